//! Account number domain model

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::result::{Error, Result};

/// Public-facing account identifier used for transfer addressing.
///
/// Always exactly [`AccountNumber::WIDTH`] ASCII digits. Distinct from the
/// internal user id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountNumber(String);

impl AccountNumber {
    pub const WIDTH: usize = 8;

    /// Smallest number the generator proposes (no leading zero)
    pub const MIN: u32 = 10_000_000;
    pub const MAX: u32 = 99_999_999;

    /// Parse and validate an account number
    pub fn parse(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        if trimmed.len() != Self::WIDTH || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::validation(format!(
                "account number must be exactly {} digits",
                Self::WIDTH
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Build from a number in `MIN..=MAX`
    pub fn from_number(number: u32) -> Result<Self> {
        if !(Self::MIN..=Self::MAX).contains(&number) {
            return Err(Error::validation(format!(
                "account number {} is outside {}..={}",
                number,
                Self::MIN,
                Self::MAX
            )));
        }
        Ok(Self(number.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for AccountNumber {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for AccountNumber {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<AccountNumber> for String {
    fn from(value: AccountNumber) -> Self {
        value.0
    }
}
