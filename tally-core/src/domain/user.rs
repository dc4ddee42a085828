//! User domain model

use std::fmt;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::AccountNumber;

/// Surrogate key of a user row
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque hashed representation of a password. Never compared in plaintext.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// A registered account holder as stored
#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub fullname: String,
    pub credential: Credential,
    pub account_number: AccountNumber,
    pub balance: Decimal,
    pub created_at: NaiveDateTime,
}

impl User {
    /// The public view of this user, without the credential
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            fullname: self.fullname.clone(),
            account_number: self.account_number.clone(),
            balance: self.balance,
            created_at: self.created_at,
        }
    }
}

/// User data safe to hand to the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserProfile {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub fullname: String,
    pub account_number: AccountNumber,
    pub balance: Decimal,
    pub created_at: NaiveDateTime,
}

/// Input for a new user row
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub fullname: String,
    pub credential: Credential,
    pub account_number: AccountNumber,
    pub balance: Decimal,
    pub created_at: NaiveDateTime,
}
