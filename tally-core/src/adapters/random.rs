//! Random account number source

use rand::Rng;

use crate::domain::result::Result;
use crate::domain::AccountNumber;
use crate::ports::AccountNumberSource;

/// Draws account numbers uniformly from the 8-digit range
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomAccountNumbers;

impl AccountNumberSource for RandomAccountNumbers {
    fn propose(&self) -> Result<AccountNumber> {
        let n = rand::thread_rng().gen_range(AccountNumber::MIN..=AccountNumber::MAX);
        AccountNumber::from_number(n)
    }
}
