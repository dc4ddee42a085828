//! Account number port - proposes candidate account numbers

use crate::domain::result::Result;
use crate::domain::AccountNumber;

/// Source of candidate account numbers for registration.
///
/// A proposal is only a suggestion: uniqueness is decided by the store.
pub trait AccountNumberSource: Send + Sync {
    fn propose(&self) -> Result<AccountNumber>;
}
