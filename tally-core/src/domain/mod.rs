//! Core domain entities
//!
//! All business entities are defined here. These are pure data structures
//! with validation logic - no I/O or external dependencies.

mod account_number;
pub mod money;
pub mod result;
mod transaction;
mod user;

pub use account_number::AccountNumber;
pub use transaction::{NewTransaction, Receipt, Transaction, TransactionKind};
pub use user::{Credential, NewUser, User, UserId, UserProfile};
