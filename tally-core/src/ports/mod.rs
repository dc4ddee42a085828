//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for external dependencies. The core domain
//! depends only on these traits, not on concrete implementations.

mod account_numbers;
mod credentials;

pub use account_numbers::AccountNumberSource;
pub use credentials::CredentialHasher;
