//! Result and error types for the core library

use serde::Serialize;
use thiserror::Error;

/// Core library error type
///
/// Variants are grouped into coarse [`ErrorKind`]s so the presentation layer
/// can decide how to react without matching every variant.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(String),

    // === Conflicts ===
    #[error("Username is already taken")]
    DuplicateUsername,

    #[error("Email is already registered")]
    DuplicateEmail,

    /// Raised for a single colliding proposal; registration retries on it.
    #[error("Account number is already in use")]
    AccountNumberTaken,

    #[error("Could not allocate a free account number after {attempts} attempts")]
    AccountNumberExhausted { attempts: u32 },

    // === Ledger state ===
    #[error("Insufficient funds")]
    InsufficientFunds,

    #[error("Cannot transfer to your own account")]
    SelfTransferNotAllowed,

    #[error("Recipient account not found")]
    RecipientNotFound,

    #[error("Amount must be greater than zero")]
    NonPositiveAmount,

    #[error("Opening deposit must be at least {minimum}")]
    BelowMinimumDeposit { minimum: rust_decimal::Decimal },

    #[error("Account not found")]
    AccountNotFound,

    #[error("Balance would exceed the maximum of {maximum}")]
    BalanceLimitExceeded { maximum: rust_decimal::Decimal },

    // === Auth ===
    #[error("Invalid username or password")]
    AuthFailure,

    // === Storage ===
    #[error("Database error: {0}")]
    Storage(String),

    #[error("Database write conflict: {0}")]
    WriteConflict(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Coarse classification of [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Validation,
    Conflict,
    State,
    Auth,
    Storage,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Conflict => "conflict",
            ErrorKind::State => "state",
            ErrorKind::Auth => "auth",
            ErrorKind::Storage => "storage",
        }
    }
}

impl Error {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::Validation,
            Error::DuplicateUsername
            | Error::DuplicateEmail
            | Error::AccountNumberTaken
            | Error::AccountNumberExhausted { .. } => ErrorKind::Conflict,
            Error::InsufficientFunds
            | Error::SelfTransferNotAllowed
            | Error::RecipientNotFound
            | Error::NonPositiveAmount
            | Error::BelowMinimumDeposit { .. }
            | Error::AccountNotFound
            | Error::BalanceLimitExceeded { .. } => ErrorKind::State,
            Error::AuthFailure => ErrorKind::Auth,
            Error::Storage(_)
            | Error::WriteConflict(_)
            | Error::Config(_)
            | Error::Io(_)
            | Error::Json(_) => ErrorKind::Storage,
        }
    }

    /// Stable snake_case name of the variant, safe to record in event logs
    pub fn code(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation",
            Error::DuplicateUsername => "duplicate_username",
            Error::DuplicateEmail => "duplicate_email",
            Error::AccountNumberTaken => "account_number_taken",
            Error::AccountNumberExhausted { .. } => "account_number_exhausted",
            Error::InsufficientFunds => "insufficient_funds",
            Error::SelfTransferNotAllowed => "self_transfer_not_allowed",
            Error::RecipientNotFound => "recipient_not_found",
            Error::NonPositiveAmount => "non_positive_amount",
            Error::BelowMinimumDeposit { .. } => "below_minimum_deposit",
            Error::AccountNotFound => "account_not_found",
            Error::BalanceLimitExceeded { .. } => "balance_limit_exceeded",
            Error::AuthFailure => "auth_failure",
            Error::Storage(_) => "storage",
            Error::WriteConflict(_) => "write_conflict",
            Error::Config(_) => "config",
            Error::Io(_) => "io",
            Error::Json(_) => "json",
        }
    }

    /// True for errors that a fresh attempt of the same store transaction may clear
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::WriteConflict(_))
    }
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_error_kinds() {
        assert_eq!(Error::validation("bad").kind(), ErrorKind::Validation);
        assert_eq!(Error::DuplicateUsername.kind(), ErrorKind::Conflict);
        assert_eq!(
            Error::AccountNumberExhausted { attempts: 3 }.kind(),
            ErrorKind::Conflict
        );
        assert_eq!(Error::InsufficientFunds.kind(), ErrorKind::State);
        assert_eq!(
            Error::BelowMinimumDeposit { minimum: Decimal::new(2000, 0) }.kind(),
            ErrorKind::State
        );
        assert_eq!(
            Error::BalanceLimitExceeded { maximum: Decimal::new(100, 0) }.kind(),
            ErrorKind::State
        );
        assert_eq!(Error::AuthFailure.kind(), ErrorKind::Auth);
        assert_eq!(Error::storage("disk").kind(), ErrorKind::Storage);
        assert_eq!(Error::WriteConflict("x".into()).kind(), ErrorKind::Storage);
    }

    #[test]
    fn test_only_write_conflicts_are_retryable() {
        assert!(Error::WriteConflict("conflict".into()).is_retryable());
        assert!(!Error::storage("io").is_retryable());
        assert!(!Error::InsufficientFunds.is_retryable());
        assert!(!Error::BalanceLimitExceeded { maximum: Decimal::ONE }.is_retryable());
    }

    #[test]
    fn test_error_messages() {
        let err = Error::validation("bad input");
        assert!(err.to_string().contains("Validation error"));

        let err = Error::BelowMinimumDeposit { minimum: Decimal::new(2000, 0) };
        assert_eq!(err.to_string(), "Opening deposit must be at least 2000");
    }
}
