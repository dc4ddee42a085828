//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - DuckDB for ledger storage and the atomic scope
//! - Argon2id for the CredentialHasher port
//! - Thread-local RNG for the AccountNumberSource port

pub mod argon2;
pub mod duckdb;
pub mod random;
