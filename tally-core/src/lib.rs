//! Tally Core - ledger consistency engine for a small banking ledger
//!
//! This crate implements the core domain logic following hexagonal architecture:
//!
//! - **domain**: Core business entities (User, Transaction, AccountNumber, money rules)
//! - **ports**: Trait definitions for external capabilities (credential hashing, account numbers)
//! - **services**: Account registry, auth, ledger engine, diagnostics, event log
//! - **adapters**: Concrete implementations (DuckDB, Argon2id, RNG)

pub mod adapters;
pub mod config;
pub mod domain;
pub mod log_migrations;
pub mod migrations;
pub mod ports;
pub mod services;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use adapters::argon2::Argon2Hasher;
use adapters::duckdb::DuckDbRepository;
use adapters::random::RandomAccountNumbers;
use config::Config;
use ports::{AccountNumberSource, CredentialHasher};
use services::*;

// Re-export commonly used types at crate root
pub use domain::result::{Error, ErrorKind};
pub use domain::{AccountNumber, Receipt, Transaction, TransactionKind, UserId, UserProfile};
pub use services::{RegistrationRequest, UserHandle};

/// Main context for Tally operations
///
/// This is the primary entry point for all business logic. It holds the
/// store, configuration, and all services. Safe to share between threads.
pub struct TallyContext {
    pub config: Config,
    pub repository: Arc<DuckDbRepository>,
    pub registry: AccountRegistry,
    pub auth: AuthService,
    pub ledger: LedgerService,
    pub doctor: DoctorService,
    pub status: StatusService,
}

impl TallyContext {
    /// Open the ledger in a tally directory, creating it if needed
    pub fn new(tally_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(tally_dir)
            .with_context(|| format!("Failed to create {}", tally_dir.display()))?;
        let config = Config::load(tally_dir).context("Failed to load settings")?;

        let db_path = tally_dir.join(&config.ledger.db_file);
        let repository = DuckDbRepository::open(&db_path, &config.store)
            .with_context(|| format!("Failed to open {}", db_path.display()))?;

        Self::with_repository(config, Arc::new(repository), Arc::new(RandomAccountNumbers))
    }

    /// A context backed by a private in-memory database
    pub fn open_in_memory(config: Config) -> Result<Self> {
        let repository = DuckDbRepository::open_in_memory(&config.store)
            .context("Failed to open in-memory database")?;
        Self::with_repository(config, Arc::new(repository), Arc::new(RandomAccountNumbers))
    }

    /// Wire services around an opened repository and run pending migrations
    pub fn with_repository(
        config: Config,
        repository: Arc<DuckDbRepository>,
        account_numbers: Arc<dyn AccountNumberSource>,
    ) -> Result<Self> {
        repository
            .ensure_schema()
            .context("Failed to apply schema migrations")?;

        let hasher: Arc<dyn CredentialHasher> =
            Arc::new(Argon2Hasher::new(&config.argon2).context("Invalid argon2 settings")?);

        let registry = AccountRegistry::new(
            Arc::clone(&repository),
            Arc::clone(&hasher),
            account_numbers,
            &config,
        );
        let auth = AuthService::new(Arc::clone(&repository), hasher)?;
        let ledger = LedgerService::new(Arc::clone(&repository));
        let doctor = DoctorService::new(Arc::clone(&repository));
        let status = StatusService::new(Arc::clone(&repository));

        Ok(Self {
            config,
            repository,
            registry,
            auth,
            ledger,
            doctor,
            status,
        })
    }
}
