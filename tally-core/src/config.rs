//! Configuration management
//!
//! Settings live in `settings.json` inside the tally directory:
//! ```json
//! {
//!   "ledger": { "minimumOpeningBalance": "2000", "currencySymbol": "₦" },
//!   "registration": { "accountNumberAttempts": 16 },
//!   "passwordPolicy": { "minLength": 8, "requireSpecial": true, ... },
//!   "store": { "conflictRetries": 32, "initialRetryDelayMs": 5, "poolSize": 4 },
//!   "argon2": { "memoryCost": 19456, "timeCost": 2, "parallelism": 1 }
//! }
//! ```
//! Every section is optional and keys this crate does not know are ignored.
//! The file is only ever read; edit it by hand.

use std::path::Path;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::money;
use crate::domain::result::{Error, Result};

pub const SETTINGS_FILE: &str = "settings.json";
pub const DEFAULT_DB_FILE: &str = "tally.duckdb";

/// Raw settings.json structure
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    ledger: LedgerSettings,
    #[serde(default)]
    registration: RegistrationSettings,
    #[serde(default)]
    password_policy: PasswordPolicy,
    #[serde(default)]
    store: StoreSettings,
    #[serde(default)]
    argon2: Argon2Params,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LedgerSettings {
    /// Smallest initial deposit accepted at registration
    pub minimum_opening_balance: Decimal,
    /// Display-only; the core never formats money
    pub currency_symbol: String,
    pub db_file: String,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            minimum_opening_balance: Decimal::new(2000, 0),
            currency_symbol: "₦".to_string(),
            db_file: DEFAULT_DB_FILE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistrationSettings {
    /// How many account number proposals to try before giving up
    pub account_number_attempts: u32,
}

impl Default for RegistrationSettings {
    fn default() -> Self {
        Self { account_number_attempts: 16 }
    }
}

/// Password strength rules applied by the validation layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub require_uppercase: bool,
    pub require_lowercase: bool,
    pub require_digit: bool,
    pub require_special: bool,
    /// The only non-alphanumeric characters a password may contain
    pub special_characters: String,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            require_uppercase: true,
            require_lowercase: true,
            require_digit: true,
            require_special: true,
            special_characters: "@$!%*#?&".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreSettings {
    /// Attempts per operation when the store reports a write-write conflict
    pub conflict_retries: u32,
    /// First backoff delay; doubles on every retry
    pub initial_retry_delay_ms: u64,
    /// Idle connections kept by the pool
    pub pool_size: usize,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            conflict_retries: 32,
            initial_retry_delay_ms: 5,
            pool_size: 4,
        }
    }
}

/// Argon2id cost parameters for password credentials
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Argon2Params {
    /// Memory cost in KiB
    pub memory_cost: u32,
    pub time_cost: u32,
    pub parallelism: u32,
}

impl Default for Argon2Params {
    fn default() -> Self {
        // argon2 crate defaults (OWASP minimum for Argon2id)
        Self {
            memory_cost: 19456,
            time_cost: 2,
            parallelism: 1,
        }
    }
}

impl Argon2Params {
    /// Very cheap parameters for tests; never use for real credentials
    pub fn insecure_fast() -> Self {
        Self {
            memory_cost: 8,
            time_cost: 1,
            parallelism: 1,
        }
    }
}

/// Tally configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub ledger: LedgerSettings,
    pub registration: RegistrationSettings,
    pub password_policy: PasswordPolicy,
    pub store: StoreSettings,
    pub argon2: Argon2Params,
}

impl Config {
    /// Load config from the tally directory
    ///
    /// A missing settings file yields defaults. Two environment variables
    /// override the file (for CI/testing):
    /// - `TALLY_MIN_OPENING_BALANCE`
    /// - `TALLY_DB_FILE`
    pub fn load(tally_dir: &Path) -> Result<Self> {
        let settings_path = tally_dir.join(SETTINGS_FILE);

        let raw: SettingsFile = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)?;
            serde_json::from_str(&content)?
        } else {
            SettingsFile::default()
        };

        let mut config = Self::from_raw(raw);

        if let Ok(value) = std::env::var("TALLY_MIN_OPENING_BALANCE") {
            config.ledger.minimum_opening_balance = Decimal::from_str(value.trim())
                .map_err(|e| Error::Config(format!("TALLY_MIN_OPENING_BALANCE: {}", e)))?;
        }
        if let Ok(value) = std::env::var("TALLY_DB_FILE") {
            if !value.trim().is_empty() {
                config.ledger.db_file = value.trim().to_string();
            }
        }

        config.validate()?;
        Ok(config)
    }

    fn from_raw(raw: SettingsFile) -> Self {
        Self {
            ledger: raw.ledger,
            registration: raw.registration,
            password_policy: raw.password_policy,
            store: raw.store,
            argon2: raw.argon2,
        }
    }

    /// Reject settings the services cannot work with
    pub fn validate(&self) -> Result<()> {
        let minimum = self.ledger.minimum_opening_balance;
        if minimum < Decimal::ZERO {
            return Err(Error::Config(
                "minimumOpeningBalance cannot be negative".to_string(),
            ));
        }
        money::ensure_representable(minimum)
            .map_err(|e| Error::Config(format!("minimumOpeningBalance: {}", e)))?;
        if self.ledger.db_file.trim().is_empty() {
            return Err(Error::Config("dbFile cannot be empty".to_string()));
        }
        if self.registration.account_number_attempts == 0 {
            return Err(Error::Config(
                "accountNumberAttempts must be at least 1".to_string(),
            ));
        }
        if self.store.conflict_retries == 0 {
            return Err(Error::Config("conflictRetries must be at least 1".to_string()));
        }
        if self.store.pool_size == 0 {
            return Err(Error::Config("poolSize must be at least 1".to_string()));
        }
        if self.password_policy.min_length == 0 {
            return Err(Error::Config("minLength must be at least 1".to_string()));
        }
        Ok(())
    }
}
