//! Account registry - registration and account lookups
//!
//! Owns account numbers, usernames and emails. Uniqueness is enforced by the
//! store's UNIQUE constraints; the probes inside the registration scope only
//! turn the common case into a clean error before the insert.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::adapters::duckdb::{store_timestamp, DuckDbRepository};
use crate::config::{Config, PasswordPolicy};
use crate::domain::money;
use crate::domain::result::{Error, Result};
use crate::domain::{AccountNumber, NewTransaction, NewUser, TransactionKind, UserId, UserProfile};
use crate::ports::{AccountNumberSource, CredentialHasher};
use crate::services::validation;

/// Raw registration input as typed by the user
#[derive(Debug, Clone)]
pub struct RegistrationRequest {
    pub fullname: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub initial_deposit: Decimal,
}

/// Outcome of a successful registration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Registration {
    pub user_id: UserId,
    pub account_number: AccountNumber,
    pub balance: Decimal,
    /// The opening `deposit` entry
    pub transaction_id: i64,
}

/// What another user may learn about an account (transfer confirmation)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountSummary {
    pub account_number: AccountNumber,
    pub fullname: String,
}

pub struct AccountRegistry {
    repository: Arc<DuckDbRepository>,
    hasher: Arc<dyn CredentialHasher>,
    numbers: Arc<dyn AccountNumberSource>,
    minimum_opening_balance: Decimal,
    account_number_attempts: u32,
    password_policy: PasswordPolicy,
}

impl AccountRegistry {
    pub fn new(
        repository: Arc<DuckDbRepository>,
        hasher: Arc<dyn CredentialHasher>,
        numbers: Arc<dyn AccountNumberSource>,
        config: &Config,
    ) -> Self {
        Self {
            repository,
            hasher,
            numbers,
            minimum_opening_balance: config.ledger.minimum_opening_balance,
            account_number_attempts: config.registration.account_number_attempts.max(1),
            password_policy: config.password_policy.clone(),
        }
    }

    pub fn minimum_opening_balance(&self) -> Decimal {
        self.minimum_opening_balance
    }

    pub fn password_policy(&self) -> &PasswordPolicy {
        &self.password_policy
    }

    /// Create a user with an opening deposit and return the new account number.
    ///
    /// The user row and the opening `deposit` entry are written in one store
    /// transaction. A colliding account number is replaced by a fresh
    /// proposal, up to the configured number of attempts.
    pub fn register(&self, request: &RegistrationRequest) -> Result<AccountNumber> {
        self.register_account(request)
            .map(|registration| registration.account_number)
    }

    /// Like [`AccountRegistry::register`], with the ids of what was created
    pub fn register_account(&self, request: &RegistrationRequest) -> Result<Registration> {
        let fullname = validation::validate_full_name(&request.fullname)?;
        let username = validation::validate_username(&request.username)?;
        let email = validation::validate_email(&request.email)?;
        validation::validate_password(&request.password, &self.password_policy)?;

        let deposit = money::ensure_representable(request.initial_deposit)?;
        if deposit < self.minimum_opening_balance || deposit <= Decimal::ZERO {
            return Err(Error::BelowMinimumDeposit {
                minimum: self.minimum_opening_balance,
            });
        }

        let credential = self.hasher.hash(&request.password)?;

        for _ in 0..self.account_number_attempts {
            let account_number = self.numbers.propose()?;
            let user = NewUser {
                username: username.clone(),
                email: email.clone(),
                fullname: fullname.clone(),
                credential: credential.clone(),
                account_number: account_number.clone(),
                balance: deposit,
                created_at: store_timestamp(Utc::now().naive_utc()),
            };

            let outcome = self.repository.atomic(|tx| {
                if tx.account_number_exists(&user.account_number)? {
                    return Err(Error::AccountNumberTaken);
                }
                if tx.username_exists(&user.username)? {
                    return Err(Error::DuplicateUsername);
                }
                if tx.email_exists(&user.email)? {
                    return Err(Error::DuplicateEmail);
                }

                let user_id = tx.insert_user(&user)?;
                let transaction_id = tx.append_transaction(&NewTransaction::new(
                    user_id,
                    TransactionKind::Deposit,
                    deposit,
                    user.created_at,
                ))?;
                Ok((user_id, transaction_id))
            });

            match outcome {
                Ok((user_id, transaction_id)) => {
                    return Ok(Registration {
                        user_id,
                        account_number,
                        balance: deposit,
                        transaction_id,
                    });
                }
                Err(Error::AccountNumberTaken) => continue,
                Err(e) => return Err(e),
            }
        }

        Err(Error::AccountNumberExhausted {
            attempts: self.account_number_attempts,
        })
    }

    /// Advisory check; registration can still lose a race for the name
    pub fn username_available(&self, username: &str) -> Result<bool> {
        Ok(!self.repository.username_exists(username.trim())?)
    }

    /// Advisory check; emails are compared lowercase
    pub fn email_available(&self, email: &str) -> Result<bool> {
        Ok(!self
            .repository
            .email_exists(&email.trim().to_lowercase())?)
    }

    pub fn find_by_account_number(&self, number: &AccountNumber) -> Result<Option<AccountSummary>> {
        Ok(self
            .repository
            .get_user_by_account_number(number)?
            .map(|user| AccountSummary {
                account_number: user.account_number,
                fullname: user.fullname,
            }))
    }

    pub fn profile(&self, user_id: UserId) -> Result<UserProfile> {
        self.repository
            .get_user(user_id)?
            .map(|user| user.profile())
            .ok_or(Error::AccountNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::argon2::Argon2Hasher;
    use crate::config::{Argon2Params, StoreSettings};
    use std::sync::Mutex;

    /// Replays a fixed list of proposals, then repeats the last one
    struct Scripted(Mutex<Vec<&'static str>>);

    impl AccountNumberSource for Scripted {
        fn propose(&self) -> Result<AccountNumber> {
            let mut numbers = self
                .0
                .lock()
                .map_err(|e| Error::storage(e.to_string()))?;
            let next = if numbers.len() > 1 {
                numbers.remove(0)
            } else {
                numbers[0]
            };
            AccountNumber::parse(next)
        }
    }

    fn registry(numbers: Vec<&'static str>) -> (AccountRegistry, Arc<DuckDbRepository>) {
        let repository = Arc::new(DuckDbRepository::open_in_memory(&StoreSettings::default()).unwrap());
        repository.ensure_schema().unwrap();
        let mut config = Config::default();
        config.registration.account_number_attempts = 3;
        let registry = AccountRegistry::new(
            Arc::clone(&repository),
            Arc::new(Argon2Hasher::new(&Argon2Params::insecure_fast()).unwrap()),
            Arc::new(Scripted(Mutex::new(numbers))),
            &config,
        );
        (registry, repository)
    }

    fn request(username: &str, deposit: i64) -> RegistrationRequest {
        RegistrationRequest {
            fullname: "Ada Lovelace".to_string(),
            username: username.to_string(),
            email: format!("{}@Example.com", username),
            password: "Secret@123".to_string(),
            initial_deposit: Decimal::new(deposit, 0),
        }
    }

    #[test]
    fn test_register_creates_user_and_opening_deposit() {
        let (registry, repository) = registry(vec!["12345678"]);
        let registration = registry.register_account(&request("alice", 2500)).unwrap();

        assert_eq!(registration.account_number.as_str(), "12345678");
        let profile = registry.profile(registration.user_id).unwrap();
        assert_eq!(profile.balance, Decimal::new(2500, 0));
        assert_eq!(profile.email, "alice@example.com");

        let history = repository
            .history_page(registration.user_id, 10, None)
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, registration.transaction_id);
        assert_eq!(history[0].kind, TransactionKind::Deposit);
        assert_eq!(history[0].amount, Decimal::new(2500, 0));
        assert_eq!(history[0].timestamp, profile.created_at);
    }

    #[test]
    fn test_below_minimum_deposit() {
        let (registry, repository) = registry(vec!["12345678"]);
        let err = registry.register(&request("alice", 1999)).unwrap_err();
        assert!(matches!(err, Error::BelowMinimumDeposit { .. }));
        assert!(!repository.username_exists("alice").unwrap());
    }

    #[test]
    fn test_duplicate_username_and_email() {
        let (registry, _) = registry(vec!["11111111", "22222222", "33333333"]);
        registry.register(&request("alice", 2000)).unwrap();

        let err = registry.register(&request("alice", 2000)).unwrap_err();
        assert!(matches!(err, Error::DuplicateUsername));

        let mut same_email = request("alice2", 2000);
        same_email.email = "ALICE@example.com".to_string();
        let err = registry.register(&same_email).unwrap_err();
        assert!(matches!(err, Error::DuplicateEmail));
    }

    #[test]
    fn test_collision_retries_with_new_number() {
        let (registry, _) = registry(vec!["11111111", "11111111", "22222222"]);
        assert_eq!(registry.register(&request("alice", 2000)).unwrap().as_str(), "11111111");
        assert_eq!(registry.register(&request("bobby", 2000)).unwrap().as_str(), "22222222");
    }

    #[test]
    fn test_exhaustion_leaves_no_partial_user() {
        let (registry, repository) = registry(vec!["11111111"]);
        registry.register(&request("alice", 2000)).unwrap();

        let err = registry.register(&request("bobby", 2000)).unwrap_err();
        assert!(matches!(err, Error::AccountNumberExhausted { attempts: 3 }));
        assert!(repository.get_user_by_username("bobby").unwrap().is_none());
        assert_eq!(repository.get_totals().unwrap().users, 1);
    }

    #[test]
    fn test_invalid_input_is_rejected_before_hashing() {
        let (registry, _) = registry(vec!["11111111"]);
        let mut bad = request("alice", 2000);
        bad.password = "weak".to_string();
        assert!(matches!(registry.register(&bad), Err(Error::Validation(_))));

        let bad = request("al", 2000);
        assert!(matches!(registry.register(&bad), Err(Error::Validation(_))));
    }

    #[test]
    fn test_lookups() {
        let (registry, _) = registry(vec!["12345678"]);
        assert!(registry.username_available("alice").unwrap());
        registry.register(&request("alice", 2000)).unwrap();

        assert!(!registry.username_available("alice").unwrap());
        assert!(!registry.email_available("Alice@Example.com").unwrap());

        let number = AccountNumber::parse("12345678").unwrap();
        let summary = registry.find_by_account_number(&number).unwrap().unwrap();
        assert_eq!(summary.fullname, "Ada Lovelace");
        assert!(registry
            .find_by_account_number(&AccountNumber::parse("87654321").unwrap())
            .unwrap()
            .is_none());
        assert!(matches!(registry.profile(UserId(999)), Err(Error::AccountNotFound)));
    }
}
