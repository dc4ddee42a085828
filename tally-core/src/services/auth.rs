//! Session/Auth service - credential check to user handle

use std::sync::Arc;

use serde::Serialize;

use crate::adapters::duckdb::DuckDbRepository;
use crate::domain::result::{Error, Result};
use crate::domain::{AccountNumber, Credential, UserId};
use crate::ports::CredentialHasher;

/// Hashed once at startup so unknown usernames cost a real verification
const DUMMY_PASSWORD: &str = "tally-dummy-credential";

/// Proof of a successful login.
///
/// Only [`AuthService::authenticate`] creates handles; ledger operations take
/// one instead of a bare user id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserHandle {
    id: UserId,
    username: String,
    account_number: AccountNumber,
}

impl UserHandle {
    pub(crate) fn new(id: UserId, username: String, account_number: AccountNumber) -> Self {
        Self {
            id,
            username,
            account_number,
        }
    }

    pub fn id(&self) -> UserId {
        self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn account_number(&self) -> &AccountNumber {
        &self.account_number
    }
}

pub struct AuthService {
    repository: Arc<DuckDbRepository>,
    hasher: Arc<dyn CredentialHasher>,
    dummy: Credential,
}

impl AuthService {
    pub fn new(repository: Arc<DuckDbRepository>, hasher: Arc<dyn CredentialHasher>) -> Result<Self> {
        let dummy = hasher.hash(DUMMY_PASSWORD)?;
        Ok(Self {
            repository,
            hasher,
            dummy,
        })
    }

    /// Check a username and password.
    ///
    /// Unknown usernames and wrong passwords both yield `AuthFailure`.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<UserHandle> {
        match self.repository.get_user_by_username(username.trim())? {
            Some(user) if self.hasher.verify(password, &user.credential) => Ok(UserHandle::new(
                user.id,
                user.username,
                user.account_number,
            )),
            Some(_) => Err(Error::AuthFailure),
            None => {
                let _ = self.hasher.verify(password, &self.dummy);
                Err(Error::AuthFailure)
            }
        }
    }
}
