//! Argon2id credential hasher

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::rngs::OsRng;

use crate::config::Argon2Params;
use crate::domain::result::{Error, Result};
use crate::domain::Credential;
use crate::ports::CredentialHasher;

/// Hashes passwords into PHC strings (`$argon2id$v=19$m=...`).
///
/// The cost parameters are embedded in every credential, so changing them
/// only affects newly hashed passwords.
pub struct Argon2Hasher {
    argon2: Argon2<'static>,
}

impl Argon2Hasher {
    pub fn new(params: &Argon2Params) -> Result<Self> {
        let params = Params::new(
            params.memory_cost,
            params.time_cost,
            params.parallelism,
            None,
        )
        .map_err(|e| Error::Config(format!("invalid argon2 parameters: {}", e)))?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }
}

impl CredentialHasher for Argon2Hasher {
    fn hash(&self, plaintext: &str) -> Result<Credential> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|e| Error::storage(format!("failed to hash password: {}", e)))?;
        Ok(Credential::new(hash.to_string()))
    }

    fn verify(&self, plaintext: &str, credential: &Credential) -> bool {
        match PasswordHash::new(credential.as_str()) {
            Ok(parsed) => self
                .argon2
                .verify_password(plaintext.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }
}
