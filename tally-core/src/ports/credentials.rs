//! Credential port - password hashing capability

use crate::domain::result::Result;
use crate::domain::Credential;

/// Turns plaintext passwords into opaque credentials and checks them.
///
/// Implementations must be safe to share between threads; the core never
/// inspects the credential contents.
pub trait CredentialHasher: Send + Sync {
    /// Hash a plaintext password into a storable credential
    fn hash(&self, plaintext: &str) -> Result<Credential>;

    /// Check a plaintext password against a stored credential.
    ///
    /// Returns `false` for a malformed credential instead of erroring.
    fn verify(&self, plaintext: &str, credential: &Credential) -> bool;
}
