//! Credential checks for the login endpoint
//!
//! The relay treats credential policy as a black box behind [`CredentialVerifier`].
//! The bundled implementation accepts a single configured account whose password
//! is stored as an Argon2id hash.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::config::AuthConfig;
use crate::error::AppError;

/// Decides whether a username/password pair may log in
pub trait CredentialVerifier: Send + Sync {
    fn verify(&self, username: &str, password: &str) -> bool;
}

/// Hash a password using Argon2id
///
/// # Errors
/// Returns an error if hashing fails
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Password hashing failed: {e}")))
}

/// Verify a password against a PHC hash string
///
/// # Errors
/// Returns an error if the hash is malformed
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Invalid password hash format: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// A single configured account
#[derive(Clone)]
pub struct StaticCredentials {
    username: String,
    password_hash: String,
}

impl StaticCredentials {
    /// Build from an already-hashed password
    ///
    /// # Errors
    /// Returns a configuration error if `password_hash` is not a valid PHC string
    pub fn new(username: impl Into<String>, password_hash: impl Into<String>) -> Result<Self, AppError> {
        let password_hash = password_hash.into();
        PasswordHash::new(&password_hash)
            .map_err(|e| AppError::Config(format!("Invalid AUTH_PASSWORD_HASH: {e}")))?;

        Ok(Self {
            username: username.into(),
            password_hash,
        })
    }

    /// Build from auth configuration, hashing the plaintext password when no hash is set
    pub fn from_config(config: &AuthConfig) -> Result<Self, AppError> {
        let hash = match &config.password_hash {
            Some(hash) => hash.clone(),
            None => hash_password(&config.password)?,
        };
        Self::new(config.username.clone(), hash)
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}

impl CredentialVerifier for StaticCredentials {
    // Both the username and the password have to match.
    fn verify(&self, username: &str, password: &str) -> bool {
        if username != self.username {
            return false;
        }

        match verify_password(password, &self.password_hash) {
            Ok(valid) => valid,
            Err(e) => {
                tracing::error!(error = %e, "Stored password hash could not be parsed");
                false
            }
        }
    }
}

impl std::fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticCredentials")
            .field("username", &self.username)
            .finish()
    }
}
