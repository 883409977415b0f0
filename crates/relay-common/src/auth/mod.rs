//! Login credential verification

mod credentials;

pub use credentials::{hash_password, verify_password, CredentialVerifier, StaticCredentials};
