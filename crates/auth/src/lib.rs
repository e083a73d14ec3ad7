//! `depot-auth` — accounts, password digests and the credential directory.
//!
//! This crate is intentionally decoupled from sessions and storage backends.

pub mod account;
pub mod directory;
pub mod password;

pub use account::Account;
pub use directory::{CredentialDirectory, CredentialStore, InMemoryCredentialStore};
pub use password::{hash_password, validate_password, verify_password, MIN_PASSWORD_LEN};
