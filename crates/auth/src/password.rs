//! Password digests.
//!
//! Passwords are stored as the lowercase hex SHA-256 of the plaintext, without
//! a salt. This is weak, but existing credential files depend on it; changing
//! the scheme means migrating every stored hash.

use sha2::{Digest, Sha256};

use depot_core::{LedgerError, LedgerResult};

pub const MIN_PASSWORD_LEN: usize = 8;

pub fn hash_password(plain: &str) -> String {
    hex::encode(Sha256::digest(plain.as_bytes()))
}

pub fn verify_password(plain: &str, hash: &str) -> bool {
    hash_password(plain) == hash
}

/// `subject` names the password in the error ("password", "new password").
///
/// The minimum counts UTF-8 bytes, as existing credential files were checked.
pub fn validate_password(subject: &str, plain: &str) -> LedgerResult<()> {
    if plain.len() < MIN_PASSWORD_LEN {
        return Err(LedgerError::validation(format!(
            "{subject} must be at least {MIN_PASSWORD_LEN} characters long"
        )));
    }
    Ok(())
}
