//! Password hashing with Argon2id, stored as PHC strings.

use crate::CoreAccessError;
use argon2::password_hash::{PasswordHash, SaltString};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use rand::RngCore;
use rand::rngs::OsRng;

const SALT_SIZE: usize = 16;
pub const MIN_PASSWORD_LENGTH: usize = 6;

pub fn hash_password(password: &str) -> Result<String, CoreAccessError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(CoreAccessError::WeakPassword(MIN_PASSWORD_LENGTH));
    }

    let mut salt = [0u8; SALT_SIZE];
    OsRng.fill_bytes(&mut salt);
    let salt_string = SaltString::encode_b64(&salt)
        .map_err(|e| CoreAccessError::PasswordHash(format!("Salt encoding failed: {e}")))?;

    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt_string)
        .map_err(|e| CoreAccessError::PasswordHash(format!("Hashing failed: {e}")))?;

    Ok(hash.to_string())
}

/// Returns `false` for a mismatch and for a stored hash that does not parse.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!("Stored password hash is not a valid PHC string: {e}");
            false
        }
    }
}
