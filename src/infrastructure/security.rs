use sha2::{Digest, Sha256};

/// Length of a hex-encoded SHA-256 digest.
pub const PASSWORD_HASH_LEN: usize = 64;

/// Hex-encoded SHA-256 of the password.
///
/// Unsalted and deterministic: equal passwords always produce equal hashes.
/// Stored hashes depend on this exact output, so moving to a salted or
/// memory-hard scheme needs a migration of the `users` table.
pub fn hash_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}
