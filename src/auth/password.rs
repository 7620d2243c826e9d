/// Password Hashing and Verification
///
/// bcrypt with the library's default cost. The salt and cost are embedded in
/// the hash string, so only the hash needs to be stored.

use bcrypt::{hash, verify, DEFAULT_COST};

use crate::error::PasswordError;

/// bcrypt only looks at the first 72 bytes; longer input is refused rather than
/// silently truncated.
pub const MAX_PASSWORD_BYTES: usize = 72;

/// Hash a password using bcrypt
///
/// # Errors
/// Returns `HashingFailure` if the password exceeds bcrypt's input limit or the
/// primitive itself fails.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(PasswordError::HashingFailure(format!(
            "password exceeds {} bytes",
            MAX_PASSWORD_BYTES
        )));
    }

    hash(password, DEFAULT_COST).map_err(|e| PasswordError::HashingFailure(e.to_string()))
}

/// Verify a password against its hash
///
/// # Errors
/// Returns `VerificationFailure` for a wrong password, an unparsable hash or an
/// unsupported cost alike.
pub fn verify_password(password: &str, password_hash: &str) -> Result<(), PasswordError> {
    // bcrypt would only compare the first 72 bytes. Still pay for the check
    // on over-long input, then refuse it.
    let too_long = password.len() > MAX_PASSWORD_BYTES;
    let input = &password.as_bytes()[..password.len().min(MAX_PASSWORD_BYTES)];

    match verify(input, password_hash) {
        Ok(true) if !too_long => Ok(()),
        Ok(_) | Err(_) => Err(PasswordError::VerificationFailure),
    }
}
