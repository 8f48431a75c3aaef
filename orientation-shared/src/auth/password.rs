/// Password hashing using Argon2id
///
/// Local accounts store an Argon2id PHC string in `users.password_hash`.
/// Accounts created through an OAuth provider have no hash and cannot log in
/// with a password.
///
/// # Example
///
/// ```
/// use orientation_shared::auth::password::{hash_password, verify_password};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("Welcome-2025")?;
/// assert!(verify_password("Welcome-2025", &hash)?);
/// assert!(!verify_password("wrong", &hash)?);
/// # Ok(())
/// # }
/// ```

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, ParamsBuilder, Version,
};

/// Minimum accepted password length
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Error type for password hashing operations
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    /// Failed to hash password
    #[error("Failed to hash password: {0}")]
    HashError(String),

    /// Failed to verify password
    #[error("Failed to verify password: {0}")]
    VerifyError(String),

    /// Invalid password hash format
    #[error("Invalid password hash format: {0}")]
    InvalidHash(String),
}

/// Hashes a password with Argon2id (19 MiB, 2 passes, 1 lane)
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    let params = ParamsBuilder::new()
        .m_cost(19 * 1024)
        .t_cost(2)
        .p_cost(1)
        .output_len(32)
        .build()
        .map_err(|e| PasswordError::HashError(format!("Invalid parameters: {}", e)))?;

    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, params);

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::HashError(format!("Hash generation failed: {}", e)))?;

    Ok(password_hash.to_string())
}

/// Verifies a password against a stored PHC hash
///
/// Returns `Ok(false)` on mismatch and an error only for unparsable hashes.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| PasswordError::InvalidHash(format!("Failed to parse hash: {}", e)))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(_) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::VerifyError(format!("Verification failed: {}", e))),
    }
}

/// Checks minimum password requirements
///
/// At least [`MIN_PASSWORD_LENGTH`] characters with one letter and one digit.
pub fn validate_password_strength(password: &str) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LENGTH
        ));
    }

    if !password.chars().any(|c| c.is_alphabetic()) {
        return Err("Password must contain at least one letter".to_string());
    }

    if !password.chars().any(|c| c.is_numeric()) {
        return Err("Password must contain at least one digit".to_string());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_password_format() {
        let hash = hash_password("orientation1").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(hash.contains("m=19456"));
        assert!(hash.contains("t=2"));
    }

    #[test]
    fn test_hash_password_produces_different_salts() {
        assert_ne!(
            hash_password("same_password").unwrap(),
            hash_password("same_password").unwrap()
        );
    }

    #[test]
    fn test_verify_password() {
        let hash = hash_password("correct_password").unwrap();
        assert!(verify_password("correct_password", &hash).unwrap());
        assert!(!verify_password("wrong_password", &hash).unwrap());
        assert!(!verify_password("", &hash).unwrap());
    }

    #[test]
    fn test_verify_password_invalid_hash() {
        assert!(verify_password("password", "invalid_hash").is_err());

        // Parses as PHC but cannot match any password
        assert!(!verify_password("password", "$argon2id$invalid").unwrap_or(false));
    }

    #[test]
    fn test_validate_password_strength() {
        assert!(validate_password_strength("welcome2025").is_ok());
        assert!(validate_password_strength("pässwort9").is_ok());

        assert!(validate_password_strength("abc123")
            .unwrap_err()
            .contains("at least 8"));
        assert!(validate_password_strength("12345678")
            .unwrap_err()
            .contains("letter"));
        assert!(validate_password_strength("abcdefgh")
            .unwrap_err()
            .contains("digit"));
    }
}
