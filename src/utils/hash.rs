use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::error::AppError;

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);

    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .to_string();

    Ok(password_hash)
}

/// `Ok(false)` on a mismatch. A stored hash that does not parse is an internal fault.
pub fn verify_password(password: &str, password_hash: &str) -> Result<bool, AppError> {
    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_verify_only_the_original_password() {
        let hash = hash_password("s3cret!").unwrap();
        assert_ne!(hash, "s3cret!");
        assert!(verify_password("s3cret!", &hash).unwrap());
        assert!(!verify_password("S3cret!", &hash).unwrap());
    }

    #[test]
    fn corrupt_hash_is_an_internal_error() {
        assert!(matches!(
            verify_password("x", "plaintext"),
            Err(AppError::InternalServerError(_))
        ));
    }
}
