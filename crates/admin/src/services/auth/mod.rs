//! Authentication service.
//!
//! Email and password sign-in for staff and clients, self-service client
//! registration, and account creation for administrators and the CLI.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sqlx::PgPool;

use salonhub_core::{Email, UserId};

use crate::db::RepositoryError;
use crate::db::users::UserRepository;
use crate::models::{ClientRegistration, NewUser, User, non_blank};

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Authentication service.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            users: UserRepository::new(pool),
        }
    }

    /// Login with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    /// Returns `AuthError::AccountDisabled` if the account was deactivated.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = Email::parse(email)?;

        let user = self
            .users
            .get_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let password_hash = self
            .users
            .get_password_hash(user.id)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;

        // Disabled state is only reported once the password matched
        if !user.is_active {
            return Err(AuthError::AccountDisabled);
        }

        Ok(user)
    }

    /// Register a new client account.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    pub async fn register_client(&self, registration: ClientRegistration) -> Result<User, AuthError> {
        self.create_user(&NewUser::from(registration)).await
    }

    /// Create an account with any role.
    ///
    /// Permission checks are the caller's job; this only validates and
    /// stores.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Invalid` if the fields are inconsistent,
    /// `AuthError::WeakPassword` for a short password and
    /// `AuthError::UserAlreadyExists` if the email is taken.
    pub async fn create_user(&self, new_user: &NewUser) -> Result<User, AuthError> {
        let email = Email::parse(&new_user.email)?;
        new_user.validate().map_err(AuthError::Invalid)?;

        let password_hash = match new_user.password.as_deref() {
            Some(password) => {
                validate_password(password)?;
                Some(hash_password(password)?)
            }
            None => None,
        };

        let phone = non_blank(new_user.phone.as_deref());
        let user = self
            .users
            .create(
                &email,
                &new_user.name,
                phone.as_deref(),
                new_user.role,
                new_user.branch_id,
                password_hash.as_deref(),
            )
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(msg) if msg.contains("email") => {
                    AuthError::UserAlreadyExists
                }
                other => AuthError::Repository(other),
            })?;

        tracing::info!(user_id = %user.id, role = ?user.role, "Account created");
        Ok(user)
    }

    /// Set a new password for a user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::WeakPassword` if the password is too short.
    pub async fn set_password(&self, user_id: UserId, password: &str) -> Result<(), AuthError> {
        validate_password(password)?;
        let password_hash = hash_password(password)?;
        self.users.set_password(user_id, &password_hash).await?;
        Ok(())
    }
}

/// Validate password meets requirements.
///
/// # Errors
///
/// Returns `AuthError::WeakPassword` if the password is shorter than
/// [`MIN_PASSWORD_LENGTH`] characters.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }

    Ok(())
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_password_length() {
        assert!(validate_password("short").is_err());
        assert!(validate_password("long enough").is_ok());
    }

    #[test]
    fn test_hash_and_verify_roundtrip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong horse", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_garbage_hash_is_invalid_credentials() {
        assert!(matches!(
            verify_password("anything", "not-a-hash"),
            Err(AuthError::InvalidCredentials)
        ));
    }
}
