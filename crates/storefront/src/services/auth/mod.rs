//! Authentication service.
//!
//! Password accounts gated by email OTP. A signup is validated and its
//! password hashed up front, parked in the session as a [`PendingSignup`],
//! and only turned into a user once the emailed code is verified. Password
//! reset follows the same verify-then-write order.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use serde::Deserialize;
use sqlx::PgPool;
use tracing::instrument;

use lifebiotech_core::Email;

use crate::db::RepositoryError;
use crate::db::users::UserRepository;
use crate::models::{PendingSignup, User};
use crate::services::otp::{OtpError, OtpStore, OtpVerifier};

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Minimum full name length, in characters.
pub const MIN_NAME_LENGTH: usize = 2;

/// Signup form.
#[derive(Debug, Clone, Deserialize)]
pub struct SignupForm {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub full_name: String,
}

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

    /// Validate a signup form and hash its password.
    ///
    /// # Errors
    ///
    /// Returns a validation error for bad input and
    /// `AuthError::UserAlreadyExists` if the email is taken.
    pub async fn prepare_signup(&self, form: SignupForm) -> Result<PendingSignup, AuthError> {
        let pending = validate_signup(form)?;

        if self.users.get_by_email(&pending.email).await?.is_some() {
            return Err(AuthError::UserAlreadyExists);
        }

        Ok(pending)
    }

    /// Verify the signup OTP and create the account.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Otp` for a bad code and
    /// `AuthError::UserAlreadyExists` if the email was registered meanwhile.
    #[instrument(skip(self, pending, otp, verifier), fields(email = %pending.email))]
    pub async fn complete_signup<S: OtpStore>(
        &self,
        pending: &PendingSignup,
        otp: &str,
        verifier: &OtpVerifier<S>,
    ) -> Result<User, AuthError> {
        verifier.verify(&pending.email, otp).await?;

        let user = self
            .users
            .create_with_password(&pending.email, &pending.full_name, &pending.password_hash)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;

        tracing::info!(user_id = %user.id, "Account created");
        Ok(user)
    }

    /// Login with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let (user, password_hash) = self
            .users
            .get_password_hash(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;

        Ok(user)
    }

    /// Look up the account a password reset code should go to.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` or `AuthError::Repository`.
    pub async fn find_account(&self, email: &str) -> Result<Option<User>, AuthError> {
        let email = Email::parse(email)?;
        Ok(self.users.get_by_email(&email).await?)
    }

    /// Verify the reset OTP and store the new password.
    ///
    /// An unknown email is reported the same way as a bad code.
    ///
    /// # Errors
    ///
    /// Returns a validation error for the new password, or `AuthError::Otp`.
    #[instrument(skip_all)]
    pub async fn reset_password<S: OtpStore>(
        &self,
        email: &str,
        otp: &str,
        password: &str,
        confirm_password: &str,
        verifier: &OtpVerifier<S>,
    ) -> Result<User, AuthError> {
        let email = Email::parse(email)?;
        validate_password(password, confirm_password)?;

        let user = self
            .users
            .get_by_email(&email)
            .await?
            .ok_or(AuthError::Otp(OtpError::InvalidOrExpired))?;

        verifier.verify(&email, otp).await?;

        let password_hash = hash_password(password)?;
        self.users.set_password_hash(user.id, &password_hash).await?;

        tracing::info!(user_id = %user.id, "Password reset");
        Ok(user)
    }
}

/// Validate a signup form and hash the password.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate_signup(form: SignupForm) -> Result<PendingSignup, AuthError> {
    let email = Email::parse(&form.email)?;

    let full_name = form.full_name.trim().to_string();
    if full_name.chars().count() < MIN_NAME_LENGTH {
        return Err(AuthError::InvalidName {
            min: MIN_NAME_LENGTH,
        });
    }

    validate_password(&form.password, &form.confirm_password)?;

    Ok(PendingSignup {
        email,
        full_name,
        password_hash: hash_password(&form.password)?,
    })
}

/// Validate password requirements.
///
/// # Errors
///
/// Returns `AuthError::WeakPassword` or `AuthError::PasswordMismatch`.
pub fn validate_password(password: &str, confirm_password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    if password != confirm_password {
        return Err(AuthError::PasswordMismatch);
    }
    Ok(())
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AuthError> {
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
