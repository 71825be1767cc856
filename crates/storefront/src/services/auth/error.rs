//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::otp::OtpError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("Invalid email address")]
    InvalidEmail(#[from] lifebiotech_core::EmailError),

    /// Full name missing or too short.
    #[error("Full name must be at least {min} characters")]
    InvalidName { min: usize },

    /// Password too weak or invalid.
    #[error("{0}")]
    WeakPassword(String),

    /// Password and confirmation differ.
    #[error("Passwords don't match")]
    PasswordMismatch,

    /// Invalid credentials (wrong password or user not found).
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// User already exists.
    #[error("An account with this email already exists")]
    UserAlreadyExists,

    /// `signup/verify` called without a signup in progress.
    #[error("No signup in progress. Please sign up again.")]
    NoPendingSignup,

    /// OTP issuance or verification failed.
    #[error(transparent)]
    Otp(#[from] OtpError),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}
