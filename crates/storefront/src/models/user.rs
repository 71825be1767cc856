//! User domain types.

use chrono::{DateTime, Utc};

use lifebiotech_core::{Email, UserId};

/// A storefront account (domain type).
///
/// Only created after the email address has been confirmed with an OTP.
#[derive(Debug, Clone)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// User's email address.
    pub email: Email,
    /// Name given at signup.
    pub full_name: String,
    /// Whether the email has been verified.
    pub email_verified: bool,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
    /// When the user was last updated.
    pub updated_at: DateTime<Utc>,
}
