//! Session-related types.
//!
//! Types stored in the session for authentication state.

use serde::{Deserialize, Serialize};

use lifebiotech_core::{Email, UserId};

use super::User;

/// Session-stored user identity.
///
/// Minimal data stored in the session to identify the logged-in user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    /// User's database ID.
    pub id: UserId,
    /// User's email address.
    pub email: Email,
    /// Display name.
    pub full_name: String,
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            full_name: user.full_name.clone(),
        }
    }
}

/// A signup waiting for its OTP.
///
/// The password is hashed before it is parked in the session.
#[derive(Clone, Serialize, Deserialize)]
pub struct PendingSignup {
    pub email: Email,
    pub full_name: String,
    pub password_hash: String,
}

impl std::fmt::Debug for PendingSignup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingSignup")
            .field("email", &self.email)
            .field("full_name", &self.full_name)
            .field("password_hash", &"[REDACTED]")
            .finish()
    }
}

/// Session keys.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for the shopping cart.
    pub const CART: &str = "cart";

    /// Key for the idle-timeout timer.
    pub const IDLE_TIMER: &str = "idle_timer";

    /// Key for a signup awaiting OTP confirmation.
    pub const PENDING_SIGNUP: &str = "pending_signup";

    /// Key for a one-shot notice shown on the next session status check.
    pub const NOTICE: &str = "notice";
}
