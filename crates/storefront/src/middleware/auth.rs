//! Authentication extractors and session sign-in helpers.
//!
//! Signing in stores the [`CurrentUser`] and arms the idle timer. Signing out
//! (explicitly or through the idle guard) removes both and empties the cart.

use axum::{extract::FromRequestParts, http::request::Parts};
use chrono::{Duration, Utc};
use tower_sessions::Session;

use lifebiotech_core::IdleTimer;

use crate::error::{AppError, SESSION_EXPIRED_MESSAGE};
use crate::models::{Cart, CurrentUser, PendingSignup, session_keys};

/// Extractor that requires a signed-in user.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireAuth(user): RequireAuth,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", user.full_name)
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Get the session from extensions (set by SessionManagerLayer)
        let session = parts
            .extensions
            .get::<Session>()
            .ok_or_else(|| AppError::Internal("session layer missing".to_string()))?;

        let user: CurrentUser = session
            .get(session_keys::CURRENT_USER)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Please sign in to continue".to_string()))?;

        Ok(Self(user))
    }
}

/// Sign a user in: rotate the session id, store the user and arm the idle timer.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn sign_in(
    session: &Session,
    user: &CurrentUser,
    idle_window: Duration,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session
        .remove::<PendingSignup>(session_keys::PENDING_SIGNUP)
        .await?;
    session.insert(session_keys::CURRENT_USER, user).await?;
    session
        .insert(
            session_keys::IDLE_TIMER,
            IdleTimer::armed(idle_window, Utc::now()),
        )
        .await?;

    crate::error::set_sentry_user(&user.id, Some(user.email.as_str()));
    Ok(())
}

/// Sign the user out, disarm the idle timer and clear the cart.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn sign_out(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session
        .remove::<CurrentUser>(session_keys::CURRENT_USER)
        .await?;
    session
        .remove::<IdleTimer>(session_keys::IDLE_TIMER)
        .await?;
    session.remove::<Cart>(session_keys::CART).await?;

    crate::error::clear_sentry_user();
    Ok(())
}

/// Forced sign-out after the idle window ran out.
///
/// Leaves a one-shot notice for the next session status check.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn expire_session(session: &Session) -> Result<(), tower_sessions::session::Error> {
    sign_out(session).await?;
    session
        .insert(session_keys::NOTICE, SESSION_EXPIRED_MESSAGE)
        .await
}

/// Take the one-shot notice, if any.
///
/// # Errors
///
/// Returns an error if the session cannot be read.
pub async fn take_notice(session: &Session) -> Result<Option<String>, tower_sessions::session::Error> {
    session.remove::<String>(session_keys::NOTICE).await
}
