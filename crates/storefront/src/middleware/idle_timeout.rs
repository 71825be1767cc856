//! Idle sign-out for authenticated sessions.
//!
//! Every request from a signed-in user counts as activity and pushes the
//! deadline out by the configured window, except the session status check
//! which only reads it. A request arriving at or after the deadline signs the
//! user out, clears the cart and is answered with `401 session_expired`.

use axum::{
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Duration, Utc};
use tower_sessions::Session;

use lifebiotech_core::{IdleState, IdleTimer};

use crate::error::AppError;
use crate::middleware::auth::expire_session;
use crate::models::{CurrentUser, session_keys};
use crate::state::AppState;

/// Path of the status check that must not count as activity.
pub const SESSION_STATUS_PATH: &str = "/api/session";

/// Whether a request counts as user activity.
#[must_use]
pub fn is_tracked(method: &Method, path: &str) -> bool {
    !(method == Method::GET && path == SESSION_STATUS_PATH)
}

/// Apply one interaction at `now` to the stored timer.
///
/// A signed-in session without a running timer (stored before the timer
/// existed, or disarmed) is armed on its first tracked request.
#[must_use]
pub fn track_activity(
    stored: Option<IdleTimer>,
    window: Duration,
    now: DateTime<Utc>,
) -> IdleTimer {
    let mut timer = stored.unwrap_or_else(|| IdleTimer::new(window));
    if timer.state() == IdleState::Disarmed {
        timer.arm(now);
        return timer;
    }
    timer.record_activity(now);
    timer
}

/// Middleware enforcing the idle window on signed-in sessions.
///
/// # Errors
///
/// Returns `AppError::SessionExpired` once the window has elapsed, or a
/// session error if the store cannot be read or written.
pub async fn idle_timeout_middleware(
    State(state): State<AppState>,
    session: Session,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if !is_tracked(request.method(), request.uri().path()) {
        return Ok(next.run(request).await);
    }

    let signed_in = session
        .get::<CurrentUser>(session_keys::CURRENT_USER)
        .await?
        .is_some();
    if !signed_in {
        return Ok(next.run(request).await);
    }

    let window = Duration::seconds(state.config().session_idle_timeout_secs);
    let stored = session.get::<IdleTimer>(session_keys::IDLE_TIMER).await?;
    let timer = track_activity(stored, window, Utc::now());

    if timer.state() == IdleState::Expired {
        tracing::info!("Signing out idle session");
        expire_session(&session).await?;
        return Err(AppError::SessionExpired);
    }

    session.insert(session_keys::IDLE_TIMER, timer).await?;
    Ok(next.run(request).await)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    fn window() -> Duration {
        Duration::minutes(4)
    }

    #[test]
    fn test_session_status_is_not_activity() {
        assert!(!is_tracked(&Method::GET, "/api/session"));
        assert!(is_tracked(&Method::GET, "/api/cart"));
        assert!(is_tracked(&Method::POST, "/api/session"));
    }

    #[test]
    fn test_activity_extends_deadline() {
        let timer = IdleTimer::armed(window(), t0());
        let timer = track_activity(Some(timer), window(), t0() + Duration::minutes(3));
        assert_eq!(timer.deadline(), Some(t0() + Duration::minutes(7)));
    }

    #[test]
    fn test_activity_after_deadline_expires() {
        let timer = IdleTimer::armed(window(), t0());
        let timer = track_activity(Some(timer), window(), t0() + Duration::minutes(4));
        assert_eq!(timer.state(), IdleState::Expired);
    }

    #[test]
    fn test_missing_timer_is_armed() {
        let timer = track_activity(None, window(), t0());
        assert_eq!(timer.deadline(), Some(t0() + window()));
    }

    #[test]
    fn test_disarmed_timer_is_rearmed() {
        let timer = track_activity(Some(IdleTimer::new(window())), window(), t0());
        assert_eq!(timer.deadline(), Some(t0() + window()));
    }
}
