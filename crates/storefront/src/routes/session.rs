//! Session status check.
//!
//! The browser polls this to show who is signed in and when the idle window
//! runs out. Reading it does not count as activity, but an elapsed window is
//! enforced here too so the notice shows up without another request.

use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tower_sessions::Session;

use lifebiotech_core::{IdleState, IdleTimer};

use crate::error::Result;
use crate::middleware::{expire_session, take_notice};
use crate::models::{Cart, CurrentUser, session_keys};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SessionStatus {
    pub authenticated: bool,
    pub user: Option<CurrentUser>,
    /// When the idle window runs out unless there is activity first.
    pub expires_at: Option<DateTime<Utc>>,
    pub idle_timeout_secs: i64,
    pub cart_items: u32,
    /// One-shot message, e.g. after an idle sign-out.
    pub notice: Option<String>,
}

pub async fn status(State(state): State<AppState>, session: Session) -> Result<Json<SessionStatus>> {
    let mut user = session
        .get::<CurrentUser>(session_keys::CURRENT_USER)
        .await?;
    let mut expires_at = None;

    if user.is_some() {
        let timer = session.get::<IdleTimer>(session_keys::IDLE_TIMER).await?;
        if let Some(mut timer) = timer {
            match timer.poll(Utc::now()) {
                IdleState::Expired => {
                    tracing::info!("Signing out idle session on status check");
                    expire_session(&session).await?;
                    user = None;
                }
                IdleState::Active { deadline } => expires_at = Some(deadline),
                IdleState::Disarmed => {}
            }
        }
    }

    let cart_items = session
        .get::<Cart>(session_keys::CART)
        .await?
        .map_or(0, |cart| cart.item_count());
    let notice = take_notice(&session).await?;

    Ok(Json(SessionStatus {
        authenticated: user.is_some(),
        user,
        expires_at,
        idle_timeout_secs: state.config().session_idle_timeout_secs,
        cart_items,
        notice,
    }))
}
