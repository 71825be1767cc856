//! Authentication route handlers.
//!
//! Signup is two steps: the form is validated and parked in the session
//! while an OTP goes out, then the code creates the account and signs in.
//! Password reset uses the same OTP flow.

use axum::{Json, extract::State, http::StatusCode};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use lifebiotech_core::Email;

use crate::db::OtpRepository;
use crate::error::{Result, add_breadcrumb};
use crate::middleware::{sign_in, sign_out};
use crate::models::{CurrentUser, PendingSignup, session_keys};
use crate::services::auth::{AuthError, AuthService, SignupForm};
use crate::services::otp::{IssuedOtp, OtpIssuer, OtpVerifier};
use crate::state::AppState;

/// Generic answer to a password reset request.
pub const RESET_REQUESTED_MESSAGE: &str =
    "If an account exists for this email, a verification code has been sent.";

#[derive(Debug, Deserialize)]
pub struct VerifySignupRequest {
    pub otp: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub otp: String,
    pub password: String,
    pub confirm_password: String,
}

/// Sent after an OTP was issued.
#[derive(Debug, Serialize)]
pub struct OtpSentResponse {
    pub message: String,
    pub email: Email,
    pub expires_at: DateTime<Utc>,
}

/// Sent after a successful sign-in.
#[derive(Debug, Serialize)]
pub struct SignedInResponse {
    pub user: CurrentUser,
    pub idle_timeout_secs: i64,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

fn idle_window(state: &AppState) -> Duration {
    Duration::seconds(state.config().session_idle_timeout_secs)
}

/// Issue and email a fresh code for `email`.
async fn send_code(state: &AppState, email: &Email) -> Result<IssuedOtp> {
    let mailer = state.mailer()?;
    let issuer = OtpIssuer::new(OtpRepository::new(state.pool()), mailer, state.config().otp);
    Ok(issuer.issue(email).await?)
}

async fn signed_in(state: &AppState, session: &Session, user: CurrentUser) -> Result<Json<SignedInResponse>> {
    sign_in(session, &user, idle_window(state)).await?;
    Ok(Json(SignedInResponse {
        user,
        idle_timeout_secs: state.config().session_idle_timeout_secs,
    }))
}

/// Start a signup: validate, park the form, send the code.
#[instrument(skip(state, session, form), fields(email = %form.email))]
pub async fn signup(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<SignupForm>,
) -> Result<(StatusCode, Json<OtpSentResponse>)> {
    let pending = AuthService::new(state.pool()).prepare_signup(form).await?;
    let issued = send_code(&state, &pending.email).await?;

    session.insert(session_keys::PENDING_SIGNUP, &pending).await?;
    add_breadcrumb("auth", "Signup code sent", None);

    Ok((
        StatusCode::ACCEPTED,
        Json(OtpSentResponse {
            message: format!("Verification code sent to {}", issued.email),
            email: issued.email,
            expires_at: issued.expires_at,
        }),
    ))
}

/// Finish a signup with the emailed code.
#[instrument(skip_all)]
pub async fn verify_signup(
    State(state): State<AppState>,
    session: Session,
    Json(req): Json<VerifySignupRequest>,
) -> Result<Json<SignedInResponse>> {
    let pending = session
        .get::<PendingSignup>(session_keys::PENDING_SIGNUP)
        .await?
        .ok_or(AuthError::NoPendingSignup)?;

    let verifier = OtpVerifier::new(OtpRepository::new(state.pool()));
    let user = AuthService::new(state.pool())
        .complete_signup(&pending, &req.otp, &verifier)
        .await?;

    signed_in(&state, &session, CurrentUser::from(&user)).await
}

#[instrument(skip(state, session, req), fields(email = %req.email))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(req): Json<LoginRequest>,
) -> Result<Json<SignedInResponse>> {
    let user = AuthService::new(state.pool())
        .login(&req.email, &req.password)
        .await?;

    tracing::info!(user_id = %user.id, "User logged in");
    signed_in(&state, &session, CurrentUser::from(&user)).await
}

pub async fn logout(session: Session) -> Result<Json<MessageResponse>> {
    sign_out(&session).await?;
    Ok(Json(MessageResponse {
        message: "Signed out",
    }))
}

/// Send a reset code when the account exists.
///
/// The answer is the same either way.
#[instrument(skip(state, req))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>> {
    if let Some(user) = AuthService::new(state.pool()).find_account(&req.email).await? {
        send_code(&state, &user.email).await?;
    } else {
        tracing::debug!("Password reset requested for unknown email");
    }

    Ok(Json(MessageResponse {
        message: RESET_REQUESTED_MESSAGE,
    }))
}

#[instrument(skip(state, req))]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>> {
    let verifier = OtpVerifier::new(OtpRepository::new(state.pool()));
    AuthService::new(state.pool())
        .reset_password(
            &req.email,
            &req.otp,
            &req.password,
            &req.confirm_password,
            &verifier,
        )
        .await?;

    Ok(Json(MessageResponse {
        message: "Password updated. Please sign in.",
    }))
}
