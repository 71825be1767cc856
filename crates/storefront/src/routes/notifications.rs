//! Direct OTP email delivery.
//!
//! Sends a caller-supplied code through the email provider. The account
//! flows issue their own codes; this endpoint exists for clients that
//! generate codes themselves.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use lifebiotech_core::{Email, OtpCode};

use crate::error::{AppError, Result};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct SendOtpEmailRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub otp: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendOtpEmailResponse {
    pub success: bool,
    pub message_id: String,
}

impl SendOtpEmailRequest {
    fn validated(self) -> Result<(Email, OtpCode)> {
        let email = self.email.filter(|e| !e.trim().is_empty());
        let otp = self.otp.filter(|o| !o.trim().is_empty());
        let (Some(email), Some(otp)) = (email, otp) else {
            return Err(AppError::BadRequest("Email and OTP are required".to_string()));
        };

        let email = Email::parse(&email).map_err(|e| AppError::BadRequest(e.to_string()))?;
        let otp = OtpCode::parse(otp.trim()).map_err(|e| AppError::BadRequest(e.to_string()))?;
        Ok((email, otp))
    }
}

#[instrument(skip_all)]
pub async fn send_otp_email(
    State(state): State<AppState>,
    Json(req): Json<SendOtpEmailRequest>,
) -> Result<Json<SendOtpEmailResponse>> {
    let (email, otp) = req.validated()?;
    let mailer = state.mailer()?;

    let receipt = mailer
        .send_otp_email(&email, &otp, state.config().otp.ttl_minutes)
        .await?;

    Ok(Json(SendOtpEmailResponse {
        success: true,
        message_id: receipt.message_id,
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn request(email: Option<&str>, otp: Option<&str>) -> SendOtpEmailRequest {
        SendOtpEmailRequest {
            email: email.map(String::from),
            otp: otp.map(String::from),
        }
    }

    #[test]
    fn test_missing_fields_rejected() {
        for req in [
            request(None, Some("123456")),
            request(Some("a@example.com"), None),
            request(Some("  "), Some("123456")),
        ] {
            match req.validated() {
                Err(AppError::BadRequest(msg)) => assert_eq!(msg, "Email and OTP are required"),
                other => panic!("unexpected: {other:?}"),
            }
        }
    }

    #[test]
    fn test_valid_request() {
        let (email, otp) = request(Some("Buyer@Example.com"), Some("482913"))
            .validated()
            .unwrap();
        assert_eq!(email.as_str(), "buyer@example.com");
        assert_eq!(otp.as_str(), "482913");
    }

    #[test]
    fn test_malformed_code_rejected() {
        assert!(matches!(
            request(Some("a@example.com"), Some("12ab")).validated(),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_response_uses_message_id_key() {
        let body = serde_json::to_value(SendOtpEmailResponse {
            success: true,
            message_id: "msg_1".to_string(),
        })
        .unwrap();
        assert_eq!(body["messageId"], "msg_1");
    }
}
