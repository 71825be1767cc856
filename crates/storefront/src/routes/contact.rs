//! Contact form.
//!
//! Visitor messages are forwarded to the merchant inbox (`CONTACT_EMAIL`)
//! with the visitor's address as `reply_to`.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use lifebiotech_core::Email;

use crate::error::{AppError, Result};
use crate::services::email::ContactMessage;
use crate::state::AppState;

/// Upper bound on the message body, in characters.
pub const MAX_MESSAGE_CHARS: usize = 5000;

const MAX_FIELD_CHARS: usize = 200;

#[derive(Debug, Default, Deserialize)]
pub struct ContactRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactResponse {
    pub success: bool,
    pub message_id: String,
}

fn required(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl ContactRequest {
    fn validated(self) -> Result<ContactMessage> {
        let (Some(name), Some(email), Some(subject), Some(message)) = (
            required(self.name),
            required(self.email),
            required(self.subject),
            required(self.message),
        ) else {
            return Err(AppError::BadRequest(
                "Name, email, subject and message are required".to_string(),
            ));
        };

        if name.chars().count() > MAX_FIELD_CHARS || subject.chars().count() > MAX_FIELD_CHARS {
            return Err(AppError::BadRequest(format!(
                "Name and subject must be at most {MAX_FIELD_CHARS} characters"
            )));
        }
        if message.chars().count() > MAX_MESSAGE_CHARS {
            return Err(AppError::BadRequest(format!(
                "Message must be at most {MAX_MESSAGE_CHARS} characters"
            )));
        }

        let email = Email::parse(&email).map_err(|e| AppError::BadRequest(e.to_string()))?;
        Ok(ContactMessage {
            name,
            email,
            subject,
            message,
        })
    }
}

#[instrument(skip_all)]
pub async fn send_message(
    State(state): State<AppState>,
    Json(req): Json<ContactRequest>,
) -> Result<Json<ContactResponse>> {
    let contact = req.validated()?;
    let mailer = state.mailer()?;

    let receipt = mailer.send_contact_message(&contact).await?;

    Ok(Json(ContactResponse {
        success: true,
        message_id: receipt.message_id,
    }))
}
