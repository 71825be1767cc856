//! Transactional email through the Resend HTTP API.
//!
//! OTP emails and contact form messages are rendered from Askama templates
//! (HTML and plain text) and posted to `{RESEND_API_URL}/emails`.

use std::future::Future;

use askama::Template;
use chrono::{Datelike, Utc};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use lifebiotech_core::{Email, OtpCode};

use crate::config::EmailConfig;

const BRAND: &str = "Life Biotech";
const OTP_SUBJECT: &str = "Verify Your Email - Life Biotech";

/// HTML template for the OTP email.
#[derive(Template)]
#[template(path = "email/otp_verification.html")]
struct OtpEmailHtml<'a> {
    brand: &'a str,
    code: &'a str,
    ttl_minutes: i64,
    year: i32,
}

/// Plain text template for the OTP email.
#[derive(Template)]
#[template(path = "email/otp_verification.txt")]
struct OtpEmailText<'a> {
    brand: &'a str,
    code: &'a str,
    ttl_minutes: i64,
    year: i32,
}

#[derive(Template)]
#[template(path = "email/contact_message.html")]
struct ContactEmailHtml<'a> {
    brand: &'a str,
    name: &'a str,
    email: &'a str,
    subject: &'a str,
    message: &'a str,
}

#[derive(Template)]
#[template(path = "email/contact_message.txt")]
struct ContactEmailText<'a> {
    brand: &'a str,
    name: &'a str,
    email: &'a str,
    subject: &'a str,
    message: &'a str,
}

/// A validated contact form submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactMessage {
    pub name: String,
    pub email: Email,
    pub subject: String,
    pub message: String,
}

impl ContactMessage {
    fn render(&self) -> Result<(String, String), askama::Error> {
        let html = ContactEmailHtml {
            brand: BRAND,
            name: &self.name,
            email: self.email.as_str(),
            subject: &self.subject,
            message: &self.message,
        }
        .render()?;
        let text = ContactEmailText {
            brand: BRAND,
            name: &self.name,
            email: self.email.as_str(),
            subject: &self.subject,
            message: &self.message,
        }
        .render()?;
        Ok((html, text))
    }
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// No API key configured.
    #[error("Email service not configured")]
    NotConfigured,

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The email API rejected the request.
    #[error("Email API error: {status} - {message}")]
    Api {
        status: u16,
        message: String,
        details: Option<serde_json::Value>,
    },

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),

    /// Client could not be built from configuration.
    #[error("Invalid email configuration: {0}")]
    Config(String),
}

/// Proof that the provider accepted a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryReceipt {
    pub message_id: String,
}

/// Something that can deliver an OTP to an inbox.
pub trait NotificationGateway: Send + Sync {
    /// Deliver `code` to `to`, stating the code's lifetime.
    fn send_otp(
        &self,
        to: &Email,
        code: &OtpCode,
        ttl_minutes: i64,
    ) -> impl Future<Output = Result<DeliveryReceipt, NotificationError>> + Send;
}

#[derive(Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<&'a str>,
}

#[derive(Deserialize)]
struct SendEmailResponse {
    id: String,
}

/// Resend API client.
#[derive(Clone)]
pub struct ResendClient {
    client: reqwest::Client,
    base_url: String,
    from: String,
    contact_to: Email,
}

impl ResendClient {
    /// Create a new Resend client.
    ///
    /// # Errors
    ///
    /// Returns error if the API key is not a valid header value or the HTTP
    /// client fails to build.
    pub fn new(config: &EmailConfig) -> Result<Self, NotificationError> {
        let mut headers = HeaderMap::new();

        let auth_value = format!("Bearer {}", config.api_key.expose_secret());
        let mut auth = HeaderValue::from_str(&auth_value)
            .map_err(|e| NotificationError::Config(format!("invalid API key format: {e}")))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_url.clone(),
            from: config.from.clone(),
            contact_to: config.contact_to.clone(),
        })
    }

    /// Send the OTP verification email.
    ///
    /// # Errors
    ///
    /// Returns error if rendering fails, the request fails, or the API
    /// responds with a non-success status.
    #[instrument(skip(self, code), fields(to = %to))]
    pub async fn send_otp_email(
        &self,
        to: &Email,
        code: &OtpCode,
        ttl_minutes: i64,
    ) -> Result<DeliveryReceipt, NotificationError> {
        let year = Utc::now().year();
        let html = OtpEmailHtml {
            brand: BRAND,
            code: code.as_str(),
            ttl_minutes,
            year,
        }
        .render()?;
        let text = OtpEmailText {
            brand: BRAND,
            code: code.as_str(),
            ttl_minutes,
            year,
        }
        .render()?;

        self.send(to, OTP_SUBJECT, &html, &text, None).await
    }

    /// Forward a contact form message to the merchant inbox.
    ///
    /// Replies go straight to the visitor through `reply_to`.
    ///
    /// # Errors
    ///
    /// Returns error if rendering fails, the request fails, or the API
    /// responds with a non-success status.
    #[instrument(skip(self, contact), fields(from = %contact.email))]
    pub async fn send_contact_message(
        &self,
        contact: &ContactMessage,
    ) -> Result<DeliveryReceipt, NotificationError> {
        let (html, text) = contact.render()?;
        let subject = format!("Contact form: {}", contact.subject);

        self.send(
            &self.contact_to,
            &subject,
            &html,
            &text,
            Some(contact.email.as_str()),
        )
        .await
    }

    async fn send(
        &self,
        to: &Email,
        subject: &str,
        html: &str,
        text: &str,
        reply_to: Option<&str>,
    ) -> Result<DeliveryReceipt, NotificationError> {
        let url = format!("{}/emails", self.base_url);
        let body = SendEmailRequest {
            from: &self.from,
            to: [to.as_str()],
            subject,
            html,
            text,
            reply_to,
        };

        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();

        if !status.is_success() {
            let raw = response.text().await.unwrap_or_default();
            let (message, details) = parse_api_error(&raw);
            tracing::warn!(status = status.as_u16(), %message, "Resend rejected email");
            return Err(NotificationError::Api {
                status: status.as_u16(),
                message,
                details,
            });
        }

        let sent: SendEmailResponse = response.json().await?;
        tracing::info!(message_id = %sent.id, subject = %subject, "Email sent successfully");

        Ok(DeliveryReceipt {
            message_id: sent.id,
        })
    }
}

impl NotificationGateway for ResendClient {
    async fn send_otp(
        &self,
        to: &Email,
        code: &OtpCode,
        ttl_minutes: i64,
    ) -> Result<DeliveryReceipt, NotificationError> {
        self.send_otp_email(to, code, ttl_minutes).await
    }
}

/// Pull a readable message (and the JSON body, when there is one) out of an
/// error response.
fn parse_api_error(raw: &str) -> (String, Option<serde_json::Value>) {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(raw) else {
        return ("Failed to send email".to_string(), None);
    };

    let message = value
        .get("message")
        .and_then(serde_json::Value::as_str)
        .filter(|m| !m.is_empty())
        .unwrap_or("Failed to send email")
        .to_string();

    (message, Some(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const DEFAULT_FROM: &str = "lifebiotech <onboarding@resend.dev>";

    #[test]
    fn test_html_template_renders_code_and_ttl() {
        let html = OtpEmailHtml {
            brand: BRAND,
            code: "482913",
            ttl_minutes: 10,
            year: 2025,
        }
        .render()
        .unwrap();

        assert!(html.contains("482913"));
        assert!(html.contains("This code will expire in 10 minutes."));
        assert!(html.contains("2025 Life Biotech"));
    }

    #[test]
    fn test_text_template_renders_code() {
        let text = OtpEmailText {
            brand: BRAND,
            code: "482913",
            ttl_minutes: 10,
            year: 2025,
        }
        .render()
        .unwrap();

        assert!(text.contains("Your verification code is: 482913"));
    }

    fn contact() -> ContactMessage {
        ContactMessage {
            name: "Meera Iyer".to_string(),
            email: Email::parse("meera@example.com").unwrap(),
            subject: "Bulk order".to_string(),
            message: "Do you ship <b>syrups</b> to Kochi?".to_string(),
        }
    }

    #[test]
    fn test_contact_templates_render_all_fields() {
        let (html, text) = contact().render().unwrap();

        assert!(html.contains("New message for Life Biotech"));
        assert!(html.contains("Meera Iyer &lt;meera@example.com&gt;"));
        assert!(html.contains("Bulk order"));
        assert!(text.contains("From: Meera Iyer <meera@example.com>"));
        assert!(text.contains("Subject: Bulk order"));
        assert!(text.contains("Do you ship <b>syrups</b> to Kochi?"));
    }

    #[test]
    fn test_contact_html_escapes_visitor_input() {
        let (html, _) = contact().render().unwrap();
        assert!(!html.contains("<b>syrups</b>"));
        assert!(html.contains("&#60;b&#62;syrups") || html.contains("&lt;b&gt;syrups"));
    }

    #[test]
    fn test_reply_to_omitted_when_absent() {
        let body = serde_json::to_value(SendEmailRequest {
            from: DEFAULT_FROM,
            to: ["buyer@example.com"],
            subject: "s",
            html: "h",
            text: "t",
            reply_to: None,
        })
        .unwrap();
        assert!(body.get("reply_to").is_none());
    }

    #[test]
    fn test_parse_api_error_with_message() {
        let (message, details) =
            parse_api_error(r#"{"statusCode":422,"name":"validation_error","message":"Invalid `to` field."}"#);
        assert_eq!(message, "Invalid `to` field.");
        assert_eq!(details.unwrap()["name"], "validation_error");
    }

    #[test]
    fn test_parse_api_error_without_message() {
        let (message, details) = parse_api_error(r#"{"name":"rate_limit_exceeded"}"#);
        assert_eq!(message, "Failed to send email");
        assert!(details.is_some());

        let (message, details) = parse_api_error("<html>bad gateway</html>");
        assert_eq!(message, "Failed to send email");
        assert!(details.is_none());
    }
}
