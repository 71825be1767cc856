//! Email one-time passwords.
//!
//! [`OtpIssuer`] generates a code, persists it and hands it to the
//! notification gateway. [`OtpVerifier`] checks a candidate against the newest
//! usable record and consumes it at most once.
//!
//! Records are written before delivery is attempted. If the gateway fails the
//! record stays in the table flagged `delivery_failed` and is never accepted.

use std::future::Future;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tracing::instrument;

use lifebiotech_core::{Email, OtpCode, OtpId, OtpRecord};

use crate::config::OtpConfig;
use crate::db::RepositoryError;
use crate::services::email::{NotificationError, NotificationGateway};

/// Errors from issuing or verifying a code.
#[derive(Debug, Error)]
pub enum OtpError {
    /// No matching record: wrong code, expired, already used or never sent.
    #[error("Invalid or expired OTP")]
    InvalidOrExpired,

    /// A code was issued for this email too recently.
    #[error("please wait {retry_after_secs} seconds before requesting another code")]
    ResendTooSoon { retry_after_secs: i64 },

    /// The code could not be delivered.
    #[error("failed to deliver OTP: {0}")]
    Delivery(#[from] NotificationError),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Storage for OTP records.
pub trait OtpStore: Send + Sync {
    /// Persist a new unverified record.
    fn insert(
        &self,
        email: &Email,
        code: &OtpCode,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<OtpRecord, RepositoryError>> + Send;

    /// Creation time of the newest delivered record for `email`.
    fn latest_issued_at(
        &self,
        email: &Email,
    ) -> impl Future<Output = Result<Option<DateTime<Utc>>, RepositoryError>> + Send;

    /// Newest record for `email` that is unverified, delivered and unexpired at `now`.
    fn find_active(
        &self,
        email: &Email,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Option<OtpRecord>, RepositoryError>> + Send;

    /// Flag a record whose email never went out.
    fn mark_delivery_failed(
        &self,
        id: OtpId,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Flip `verified` if it is still false. Returns whether this call did it.
    fn consume(&self, id: OtpId) -> impl Future<Output = Result<bool, RepositoryError>> + Send;
}

/// A code that was persisted and handed to the gateway.
#[derive(Debug, Clone)]
pub struct IssuedOtp {
    pub id: OtpId,
    pub email: Email,
    pub expires_at: DateTime<Utc>,
    pub message_id: String,
}

/// Issues codes.
pub struct OtpIssuer<'a, S, G> {
    store: S,
    gateway: &'a G,
    settings: OtpConfig,
}

impl<'a, S: OtpStore, G: NotificationGateway> OtpIssuer<'a, S, G> {
    #[must_use]
    pub const fn new(store: S, gateway: &'a G, settings: OtpConfig) -> Self {
        Self {
            store,
            gateway,
            settings,
        }
    }

    /// Issue and deliver a fresh code for `email`.
    ///
    /// # Errors
    ///
    /// Returns `OtpError::ResendTooSoon` when the previous code is younger
    /// than the resend interval, `OtpError::Delivery` when the gateway fails
    /// (the record is kept and flagged), or `OtpError::Repository`.
    pub async fn issue(&self, email: &Email) -> Result<IssuedOtp, OtpError> {
        self.issue_at(email, Utc::now()).await
    }

    /// [`issue`](Self::issue) with an explicit clock.
    ///
    /// # Errors
    ///
    /// See [`issue`](Self::issue).
    #[instrument(skip(self), fields(email = %email))]
    pub async fn issue_at(&self, email: &Email, now: DateTime<Utc>) -> Result<IssuedOtp, OtpError> {
        self.check_resend_interval(email, now).await?;

        let code = OtpCode::generate();
        let expires_at = now + Duration::minutes(self.settings.ttl_minutes);
        let record = self.store.insert(email, &code, now, expires_at).await?;

        match self
            .gateway
            .send_otp(email, &code, self.settings.ttl_minutes)
            .await
        {
            Ok(receipt) => {
                tracing::info!(otp_id = %record.id, "OTP issued");
                Ok(IssuedOtp {
                    id: record.id,
                    email: record.email,
                    expires_at: record.expires_at,
                    message_id: receipt.message_id,
                })
            }
            Err(e) => {
                tracing::warn!(otp_id = %record.id, error = %e, "OTP delivery failed");
                if let Err(flag_err) = self.store.mark_delivery_failed(record.id).await {
                    tracing::error!(otp_id = %record.id, error = %flag_err, "Failed to flag undelivered OTP");
                }
                Err(OtpError::Delivery(e))
            }
        }
    }

    async fn check_resend_interval(&self, email: &Email, now: DateTime<Utc>) -> Result<(), OtpError> {
        if self.settings.resend_interval_secs <= 0 {
            return Ok(());
        }

        let Some(last) = self.store.latest_issued_at(email).await? else {
            return Ok(());
        };

        let interval = Duration::seconds(self.settings.resend_interval_secs);
        let remaining = interval - (now - last);
        if remaining > Duration::zero() {
            let retry_after_secs = (remaining.num_milliseconds() + 999) / 1000;
            return Err(OtpError::ResendTooSoon { retry_after_secs });
        }

        Ok(())
    }
}

/// Verifies and consumes codes.
pub struct OtpVerifier<S> {
    store: S,
}

impl<S: OtpStore> OtpVerifier<S> {
    #[must_use]
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// Check `candidate` against the newest usable code for `email`.
    ///
    /// # Errors
    ///
    /// Returns `OtpError::InvalidOrExpired` unless the candidate exactly
    /// matches a usable record and this call is the one that consumed it.
    pub async fn verify(&self, email: &Email, candidate: &str) -> Result<OtpId, OtpError> {
        self.verify_at(email, candidate, Utc::now()).await
    }

    /// [`verify`](Self::verify) with an explicit clock.
    ///
    /// # Errors
    ///
    /// See [`verify`](Self::verify).
    #[instrument(skip(self, candidate), fields(email = %email))]
    pub async fn verify_at(
        &self,
        email: &Email,
        candidate: &str,
        now: DateTime<Utc>,
    ) -> Result<OtpId, OtpError> {
        let candidate = OtpCode::parse(candidate).map_err(|_| OtpError::InvalidOrExpired)?;

        let record = self
            .store
            .find_active(email, now)
            .await?
            .ok_or(OtpError::InvalidOrExpired)?;

        if record.code != candidate {
            tracing::debug!(otp_id = %record.id, "OTP mismatch");
            return Err(OtpError::InvalidOrExpired);
        }

        if !self.store.consume(record.id).await? {
            tracing::debug!(otp_id = %record.id, "OTP already consumed");
            return Err(OtpError::InvalidOrExpired);
        }

        tracing::info!(otp_id = %record.id, "OTP verified");
        Ok(record.id)
    }
}
