//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::StorefrontConfig;
use crate::services::email::{NotificationError, ResendClient};
use crate::services::payment::{PaymentError, RazorpayClient};

/// Error building the outbound API clients.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("payment client: {0}")]
    Payment(#[from] PaymentError),
    #[error("email client: {0}")]
    Email(#[from] NotificationError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    payments: RazorpayClient,
    mailer: Option<ResendClient>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// The email client is only built when `RESEND_API_KEY` is configured;
    /// without it email endpoints answer "Email service not configured".
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, StateError> {
        let payments = RazorpayClient::new(&config.payment)?;
        let mailer = config.email.as_ref().map(ResendClient::new).transpose()?;

        if mailer.is_none() {
            tracing::warn!("RESEND_API_KEY not set, outbound email is disabled");
        }

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                payments,
                mailer,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the Razorpay client.
    #[must_use]
    pub fn payments(&self) -> &RazorpayClient {
        &self.inner.payments
    }

    /// Get the email client.
    ///
    /// # Errors
    ///
    /// Returns `NotificationError::NotConfigured` when no API key is set.
    pub fn mailer(&self) -> Result<&ResendClient, NotificationError> {
        self.inner
            .mailer
            .as_ref()
            .ok_or(NotificationError::NotConfigured)
    }
}
