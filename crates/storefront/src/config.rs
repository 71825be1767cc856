//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront
//! - `RAZORPAY_KEY_ID` - Razorpay public key id (sent to the browser)
//! - `RAZORPAY_KEY_SECRET` - Razorpay key secret (server-side only, high entropy)
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `STOREFRONT_CORS_ORIGIN` - Browser origin allowed to call the API with credentials
//! - `RAZORPAY_WEBHOOK_SECRET` - Secret for verifying reconciliation webhooks
//! - `RAZORPAY_API_URL` - Gateway base URL (default: <https://api.razorpay.com/v1>)
//! - `PAYMENT_CURRENCY` - ISO 4217 code (default: INR)
//! - `MERCHANT_NAME` - Name shown in the hosted checkout (default: Life Biotech)
//! - `RESEND_API_KEY` - Resend API key; OTP email is disabled without it
//! - `RESEND_API_URL` - Resend base URL (default: <https://api.resend.com>)
//! - `EMAIL_FROM` - Sender (default: `lifebiotech <onboarding@resend.dev>`)
//! - `CONTACT_EMAIL` - Inbox for contact form messages (default: lifebiotech.org@gmail.com)
//! - `OTP_TTL_MINUTES` - Code lifetime (default: 10)
//! - `OTP_RESEND_INTERVAL_SECS` - Minimum gap between codes per email (default: 60, 0 disables)
//! - `SESSION_IDLE_TIMEOUT_SECS` - Idle sign-out window (default: 240)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate (default: 0.0)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use lifebiotech_core::{CurrencyCode, DEFAULT_IDLE_WINDOW_SECS, Email, OTP_TTL_MINUTES};
use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

const DEFAULT_RAZORPAY_API_URL: &str = "https://api.razorpay.com/v1";
const DEFAULT_RESEND_API_URL: &str = "https://api.resend.com";
const DEFAULT_EMAIL_FROM: &str = "lifebiotech <onboarding@resend.dev>";
const DEFAULT_CONTACT_EMAIL: &str = "lifebiotech.org@gmail.com";
const DEFAULT_MERCHANT_NAME: &str = "Life Biotech";
const DEFAULT_OTP_RESEND_INTERVAL_SECS: i64 = 60;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// Browser origin allowed to make credentialed API calls
    pub cors_origin: Option<String>,
    /// Payment gateway configuration
    pub payment: PaymentConfig,
    /// Transactional email configuration (absent when no API key is set)
    pub email: Option<EmailConfig>,
    /// OTP lifetime and throttling
    pub otp: OtpConfig,
    /// Idle window after which a signed-in session is forcibly ended
    pub session_idle_timeout_secs: i64,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Fraction of errors sent to Sentry
    pub sentry_sample_rate: f32,
    /// Fraction of transactions traced
    pub sentry_traces_sample_rate: f32,
}

/// Razorpay configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct PaymentConfig {
    /// Public key id (safe to expose in browser)
    pub key_id: String,
    /// Key secret used for API auth and payment signatures
    pub key_secret: SecretString,
    /// Webhook signing secret
    pub webhook_secret: Option<SecretString>,
    /// Gateway API base URL
    pub api_url: String,
    /// Charge currency
    pub currency: CurrencyCode,
    /// Merchant name shown in the hosted checkout
    pub merchant_name: String,
}

impl std::fmt::Debug for PaymentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentConfig")
            .field("key_id", &self.key_id)
            .field("key_secret", &"[REDACTED]")
            .field(
                "webhook_secret",
                &self.webhook_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("api_url", &self.api_url)
            .field("currency", &self.currency)
            .field("merchant_name", &self.merchant_name)
            .finish()
    }
}

/// Resend email configuration.
#[derive(Clone)]
pub struct EmailConfig {
    /// Resend API key
    pub api_key: SecretString,
    /// Resend API base URL
    pub api_url: String,
    /// `From` header value
    pub from: String,
    /// Merchant inbox that receives contact form messages
    pub contact_to: Email,
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("api_key", &"[REDACTED]")
            .field("api_url", &self.api_url)
            .field("from", &self.from)
            .field("contact_to", &self.contact_to)
            .finish()
    }
}

/// OTP lifetime and resend throttling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OtpConfig {
    /// Minutes until an issued code expires
    pub ttl_minutes: i64,
    /// Minimum seconds between two codes for the same email (0 disables)
    pub resend_interval_secs: i64,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            ttl_minutes: OTP_TTL_MINUTES,
            resend_interval_secs: DEFAULT_OTP_RESEND_INTERVAL_SECS,
        }
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("STOREFRONT_DATABASE_URL")?;
        let host = get_parsed_or_default::<IpAddr>("STOREFRONT_HOST", "127.0.0.1")?;
        let port = get_parsed_or_default::<u16>("STOREFRONT_PORT", "3000")?;
        let base_url = get_required_url("STOREFRONT_BASE_URL")?;
        let cors_origin = get_optional_env("STOREFRONT_CORS_ORIGIN");

        let payment = PaymentConfig::from_env()?;
        let email = EmailConfig::from_env()?;
        let otp = OtpConfig::from_env()?;

        let session_idle_timeout_secs = get_parsed_or_default::<i64>(
            "SESSION_IDLE_TIMEOUT_SECS",
            &DEFAULT_IDLE_WINDOW_SECS.to_string(),
        )?;
        if session_idle_timeout_secs <= 0 {
            return Err(ConfigError::InvalidEnvVar(
                "SESSION_IDLE_TIMEOUT_SECS".to_string(),
                "must be positive".to_string(),
            ));
        }

        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_parsed_or_default::<f32>("SENTRY_SAMPLE_RATE", "1.0")?;
        let sentry_traces_sample_rate =
            get_parsed_or_default::<f32>("SENTRY_TRACES_SAMPLE_RATE", "0.0")?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            cors_origin,
            payment,
            email,
            otp,
            session_idle_timeout_secs,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies should carry the `Secure` attribute.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl PaymentConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let currency = get_env_or_default("PAYMENT_CURRENCY", CurrencyCode::INR.code());
        let currency = CurrencyCode::from_str(&currency)
            .map_err(|e| ConfigError::InvalidEnvVar("PAYMENT_CURRENCY".to_string(), e))?;

        let webhook_secret = get_optional_env("RAZORPAY_WEBHOOK_SECRET")
            .map(|value| {
                validate_secret_strength(&value, "RAZORPAY_WEBHOOK_SECRET")?;
                Ok::<_, ConfigError>(SecretString::from(value))
            })
            .transpose()?;

        Ok(Self {
            key_id: get_required_env("RAZORPAY_KEY_ID")?,
            key_secret: get_validated_secret("RAZORPAY_KEY_SECRET")?,
            webhook_secret,
            api_url: get_url_or_default("RAZORPAY_API_URL", DEFAULT_RAZORPAY_API_URL)?,
            currency,
            merchant_name: get_env_or_default("MERCHANT_NAME", DEFAULT_MERCHANT_NAME),
        })
    }
}

impl EmailConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(api_key) = get_optional_env("RESEND_API_KEY") else {
            tracing::warn!("RESEND_API_KEY not set; email delivery is disabled");
            return Ok(None);
        };
        validate_secret_strength(&api_key, "RESEND_API_KEY")?;

        let contact_to = Email::parse(&get_env_or_default("CONTACT_EMAIL", DEFAULT_CONTACT_EMAIL))
            .map_err(|e| ConfigError::InvalidEnvVar("CONTACT_EMAIL".to_string(), e.to_string()))?;

        Ok(Some(Self {
            api_key: SecretString::from(api_key),
            api_url: get_url_or_default("RESEND_API_URL", DEFAULT_RESEND_API_URL)?,
            from: get_env_or_default("EMAIL_FROM", DEFAULT_EMAIL_FROM),
            contact_to,
        }))
    }
}

impl OtpConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let ttl_minutes =
            get_parsed_or_default::<i64>("OTP_TTL_MINUTES", &defaults.ttl_minutes.to_string())?;
        if ttl_minutes <= 0 {
            return Err(ConfigError::InvalidEnvVar(
                "OTP_TTL_MINUTES".to_string(),
                "must be positive".to_string(),
            ));
        }

        let resend_interval_secs = get_parsed_or_default::<i64>(
            "OTP_RESEND_INTERVAL_SECS",
            &defaults.resend_interval_secs.to_string(),
        )?;
        if resend_interval_secs < 0 {
            return Err(ConfigError::InvalidEnvVar(
                "OTP_RESEND_INTERVAL_SECS".to_string(),
                "must not be negative".to_string(),
            ));
        }

        Ok(Self {
            ttl_minutes,
            resend_interval_secs,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL` (used by Fly.io postgres attach).
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable. Empty values count as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
fn get_parsed_or_default<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Get a required absolute URL, without a trailing slash.
fn get_required_url(key: &str) -> Result<String, ConfigError> {
    let value = get_required_env(key)?;
    normalize_url(key, &value)
}

/// Get an absolute URL with a default, without a trailing slash.
fn get_url_or_default(key: &str, default: &str) -> Result<String, ConfigError> {
    normalize_url(key, &get_env_or_default(key, default))
}

fn normalize_url(key: &str, value: &str) -> Result<String, ConfigError> {
    Url::parse(value).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    Ok(value.trim_end_matches('/').to_string())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}
