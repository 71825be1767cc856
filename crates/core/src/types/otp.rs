//! One-time password codes and the rule for picking the code that counts.
//!
//! A user may request several codes for the same email. Only the newest one
//! that is still unused, delivered and unexpired is accepted. [`select_active`]
//! is that rule in pure form. The database query in the storefront applies
//! the same filter and ordering.

use core::fmt;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{Email, OtpId};

/// Default lifetime of an issued code.
pub const OTP_TTL_MINUTES: i64 = 10;

/// Errors from parsing a candidate code.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum OtpCodeError {
    #[error("OTP must be exactly {len} digits")]
    InvalidLength { len: usize },
    #[error("OTP must contain only digits")]
    NonDigit,
}

/// A six-digit numeric code.
///
/// Generated codes never start with `0` (range `100000..=999999`), but a
/// candidate typed by a user may. `"000000"` parses fine and simply never
/// matches a generated code.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OtpCode(String);

impl OtpCode {
    /// Number of digits in a code.
    pub const LEN: usize = 6;

    /// Generate a fresh code, uniformly distributed over `100000..=999999`.
    #[must_use]
    pub fn generate() -> Self {
        let n: u32 = rand::rng().random_range(100_000..=999_999);
        Self(n.to_string())
    }

    /// Parse a candidate code as given; no whitespace is stripped.
    ///
    /// # Errors
    ///
    /// Returns [`OtpCodeError`] unless the input is exactly six ASCII digits.
    pub fn parse(s: &str) -> Result<Self, OtpCodeError> {
        if s.len() != Self::LEN {
            return Err(OtpCodeError::InvalidLength { len: Self::LEN });
        }
        if !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(OtpCodeError::NonDigit);
        }
        Ok(Self(s.to_owned()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Codes are credentials; keep them out of logs.
impl fmt::Debug for OtpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OtpCode(******)")
    }
}

impl TryFrom<String> for OtpCode {
    type Error = OtpCodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<OtpCode> for String {
    fn from(code: OtpCode) -> Self {
        code.0
    }
}

/// A persisted OTP record.
///
/// Records are never deleted; consumption flips `verified`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpRecord {
    pub id: OtpId,
    pub email: Email,
    pub code: OtpCode,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub verified: bool,
    /// Set when the notification gateway rejected the email for this code.
    pub delivery_failed: bool,
}

impl OtpRecord {
    /// Whether this record may still be used at `now`.
    #[must_use]
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        !self.verified && !self.delivery_failed && self.expires_at > now
    }
}

/// Pick the record a verification for `email` at `now` is checked against.
///
/// The newest usable record wins, even if an older usable one exists.
pub fn select_active<'a, I>(records: I, email: &Email, now: DateTime<Utc>) -> Option<&'a OtpRecord>
where
    I: IntoIterator<Item = &'a OtpRecord>,
{
    records
        .into_iter()
        .filter(|r| &r.email == email && r.is_usable_at(now))
        .max_by_key(|r| r.created_at)
}
