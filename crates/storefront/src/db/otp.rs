//! OTP record storage.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use lifebiotech_core::{Email, OtpCode, OtpId, OtpRecord};

use super::RepositoryError;
use crate::services::otp::OtpStore;

#[derive(sqlx::FromRow)]
struct OtpRow {
    id: OtpId,
    email: String,
    otp: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    verified: bool,
    delivery_failed: bool,
}

impl TryFrom<OtpRow> for OtpRecord {
    type Error = RepositoryError;

    fn try_from(r: OtpRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&r.email)
            .map_err(|e| RepositoryError::DataCorruption(format!("invalid OTP email: {e}")))?;
        let code = OtpCode::parse(&r.otp)
            .map_err(|e| RepositoryError::DataCorruption(format!("invalid OTP code: {e}")))?;

        Ok(Self {
            id: r.id,
            email,
            code,
            created_at: r.created_at,
            expires_at: r.expires_at,
            verified: r.verified,
            delivery_failed: r.delivery_failed,
        })
    }
}

/// Repository for `storefront.email_otp`.
pub struct OtpRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OtpRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }
}

impl OtpStore for OtpRepository<'_> {
    async fn insert(
        &self,
        email: &Email,
        code: &OtpCode,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<OtpRecord, RepositoryError> {
        let row = sqlx::query_as::<_, OtpRow>(
            r"
            INSERT INTO storefront.email_otp (email, otp, created_at, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, email, otp, created_at, expires_at, verified, delivery_failed
            ",
        )
        .bind(email.as_str())
        .bind(code.as_str())
        .bind(created_at)
        .bind(expires_at)
        .fetch_one(self.pool)
        .await?;

        OtpRecord::try_from(row)
    }

    async fn latest_issued_at(
        &self,
        email: &Email,
    ) -> Result<Option<DateTime<Utc>>, RepositoryError> {
        let row: Option<(DateTime<Utc>,)> = sqlx::query_as(
            r"
            SELECT created_at
            FROM storefront.email_otp
            WHERE email = $1 AND delivery_failed = FALSE
            ORDER BY created_at DESC
            LIMIT 1
            ",
        )
        .bind(email.as_str())
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(|(created_at,)| created_at))
    }

    async fn find_active(
        &self,
        email: &Email,
        now: DateTime<Utc>,
    ) -> Result<Option<OtpRecord>, RepositoryError> {
        let row = sqlx::query_as::<_, OtpRow>(
            r"
            SELECT id, email, otp, created_at, expires_at, verified, delivery_failed
            FROM storefront.email_otp
            WHERE email = $1
              AND verified = FALSE
              AND delivery_failed = FALSE
              AND expires_at > $2
            ORDER BY created_at DESC
            LIMIT 1
            ",
        )
        .bind(email.as_str())
        .bind(now)
        .fetch_optional(self.pool)
        .await?;

        row.map(OtpRecord::try_from).transpose()
    }

    async fn mark_delivery_failed(&self, id: OtpId) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE storefront.email_otp SET delivery_failed = TRUE WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    async fn consume(&self, id: OtpId) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE storefront.email_otp
            SET verified = TRUE
            WHERE id = $1 AND verified = FALSE
            ",
        )
        .bind(id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
