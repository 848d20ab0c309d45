use async_trait::async_trait;
use chrono::{DateTime, Utc};
use relaycast_core::models::{CredentialRecord, CredentialUpsert, RefreshedToken};
use relaycast_core::{AppError, EncryptionService};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

/// Durable keyed storage of per-user delegated credentials.
///
/// Writes for one subject are atomic and last-write-wins.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self, subject_id: &str) -> Result<Option<CredentialRecord>, AppError>;

    /// Insert or replace the record for `upsert.subject_id`. A missing
    /// refresh token or email keeps the stored value.
    async fn upsert(&self, upsert: CredentialUpsert) -> Result<CredentialRecord, AppError>;

    /// Write back a refreshed access token and its expiry.
    async fn persist_refresh(
        &self,
        subject_id: &str,
        token: &RefreshedToken,
    ) -> Result<(), AppError>;

    /// Cheap connectivity check for readiness probes.
    async fn ping(&self) -> Result<(), AppError>;
}

/// Postgres-backed [`CredentialStore`]. Tokens are sealed before they reach the database.
#[derive(Clone)]
pub struct PgCredentialRepository {
    pool: PgPool,
    encryption: EncryptionService,
}

const RETURNING_COLUMNS: &str = "subject_id, email, access_token_encrypted, \
     refresh_token_encrypted, expires_at, created_at, updated_at";

impl PgCredentialRepository {
    pub fn new(pool: PgPool, encryption: EncryptionService) -> Self {
        Self { pool, encryption }
    }

    fn row_to_record(&self, row: &PgRow) -> Result<CredentialRecord, AppError> {
        let access_token_encrypted: String = row.try_get("access_token_encrypted")?;
        let refresh_token_encrypted: Option<String> = row.try_get("refresh_token_encrypted")?;

        Ok(CredentialRecord {
            subject_id: row.try_get("subject_id")?,
            email: row.try_get("email")?,
            access_token: self.encryption.decrypt(&access_token_encrypted)?,
            refresh_token: self
                .encryption
                .decrypt_optional(refresh_token_encrypted.as_deref())?,
            expires_at: row.try_get::<Option<DateTime<Utc>>, _>("expires_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl CredentialStore for PgCredentialRepository {
    async fn get(&self, subject_id: &str) -> Result<Option<CredentialRecord>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM user_credentials WHERE subject_id = $1",
            RETURNING_COLUMNS
        ))
        .bind(subject_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(|r| self.row_to_record(r)).transpose()
    }

    async fn upsert(&self, upsert: CredentialUpsert) -> Result<CredentialRecord, AppError> {
        let access_token = self.encryption.encrypt(&upsert.access_token)?;
        let refresh_token = self
            .encryption
            .encrypt_optional(upsert.refresh_token.as_deref())?;

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO user_credentials (
                subject_id, email, access_token_encrypted, refresh_token_encrypted, expires_at
            )
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (subject_id) DO UPDATE SET
                email = COALESCE(EXCLUDED.email, user_credentials.email),
                access_token_encrypted = EXCLUDED.access_token_encrypted,
                refresh_token_encrypted = COALESCE(
                    EXCLUDED.refresh_token_encrypted,
                    user_credentials.refresh_token_encrypted
                ),
                expires_at = EXCLUDED.expires_at,
                updated_at = NOW()
            RETURNING {}
            "#,
            RETURNING_COLUMNS
        ))
        .bind(&upsert.subject_id)
        .bind(&upsert.email)
        .bind(access_token)
        .bind(refresh_token)
        .bind(upsert.expires_at)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(
            subject_id = %upsert.subject_id,
            has_refresh_token = upsert.refresh_token.is_some(),
            "Credential upserted"
        );

        self.row_to_record(&row)
    }

    async fn persist_refresh(
        &self,
        subject_id: &str,
        token: &RefreshedToken,
    ) -> Result<(), AppError> {
        let access_token = self.encryption.encrypt(&token.access_token)?;
        let rotated_refresh = self
            .encryption
            .encrypt_optional(token.refresh_token.as_deref())?;

        let result = sqlx::query(
            r#"
            UPDATE user_credentials
            SET access_token_encrypted = $2,
                expires_at = $3,
                refresh_token_encrypted = COALESCE($4, refresh_token_encrypted),
                updated_at = NOW()
            WHERE subject_id = $1
            "#,
        )
        .bind(subject_id)
        .bind(access_token)
        .bind(token.expiry_or_default(Utc::now()))
        .bind(rotated_refresh)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::CredentialNotFound(format!(
                "No credentials stored for user {}",
                subject_id
            )));
        }

        tracing::debug!(
            subject_id = %subject_id,
            expires_at = ?token.expires_at,
            "Refreshed access token persisted"
        );

        Ok(())
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
