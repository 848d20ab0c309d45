//! Refresh-and-persist of delegated access tokens.
//!
//! Refreshes for one subject are serialised: a run that waited on another
//! run's refresh re-reads the store and reuses the token it persisted.

use crate::error::PipelineError;
use chrono::{Duration, Utc};
use relaycast_core::models::CredentialRecord;
use relaycast_db::CredentialStore;
use relaycast_services::PublishClient;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct CredentialRefresher {
    store: Arc<dyn CredentialStore>,
    publisher: Arc<dyn PublishClient>,
    skew: Duration,
    locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl CredentialRefresher {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        publisher: Arc<dyn PublishClient>,
        skew: Duration,
    ) -> Self {
        CredentialRefresher {
            store,
            publisher,
            skew,
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Return a credential whose access token is usable now, refreshing and
    /// persisting it first if it is expired or about to expire.
    pub async fn ensure_fresh(
        &self,
        credential: CredentialRecord,
    ) -> Result<CredentialRecord, PipelineError> {
        if !credential.needs_refresh(Utc::now(), self.skew) {
            return Ok(credential);
        }

        let subject_id = credential.subject_id.clone();
        let lock = self.lock_for(&subject_id).await;
        let result = {
            let _guard = lock.lock().await;
            self.refresh_locked(&subject_id).await
        };
        drop(lock);
        self.prune(&subject_id).await;

        result
    }

    async fn refresh_locked(&self, subject_id: &str) -> Result<CredentialRecord, PipelineError> {
        let current = self
            .store
            .get(subject_id)
            .await
            .map_err(PipelineError::CredentialStore)?
            .ok_or_else(|| PipelineError::NotFound {
                subject_id: subject_id.to_string(),
            })?;

        if !current.needs_refresh(Utc::now(), self.skew) {
            tracing::debug!(
                subject_id = %subject_id,
                "Access token already refreshed by a concurrent run"
            );
            return Ok(current);
        }

        let start = std::time::Instant::now();
        let token = self
            .publisher
            .refresh_access_token(&current)
            .await?
            .with_default_expiry(Utc::now());

        self.store
            .persist_refresh(subject_id, &token)
            .await
            .map_err(PipelineError::CredentialStore)?;

        tracing::info!(
            subject_id = %subject_id,
            expires_at = ?token.expires_at,
            rotated_refresh_token = token.refresh_token.is_some(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Access token refreshed and persisted"
        );

        Ok(current.with_refreshed(&token, Utc::now()))
    }

    async fn lock_for(&self, subject_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(subject_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the subject's lock once no run holds or waits on it.
    async fn prune(&self, subject_id: &str) {
        let mut locks = self.locks.lock().await;
        if locks
            .get(subject_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(subject_id);
        }
    }
}
