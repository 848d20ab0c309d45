//! In-memory credential store

use async_trait::async_trait;
use chrono::Utc;
use relaycast_core::models::{CredentialRecord, CredentialUpsert, RefreshedToken};
use relaycast_core::AppError;
use relaycast_db::CredentialStore;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Default)]
pub struct InMemoryCredentialStore {
    records: Mutex<HashMap<String, CredentialRecord>>,
    get_calls: AtomicUsize,
    persist_calls: AtomicUsize,
    unavailable: bool,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call fails as if the database were down.
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn insert(&self, record: CredentialRecord) {
        self.records
            .lock()
            .unwrap()
            .insert(record.subject_id.clone(), record);
    }

    pub fn record(&self, subject_id: &str) -> Option<CredentialRecord> {
        self.records.lock().unwrap().get(subject_id).cloned()
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn persist_calls(&self) -> usize {
        self.persist_calls.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<(), AppError> {
        if self.unavailable {
            return Err(AppError::Internal("credential store unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn get(&self, subject_id: &str) -> Result<Option<CredentialRecord>, AppError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(self.record(subject_id))
    }

    async fn upsert(&self, upsert: CredentialUpsert) -> Result<CredentialRecord, AppError> {
        self.check_available()?;
        let now = Utc::now();
        let mut records = self.records.lock().unwrap();
        let previous = records.get(&upsert.subject_id).cloned();

        let record = CredentialRecord {
            subject_id: upsert.subject_id.clone(),
            email: upsert
                .email
                .or_else(|| previous.as_ref().and_then(|p| p.email.clone())),
            access_token: upsert.access_token,
            refresh_token: upsert
                .refresh_token
                .or_else(|| previous.as_ref().and_then(|p| p.refresh_token.clone())),
            expires_at: upsert.expires_at,
            created_at: previous.as_ref().map(|p| p.created_at).unwrap_or(now),
            updated_at: now,
        };
        records.insert(upsert.subject_id, record.clone());
        Ok(record)
    }

    async fn persist_refresh(
        &self,
        subject_id: &str,
        token: &RefreshedToken,
    ) -> Result<(), AppError> {
        self.persist_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        let mut records = self.records.lock().unwrap();
        let record = records.get_mut(subject_id).ok_or_else(|| {
            AppError::CredentialNotFound(format!("No credentials stored for user {}", subject_id))
        })?;
        *record = record.with_refreshed(token, Utc::now());
        Ok(())
    }

    async fn ping(&self) -> Result<(), AppError> {
        self.check_available()
    }
}
