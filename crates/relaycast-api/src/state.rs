//! Application state shared by every handler.

use rand::Rng;
use relaycast_core::Config;
use relaycast_db::CredentialStore;
use relaycast_pipeline::PublishPipeline;
use relaycast_services::OAuthClient;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// How long an issued OAuth `state` value stays redeemable.
pub const OAUTH_STATE_TTL: Duration = Duration::from_secs(600);

/// Outstanding states kept at most; the oldest is evicted beyond this.
pub const MAX_OUTSTANDING_STATES: usize = 10_000;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub credentials: Arc<dyn CredentialStore>,
    pub pipeline: PublishPipeline,
    pub oauth: OAuthClient,
    pub oauth_states: OAuthStateStore,
}

/// Outstanding `state` values of the consent flow. Each one is single-use.
#[derive(Clone)]
pub struct OAuthStateStore {
    issued: Arc<Mutex<HashMap<String, Instant>>>,
    ttl: Duration,
    limit: usize,
}

impl OAuthStateStore {
    pub fn new(ttl: Duration) -> Self {
        Self::with_limit(ttl, MAX_OUTSTANDING_STATES)
    }

    pub fn with_limit(ttl: Duration, limit: usize) -> Self {
        OAuthStateStore {
            issued: Arc::new(Mutex::new(HashMap::new())),
            ttl,
            limit: limit.max(1),
        }
    }

    /// Generate and remember a fresh random state value.
    pub async fn issue(&self) -> String {
        let random_bytes: Vec<u8> = {
            let mut rng = rand::rng();
            (0..24).map(|_| rng.random()).collect()
        };
        let state = hex::encode(random_bytes);

        let mut issued = self.issued.lock().await;
        let ttl = self.ttl;
        issued.retain(|_, at| at.elapsed() < ttl);
        while issued.len() >= self.limit {
            let Some(oldest) = issued
                .iter()
                .min_by_key(|(_, at)| **at)
                .map(|(key, _)| key.clone())
            else {
                break;
            };
            issued.remove(&oldest);
            tracing::debug!("Evicted oldest outstanding OAuth state");
        }
        issued.insert(state.clone(), Instant::now());
        state
    }

    /// True if `state` was issued here and has not expired. Consumes it.
    pub async fn redeem(&self, state: &str) -> bool {
        let mut issued = self.issued.lock().await;
        matches!(issued.remove(state), Some(at) if at.elapsed() < self.ttl)
    }
}

impl Default for OAuthStateStore {
    fn default() -> Self {
        OAuthStateStore::new(OAUTH_STATE_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_state_is_single_use() {
        let store = OAuthStateStore::default();
        let state = store.issue().await;

        assert_eq!(state.len(), 48);
        assert!(store.redeem(&state).await);
        assert!(!store.redeem(&state).await);
    }

    #[tokio::test]
    async fn test_unknown_state_is_rejected() {
        let store = OAuthStateStore::default();
        assert!(!store.redeem("forged").await);
    }

    #[tokio::test]
    async fn test_outstanding_states_are_capped() {
        let store = OAuthStateStore::with_limit(OAUTH_STATE_TTL, 3);
        let first = store.issue().await;
        tokio::time::sleep(Duration::from_millis(2)).await;

        let mut rest = Vec::new();
        for _ in 0..3 {
            rest.push(store.issue().await);
            tokio::time::sleep(Duration::from_millis(2)).await;
        }

        assert_eq!(store.issued.lock().await.len(), 3);
        assert!(!store.redeem(&first).await);
        for state in rest {
            assert!(store.redeem(&state).await);
        }
    }

    #[tokio::test]
    async fn test_expired_state_is_rejected() {
        let store = OAuthStateStore::new(Duration::from_millis(10));
        let state = store.issue().await;

        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(!store.redeem(&state).await);
    }
}
