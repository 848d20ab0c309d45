//! Publish run orchestration
//!
//! One run per publish request: load the credential, open the source, stage
//! it, pull it back as a local artifact and publish it. Whatever the run
//! acquired is released before it reports, on success, failure and timeout
//! alike.

use crate::error::PipelineError;
use crate::refresh::CredentialRefresher;
use crate::run::{CleanupFailure, RunReport, RunResources, RunState, RunTracker};
use relaycast_core::models::PublishRequest;
use relaycast_core::Config;
use relaycast_db::CredentialStore;
use relaycast_services::{PublishClient, PublishedVideo, RemoteFetcher};
use relaycast_storage::ObjectStager;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use uuid::Uuid;
use validator::Validate;

const DEFAULT_RUN_TIMEOUT_SECS: u64 = 3600;
const DEFAULT_REFRESH_SKEW_SECS: i64 = 60;

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Upper bound on the steps before cleanup. `None` disables it.
    pub run_timeout: Option<Duration>,
    /// Access tokens expiring within this window are refreshed first.
    pub refresh_skew: chrono::Duration,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        let run_timeout = match config.run_timeout_secs() {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        PipelineSettings {
            run_timeout,
            refresh_skew: chrono::Duration::seconds(config.token_refresh_skew_secs()),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        PipelineSettings {
            run_timeout: Some(Duration::from_secs(DEFAULT_RUN_TIMEOUT_SECS)),
            refresh_skew: chrono::Duration::seconds(DEFAULT_REFRESH_SKEW_SECS),
        }
    }
}

/// Sequences the collaborators into publish runs. Cheap to clone; clones
/// share the same collaborators.
#[derive(Clone)]
pub struct PublishPipeline {
    credentials: Arc<dyn CredentialStore>,
    fetcher: Arc<dyn RemoteFetcher>,
    stager: Arc<dyn ObjectStager>,
    publisher: Arc<dyn PublishClient>,
    refresher: CredentialRefresher,
    settings: PipelineSettings,
}

impl PublishPipeline {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        fetcher: Arc<dyn RemoteFetcher>,
        stager: Arc<dyn ObjectStager>,
        publisher: Arc<dyn PublishClient>,
        settings: PipelineSettings,
    ) -> Self {
        let refresher =
            CredentialRefresher::new(credentials.clone(), publisher.clone(), settings.refresh_skew);
        PublishPipeline {
            credentials,
            fetcher,
            stager,
            publisher,
            refresher,
            settings,
        }
    }

    pub async fn run(
        &self,
        subject_id: Option<String>,
        request: PublishRequest,
    ) -> Result<PublishedVideo, PipelineError> {
        self.run_with_report(subject_id, request).await.result
    }

    /// Execute the run on its own task so it reaches cleanup even if the
    /// caller stops waiting for it.
    pub fn spawn_run(
        &self,
        subject_id: Option<String>,
        request: PublishRequest,
    ) -> JoinHandle<RunReport> {
        let pipeline = self.clone();
        tokio::spawn(async move { pipeline.run_with_report(subject_id, request).await })
    }

    pub async fn run_with_report(
        &self,
        subject_id: Option<String>,
        request: PublishRequest,
    ) -> RunReport {
        let start = Instant::now();
        let mut tracker = RunTracker::new(subject_id.clone());
        let mut resources = RunResources::default();
        let run_id = tracker.run_id();

        tracing::info!(
            run_id = %run_id,
            subject_id = ?subject_id,
            source_url = ?request.video_url,
            "Publish run started"
        );

        let result = {
            let steps = self.drive(&mut tracker, &mut resources, subject_id, &request);
            match self.settings.run_timeout {
                Some(limit) => match tokio::time::timeout(limit, steps).await {
                    Ok(result) => result,
                    Err(_) => Err(PipelineError::TimedOut {
                        after_secs: limit.as_secs(),
                    }),
                },
                None => steps.await,
            }
        };

        tracker.transition(RunState::CleaningUp);
        let staged_key = resources.staged_key.as_ref().map(|key| key.to_string());
        let cleanup_failures = self.release(run_id, resources).await;

        match &result {
            Ok(video) => {
                tracker.transition(RunState::Completed);
                tracing::info!(
                    run_id = %run_id,
                    video_id = %video.video_id,
                    cleanup_failures = cleanup_failures.len(),
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Publish run completed"
                );
            }
            Err(e) => {
                tracker.transition(RunState::Failed(e.kind().to_string()));
                tracing::warn!(
                    run_id = %run_id,
                    error = %e,
                    cleanup_failures = cleanup_failures.len(),
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Publish run failed"
                );
            }
        }

        RunReport {
            run_id,
            states: tracker.into_history(),
            staged_key,
            result,
            cleanup_failures,
        }
    }

    async fn drive(
        &self,
        tracker: &mut RunTracker,
        resources: &mut RunResources,
        subject_id: Option<String>,
        request: &PublishRequest,
    ) -> Result<PublishedVideo, PipelineError> {
        tracker.transition(RunState::Authenticating);
        let subject_id = subject_id
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or(PipelineError::Unauthenticated)?;

        request
            .validate()
            .map_err(|e| PipelineError::Validation(e.to_string()))?;
        let video_url = request
            .video_url
            .as_deref()
            .ok_or_else(|| PipelineError::Validation("video_url is required".to_string()))?;

        let credential = self
            .credentials
            .get(&subject_id)
            .await
            .map_err(PipelineError::CredentialStore)?
            .ok_or_else(|| PipelineError::NotFound {
                subject_id: subject_id.clone(),
            })?;

        tracker.transition(RunState::Fetching);
        let source = self.fetcher.open(video_url).await?;

        // The key is owned by the run before any byte is written, so a
        // failed or interrupted stage still gets cleaned up.
        tracker.transition(RunState::Staging);
        let key = resources.staged_key.insert(self.stager.allocate_key());
        self.stager.stage(key, source.stream, source.length).await?;

        tracker.transition(RunState::Materializing);
        let artifact = resources
            .artifact
            .insert(self.stager.materialize(key).await?);

        tracker.transition(RunState::Publishing);
        let credential = self.refresher.ensure_fresh(credential).await?;
        let video = self
            .publisher
            .publish(&credential, &request.metadata(), artifact)
            .await?;

        Ok(video)
    }

    async fn release(&self, run_id: Uuid, resources: RunResources) -> Vec<CleanupFailure> {
        let mut failures = Vec::new();

        if let Some(artifact) = resources.artifact {
            let path = artifact.path().display().to_string();
            if let Err(e) = artifact.release() {
                tracing::warn!(
                    run_id = %run_id,
                    path = %path,
                    error = %e,
                    "Failed to remove local artifact"
                );
                failures.push(CleanupFailure::LocalArtifact {
                    path,
                    message: e.to_string(),
                });
            }
        }

        if let Some(key) = resources.staged_key {
            if let Err(e) = self.stager.delete(&key).await {
                tracing::warn!(
                    run_id = %run_id,
                    key = %key,
                    error = %e,
                    "Failed to delete staged object"
                );
                failures.push(CleanupFailure::StagedObject {
                    key: key.to_string(),
                    message: e.to_string(),
                });
            }
        }

        failures
    }
}
