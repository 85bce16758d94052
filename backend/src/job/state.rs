//! Single writer of job status and failure.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use super::events::{LifecycleEvent, LifecycleListener};
use crate::error::{JobError, JobResult};
use crate::models::{JobId, JobStatus, ResolverJobFailure};
use crate::store::JobRepository;

/// Applies lifecycle events to stored jobs.
///
/// Retryable failures are recorded without touching the status, which is
/// what makes a job "temporarily failed".
pub struct JobStateUpdater {
    jobs: Arc<dyn JobRepository>,
}

impl JobStateUpdater {
    pub fn new(jobs: Arc<dyn JobRepository>) -> Self {
        Self { jobs }
    }

    async fn transition(&self, job_id: JobId, next: JobStatus) -> JobResult<()> {
        let job = self.jobs.get_job(job_id).await?;
        if !job.status.can_transition_to(next) {
            return Err(JobError::InvalidTransition {
                job_id,
                from: job.status,
                to: next,
            });
        }
        self.jobs.update_status(job_id, next).await?;
        Ok(())
    }

    async fn complete(&self, job_id: JobId, next: JobStatus) -> JobResult<()> {
        self.transition(job_id, next).await?;
        self.jobs.record_failure(job_id, None).await?;
        Ok(())
    }

    async fn fail(&self, job_id: JobId, failure: &ResolverJobFailure) -> JobResult<()> {
        if failure.retryable {
            warn!(%job_id, details = %failure.details, "Job temporarily failed");
        } else {
            self.transition(job_id, JobStatus::Failed).await?;
            warn!(%job_id, failure_type = ?failure.failure_type, details = %failure.details, "Job failed");
        }
        self.jobs.record_failure(job_id, Some(failure.clone())).await?;
        Ok(())
    }
}

#[async_trait]
impl LifecycleListener for JobStateUpdater {
    async fn on_event(&self, event: &LifecycleEvent) -> JobResult<()> {
        match event {
            LifecycleEvent::JobCreated { job_id, job_type } => {
                info!(%job_id, %job_type, "Job created");
                Ok(())
            }
            LifecycleEvent::PreparationStarted { job_id } => {
                self.transition(*job_id, JobStatus::Preparing).await
            }
            LifecycleEvent::PreparationCompleted { job_id, task_count } => {
                info!(%job_id, task_count, "Job ready");
                self.complete(*job_id, JobStatus::Ready).await
            }
            LifecycleEvent::ResolvingStarted { job_id } => {
                self.transition(*job_id, JobStatus::Resolving).await
            }
            LifecycleEvent::ResolvingCompleted { job_id, task_count } => {
                info!(%job_id, task_count, "Job completed");
                self.complete(*job_id, JobStatus::Completed).await
            }
            LifecycleEvent::PreparationFailed { job_id, failure }
            | LifecycleEvent::ResolvingFailed { job_id, failure } => self.fail(*job_id, failure).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{JobMetadata, JobType, ResolverJob};
    use crate::store::MemoryStore;
    use chrono::Duration;

    async fn setup() -> (Arc<MemoryStore>, JobStateUpdater, JobId) {
        let store = Arc::new(MemoryStore::new());
        let job = ResolverJob::new(JobType::BuildingIds, JobMetadata::default(), Duration::days(1));
        let id = job.id;
        store.create_job(job, Vec::new()).await.unwrap();
        (store.clone(), JobStateUpdater::new(store), id)
    }

    #[tokio::test]
    async fn test_happy_path_transitions() {
        let (store, updater, job_id) = setup().await;
        let events = [
            LifecycleEvent::PreparationStarted { job_id },
            LifecycleEvent::PreparationCompleted { job_id, task_count: 2 },
            LifecycleEvent::ResolvingStarted { job_id },
            LifecycleEvent::ResolvingCompleted { job_id, task_count: 2 },
        ];
        let expected = [
            JobStatus::Preparing,
            JobStatus::Ready,
            JobStatus::Resolving,
            JobStatus::Completed,
        ];
        for (event, status) in events.iter().zip(expected) {
            updater.on_event(event).await.unwrap();
            assert_eq!(store.get_job(job_id).await.unwrap().status, status);
        }
    }

    #[tokio::test]
    async fn test_skipping_a_state_is_rejected() {
        let (store, updater, job_id) = setup().await;
        let err = updater
            .on_event(&LifecycleEvent::ResolvingStarted { job_id })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            JobError::InvalidTransition {
                from: JobStatus::Created,
                to: JobStatus::Resolving,
                ..
            }
        ));
        assert_eq!(store.get_job(job_id).await.unwrap().status, JobStatus::Created);
    }

    #[tokio::test]
    async fn test_retryable_failure_keeps_status() {
        let (store, updater, job_id) = setup().await;
        for event in [
            LifecycleEvent::PreparationStarted { job_id },
            LifecycleEvent::PreparationCompleted { job_id, task_count: 1 },
            LifecycleEvent::ResolvingStarted { job_id },
        ] {
            updater.on_event(&event).await.unwrap();
        }

        let failure = ResolverJobFailure::resolving_error("registry timeout", true);
        updater
            .on_event(&LifecycleEvent::ResolvingFailed { job_id, failure })
            .await
            .unwrap();
        let job = store.get_job(job_id).await.unwrap();
        assert_eq!(job.status, JobStatus::Resolving);
        assert!(job.is_temporarily_failed());

        // Re-driven resolution clears the failure on completion
        updater.on_event(&LifecycleEvent::ResolvingStarted { job_id }).await.unwrap();
        updater
            .on_event(&LifecycleEvent::ResolvingCompleted { job_id, task_count: 0 })
            .await
            .unwrap();
        let job = store.get_job(job_id).await.unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.failure.is_none());
    }

    #[tokio::test]
    async fn test_permanent_failure() {
        let (store, updater, job_id) = setup().await;
        updater.on_event(&LifecycleEvent::PreparationStarted { job_id }).await.unwrap();
        let failure = ResolverJobFailure::invalid_input_data("Missing required column 'egid'");
        updater
            .on_event(&LifecycleEvent::PreparationFailed { job_id, failure: failure.clone() })
            .await
            .unwrap();

        let job = store.get_job(job_id).await.unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.failure, Some(failure));
    }

    #[tokio::test]
    async fn test_unknown_job() {
        let (_, updater, _) = setup().await;
        let err = updater
            .on_event(&LifecycleEvent::PreparationStarted { job_id: JobId::new() })
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::NotFound(_)));
    }
}
