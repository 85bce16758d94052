//! Job creation, deletion and expiry.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use super::events::{EventBus, LifecycleEvent};
use crate::error::{JobError, JobResult};
use crate::models::{JobId, JobMetadata, JobType, ResolverJob};
use crate::store::JobRepository;

pub struct ResolverJobFactory {
    jobs: Arc<dyn JobRepository>,
    events: EventBus,
    ttl: Duration,
}

impl ResolverJobFactory {
    pub fn new(jobs: Arc<dyn JobRepository>, events: EventBus, ttl: Duration) -> Self {
        Self { jobs, events, ttl }
    }

    /// Persist a new job in `created` status and announce it.
    pub async fn create_job(
        &self,
        job_type: JobType,
        data: Vec<u8>,
        metadata: JobMetadata,
    ) -> JobResult<JobId> {
        let job = ResolverJob::new(job_type, metadata, self.ttl);
        let job_id = job.id;
        let size = data.len();

        self.jobs.create_job(job, data).await?;
        info!(%job_id, %job_type, bytes = size, "Job submitted");

        self.events
            .publish(LifecycleEvent::JobCreated { job_id, job_type })
            .await?;
        Ok(job_id)
    }

    /// Delete a job with its tasks and results.
    pub async fn delete_job(&self, job_id: JobId) -> JobResult<()> {
        self.jobs.delete_job(job_id).await?;
        info!(%job_id, "Job deleted");
        Ok(())
    }

    /// Delete every job whose deadline has passed, returning the deleted ids.
    pub async fn delete_expired_jobs(&self, now: DateTime<Utc>) -> JobResult<Vec<JobId>> {
        let expired = self.jobs.expired_jobs(now).await?;
        let mut deleted = Vec::with_capacity(expired.len());

        for job_id in expired {
            match self.jobs.delete_job(job_id).await.map_err(JobError::from) {
                Ok(()) => deleted.push(job_id),
                // Deleted concurrently
                Err(JobError::NotFound(_)) => {}
                Err(e) => {
                    warn!(%job_id, error = %e, "Failed to delete expired job");
                    return Err(e);
                }
            }
        }

        if !deleted.is_empty() {
            info!(count = deleted.len(), "Deleted expired jobs");
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::events::testing::RecordingListener;
    use crate::models::JobStatus;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_create_job_announces_creation() {
        let store = Arc::new(MemoryStore::new());
        let recorder = Arc::new(RecordingListener::default());
        let factory = ResolverJobFactory::new(
            store.clone(),
            EventBus::new().subscribe(recorder.clone()),
            Duration::days(30),
        );

        let job_id = factory
            .create_job(JobType::BuildingIds, b"egid\n1".to_vec(), JobMetadata::default())
            .await
            .unwrap();

        let job = store.get_job(job_id).await.unwrap();
        assert_eq!(job.status, JobStatus::Created);
        assert_eq!(job.expires_at - job.created_at, Duration::days(30));
        assert_eq!(
            recorder.events.lock().await.as_slice(),
            &[LifecycleEvent::JobCreated {
                job_id,
                job_type: JobType::BuildingIds
            }]
        );
    }

    #[tokio::test]
    async fn test_delete_expired_jobs() {
        let store = Arc::new(MemoryStore::new());
        let short = ResolverJobFactory::new(store.clone(), EventBus::new(), Duration::hours(1));
        let long = ResolverJobFactory::new(store.clone(), EventBus::new(), Duration::days(30));

        let expiring = short
            .create_job(JobType::GeoJson, Vec::new(), JobMetadata::default())
            .await
            .unwrap();
        let kept = long
            .create_job(JobType::GeoJson, Vec::new(), JobMetadata::default())
            .await
            .unwrap();

        let deleted = short.delete_expired_jobs(Utc::now() + Duration::days(1)).await.unwrap();
        assert_eq!(deleted, vec![expiring]);
        assert!(store.get_job(kept).await.is_ok());
        assert!(store.get_job(expiring).await.is_err());
    }

    #[tokio::test]
    async fn test_delete_unknown_job() {
        let factory = ResolverJobFactory::new(Arc::new(MemoryStore::new()), EventBus::new(), Duration::days(1));
        assert!(matches!(
            factory.delete_job(JobId::new()).await,
            Err(JobError::NotFound(_))
        ));
    }
}
