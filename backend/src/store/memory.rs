//! In-memory storage backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

use super::{JobRepository, ResultRepository, TaskRepository};
use crate::error::{StoreError, StoreResult};
use crate::models::{
    JobId, JobMetadata, JobRawData, JobStatus, ResolverJob, ResolverJobFailure, ResolverResult,
    ResolverTask, ResultKey,
};

struct StoredJob {
    job: ResolverJob,
    data: Vec<u8>,
}

/// Jobs, tasks and results held in process memory.
#[derive(Default)]
pub struct MemoryStore {
    jobs: RwLock<HashMap<JobId, StoredJob>>,
    tasks: RwLock<HashMap<JobId, Vec<ResolverTask>>>,
    results: RwLock<HashMap<JobId, BTreeMap<ResultKey, ResolverResult>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn ensure_job(&self, id: JobId) -> StoreResult<()> {
        if self.jobs.read().await.contains_key(&id) {
            Ok(())
        } else {
            Err(StoreError::JobNotFound(id))
        }
    }

    async fn with_job<F>(&self, id: JobId, update: F) -> StoreResult<()>
    where
        F: FnOnce(&mut ResolverJob) + Send,
    {
        let mut jobs = self.jobs.write().await;
        let stored = jobs.get_mut(&id).ok_or(StoreError::JobNotFound(id))?;
        update(&mut stored.job);
        Ok(())
    }
}

#[async_trait]
impl JobRepository for MemoryStore {
    async fn create_job(&self, job: ResolverJob, data: Vec<u8>) -> StoreResult<()> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            return Err(StoreError::Backend(format!("Job {} already exists", job.id)));
        }
        jobs.insert(job.id, StoredJob { job, data });
        Ok(())
    }

    async fn get_job(&self, id: JobId) -> StoreResult<ResolverJob> {
        self.jobs
            .read()
            .await
            .get(&id)
            .map(|stored| stored.job.clone())
            .ok_or(StoreError::JobNotFound(id))
    }

    async fn get_raw_data(&self, id: JobId) -> StoreResult<JobRawData> {
        let jobs = self.jobs.read().await;
        let stored = jobs.get(&id).ok_or(StoreError::JobNotFound(id))?;
        Ok(JobRawData {
            job_id: id,
            job_type: stored.job.job_type,
            metadata: stored.job.metadata.clone(),
            data: stored.data.clone(),
        })
    }

    async fn list_jobs(&self) -> StoreResult<Vec<ResolverJob>> {
        let mut jobs: Vec<ResolverJob> = self
            .jobs
            .read()
            .await
            .values()
            .map(|stored| stored.job.clone())
            .collect();
        jobs.sort_by_key(|job| job.id);
        Ok(jobs)
    }

    async fn update_metadata(&self, id: JobId, metadata: JobMetadata) -> StoreResult<()> {
        self.with_job(id, |job| job.metadata = metadata).await
    }

    async fn update_status(&self, id: JobId, status: JobStatus) -> StoreResult<()> {
        self.with_job(id, |job| job.status = status).await
    }

    async fn record_failure(&self, id: JobId, failure: Option<ResolverJobFailure>) -> StoreResult<()> {
        self.with_job(id, |job| job.failure = failure).await
    }

    async fn expired_jobs(&self, now: DateTime<Utc>) -> StoreResult<Vec<JobId>> {
        let mut expired: Vec<JobId> = self
            .jobs
            .read()
            .await
            .values()
            .filter(|stored| stored.job.is_expired(now))
            .map(|stored| stored.job.id)
            .collect();
        expired.sort();
        Ok(expired)
    }

    async fn delete_job(&self, id: JobId) -> StoreResult<()> {
        let mut jobs = self.jobs.write().await;
        if jobs.remove(&id).is_none() {
            return Err(StoreError::JobNotFound(id));
        }
        self.tasks.write().await.remove(&id);
        self.results.write().await.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl TaskRepository for MemoryStore {
    async fn delete_tasks(&self, job_id: JobId) -> StoreResult<()> {
        self.tasks.write().await.remove(&job_id);
        Ok(())
    }

    async fn store_tasks(&self, tasks: Vec<ResolverTask>) -> StoreResult<()> {
        let mut by_job: HashMap<JobId, Vec<ResolverTask>> = HashMap::new();
        for task in tasks {
            by_job.entry(task.job_id).or_default().push(task);
        }
        for job_id in by_job.keys() {
            self.ensure_job(*job_id).await?;
        }

        let mut table = self.tasks.write().await;
        for (job_id, tasks) in by_job {
            table.entry(job_id).or_default().extend(tasks);
        }
        Ok(())
    }

    async fn tasks_for_job(&self, job_id: JobId) -> StoreResult<Vec<ResolverTask>> {
        Ok(self
            .tasks
            .read()
            .await
            .get(&job_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl ResultRepository for MemoryStore {
    async fn delete_results(&self, job_id: JobId) -> StoreResult<()> {
        self.results.write().await.remove(&job_id);
        Ok(())
    }

    async fn upsert_result(&self, result: ResolverResult) -> StoreResult<()> {
        self.ensure_job(result.job_id).await?;

        // Merge happens under the write lock so concurrent writers on the same key are safe
        let mut table = self.results.write().await;
        let results = table.entry(result.job_id).or_default();
        match results.get_mut(&result.key()) {
            Some(existing) => existing.merge(&result),
            None => {
                results.insert(result.key(), result);
            }
        }
        Ok(())
    }

    async fn results_for_job(&self, job_id: JobId) -> StoreResult<Vec<ResolverResult>> {
        Ok(self
            .results
            .read()
            .await
            .get(&job_id)
            .map(|results| results.values().cloned().collect())
            .unwrap_or_default())
    }
}
