//! Storage contracts for jobs, tasks and results.
//!
//! The pipeline only talks to these traits; [`MemoryStore`] implements all
//! three for the CLI, the server and tests.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreResult;
use crate::models::{
    JobId, JobMetadata, JobRawData, JobStatus, ResolverJob, ResolverJobFailure, ResolverResult,
    ResolverTask,
};

pub use memory::MemoryStore;

#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Persist a new job with its raw submitted bytes.
    async fn create_job(&self, job: ResolverJob, data: Vec<u8>) -> StoreResult<()>;

    async fn get_job(&self, id: JobId) -> StoreResult<ResolverJob>;

    async fn get_raw_data(&self, id: JobId) -> StoreResult<JobRawData>;

    async fn list_jobs(&self) -> StoreResult<Vec<ResolverJob>>;

    async fn update_metadata(&self, id: JobId, metadata: JobMetadata) -> StoreResult<()>;

    async fn update_status(&self, id: JobId, status: JobStatus) -> StoreResult<()>;

    /// Record or clear the failure.
    async fn record_failure(&self, id: JobId, failure: Option<ResolverJobFailure>) -> StoreResult<()>;

    /// Jobs whose deadline is at or before `now`.
    async fn expired_jobs(&self, now: DateTime<Utc>) -> StoreResult<Vec<JobId>>;

    /// Delete a job, its raw data, tasks and results.
    async fn delete_job(&self, id: JobId) -> StoreResult<()>;
}

#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn delete_tasks(&self, job_id: JobId) -> StoreResult<()>;

    async fn store_tasks(&self, tasks: Vec<ResolverTask>) -> StoreResult<()>;

    async fn tasks_for_job(&self, job_id: JobId) -> StoreResult<Vec<ResolverTask>>;
}

#[async_trait]
pub trait ResultRepository: Send + Sync {
    async fn delete_results(&self, job_id: JobId) -> StoreResult<()>;

    /// Insert, or merge into the existing result with the same key.
    async fn upsert_result(&self, result: ResolverResult) -> StoreResult<()>;

    async fn upsert_results(&self, results: Vec<ResolverResult>) -> StoreResult<()> {
        for result in results {
            self.upsert_result(result).await?;
        }
        Ok(())
    }

    async fn results_for_job(&self, job_id: JobId) -> StoreResult<Vec<ResolverResult>>;
}
