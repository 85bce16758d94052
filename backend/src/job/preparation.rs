//! Preparation phase: raw job input to tasks.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use super::events::{EventBus, LifecycleEvent};
use crate::error::{JobResult, PrepareError, PrepareResult};
use crate::models::{JobId, JobRawData, JobType, ResolverJobFailure};
use crate::store::JobRepository;

/// Strategy turning raw input of some job types into stored tasks.
#[async_trait]
pub trait JobPreparer: Send + Sync {
    fn name(&self) -> &'static str;

    fn can_prepare_job(&self, job_type: JobType) -> bool;

    /// Store the job's tasks, returning how many were produced.
    async fn prepare_job(&self, raw: JobRawData) -> PrepareResult<usize>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum PreparationOutcome {
    Prepared { task_count: usize },
    Failed(ResolverJobFailure),
}

pub struct JobPreparationHandler {
    jobs: Arc<dyn JobRepository>,
    preparers: Vec<Arc<dyn JobPreparer>>,
    events: EventBus,
}

impl JobPreparationHandler {
    /// Preparers are tried in the given order; the first capable one wins.
    pub fn new(jobs: Arc<dyn JobRepository>, preparers: Vec<Arc<dyn JobPreparer>>, events: EventBus) -> Self {
        Self {
            jobs,
            preparers,
            events,
        }
    }

    /// Prepare a job.
    ///
    /// Only a missing job, a storage failure or a rejected transition is
    /// returned as an error; input problems become a recorded failure.
    pub async fn handle_preparation(&self, job_id: JobId) -> JobResult<PreparationOutcome> {
        let raw = self.jobs.get_raw_data(job_id).await?;
        let job_type = raw.job_type;

        self.events
            .publish(LifecycleEvent::PreparationStarted { job_id })
            .await?;

        let Some(preparer) = self.preparers.iter().find(|p| p.can_prepare_job(job_type)) else {
            return self.fail(job_id, ResolverJobFailure::no_preparer_found(job_type)).await;
        };

        info!(%job_id, %job_type, preparer = preparer.name(), "Preparing job");
        match preparer.prepare_job(raw).await {
            Ok(task_count) => {
                self.events
                    .publish(LifecycleEvent::PreparationCompleted { job_id, task_count })
                    .await?;
                Ok(PreparationOutcome::Prepared { task_count })
            }
            Err(PrepareError::InvalidInputData(e)) => {
                warn!(%job_id, error = %e, "Invalid input data");
                self.fail(job_id, ResolverJobFailure::invalid_input_data(e.message()))
                    .await
            }
            Err(PrepareError::Store(e)) => Err(e.into()),
        }
    }

    async fn fail(&self, job_id: JobId, failure: ResolverJobFailure) -> JobResult<PreparationOutcome> {
        self.events
            .publish(LifecycleEvent::PreparationFailed {
                job_id,
                failure: failure.clone(),
            })
            .await?;
        Ok(PreparationOutcome::Failed(failure))
    }
}
