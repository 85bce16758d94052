//! Resolving phase: tasks to results.

use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::events::{EventBus, LifecycleEvent};
use crate::error::{JobError, JobResult, ResolveError, ResolveResult};
use crate::models::{JobId, JobType, ResolverJob, ResolverJobFailure};
use crate::store::{JobRepository, ResultRepository};

/// Strategy matching the tasks of some job types against the registry.
#[async_trait]
pub trait TaskResolver: Send + Sync {
    fn name(&self) -> &'static str;

    fn can_resolve_tasks(&self, job_type: JobType) -> bool;

    /// Write the job's results, returning how many tasks were resolved.
    async fn resolve_tasks(&self, job: &ResolverJob) -> ResolveResult<usize>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResolvingOutcome {
    Resolved { task_count: usize },
    Failed(ResolverJobFailure),
}

pub struct TaskResolvingHandler {
    jobs: Arc<dyn JobRepository>,
    results: Arc<dyn ResultRepository>,
    resolvers: Vec<Arc<dyn TaskResolver>>,
    events: EventBus,
}

impl TaskResolvingHandler {
    /// Resolvers are tried in the given order; the first capable one wins.
    pub fn new(
        jobs: Arc<dyn JobRepository>,
        results: Arc<dyn ResultRepository>,
        resolvers: Vec<Arc<dyn TaskResolver>>,
        events: EventBus,
    ) -> Self {
        Self {
            jobs,
            results,
            resolvers,
            events,
        }
    }

    /// Resolve a job.
    ///
    /// A retryable resolver error is recorded then returned as
    /// [`JobError::RetryableResolving`]. Any other resolver error, a panic
    /// included, is recorded as a permanent failure and not returned.
    pub async fn handle_resolving(&self, job_id: JobId) -> JobResult<ResolvingOutcome> {
        let job = self.jobs.get_job(job_id).await?;
        let job_type = job.job_type;

        self.events
            .publish(LifecycleEvent::ResolvingStarted { job_id })
            .await?;

        if let Err(e) = self.results.delete_results(job_id).await {
            return self.fail(job_id, ResolverJobFailure::resolving_error(e.to_string(), false)).await;
        }

        let Some(resolver) = self.resolvers.iter().find(|r| r.can_resolve_tasks(job_type)) else {
            return self.fail(job_id, ResolverJobFailure::no_resolver_found(job_type)).await;
        };

        info!(%job_id, %job_type, resolver = resolver.name(), "Resolving job");
        let run = AssertUnwindSafe(resolver.resolve_tasks(&job)).catch_unwind().await;

        match run {
            Ok(Ok(task_count)) => {
                self.events
                    .publish(LifecycleEvent::ResolvingCompleted { job_id, task_count })
                    .await?;
                Ok(ResolvingOutcome::Resolved { task_count })
            }
            Ok(Err(ResolveError::Retryable(message))) => {
                warn!(%job_id, error = %message, "Retryable resolving error");
                self.events
                    .publish(LifecycleEvent::ResolvingFailed {
                        job_id,
                        failure: ResolverJobFailure::resolving_error(message.clone(), true),
                    })
                    .await?;
                Err(JobError::RetryableResolving { job_id, message })
            }
            Ok(Err(e)) => {
                error!(%job_id, error = %e, "Resolving failed");
                self.fail(job_id, ResolverJobFailure::resolving_error(e.to_string(), false))
                    .await
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(%job_id, error = %message, "Resolver panicked");
                self.fail(job_id, ResolverJobFailure::resolving_error(message, false))
                    .await
            }
        }
    }

    async fn fail(&self, job_id: JobId, failure: ResolverJobFailure) -> JobResult<ResolvingOutcome> {
        self.events
            .publish(LifecycleEvent::ResolvingFailed {
                job_id,
                failure: failure.clone(),
            })
            .await?;
        Ok(ResolvingOutcome::Failed(failure))
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "resolver panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RegistryError;
    use crate::job::events::testing::RecordingListener;
    use crate::job::state::JobStateUpdater;
    use crate::models::{FailureType, JobMetadata, JobStatus};
    use crate::store::MemoryStore;
    use chrono::Duration;

    enum Behaviour {
        Succeed,
        Unavailable,
        Broken,
        Panic,
    }

    struct StubResolver(Behaviour);

    #[async_trait]
    impl TaskResolver for StubResolver {
        fn name(&self) -> &'static str {
            "stub"
        }

        fn can_resolve_tasks(&self, job_type: JobType) -> bool {
            job_type == JobType::BuildingIds
        }

        async fn resolve_tasks(&self, _job: &ResolverJob) -> ResolveResult<usize> {
            match self.0 {
                Behaviour::Succeed => Ok(3),
                Behaviour::Unavailable => Err(RegistryError::Unavailable("connection reset".into()).into()),
                Behaviour::Broken => Err(ResolveError::InvalidTask("corrupt geometry".into())),
                Behaviour::Panic => panic!("index out of bounds"),
            }
        }
    }

    async fn setup(job_type: JobType, behaviour: Behaviour) -> (Arc<MemoryStore>, Arc<RecordingListener>, TaskResolvingHandler, JobId) {
        let store = Arc::new(MemoryStore::new());
        let recorder = Arc::new(RecordingListener::default());
        let events = EventBus::new()
            .subscribe(Arc::new(JobStateUpdater::new(store.clone())))
            .subscribe(recorder.clone());

        let mut job = ResolverJob::new(job_type, JobMetadata::default(), Duration::days(1));
        job.status = JobStatus::Ready;
        let job_id = job.id;
        store.create_job(job, Vec::new()).await.unwrap();

        let handler = TaskResolvingHandler::new(
            store.clone(),
            store.clone(),
            vec![Arc::new(StubResolver(behaviour)) as Arc<dyn TaskResolver>],
            events,
        );
        (store, recorder, handler, job_id)
    }

    #[tokio::test]
    async fn test_success_completes_job() {
        let (store, recorder, handler, job_id) = setup(JobType::BuildingIds, Behaviour::Succeed).await;
        let outcome = handler.handle_resolving(job_id).await.unwrap();
        assert_eq!(outcome, ResolvingOutcome::Resolved { task_count: 3 });
        assert_eq!(store.get_job(job_id).await.unwrap().status, JobStatus::Completed);
        assert_eq!(recorder.names().await, vec!["resolving_started", "resolving_completed"]);
    }

    #[tokio::test]
    async fn test_retryable_error_is_recorded_and_returned() {
        let (store, _, handler, job_id) = setup(JobType::BuildingIds, Behaviour::Unavailable).await;
        let err = handler.handle_resolving(job_id).await.unwrap_err();
        assert!(matches!(err, JobError::RetryableResolving { job_id: id, .. } if id == job_id));

        let job = store.get_job(job_id).await.unwrap();
        assert_eq!(job.status, JobStatus::Resolving);
        assert!(job.is_temporarily_failed());
        // Still eligible for a re-drive
        assert!(job.status.can_transition_to(JobStatus::Resolving));
    }

    #[tokio::test]
    async fn test_other_errors_are_swallowed() {
        let (store, _, handler, job_id) = setup(JobType::BuildingIds, Behaviour::Broken).await;
        let outcome = handler.handle_resolving(job_id).await.unwrap();
        assert!(matches!(outcome, ResolvingOutcome::Failed(ref f) if !f.retryable));

        let job = store.get_job(job_id).await.unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.failure.unwrap().failure_type, FailureType::ResolvingError);
    }

    #[tokio::test]
    async fn test_panic_is_a_permanent_failure() {
        let (store, _, handler, job_id) = setup(JobType::BuildingIds, Behaviour::Panic).await;
        let outcome = handler.handle_resolving(job_id).await.unwrap();
        let ResolvingOutcome::Failed(failure) = outcome else {
            panic!("expected failure");
        };
        assert!(failure.details.contains("index out of bounds"));
        assert_eq!(store.get_job(job_id).await.unwrap().status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_no_resolver_found() {
        let (store, _, handler, job_id) = setup(JobType::GeoJson, Behaviour::Succeed).await;
        let outcome = handler.handle_resolving(job_id).await.unwrap();
        assert!(matches!(
            outcome,
            ResolvingOutcome::Failed(ref f) if f.failure_type == FailureType::NoResolverFound && !f.retryable
        ));
        assert_eq!(store.get_job(job_id).await.unwrap().status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_missing_job() {
        let (_, _, handler, _) = setup(JobType::BuildingIds, Behaviour::Succeed).await;
        assert!(matches!(
            handler.handle_resolving(JobId::new()).await,
            Err(JobError::NotFound(_))
        ));
    }
}
