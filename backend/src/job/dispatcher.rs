//! In-process work queue driving preparation and resolving.
//!
//! [`JobQueue`] listens to lifecycle events and enqueues the next phase;
//! [`Dispatcher`] workers pull messages and call the handlers. Retryable
//! resolving failures are re-enqueued with linear backoff.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::events::{LifecycleEvent, LifecycleListener};
use super::preparation::JobPreparationHandler;
use super::resolving::TaskResolvingHandler;
use crate::error::{JobError, JobResult};
use crate::models::JobId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMessage {
    Prepare { job_id: JobId },
    Resolve { job_id: JobId, attempt: u32 },
}

/// Outcome of processing one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchStatus {
    Success,
    Retry { attempt: u32, delay: Duration },
    DeadLetter { error: String },
}

/// Longest wait before a retry.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub workers: usize,
    pub max_attempts: u32,
    pub retry_backoff: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            max_attempts: 5,
            retry_backoff: Duration::from_millis(1000),
        }
    }
}

/// Sending half of the queue, subscribed to the event bus.
#[derive(Clone)]
pub struct JobQueue {
    sender: mpsc::UnboundedSender<DispatchMessage>,
}

pub type JobQueueReceiver = mpsc::UnboundedReceiver<DispatchMessage>;

impl JobQueue {
    pub fn channel() -> (Self, JobQueueReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    pub fn enqueue(&self, message: DispatchMessage) {
        if self.sender.send(message).is_err() {
            warn!(?message, "Dispatcher stopped, message dropped");
        }
    }
}

#[async_trait]
impl LifecycleListener for JobQueue {
    async fn on_event(&self, event: &LifecycleEvent) -> JobResult<()> {
        match event {
            LifecycleEvent::JobCreated { job_id, .. } => {
                self.enqueue(DispatchMessage::Prepare { job_id: *job_id })
            }
            LifecycleEvent::PreparationCompleted { job_id, .. } => {
                self.enqueue(DispatchMessage::Resolve {
                    job_id: *job_id,
                    attempt: 1,
                })
            }
            _ => {}
        }
        Ok(())
    }
}

pub struct Dispatcher {
    preparation: Arc<JobPreparationHandler>,
    resolving: Arc<TaskResolvingHandler>,
    queue: JobQueue,
    receiver: JobQueueReceiver,
    config: DispatcherConfig,
}

impl Dispatcher {
    pub fn new(
        preparation: Arc<JobPreparationHandler>,
        resolving: Arc<TaskResolvingHandler>,
        queue: JobQueue,
        receiver: JobQueueReceiver,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            preparation,
            resolving,
            queue,
            receiver,
            config,
        }
    }

    /// Start the worker tasks. Workers hold a queue sender for re-scheduling,
    /// so they run until aborted or the runtime shuts down.
    pub fn spawn(self) -> Vec<JoinHandle<()>> {
        let workers = self.config.workers.max(1);
        let receiver = Arc::new(Mutex::new(self.receiver));
        let worker = Arc::new(Worker {
            preparation: self.preparation,
            resolving: self.resolving,
            queue: self.queue,
            config: self.config,
        });

        info!(workers, "Starting dispatcher");
        (0..workers)
            .map(|id| {
                let receiver = receiver.clone();
                let worker = worker.clone();
                tokio::spawn(async move {
                    loop {
                        let message = receiver.lock().await.recv().await;
                        let Some(message) = message else {
                            debug!(worker = id, "Queue closed, worker exiting");
                            break;
                        };
                        worker.run(message).await;
                    }
                })
            })
            .collect()
    }
}

struct Worker {
    preparation: Arc<JobPreparationHandler>,
    resolving: Arc<TaskResolvingHandler>,
    queue: JobQueue,
    config: DispatcherConfig,
}

impl Worker {
    async fn run(&self, message: DispatchMessage) {
        match self.process(message).await {
            DispatchStatus::Success => {}
            DispatchStatus::Retry { attempt, delay } => {
                let DispatchMessage::Resolve { job_id, .. } = message else {
                    return;
                };
                let queue = self.queue.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    queue.enqueue(DispatchMessage::Resolve { job_id, attempt });
                });
            }
            DispatchStatus::DeadLetter { error } => {
                warn!(?message, %error, "Dropping message");
            }
        }
    }

    async fn process(&self, message: DispatchMessage) -> DispatchStatus {
        match message {
            DispatchMessage::Prepare { job_id } => {
                status_of(job_id, self.preparation.handle_preparation(job_id).await.map(|_| ()))
            }
            DispatchMessage::Resolve { job_id, attempt } => {
                match self.resolving.handle_resolving(job_id).await {
                    Err(JobError::RetryableResolving { message, .. }) => {
                        if attempt >= self.config.max_attempts {
                            warn!(%job_id, attempt, "Giving up on retryable resolving error");
                            return DispatchStatus::DeadLetter { error: message };
                        }
                        let delay = retry_delay(self.config.retry_backoff, attempt);
                        info!(%job_id, attempt, delay_ms = delay.as_millis() as u64, "Re-scheduling resolving");
                        DispatchStatus::Retry {
                            attempt: attempt + 1,
                            delay,
                        }
                    }
                    other => status_of(job_id, other.map(|_| ())),
                }
            }
        }
    }
}

/// Linear backoff, capped at [`MAX_RETRY_DELAY`].
fn retry_delay(backoff: Duration, attempt: u32) -> Duration {
    backoff
        .checked_mul(attempt)
        .map_or(MAX_RETRY_DELAY, |delay| delay.min(MAX_RETRY_DELAY))
}

fn status_of(job_id: JobId, result: JobResult<()>) -> DispatchStatus {
    match result {
        Ok(()) => DispatchStatus::Success,
        Err(e @ JobError::NotFound(_)) => DispatchStatus::DeadLetter { error: e.to_string() },
        Err(e) => {
            error!(%job_id, error = %e, "Job handler failed");
            DispatchStatus::DeadLetter { error: e.to_string() }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{PrepareResult, RegistryError, ResolveResult};
    use crate::job::events::EventBus;
    use crate::job::factory::ResolverJobFactory;
    use crate::job::preparation::JobPreparer;
    use crate::job::resolving::TaskResolver;
    use crate::job::state::JobStateUpdater;
    use crate::models::{JobMetadata, JobRawData, JobStatus, JobType, ResolverJob};
    use crate::store::{JobRepository, MemoryStore};
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingPreparer;

    #[async_trait]
    impl JobPreparer for CountingPreparer {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn can_prepare_job(&self, _job_type: JobType) -> bool {
            true
        }

        async fn prepare_job(&self, _raw: JobRawData) -> PrepareResult<usize> {
            Ok(1)
        }
    }

    /// Unavailable until `succeed_on` calls have been made.
    struct FlakyResolver {
        calls: AtomicU32,
        succeed_on: u32,
    }

    #[async_trait]
    impl TaskResolver for FlakyResolver {
        fn name(&self) -> &'static str {
            "flaky"
        }

        fn can_resolve_tasks(&self, _job_type: JobType) -> bool {
            true
        }

        async fn resolve_tasks(&self, _job: &ResolverJob) -> ResolveResult<usize> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call < self.succeed_on {
                Err(RegistryError::Unavailable("try later".into()).into())
            } else {
                Ok(1)
            }
        }
    }

    async fn run_job(succeed_on: u32, max_attempts: u32) -> (ResolverJob, u32) {
        let store = Arc::new(MemoryStore::new());
        let (queue, receiver) = JobQueue::channel();
        let events = EventBus::new()
            .subscribe(Arc::new(JobStateUpdater::new(store.clone())))
            .subscribe(Arc::new(queue.clone()));

        let resolver = Arc::new(FlakyResolver {
            calls: AtomicU32::new(0),
            succeed_on,
        });
        let preparation = Arc::new(JobPreparationHandler::new(
            store.clone(),
            vec![Arc::new(CountingPreparer) as Arc<dyn JobPreparer>],
            events.clone(),
        ));
        let resolving = Arc::new(TaskResolvingHandler::new(
            store.clone(),
            store.clone(),
            vec![resolver.clone() as Arc<dyn TaskResolver>],
            events.clone(),
        ));
        let config = DispatcherConfig {
            workers: 2,
            max_attempts,
            retry_backoff: Duration::from_millis(5),
        };
        let workers = Dispatcher::new(preparation, resolving, queue, receiver, config).spawn();

        let factory = ResolverJobFactory::new(store.clone(), events, chrono::Duration::days(1));
        let job_id = factory
            .create_job(JobType::BuildingIds, Vec::new(), JobMetadata::default())
            .await
            .unwrap();

        let mut job = store.get_job(job_id).await.unwrap();
        for _ in 0..200 {
            tokio::time::sleep(Duration::from_millis(5)).await;
            job = store.get_job(job_id).await.unwrap();
            let exhausted = resolver.calls.load(Ordering::SeqCst) >= max_attempts;
            if job.status.is_terminal() || (exhausted && job.is_temporarily_failed()) {
                break;
            }
        }
        for worker in workers {
            worker.abort();
        }
        (job, resolver.calls.load(Ordering::SeqCst))
    }

    #[tokio::test]
    async fn test_job_flows_through_both_phases() {
        let (job, calls) = run_job(1, 5).await;
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_retryable_failure_is_retried() {
        let (job, calls) = run_job(3, 5).await;
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.failure.is_none());
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_retry_delay_is_linear_and_capped() {
        let backoff = Duration::from_millis(200);
        assert_eq!(retry_delay(backoff, 1), Duration::from_millis(200));
        assert_eq!(retry_delay(backoff, 3), Duration::from_millis(600));
        assert_eq!(retry_delay(Duration::from_secs(3000), 2), MAX_RETRY_DELAY);
        assert_eq!(retry_delay(Duration::MAX, 2), MAX_RETRY_DELAY);
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let (job, calls) = run_job(100, 2).await;
        assert_eq!(calls, 2);
        assert_eq!(job.status, JobStatus::Resolving);
        assert!(job.is_temporarily_failed());
    }
}
