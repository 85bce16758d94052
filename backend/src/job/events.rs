//! Lifecycle events and their in-process bus.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::JobResult;
use crate::models::{JobId, JobType, ResolverJobFailure};

#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    JobCreated { job_id: JobId, job_type: JobType },
    PreparationStarted { job_id: JobId },
    PreparationCompleted { job_id: JobId, task_count: usize },
    PreparationFailed { job_id: JobId, failure: ResolverJobFailure },
    ResolvingStarted { job_id: JobId },
    ResolvingCompleted { job_id: JobId, task_count: usize },
    ResolvingFailed { job_id: JobId, failure: ResolverJobFailure },
}

impl LifecycleEvent {
    pub fn job_id(&self) -> JobId {
        match self {
            LifecycleEvent::JobCreated { job_id, .. }
            | LifecycleEvent::PreparationStarted { job_id }
            | LifecycleEvent::PreparationCompleted { job_id, .. }
            | LifecycleEvent::PreparationFailed { job_id, .. }
            | LifecycleEvent::ResolvingStarted { job_id }
            | LifecycleEvent::ResolvingCompleted { job_id, .. }
            | LifecycleEvent::ResolvingFailed { job_id, .. } => *job_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LifecycleEvent::JobCreated { .. } => "job_created",
            LifecycleEvent::PreparationStarted { .. } => "preparation_started",
            LifecycleEvent::PreparationCompleted { .. } => "preparation_completed",
            LifecycleEvent::PreparationFailed { .. } => "preparation_failed",
            LifecycleEvent::ResolvingStarted { .. } => "resolving_started",
            LifecycleEvent::ResolvingCompleted { .. } => "resolving_completed",
            LifecycleEvent::ResolvingFailed { .. } => "resolving_failed",
        }
    }
}

#[async_trait]
pub trait LifecycleListener: Send + Sync {
    async fn on_event(&self, event: &LifecycleEvent) -> JobResult<()>;
}

/// Delivers each event to every listener, in subscription order.
///
/// The first listener error stops delivery and is returned to the publisher.
#[derive(Clone, Default)]
pub struct EventBus {
    listeners: Vec<Arc<dyn LifecycleListener>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(mut self, listener: Arc<dyn LifecycleListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub async fn publish(&self, event: LifecycleEvent) -> JobResult<()> {
        tracing::debug!(job_id = %event.job_id(), event = event.name(), "Lifecycle event");
        for listener in &self.listeners {
            listener.on_event(&event).await?;
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingListener;
    use super::*;
    use crate::error::JobError;

    struct Failing;

    #[async_trait]
    impl LifecycleListener for Failing {
        async fn on_event(&self, event: &LifecycleEvent) -> JobResult<()> {
            Err(JobError::NotFound(event.job_id()))
        }
    }

    #[tokio::test]
    async fn test_listeners_called_in_order_until_error() {
        let first = Arc::new(RecordingListener::default());
        let last = Arc::new(RecordingListener::default());
        let bus = EventBus::new()
            .subscribe(first.clone())
            .subscribe(Arc::new(Failing))
            .subscribe(last.clone());

        let job_id = JobId::new();
        let result = bus.publish(LifecycleEvent::PreparationStarted { job_id }).await;

        assert!(matches!(result, Err(JobError::NotFound(id)) if id == job_id));
        assert_eq!(first.names().await, vec!["preparation_started"]);
        assert!(last.names().await.is_empty());
    }
}
