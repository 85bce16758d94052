//! Wiring of storage, registry, handlers and dispatcher.
//!
//! Preparers and resolvers are registered in a fixed order: building ids,
//! municipality codes, GeoJSON, address search.

use std::sync::Arc;
use tracing::info;

use crate::error::{JobError, JobResult};
use crate::job::{
    Dispatcher, DispatcherConfig, EventBus, JobPreparationHandler, JobPreparer, JobQueue,
    JobStateUpdater, LifecycleListener, PreparationOutcome, ResolverJobFactory, TaskResolver,
    TaskResolvingHandler,
};
use crate::models::{JobId, JobMetadata, JobType, ResolverJob, ResolverResult};
use crate::prepare::{
    AddressSearchPreparer, BuildingIdsPreparer, GeoJsonPreparer, MunicipalityCodesPreparer,
    PreparerContext,
};
use crate::registry::{AddressSearchIndex, BuildingRegistry, InMemoryRegistry};
use crate::resolve::{
    AddressSearchResolver, BuildingIdsResolver, GeoJsonResolver, MunicipalityCodesResolver,
    ResolverContext,
};
use crate::store::{JobRepository, MemoryStore, ResultRepository, TaskRepository};

/// A fully wired pipeline.
pub struct Pipeline {
    pub jobs: Arc<dyn JobRepository>,
    pub results: Arc<dyn ResultRepository>,
    pub factory: Arc<ResolverJobFactory>,
    pub preparation: Arc<JobPreparationHandler>,
    pub resolving: Arc<TaskResolvingHandler>,
}

pub struct PipelineBuilder {
    store: Arc<MemoryStore>,
    registry: Arc<dyn BuildingRegistry>,
    index: Arc<dyn AddressSearchIndex>,
    job_ttl: chrono::Duration,
    listeners: Vec<Arc<dyn LifecycleListener>>,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        let registry = Arc::new(InMemoryRegistry::new(Vec::new()));
        Self {
            store: Arc::new(MemoryStore::new()),
            registry: registry.clone(),
            index: registry,
            job_ttl: chrono::Duration::days(30),
            listeners: Vec::new(),
        }
    }
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(mut self, store: Arc<MemoryStore>) -> Self {
        self.store = store;
        self
    }

    /// Registry serving both lookups and full-text search.
    pub fn registry<R>(mut self, registry: Arc<R>) -> Self
    where
        R: BuildingRegistry + AddressSearchIndex + 'static,
    {
        self.registry = registry.clone();
        self.index = registry;
        self
    }

    pub fn job_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.job_ttl = ttl;
        self
    }

    /// Extra lifecycle listener, called after the state updater.
    pub fn listener(mut self, listener: Arc<dyn LifecycleListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Pipeline driven by explicit calls, see [`Pipeline::run_job`].
    pub fn build(self) -> Pipeline {
        let events = self.events(None);
        self.assemble(events)
    }

    /// Pipeline whose jobs are driven by the returned dispatcher.
    pub fn build_with_dispatcher(self, config: DispatcherConfig) -> (Pipeline, Dispatcher) {
        let (queue, receiver) = JobQueue::channel();
        let events = self.events(Some(&queue));
        let pipeline = self.assemble(events);
        let dispatcher = Dispatcher::new(
            pipeline.preparation.clone(),
            pipeline.resolving.clone(),
            queue,
            receiver,
            config,
        );
        (pipeline, dispatcher)
    }

    /// State updater first, then the queue, then extra listeners.
    fn events(&self, queue: Option<&JobQueue>) -> EventBus {
        let mut events = EventBus::new().subscribe(Arc::new(JobStateUpdater::new(self.store.clone())));
        if let Some(queue) = queue {
            events = events.subscribe(Arc::new(queue.clone()));
        }
        for listener in &self.listeners {
            events = events.subscribe(listener.clone());
        }
        events
    }

    fn assemble(self, events: EventBus) -> Pipeline {
        let jobs: Arc<dyn JobRepository> = self.store.clone();
        let tasks: Arc<dyn TaskRepository> = self.store.clone();
        let results: Arc<dyn ResultRepository> = self.store.clone();

        let preparer_context = PreparerContext::new(jobs.clone(), tasks.clone());
        let preparers: Vec<Arc<dyn JobPreparer>> = vec![
            Arc::new(BuildingIdsPreparer::new(preparer_context.clone())),
            Arc::new(MunicipalityCodesPreparer::new(preparer_context.clone())),
            Arc::new(GeoJsonPreparer::new(preparer_context.clone())),
            Arc::new(AddressSearchPreparer::new(preparer_context)),
        ];

        let resolver_context = ResolverContext::new(tasks, results.clone(), self.registry);
        let resolvers: Vec<Arc<dyn TaskResolver>> = vec![
            Arc::new(BuildingIdsResolver::new(resolver_context.clone())),
            Arc::new(MunicipalityCodesResolver::new(resolver_context.clone())),
            Arc::new(GeoJsonResolver::new(resolver_context.clone())),
            Arc::new(AddressSearchResolver::new(resolver_context, self.index)),
        ];

        Pipeline {
            factory: Arc::new(ResolverJobFactory::new(jobs.clone(), events.clone(), self.job_ttl)),
            preparation: Arc::new(JobPreparationHandler::new(jobs.clone(), preparers, events.clone())),
            resolving: Arc::new(TaskResolvingHandler::new(jobs.clone(), results.clone(), resolvers, events)),
            jobs,
            results,
        }
    }
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Create a job and run both phases in place.
    ///
    /// Only for pipelines built without a dispatcher, which would otherwise
    /// pick the job up as well.
    pub async fn run_job(&self, job_type: JobType, data: Vec<u8>, metadata: JobMetadata) -> JobResult<ResolverJob> {
        let job_id = self.factory.create_job(job_type, data, metadata).await?;

        if let PreparationOutcome::Prepared { task_count } = self.preparation.handle_preparation(job_id).await? {
            info!(%job_id, task_count, "Resolving prepared job");
            self.resolving.handle_resolving(job_id).await?;
        }
        self.job(job_id).await
    }

    pub async fn job(&self, job_id: JobId) -> JobResult<ResolverJob> {
        Ok(self.jobs.get_job(job_id).await?)
    }

    /// Results of a job; unknown jobs are an error rather than an empty list.
    pub async fn results(&self, job_id: JobId) -> JobResult<Vec<ResolverResult>> {
        self.job(job_id).await?;
        self.results.results_for_job(job_id).await.map_err(JobError::from)
    }
}
