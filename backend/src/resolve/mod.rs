//! Task resolvers, one per job type.
//!
//! Every resolver walks the job's tasks, asks the registry for candidate
//! entrances and upserts one result per matched entrance. Tasks without a
//! match produce a `nomatch` result echoing their additional data.

pub mod address_search;
pub mod building_ids;
pub mod geo_json;
pub mod matchers;
pub mod municipality_codes;

use std::sync::Arc;
use tracing::debug;

use crate::error::ResolveResult;
use crate::models::{
    BuildingEntrance, Confidence, MatchType, ResolverJob, ResolverResult, ResolverTask,
};
use crate::registry::BuildingRegistry;
use crate::store::{ResultRepository, TaskRepository};

pub use address_search::AddressSearchResolver;
pub use building_ids::BuildingIdsResolver;
pub use geo_json::GeoJsonResolver;
pub use municipality_codes::MunicipalityCodesResolver;

/// Storage and registry shared by all resolvers.
#[derive(Clone)]
pub struct ResolverContext {
    pub tasks: Arc<dyn TaskRepository>,
    pub results: Arc<dyn ResultRepository>,
    pub registry: Arc<dyn BuildingRegistry>,
}

impl ResolverContext {
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        results: Arc<dyn ResultRepository>,
        registry: Arc<dyn BuildingRegistry>,
    ) -> Self {
        Self {
            tasks,
            results,
            registry,
        }
    }

    /// Store the results of one task, or a non-match when there are none.
    pub async fn store_results(&self, task: &ResolverTask, results: Vec<ResolverResult>) -> ResolveResult<()> {
        if results.is_empty() {
            debug!(task_id = %task.id, "No match");
            self.results.upsert_result(ResolverResult::unmatched(task)).await?;
        } else {
            self.results.upsert_results(results).await?;
        }
        Ok(())
    }
}

/// Country filter of a job, ignoring blank values.
pub fn job_country(job: &ResolverJob) -> Option<&str> {
    job.metadata
        .country
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
}

/// One matched result per entrance, carrying the task's data.
pub fn matched_results(
    task: &ResolverTask,
    entrances: Vec<BuildingEntrance>,
    confidence: Confidence,
    match_type: &MatchType,
) -> Vec<ResolverResult> {
    entrances
        .into_iter()
        .map(|entrance| {
            ResolverResult::matched(
                task.job_id,
                entrance,
                confidence,
                match_type.clone(),
                task.additional_data.clone(),
            )
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::models::{AdditionalData, JobMetadata, JobStatus, JobType, TaskPayload};
    use crate::models::additional_data::DataRow;
    use crate::registry::InMemoryRegistry;
    use crate::store::{JobRepository, MemoryStore};

    /// Store with one `resolving` job holding the given task payloads.
    pub async fn job_with_tasks(
        job_type: JobType,
        metadata: JobMetadata,
        payloads: Vec<(TaskPayload, DataRow)>,
    ) -> (Arc<MemoryStore>, ResolverJob) {
        let store = Arc::new(MemoryStore::new());
        let mut job = ResolverJob::new(job_type, metadata, chrono::Duration::days(1));
        job.status = JobStatus::Resolving;
        store.create_job(job.clone(), Vec::new()).await.unwrap();

        let tasks = payloads
            .into_iter()
            .map(|(payload, data)| {
                ResolverTask::new(job.id, payload, Confidence::MAX, AdditionalData::create(data))
            })
            .collect();
        store.store_tasks(tasks).await.unwrap();
        (store, job)
    }

    pub fn context(store: &Arc<MemoryStore>, registry: InMemoryRegistry) -> ResolverContext {
        ResolverContext::new(store.clone(), store.clone(), Arc::new(registry))
    }
}
