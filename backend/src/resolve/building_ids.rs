//! Resolver for building identifier jobs.

use async_trait::async_trait;

use super::{job_country, matched_results, ResolverContext};
use crate::error::ResolveResult;
use crate::job::TaskResolver;
use crate::models::result::tags;
use crate::models::{JobType, MatchType, ResolverJob};

pub struct BuildingIdsResolver {
    context: ResolverContext,
}

impl BuildingIdsResolver {
    pub fn new(context: ResolverContext) -> Self {
        Self { context }
    }
}

#[async_trait]
impl TaskResolver for BuildingIdsResolver {
    fn name(&self) -> &'static str {
        "building_ids"
    }

    fn can_resolve_tasks(&self, job_type: JobType) -> bool {
        job_type == JobType::BuildingIds
    }

    async fn resolve_tasks(&self, job: &ResolverJob) -> ResolveResult<usize> {
        let country = job_country(job);
        let match_type = MatchType::new(tags::BUILDING_ID);
        let tasks = self.context.tasks.tasks_for_job(job.id).await?;

        for task in &tasks {
            let entrances = match task.matching_building_id().map(str::trim) {
                Some(id) if !id.is_empty() => {
                    self.context.registry.find_by_building_id(id, country).await?
                }
                _ => Vec::new(),
            };
            let results = matched_results(task, entrances, task.confidence, &match_type);
            self.context.store_results(task, results).await?;
        }
        Ok(tasks.len())
    }
}
