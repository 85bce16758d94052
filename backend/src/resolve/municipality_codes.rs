//! Resolver for municipality code jobs.

use async_trait::async_trait;

use super::{job_country, matched_results, ResolverContext};
use crate::error::ResolveResult;
use crate::job::TaskResolver;
use crate::models::result::tags;
use crate::models::{JobType, MatchType, ResolverJob};

pub struct MunicipalityCodesResolver {
    context: ResolverContext,
}

impl MunicipalityCodesResolver {
    pub fn new(context: ResolverContext) -> Self {
        Self { context }
    }
}

#[async_trait]
impl TaskResolver for MunicipalityCodesResolver {
    fn name(&self) -> &'static str {
        "municipality_codes"
    }

    fn can_resolve_tasks(&self, job_type: JobType) -> bool {
        job_type == JobType::MunicipalitiesCodes
    }

    async fn resolve_tasks(&self, job: &ResolverJob) -> ResolveResult<usize> {
        let country = job_country(job);
        let match_type = MatchType::new(tags::MUNICIPALITY_CODE);
        let tasks = self.context.tasks.tasks_for_job(job.id).await?;

        for task in &tasks {
            let entrances = match task.matching_municipality_code().map(str::trim) {
                Some(code) if !code.is_empty() => {
                    self.context
                        .registry
                        .find_by_municipality_code(code, country)
                        .await?
                }
                _ => Vec::new(),
            };
            let results = matched_results(task, entrances, task.confidence, &match_type);
            self.context.store_results(task, results).await?;
        }
        Ok(tasks.len())
    }
}
