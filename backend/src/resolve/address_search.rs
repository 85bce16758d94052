//! Resolver for free-text address jobs.
//!
//! Candidates are the entrances of the task's postal code. When none of
//! them matches, the entrances of the task's locality are tried with a
//! confidence penalty. The full-text index is the last resort.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::matchers::{match_street, Candidate, StreetKeys, FULLTEXT_TAG, FULLTEXT_WEIGHT};
use super::{job_country, matched_results, ResolverContext};
use crate::error::{ResolveError, ResolveResult};
use crate::job::TaskResolver;
use crate::models::result::tags;
use crate::models::{
    AddressQuery, BuildingEntrance, Confidence, JobType, MatchType, ResolverJob, ResolverResult,
    ResolverTask,
};
use crate::registry::AddressSearchIndex;

/// Points taken off matches found through the locality.
pub const LOCALITY_PENALTY: u8 = 5;

/// Hits below this score are ignored.
pub const MIN_FULLTEXT_SCORE: f64 = 0.5;

const FULLTEXT_LIMIT: usize = 5;

pub struct AddressSearchResolver {
    context: ResolverContext,
    index: Arc<dyn AddressSearchIndex>,
}

impl AddressSearchResolver {
    pub fn new(context: ResolverContext, index: Arc<dyn AddressSearchIndex>) -> Self {
        Self { context, index }
    }

    async fn resolve_task(&self, task: &ResolverTask, country: Option<&str>) -> ResolveResult<Vec<ResolverResult>> {
        let Some(query) = task.matching_address() else {
            return Err(ResolveError::InvalidTask(format!("task {} has no address", task.id)));
        };
        let keys = StreetKeys::parse(&query.street);

        if !query.postal_code.is_empty() {
            let entrances = self
                .context
                .registry
                .find_by_postal_code(&query.postal_code, country)
                .await?;
            if let Some(results) = layered(task, &keys, &entrances, false) {
                return Ok(results);
            }
        }

        if !query.locality.is_empty() {
            let entrances = self
                .context
                .registry
                .find_by_locality(&query.locality, country)
                .await?;
            if let Some(results) = layered(task, &keys, &entrances, true) {
                return Ok(results);
            }
        }

        self.fulltext(task, query, country).await
    }

    async fn fulltext(
        &self,
        task: &ResolverTask,
        query: &AddressQuery,
        country: Option<&str>,
    ) -> ResolveResult<Vec<ResolverResult>> {
        let text = [&query.street, &query.postal_code, &query.locality]
            .into_iter()
            .filter(|part| !part.is_empty())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ");
        if text.is_empty() {
            return Ok(Vec::new());
        }

        let best = self
            .index
            .search(&text, country, FULLTEXT_LIMIT)
            .await?
            .into_iter()
            .filter(|hit| hit.score >= MIN_FULLTEXT_SCORE)
            .max_by(|a, b| a.score.total_cmp(&b.score));

        Ok(match best {
            Some(hit) => {
                debug!(task_id = %task.id, score = hit.score, "Full-text match");
                let confidence = Confidence::from_score(hit.score * FULLTEXT_WEIGHT).weighted_by(task.confidence);
                let match_type = MatchType::new(tags::ADDRESS).with(FULLTEXT_TAG);
                matched_results(task, vec![hit.entrance], confidence, &match_type)
            }
            None => Vec::new(),
        })
    }
}

/// Results of the first matching layer over `entrances`, if any.
fn layered(
    task: &ResolverTask,
    keys: &StreetKeys,
    entrances: &[BuildingEntrance],
    by_locality: bool,
) -> Option<Vec<ResolverResult>> {
    let candidates: Vec<Candidate> = entrances.iter().map(Candidate::new).collect();
    let (layer, matched) = match_street(keys, &candidates)?;

    let mut confidence = layer.confidence();
    let mut match_type = MatchType::new(tags::ADDRESS).with(layer.tag());
    if by_locality {
        confidence = confidence.saturating_sub(LOCALITY_PENALTY);
        match_type = match_type.with(tags::LOCALITY);
    }

    let matched = matched.into_iter().cloned().collect();
    Some(matched_results(
        task,
        matched,
        confidence.weighted_by(task.confidence),
        &match_type,
    ))
}

#[async_trait]
impl TaskResolver for AddressSearchResolver {
    fn name(&self) -> &'static str {
        "address_search"
    }

    fn can_resolve_tasks(&self, job_type: JobType) -> bool {
        job_type == JobType::AddressSearch
    }

    async fn resolve_tasks(&self, job: &ResolverJob) -> ResolveResult<usize> {
        let country = job_country(job);
        let tasks = self.context.tasks.tasks_for_job(job.id).await?;

        for task in &tasks {
            let results = self.resolve_task(task, country).await?;
            self.context.store_results(task, results).await?;
        }
        Ok(tasks.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{RegistryError, RegistryResult};
    use crate::models::additional_data::DataRow;
    use crate::models::entrance::fixtures::entrance;
    use crate::models::{JobMetadata, TaskPayload};
    use crate::registry::{InMemoryRegistry, SearchHit};
    use crate::resolve::testing::job_with_tasks;
    use crate::resolve::ResolverContext;
    use crate::store::ResultRepository;

    fn registry() -> Arc<InMemoryRegistry> {
        let mut zurich = entrance("200", "0", "Bahnhofstrasse", "12a");
        zurich.postal_code = "8001".to_string();
        zurich.locality = "Zürich".to_string();
        Arc::new(InMemoryRegistry::new(vec![
            entrance("100", "0", "Bundesplatz", "3"),
            entrance("101", "0", "Kochergasse", "4"),
            zurich,
        ]))
    }

    fn address(street: &str, postal_code: &str, locality: &str) -> (TaskPayload, DataRow) {
        (
            TaskPayload::Address(AddressQuery {
                street: street.to_string(),
                postal_code: postal_code.to_string(),
                locality: locality.to_string(),
            }),
            DataRow::from([("line".to_string(), street.to_string())]),
        )
    }

    async fn resolve(tasks: Vec<(TaskPayload, DataRow)>) -> Vec<ResolverResult> {
        let (store, job) = job_with_tasks(JobType::AddressSearch, JobMetadata::default(), tasks).await;
        let registry = registry();
        let context = ResolverContext::new(store.clone(), store.clone(), registry.clone());
        AddressSearchResolver::new(context, registry)
            .resolve_tasks(&job)
            .await
            .unwrap();
        store.results_for_job(job.id).await.unwrap()
    }

    fn summary(results: &[ResolverResult]) -> Vec<(String, String, u8)> {
        results
            .iter()
            .map(|r| {
                (
                    r.entrance.as_ref().map(|e| e.building_id.clone()).unwrap_or_default(),
                    r.match_type.to_string(),
                    r.confidence.value(),
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn test_postal_code_candidates() {
        let results = resolve(vec![address("Bundesplatz 3", "3011", "Bern")]).await;
        assert_eq!(summary(&results), vec![("100".into(), "address-exact".into(), 100)]);
        assert_eq!(results[0].additional_data.get("line"), Some("Bundesplatz 3"));
    }

    #[tokio::test]
    async fn test_locality_fallback_is_penalised() {
        let results = resolve(vec![address("Bahnhofstr. 12a", "9999", "zurich")]).await;
        assert_eq!(
            summary(&results),
            vec![("200".into(), "address-abbreviated-locality".into(), 90)]
        );
    }

    #[tokio::test]
    async fn test_fulltext_fallback() {
        // No postal code or locality to draw candidates from
        let results = resolve(vec![address("Kochergasse 4 Bern", "", "")]).await;
        let [(building, match_type, confidence)] = summary(&results).try_into().unwrap();
        assert_eq!(building, "101");
        assert_eq!(match_type, "address-fulltext");
        assert!(confidence > 0 && confidence <= 60);
    }

    #[tokio::test]
    async fn test_fulltext_country_is_not_crowded_out() {
        let mut entrances: Vec<BuildingEntrance> = (0..5)
            .map(|i| {
                let mut e = entrance(&format!("de{}", i), "0", "Kochergasse", "4");
                e.country_code = "DE".to_string();
                e
            })
            .collect();
        let mut swiss = entrance("ch1", "0", "Kochergasse", "4");
        swiss.locality = "Bärn".to_string();
        entrances.push(swiss);
        let registry = Arc::new(InMemoryRegistry::new(entrances));

        let metadata = JobMetadata {
            country: Some("CH".to_string()),
            ..Default::default()
        };
        let (store, job) = job_with_tasks(JobType::AddressSearch, metadata, vec![address("Kochergasse 4", "", "Bern")]).await;
        let context = ResolverContext::new(store.clone(), store.clone(), registry.clone());
        AddressSearchResolver::new(context, registry)
            .resolve_tasks(&job)
            .await
            .unwrap();

        let results = store.results_for_job(job.id).await.unwrap();
        let [(building, match_type, _)] = summary(&results).try_into().unwrap();
        assert_eq!(building, "ch1");
        assert_eq!(match_type, "address-fulltext");
    }

    #[tokio::test]
    async fn test_no_match() {
        let results = resolve(vec![address("Nowhere 1", "1000", "Lausanne")]).await;
        assert_eq!(summary(&results), vec![(String::new(), "nomatch".into(), 0)]);
    }

    struct DownIndex;

    #[async_trait]
    impl AddressSearchIndex for DownIndex {
        async fn search(&self, _query: &str, _country: Option<&str>, _limit: usize) -> RegistryResult<Vec<SearchHit>> {
            Err(RegistryError::Unavailable("index offline".into()))
        }
    }

    #[tokio::test]
    async fn test_unavailable_index_is_retryable() {
        let (store, job) = job_with_tasks(
            JobType::AddressSearch,
            JobMetadata::default(),
            vec![address("Nowhere 1", "1000", "Lausanne")],
        )
        .await;
        let context = ResolverContext::new(store.clone(), store.clone(), registry());
        let err = AddressSearchResolver::new(context, Arc::new(DownIndex))
            .resolve_tasks(&job)
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::Retryable(_)));
    }
}
