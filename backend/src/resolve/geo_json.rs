//! Resolver for GeoJSON jobs.
//!
//! Candidates come from the registry's bounding-box lookup; only entrances
//! strictly inside the task geometry, in the task's reference system, match.

use async_trait::async_trait;
use geo::{BoundingRect, Contains};
use serde_json::Value;

use super::{job_country, matched_results, ResolverContext};
use crate::error::{ResolveError, ResolveResult};
use crate::job::TaskResolver;
use crate::models::result::tags;
use crate::models::{BuildingEntrance, JobType, MatchType, ResolverJob, ResolverTask};
use crate::spatial::geometry_from_json;

pub struct GeoJsonResolver {
    context: ResolverContext,
}

impl GeoJsonResolver {
    pub fn new(context: ResolverContext) -> Self {
        Self { context }
    }

    async fn entrances_within(
        &self,
        task: &ResolverTask,
        country: Option<&str>,
    ) -> ResolveResult<Vec<BuildingEntrance>> {
        let Some(payload) = task.matching_geometry() else {
            return Err(ResolveError::InvalidTask(format!("task {} has no geometry", task.id)));
        };
        let value: Value = serde_json::from_str(&payload.geojson)
            .map_err(|e| ResolveError::InvalidTask(format!("task {}: {}", task.id, e)))?;
        let geometry = geometry_from_json(&value)
            .map_err(|e| ResolveError::InvalidTask(format!("task {}: {}", task.id, e)))?;

        let Some(bounds) = geometry.bounding_rect() else {
            return Ok(Vec::new());
        };
        let candidates = self
            .context
            .registry
            .find_in_bounds(payload.srid, bounds, country)
            .await?;

        Ok(candidates
            .into_iter()
            .filter(|e| geometry.contains(&e.point(payload.srid)))
            .collect())
    }
}

#[async_trait]
impl TaskResolver for GeoJsonResolver {
    fn name(&self) -> &'static str {
        "geo_json"
    }

    fn can_resolve_tasks(&self, job_type: JobType) -> bool {
        job_type == JobType::GeoJson
    }

    async fn resolve_tasks(&self, job: &ResolverJob) -> ResolveResult<usize> {
        let country = job_country(job);
        let match_type = MatchType::new(tags::GEO_JSON);
        let tasks = self.context.tasks.tasks_for_job(job.id).await?;

        for task in &tasks {
            let entrances = self.entrances_within(task, country).await?;
            let results = matched_results(task, entrances, task.confidence, &match_type);
            self.context.store_results(task, results).await?;
        }
        Ok(tasks.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::additional_data::DataRow;
    use crate::models::entrance::fixtures::entrance;
    use crate::models::{GeometryPayload, JobMetadata, TaskPayload};
    use crate::registry::InMemoryRegistry;
    use crate::resolve::testing::{context, job_with_tasks};
    use crate::spatial::Srid;
    use crate::store::ResultRepository;

    fn at(building_id: &str, east: f64, north: f64) -> BuildingEntrance {
        let mut e = entrance(building_id, "0", "Bundesplatz", "3");
        e.east = east;
        e.north = north;
        e
    }

    fn registry() -> InMemoryRegistry {
        InMemoryRegistry::new(vec![
            at("1", 2_600_006.0, 1_200_004.0),
            at("2", 2_600_015.0, 1_200_005.0),
            // Inside the bounding box but outside the triangle
            at("3", 2_600_005.0, 1_200_018.0),
            at("4", 2_700_000.0, 1_200_000.0),
        ])
    }

    fn polygon(coords: &str, zone: &str) -> (TaskPayload, DataRow) {
        let geojson = format!(
            r#"{{"type":"Polygon","coordinates":[{}],"crs":{{"type":"name","properties":{{"name":"EPSG:2056"}}}}}}"#,
            coords
        );
        (
            TaskPayload::Geometry(GeometryPayload {
                srid: Srid::Lv95,
                geojson,
            }),
            DataRow::from([("zone".to_string(), zone.to_string())]),
        )
    }

    fn tasks() -> Vec<(TaskPayload, DataRow)> {
        vec![
            polygon(
                "[[2600000,1200000],[2600010,1200000],[2600010,1200010],[2600000,1200010],[2600000,1200000]]",
                "A",
            ),
            // Triangle covering entrances 1 and 2
            polygon(
                "[[2600000,1200000],[2600020,1200000],[2600020,1200020],[2600000,1200000]]",
                "B",
            ),
            polygon(
                "[[2500000,1100000],[2500010,1100000],[2500010,1100010],[2500000,1100000]]",
                "C",
            ),
        ]
    }

    #[tokio::test]
    async fn test_containment_and_merge() {
        let (store, job) = job_with_tasks(JobType::GeoJson, JobMetadata::default(), tasks()).await;
        GeoJsonResolver::new(context(&store, registry()))
            .resolve_tasks(&job)
            .await
            .unwrap();

        let results = store.results_for_job(job.id).await.unwrap();
        let by_building = |id: &str| {
            results
                .iter()
                .find(|r| r.entrance.as_ref().is_some_and(|e| e.building_id == id))
        };

        assert_eq!(by_building("1").unwrap().additional_data.get("zone"), Some("A||B"));
        assert_eq!(by_building("2").unwrap().additional_data.get("zone"), Some("B"));
        assert!(by_building("3").is_none());
        assert!(by_building("4").is_none());
        assert_eq!(by_building("1").unwrap().match_type.to_string(), "geoJson");

        let unmatched: Vec<_> = results.iter().filter(|r| r.match_type.is_no_match()).collect();
        assert_eq!(unmatched.len(), 1);
        assert_eq!(unmatched[0].additional_data.get("zone"), Some("C"));
    }

    #[tokio::test]
    async fn test_resolving_twice_is_idempotent() {
        let (store, job) = job_with_tasks(JobType::GeoJson, JobMetadata::default(), tasks()).await;
        let resolver = GeoJsonResolver::new(context(&store, registry()));

        resolver.resolve_tasks(&job).await.unwrap();
        let first = store.results_for_job(job.id).await.unwrap();
        resolver.resolve_tasks(&job).await.unwrap();
        let second = store.results_for_job(job.id).await.unwrap();

        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.key(), b.key());
            assert_eq!(a.additional_data.merged(), b.additional_data.merged());
            assert_eq!(a.confidence, b.confidence);
        }
    }

    #[tokio::test]
    async fn test_corrupt_geometry_is_an_invalid_task() {
        let payload = TaskPayload::Geometry(GeometryPayload {
            srid: Srid::Lv95,
            geojson: "{".to_string(),
        });
        let (store, job) =
            job_with_tasks(JobType::GeoJson, JobMetadata::default(), vec![(payload, DataRow::new())]).await;
        let err = GeoJsonResolver::new(context(&store, registry()))
            .resolve_tasks(&job)
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::InvalidTask(_)));
    }
}
