//! Preparer for GeoJSON inputs.
//!
//! The reference system is detected from the payload and reconciled with
//! the caller's `srid` metadata: a mismatch is fatal, as is an undetectable
//! system without an override. Each feature becomes one task whose geometry
//! carries the legacy `crs` member.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::PreparerContext;
use crate::error::{GeoJsonError, InvalidInputData, PrepareResult};
use crate::job::JobPreparer;
use crate::models::additional_data::DataRow;
use crate::models::{
    AdditionalData, Confidence, GeometryPayload, JobMetadata, JobRawData, JobType, ResolverTask,
    TaskPayload,
};
use crate::spatial::{detect_srid_value, geometry_to_json, read_features, Srid, SridDetection};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

pub struct GeoJsonPreparer {
    context: PreparerContext,
}

impl GeoJsonPreparer {
    pub fn new(context: PreparerContext) -> Self {
        Self { context }
    }
}

#[async_trait]
impl JobPreparer for GeoJsonPreparer {
    fn name(&self) -> &'static str {
        "geo_json"
    }

    fn can_prepare_job(&self, job_type: JobType) -> bool {
        job_type == JobType::GeoJson
    }

    async fn prepare_job(&self, raw: JobRawData) -> PrepareResult<usize> {
        let bytes = raw.data.strip_prefix(UTF8_BOM).unwrap_or(raw.data.as_slice());
        let value: Value = serde_json::from_slice(bytes).map_err(GeoJsonError::from)?;

        let srid = reconcile_srid(detect_srid_value(&value)?, raw.metadata.srid)?;
        let features = read_features(&value)?;
        debug!(job_id = %raw.job_id, %srid, features = features.len(), "GeoJSON read");

        let mut metadata = JobMetadata {
            srid: Some(srid),
            ..raw.metadata.clone()
        };
        metadata.additional_columns.clear();
        for feature in &features {
            for key in feature.properties.keys() {
                if !metadata.additional_columns.contains(key) {
                    metadata.additional_columns.push(key.clone());
                }
            }
        }

        let tasks = features
            .into_iter()
            .map(|feature| {
                let payload = GeometryPayload {
                    srid,
                    geojson: geometry_to_json(&feature.geometry, Some(srid)).to_string(),
                };
                let data: DataRow = feature.properties.into_iter().collect();
                ResolverTask::new(
                    raw.job_id,
                    TaskPayload::Geometry(payload),
                    Confidence::MAX,
                    AdditionalData::create(data),
                )
            })
            .collect();

        self.context.jobs.update_metadata(raw.job_id, metadata).await?;
        self.context.replace_tasks(&raw, tasks).await
    }
}

/// Effective reference system of a payload given the caller's override.
fn reconcile_srid(detected: SridDetection, declared: Option<Srid>) -> Result<Srid, InvalidInputData> {
    match (detected.srid(), declared) {
        (Some(found), Some(expected)) if found != expected => Err(InvalidInputData::new(format!(
            "SRID mismatch: job declares {} but the GeoJSON is in {}",
            expected.crs_name(),
            found.crs_name()
        ))),
        (Some(found), _) => Ok(found),
        (None, Some(expected)) => Ok(expected),
        (None, None) => Err(InvalidInputData::new(
            "Could not detect the SRID of the GeoJSON, set the srid metadata",
        )),
    }
}
