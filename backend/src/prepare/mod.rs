//! Job preparers, one per job type.
//!
//! CSV driven preparers share [`prepare_csv`]: read with the pinned or
//! guessed format, check required columns, write the effective format back
//! to the job, then replace the job's tasks.

pub mod address_search;
pub mod building_ids;
pub mod geo_json;
pub mod municipality_codes;

use std::sync::Arc;
use tracing::debug;

use crate::error::{InvalidInputData, PrepareResult};
use crate::models::additional_data::DataRow;
use crate::models::{AdditionalData, Confidence, JobMetadata, JobRawData, ResolverTask, TaskPayload};
use crate::parser::{CsvReadOptions, CsvReader, CsvRow};
use crate::store::{JobRepository, TaskRepository};

pub use address_search::AddressSearchPreparer;
pub use building_ids::BuildingIdsPreparer;
pub use geo_json::GeoJsonPreparer;
pub use municipality_codes::MunicipalityCodesPreparer;

/// Tasks written per storage call.
pub const TASK_BATCH_SIZE: usize = 500;

/// Storage shared by all preparers.
#[derive(Clone)]
pub struct PreparerContext {
    pub jobs: Arc<dyn JobRepository>,
    pub tasks: Arc<dyn TaskRepository>,
}

impl PreparerContext {
    pub fn new(jobs: Arc<dyn JobRepository>, tasks: Arc<dyn TaskRepository>) -> Self {
        Self { jobs, tasks }
    }

    /// Replace the job's tasks, writing them in batches.
    pub async fn replace_tasks(&self, raw: &JobRawData, tasks: Vec<ResolverTask>) -> PrepareResult<usize> {
        self.tasks.delete_tasks(raw.job_id).await?;

        let count = tasks.len();
        let mut tasks = tasks.into_iter().peekable();
        while tasks.peek().is_some() {
            let batch: Vec<ResolverTask> = tasks.by_ref().take(TASK_BATCH_SIZE).collect();
            debug!(job_id = %raw.job_id, size = batch.len(), "Storing task batch");
            self.tasks.store_tasks(batch).await?;
        }
        Ok(count)
    }
}

/// Open the job's CSV and check that every required column is present.
pub fn open_csv(raw: &JobRawData, required: &[&str]) -> PrepareResult<CsvReader> {
    let options = CsvReadOptions {
        delimiter: raw.metadata.delimiter,
        enclosure: raw.metadata.enclosure,
        charset: raw.metadata.charset.clone(),
    };
    let reader = CsvReader::new(&raw.data, options)?;

    for column in required {
        if !reader.has_column(column) {
            return Err(InvalidInputData::missing_column(column, reader.header()).into());
        }
    }
    Ok(reader)
}

/// Metadata with the detected format filled in where the caller left it open.
pub fn effective_metadata(metadata: &JobMetadata, reader: &CsvReader, required: &[&str]) -> JobMetadata {
    let mut effective = metadata.clone();
    effective.delimiter.get_or_insert(reader.delimiter());
    effective.enclosure.get_or_insert(reader.enclosure());
    effective
        .charset
        .get_or_insert_with(|| reader.charset().to_string());
    effective.additional_columns = reader
        .header()
        .iter()
        .filter(|column| !required.contains(&column.as_str()))
        .cloned()
        .collect();
    effective
}

/// Shared skeleton of the CSV preparers.
///
/// `payload` builds the task payload of one row; it receives the row's
/// additional columns and may add internal keys to them.
pub async fn prepare_csv<F>(
    context: &PreparerContext,
    raw: &JobRawData,
    required: &[&str],
    payload: F,
) -> PrepareResult<usize>
where
    F: Fn(&CsvRow, &mut DataRow) -> TaskPayload + Send,
{
    let reader = open_csv(raw, required)?;
    let metadata = effective_metadata(&raw.metadata, &reader, required);
    let rows = reader.read_all()?;

    let tasks: Vec<ResolverTask> = rows
        .iter()
        .map(|row| {
            let mut data: DataRow = metadata
                .additional_columns
                .iter()
                .map(|column| (column.clone(), row.get(column).unwrap_or_default().to_string()))
                .collect();
            let payload = payload(row, &mut data);
            ResolverTask::new(raw.job_id, payload, Confidence::MAX, AdditionalData::create(data))
        })
        .collect();

    context.jobs.update_metadata(raw.job_id, metadata).await?;
    context.replace_tasks(raw, tasks).await
}


#[cfg(test)]
mod tests {
    use super::testing::job_with_data;
    use super::*;
    use crate::models::JobType;

    #[tokio::test]
    async fn test_replace_tasks_in_batches() {
        let (store, context, raw) = job_with_data(JobType::BuildingIds, "egid\n1", JobMetadata::default()).await;
        let tasks: Vec<ResolverTask> = (0..TASK_BATCH_SIZE + 3)
            .map(|i| {
                ResolverTask::new(
                    raw.job_id,
                    TaskPayload::BuildingId(i.to_string()),
                    Confidence::MAX,
                    AdditionalData::default(),
                )
            })
            .collect();

        assert_eq!(context.replace_tasks(&raw, tasks).await.unwrap(), TASK_BATCH_SIZE + 3);
        // Re-preparing replaces instead of appending
        assert_eq!(context.replace_tasks(&raw, Vec::new()).await.unwrap(), 0);
        assert!(store.tasks_for_job(raw.job_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_pinned_format_kept_in_metadata() {
        let metadata = JobMetadata {
            delimiter: Some(';'),
            ..Default::default()
        };
        let (_, _, raw) = job_with_data(JobType::BuildingIds, "egid;name\n1;x", metadata).await;
        let reader = open_csv(&raw, &["egid"]).unwrap();
        let effective = effective_metadata(&raw.metadata, &reader, &["egid"]);
        assert_eq!(effective.delimiter, Some(';'));
        assert_eq!(effective.enclosure, Some('"'));
        assert_eq!(effective.charset.as_deref(), Some("UTF-8"));
        assert_eq!(effective.additional_columns, vec!["name".to_string()]);
    }
}
