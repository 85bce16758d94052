//! Preparer for lists of building identifiers (EGID).

use async_trait::async_trait;

use super::{prepare_csv, PreparerContext};
use crate::error::PrepareResult;
use crate::job::JobPreparer;
use crate::models::additional_data::KEY_BUILDING_ID;
use crate::models::{JobRawData, JobType, TaskPayload};

pub const COLUMN_EGID: &str = "egid";

pub struct BuildingIdsPreparer {
    context: PreparerContext,
}

impl BuildingIdsPreparer {
    pub fn new(context: PreparerContext) -> Self {
        Self { context }
    }
}

#[async_trait]
impl JobPreparer for BuildingIdsPreparer {
    fn name(&self) -> &'static str {
        "building_ids"
    }

    fn can_prepare_job(&self, job_type: JobType) -> bool {
        job_type == JobType::BuildingIds
    }

    async fn prepare_job(&self, raw: JobRawData) -> PrepareResult<usize> {
        prepare_csv(&self.context, &raw, &[COLUMN_EGID], |row, data| {
            let egid = row.get(COLUMN_EGID).unwrap_or_default().to_string();
            data.insert(KEY_BUILDING_ID.to_string(), egid.clone());
            TaskPayload::BuildingId(egid)
        })
        .await
    }
}
