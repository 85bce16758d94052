//! Preparer for lists of municipality codes.

use async_trait::async_trait;

use super::{prepare_csv, PreparerContext};
use crate::error::PrepareResult;
use crate::job::JobPreparer;
use crate::models::additional_data::KEY_MUNICIPALITY_CODE;
use crate::models::{JobRawData, JobType, TaskPayload};

pub const COLUMN_MUNICIPALITY_CODE: &str = "municipality_code";

pub struct MunicipalityCodesPreparer {
    context: PreparerContext,
}

impl MunicipalityCodesPreparer {
    pub fn new(context: PreparerContext) -> Self {
        Self { context }
    }
}

#[async_trait]
impl JobPreparer for MunicipalityCodesPreparer {
    fn name(&self) -> &'static str {
        "municipality_codes"
    }

    fn can_prepare_job(&self, job_type: JobType) -> bool {
        job_type == JobType::MunicipalitiesCodes
    }

    async fn prepare_job(&self, raw: JobRawData) -> PrepareResult<usize> {
        prepare_csv(&self.context, &raw, &[COLUMN_MUNICIPALITY_CODE], |row, data| {
            let code = row.get(COLUMN_MUNICIPALITY_CODE).unwrap_or_default().to_string();
            data.insert(KEY_MUNICIPALITY_CODE.to_string(), code.clone());
            TaskPayload::MunicipalityCode(code)
        })
        .await
    }
}
