//! Preparer for free-text address lists.

use async_trait::async_trait;

use super::{prepare_csv, PreparerContext};
use crate::error::PrepareResult;
use crate::job::JobPreparer;
use crate::models::additional_data::{KEY_LOCALITY, KEY_POSTAL_CODE, KEY_STREET};
use crate::models::{AddressQuery, JobRawData, JobType, TaskPayload};

pub const COLUMN_STREET_HOUSENUMBER: &str = "street_housenumber";
pub const COLUMN_POSTAL_CODE: &str = "postal_code";
pub const COLUMN_LOCALITY: &str = "locality";

const REQUIRED: [&str; 3] = [COLUMN_STREET_HOUSENUMBER, COLUMN_POSTAL_CODE, COLUMN_LOCALITY];

pub struct AddressSearchPreparer {
    context: PreparerContext,
}

impl AddressSearchPreparer {
    pub fn new(context: PreparerContext) -> Self {
        Self { context }
    }
}

#[async_trait]
impl JobPreparer for AddressSearchPreparer {
    fn name(&self) -> &'static str {
        "address_search"
    }

    fn can_prepare_job(&self, job_type: JobType) -> bool {
        job_type == JobType::AddressSearch
    }

    async fn prepare_job(&self, raw: JobRawData) -> PrepareResult<usize> {
        prepare_csv(&self.context, &raw, &REQUIRED, |row, data| {
            let query = AddressQuery {
                street: row.get(COLUMN_STREET_HOUSENUMBER).unwrap_or_default().trim().to_string(),
                postal_code: row.get(COLUMN_POSTAL_CODE).unwrap_or_default().trim().to_string(),
                locality: row.get(COLUMN_LOCALITY).unwrap_or_default().trim().to_string(),
            };
            data.insert(KEY_STREET.to_string(), query.street.clone());
            data.insert(KEY_POSTAL_CODE.to_string(), query.postal_code.clone());
            data.insert(KEY_LOCALITY.to_string(), query.locality.clone());
            TaskPayload::Address(query)
        })
        .await
    }
}
