//! Domain models for the resolver job pipeline.
//!
//! - [`ResolverJob`] - one submitted batch with its lifecycle status
//! - [`ResolverTask`] - one atomic unit of matching work
//! - [`ResolverResult`] - one produced match (or non-match)
//! - [`AdditionalData`] - caller columns carried end to end
//! - [`Confidence`] - bounded match score
//! - [`BuildingEntrance`] - registry row a result points at

pub mod additional_data;
pub mod confidence;
pub mod entrance;
pub mod result;
pub mod task;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::spatial::Srid;

pub use additional_data::AdditionalData;
pub use confidence::Confidence;
pub use entrance::BuildingEntrance;
pub use result::{MatchType, ResolverResult, ResultKey};
pub use task::{AddressQuery, GeometryPayload, ResolverTask, TaskPayload};

// =============================================================================
// Identifiers
// =============================================================================

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Fresh time-sortable identifier.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

uuid_id!(
    /// Opaque job identifier.
    JobId
);
uuid_id!(
    /// Opaque task identifier.
    TaskId
);
uuid_id!(
    /// Opaque result identifier.
    ResultId
);

// =============================================================================
// Job Type
// =============================================================================

/// Kind of raw input a job carries; selects preparer and resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobType {
    BuildingIds,
    MunicipalitiesCodes,
    GeoJson,
    AddressSearch,
}

impl JobType {
    pub const ALL: [JobType; 4] = [
        JobType::BuildingIds,
        JobType::MunicipalitiesCodes,
        JobType::GeoJson,
        JobType::AddressSearch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::BuildingIds => "BUILDING_IDS",
            JobType::MunicipalitiesCodes => "MUNICIPALITIES_CODES",
            JobType::GeoJson => "GEO_JSON",
            JobType::AddressSearch => "ADDRESS_SEARCH",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobType {
    type Err = String;

    /// Accepts `BUILDING_IDS`, `building-ids` and `building_ids` forms.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase().replace('-', "_");
        JobType::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| format!("Unknown job type: {}", s))
    }
}

// =============================================================================
// Job Status
// =============================================================================

/// Stored lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Created,
    Preparing,
    Ready,
    Resolving,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Created => "created",
            JobStatus::Preparing => "preparing",
            JobStatus::Ready => "ready",
            JobStatus::Resolving => "resolving",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Whether the state machine allows moving from `self` to `next`.
    ///
    /// Self-loops on `preparing`/`resolving` let the dispatcher re-drive a
    /// phase after a crash or a retryable failure.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Created, Preparing)
                | (Preparing, Preparing)
                | (Preparing, Ready)
                | (Preparing, Failed)
                | (Ready, Resolving)
                | (Resolving, Resolving)
                | (Resolving, Completed)
                | (Resolving, Failed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Metadata & Failure
// =============================================================================

/// Caller supplied options plus values detected during preparation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<char>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enclosure: Option<char>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub charset: Option<String>,
    /// Non-essential input columns echoed back as `userdata.<column>`.
    #[serde(default)]
    pub additional_columns: Vec<String>,
    /// ISO country code narrowing registry lookups.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub srid: Option<Srid>,
}

/// Why a job is stuck.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureType {
    NoPreparerFound,
    NoResolverFound,
    InvalidInputData,
    ResolvingError,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolverJobFailure {
    #[serde(rename = "type")]
    pub failure_type: FailureType,
    pub details: String,
    pub retryable: bool,
}

impl ResolverJobFailure {
    pub fn no_preparer_found(job_type: JobType) -> Self {
        Self {
            failure_type: FailureType::NoPreparerFound,
            details: format!("No preparer found for job type {}", job_type),
            retryable: false,
        }
    }

    pub fn no_resolver_found(job_type: JobType) -> Self {
        Self {
            failure_type: FailureType::NoResolverFound,
            details: format!("No resolver found for job type {}", job_type),
            retryable: false,
        }
    }

    pub fn invalid_input_data(details: impl Into<String>) -> Self {
        Self {
            failure_type: FailureType::InvalidInputData,
            details: details.into(),
            retryable: false,
        }
    }

    pub fn resolving_error(details: impl Into<String>, retryable: bool) -> Self {
        Self {
            failure_type: FailureType::ResolvingError,
            details: details.into(),
            retryable,
        }
    }
}

// =============================================================================
// Resolver Job
// =============================================================================

/// A submitted batch of raw input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolverJob {
    pub id: JobId,
    #[serde(rename = "type")]
    pub job_type: JobType,
    pub status: JobStatus,
    pub metadata: JobMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<ResolverJobFailure>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl ResolverJob {
    /// New job in `created` status, expiring `ttl` after creation.
    pub fn new(job_type: JobType, metadata: JobMetadata, ttl: Duration) -> Self {
        let created_at = Utc::now();
        Self {
            id: JobId::new(),
            job_type,
            status: JobStatus::Created,
            metadata,
            failure: None,
            created_at,
            expires_at: created_at + ttl,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Retryable failure recorded while the status was kept.
    pub fn is_temporarily_failed(&self) -> bool {
        self.status != JobStatus::Failed && self.failure.as_ref().is_some_and(|f| f.retryable)
    }
}

/// Raw submitted bytes, fetched by preparers.
#[derive(Debug, Clone)]
pub struct JobRawData {
    pub job_id: JobId,
    pub job_type: JobType,
    pub metadata: JobMetadata,
    pub data: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_type_from_str() {
        assert_eq!("BUILDING_IDS".parse::<JobType>(), Ok(JobType::BuildingIds));
        assert_eq!("geo-json".parse::<JobType>(), Ok(JobType::GeoJson));
        assert_eq!(
            "municipalities_codes".parse::<JobType>(),
            Ok(JobType::MunicipalitiesCodes)
        );
        assert!("buildings".parse::<JobType>().is_err());
    }

    #[test]
    fn test_status_never_skips_a_state() {
        assert!(JobStatus::Created.can_transition_to(JobStatus::Preparing));
        assert!(JobStatus::Preparing.can_transition_to(JobStatus::Ready));
        assert!(!JobStatus::Created.can_transition_to(JobStatus::Ready));
        assert!(!JobStatus::Ready.can_transition_to(JobStatus::Completed));
        assert!(!JobStatus::Completed.can_transition_to(JobStatus::Resolving));
        assert!(!JobStatus::Failed.can_transition_to(JobStatus::Preparing));
    }

    #[test]
    fn test_temporarily_failed_keeps_status() {
        let mut job = ResolverJob::new(JobType::GeoJson, JobMetadata::default(), Duration::days(1));
        job.status = JobStatus::Resolving;
        job.failure = Some(ResolverJobFailure::resolving_error("timeout", true));
        assert!(job.is_temporarily_failed());

        job.status = JobStatus::Failed;
        assert!(!job.is_temporarily_failed());
    }

    #[test]
    fn test_job_expiry() {
        let job = ResolverJob::new(JobType::BuildingIds, JobMetadata::default(), Duration::days(30));
        assert!(!job.is_expired(Utc::now()));
        assert!(job.is_expired(Utc::now() + Duration::days(31)));
    }

    #[test]
    fn test_job_id_parse() {
        let id = JobId::new();
        assert_eq!(id.to_string().parse::<JobId>().unwrap(), id);
        assert!("not-a-uuid".parse::<JobId>().is_err());
    }
}
