//! Results: matches (or non-matches) produced by resolution.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use super::{AdditionalData, BuildingEntrance, Confidence, JobId, ResolverTask, ResultId, TaskId};

/// Match strategy tags.
pub mod tags {
    pub const BUILDING_ID: &str = "buildingId";
    pub const MUNICIPALITY_CODE: &str = "municipalityCode";
    pub const GEO_JSON: &str = "geoJson";
    pub const ADDRESS: &str = "address";
    pub const NO_MATCH: &str = "nomatch";
    pub const LOCALITY: &str = "locality";
}

/// Chain of tags explaining how a result was produced, rendered dash-joined.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MatchType(Vec<String>);

impl MatchType {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(vec![tag.into()])
    }

    pub fn no_match() -> Self {
        Self::new(tags::NO_MATCH)
    }

    pub fn with(mut self, tag: impl Into<String>) -> Self {
        self.0.push(tag.into());
        self
    }

    pub fn tags(&self) -> &[String] {
        &self.0
    }

    pub fn is_no_match(&self) -> bool {
        self.0.iter().any(|t| t == tags::NO_MATCH)
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("-"))
    }
}

impl Serialize for MatchType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MatchType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(MatchType(
            raw.split('-')
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect(),
        ))
    }
}

/// Uniqueness key of a result within its job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResultKey {
    Entrance {
        country_code: String,
        building_id: String,
        entrance_id: String,
    },
    Unmatched(TaskId),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolverResult {
    pub id: ResultId,
    pub job_id: JobId,
    pub entrance: Option<BuildingEntrance>,
    /// Set for non-matches, which are keyed by their task.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unmatched_task: Option<TaskId>,
    pub confidence: Confidence,
    pub match_type: MatchType,
    pub additional_data: AdditionalData,
}

impl ResolverResult {
    pub fn matched(
        job_id: JobId,
        entrance: BuildingEntrance,
        confidence: Confidence,
        match_type: MatchType,
        additional_data: AdditionalData,
    ) -> Self {
        Self {
            id: ResultId::new(),
            job_id,
            entrance: Some(entrance),
            unmatched_task: None,
            confidence,
            match_type,
            additional_data,
        }
    }

    /// Non-match echoing the task's data.
    pub fn unmatched(task: &ResolverTask) -> Self {
        Self {
            id: ResultId::new(),
            job_id: task.job_id,
            entrance: None,
            unmatched_task: Some(task.id),
            confidence: Confidence::MIN,
            match_type: MatchType::no_match(),
            additional_data: task.additional_data.clone(),
        }
    }

    pub fn key(&self) -> ResultKey {
        match &self.entrance {
            Some(e) => ResultKey::Entrance {
                country_code: e.country_code.clone(),
                building_id: e.building_id.clone(),
                entrance_id: e.entrance_id.clone(),
            },
            None => ResultKey::Unmatched(self.unmatched_task.unwrap_or_default()),
        }
    }

    /// Conflict policy for a second result on the same key: union of
    /// additional data, best confidence and its match type.
    pub fn merge(&mut self, other: &ResolverResult) {
        self.additional_data.merge(&other.additional_data);
        if other.confidence > self.confidence {
            self.confidence = other.confidence;
            self.match_type = other.match_type.clone();
        }
    }
}
