//! Tasks: atomic units of matching work produced by preparation.

use serde::{Deserialize, Serialize};

use super::{AdditionalData, Confidence, JobId, TaskId};
use crate::spatial::Srid;

/// Type specific matching payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum TaskPayload {
    BuildingId(String),
    MunicipalityCode(String),
    Geometry(GeometryPayload),
    Address(AddressQuery),
}

/// Two dimensional GeoJSON geometry with its legacy `crs` member attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeometryPayload {
    pub srid: Srid,
    pub geojson: String,
}

/// Free-text address triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressQuery {
    pub street: String,
    pub postal_code: String,
    pub locality: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolverTask {
    pub id: TaskId,
    pub job_id: JobId,
    pub payload: TaskPayload,
    pub confidence: Confidence,
    pub additional_data: AdditionalData,
}

impl ResolverTask {
    pub fn new(
        job_id: JobId,
        payload: TaskPayload,
        confidence: Confidence,
        additional_data: AdditionalData,
    ) -> Self {
        Self {
            id: TaskId::new(),
            job_id,
            payload,
            confidence,
            additional_data,
        }
    }

    pub fn matching_building_id(&self) -> Option<&str> {
        match &self.payload {
            TaskPayload::BuildingId(id) => Some(id),
            _ => None,
        }
    }

    pub fn matching_municipality_code(&self) -> Option<&str> {
        match &self.payload {
            TaskPayload::MunicipalityCode(code) => Some(code),
            _ => None,
        }
    }

    pub fn matching_geometry(&self) -> Option<&GeometryPayload> {
        match &self.payload {
            TaskPayload::Geometry(geometry) => Some(geometry),
            _ => None,
        }
    }

    pub fn matching_address(&self) -> Option<&AddressQuery> {
        match &self.payload {
            TaskPayload::Address(address) => Some(address),
            _ => None,
        }
    }
}
