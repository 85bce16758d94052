//! Building-entrance registry contracts.
//!
//! The authoritative dataset and its full-text index are external; resolvers
//! only see these traits. [`InMemoryRegistry`] implements both over a CSV dump.

pub mod memory;

use async_trait::async_trait;
use geo::Rect;

use crate::error::RegistryResult;
use crate::models::BuildingEntrance;
use crate::spatial::Srid;

pub use memory::InMemoryRegistry;

/// Lookups against the registry. `country` narrows results when set.
#[async_trait]
pub trait BuildingRegistry: Send + Sync {
    async fn find_by_building_id(
        &self,
        building_id: &str,
        country: Option<&str>,
    ) -> RegistryResult<Vec<BuildingEntrance>>;

    async fn find_by_municipality_code(
        &self,
        municipality_code: &str,
        country: Option<&str>,
    ) -> RegistryResult<Vec<BuildingEntrance>>;

    /// Entrances whose location in `srid` falls inside `bounds`.
    async fn find_in_bounds(
        &self,
        srid: Srid,
        bounds: Rect<f64>,
        country: Option<&str>,
    ) -> RegistryResult<Vec<BuildingEntrance>>;

    async fn find_by_postal_code(
        &self,
        postal_code: &str,
        country: Option<&str>,
    ) -> RegistryResult<Vec<BuildingEntrance>>;

    /// Case and accent insensitive locality lookup.
    async fn find_by_locality(
        &self,
        locality: &str,
        country: Option<&str>,
    ) -> RegistryResult<Vec<BuildingEntrance>>;
}

/// One full-text hit, `score` in `0.0..=1.0`.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub entrance: BuildingEntrance,
    pub score: f64,
}

#[async_trait]
pub trait AddressSearchIndex: Send + Sync {
    /// Best hits first, restricted to `country` before `limit` applies.
    async fn search(&self, query: &str, country: Option<&str>, limit: usize) -> RegistryResult<Vec<SearchHit>>;
}

pub(crate) fn country_matches(entrance: &BuildingEntrance, country: Option<&str>) -> bool {
    country.map_or(true, |c| entrance.country_code.eq_ignore_ascii_case(c.trim()))
}
