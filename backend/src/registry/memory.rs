//! Registry held in memory, loadable from a CSV dump.
//!
//! Expected columns: `egid`, `edid`, `country_code`, `municipality_code`,
//! `postal_code`, `locality`, `street_name`, `house_number`, `latitude`,
//! `longitude`, `east`, `north`. Only `egid` is required; a missing
//! `country_code` defaults to `CH`.

use async_trait::async_trait;
use geo::Rect;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use tracing::info;

use super::{country_matches, AddressSearchIndex, BuildingRegistry, SearchHit};
use crate::address::normalize;
use crate::error::{RegistryError, RegistryResult};
use crate::models::BuildingEntrance;
use crate::parser::{CsvReadOptions, CsvReader, CsvRow};
use crate::spatial::Srid;

const DEFAULT_COUNTRY: &str = "CH";

pub struct InMemoryRegistry {
    entrances: Vec<BuildingEntrance>,
    by_building_id: HashMap<String, Vec<usize>>,
    by_municipality: HashMap<String, Vec<usize>>,
    by_postal_code: HashMap<String, Vec<usize>>,
    by_locality: HashMap<String, Vec<usize>>,
    /// Entrance indexes sorted by x, per reference system.
    by_x: HashMap<Srid, Vec<usize>>,
    search_tokens: Vec<BTreeSet<String>>,
}

impl InMemoryRegistry {
    pub fn new(entrances: Vec<BuildingEntrance>) -> Self {
        let mut by_building_id: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_municipality: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_postal_code: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_locality: HashMap<String, Vec<usize>> = HashMap::new();

        for (i, e) in entrances.iter().enumerate() {
            by_building_id.entry(e.building_id.clone()).or_default().push(i);
            by_municipality.entry(e.municipality_code.clone()).or_default().push(i);
            by_postal_code.entry(e.postal_code.clone()).or_default().push(i);
            by_locality.entry(normalize::normalize(&e.locality)).or_default().push(i);
        }

        let by_x = Srid::ALL
            .into_iter()
            .map(|srid| {
                let mut order: Vec<usize> = (0..entrances.len()).collect();
                order.sort_by(|a, b| {
                    let xa = entrances[*a].coordinates(srid).0;
                    let xb = entrances[*b].coordinates(srid).0;
                    xa.total_cmp(&xb)
                });
                (srid, order)
            })
            .collect();

        let search_tokens = entrances
            .iter()
            .map(|e| {
                let text = format!("{} {} {} {}", e.street_name, e.house_number, e.postal_code, e.locality);
                normalize::tokens(&text).into_iter().collect()
            })
            .collect();

        Self {
            entrances,
            by_building_id,
            by_municipality,
            by_postal_code,
            by_locality,
            by_x,
            search_tokens,
        }
    }

    /// Load a registry dump from disk.
    pub fn from_path(path: impl AsRef<Path>) -> RegistryResult<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let registry = Self::from_csv(&bytes)?;
        info!(
            path = %path.display(),
            entrances = registry.len(),
            "Loaded building registry"
        );
        Ok(registry)
    }

    pub fn from_csv(bytes: &[u8]) -> RegistryResult<Self> {
        let reader = CsvReader::new(bytes, CsvReadOptions::default())?;
        if !reader.has_column("egid") {
            return Err(RegistryError::Load(format!(
                "Missing column 'egid', found columns: {}",
                reader.header().join(", ")
            )));
        }

        let entrances = reader
            .rows()
            .map(|row| entrance_from_row(&row?))
            .collect::<RegistryResult<Vec<_>>>()?;
        Ok(Self::new(entrances))
    }

    pub fn len(&self) -> usize {
        self.entrances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entrances.is_empty()
    }

    fn collect(&self, indexes: Option<&Vec<usize>>, country: Option<&str>) -> Vec<BuildingEntrance> {
        indexes
            .into_iter()
            .flatten()
            .map(|i| &self.entrances[*i])
            .filter(|e| country_matches(e, country))
            .cloned()
            .collect()
    }
}

fn entrance_from_row(row: &CsvRow) -> RegistryResult<BuildingEntrance> {
    let text = |column: &str| row.get(column).unwrap_or_default().to_string();
    let coordinate = |column: &str| -> RegistryResult<f64> {
        match row.get(column).filter(|v| !v.is_empty()) {
            None => Ok(f64::NAN),
            Some(value) => value.parse().map_err(|_| {
                RegistryError::Load(format!(
                    "Row {}: invalid {} '{}'",
                    row.number, column, value
                ))
            }),
        }
    };

    let country = text("country_code");
    Ok(BuildingEntrance {
        building_id: text("egid"),
        entrance_id: text("edid"),
        country_code: if country.is_empty() {
            DEFAULT_COUNTRY.to_string()
        } else {
            country.to_uppercase()
        },
        municipality_code: text("municipality_code"),
        postal_code: text("postal_code"),
        locality: text("locality"),
        street_name: text("street_name"),
        house_number: text("house_number"),
        latitude: coordinate("latitude")?,
        longitude: coordinate("longitude")?,
        east: coordinate("east")?,
        north: coordinate("north")?,
    })
}

#[async_trait]
impl BuildingRegistry for InMemoryRegistry {
    async fn find_by_building_id(
        &self,
        building_id: &str,
        country: Option<&str>,
    ) -> RegistryResult<Vec<BuildingEntrance>> {
        Ok(self.collect(self.by_building_id.get(building_id.trim()), country))
    }

    async fn find_by_municipality_code(
        &self,
        municipality_code: &str,
        country: Option<&str>,
    ) -> RegistryResult<Vec<BuildingEntrance>> {
        Ok(self.collect(self.by_municipality.get(municipality_code.trim()), country))
    }

    async fn find_in_bounds(
        &self,
        srid: Srid,
        bounds: Rect<f64>,
        country: Option<&str>,
    ) -> RegistryResult<Vec<BuildingEntrance>> {
        let Some(order) = self.by_x.get(&srid) else {
            return Ok(Vec::new());
        };
        let (min, max) = (bounds.min(), bounds.max());
        let x_of = |i: &usize| self.entrances[*i].coordinates(srid).0;
        let first = order.partition_point(|i| x_of(i) < min.x);

        Ok(order[first..]
            .iter()
            .take_while(|i| x_of(i) <= max.x)
            .map(|i| &self.entrances[*i])
            .filter(|e| {
                let y = e.coordinates(srid).1;
                y >= min.y && y <= max.y && country_matches(e, country)
            })
            .cloned()
            .collect())
    }

    async fn find_by_postal_code(
        &self,
        postal_code: &str,
        country: Option<&str>,
    ) -> RegistryResult<Vec<BuildingEntrance>> {
        Ok(self.collect(self.by_postal_code.get(postal_code.trim()), country))
    }

    async fn find_by_locality(
        &self,
        locality: &str,
        country: Option<&str>,
    ) -> RegistryResult<Vec<BuildingEntrance>> {
        Ok(self.collect(self.by_locality.get(&normalize::normalize(locality)), country))
    }
}

#[async_trait]
impl AddressSearchIndex for InMemoryRegistry {
    async fn search(&self, query: &str, country: Option<&str>, limit: usize) -> RegistryResult<Vec<SearchHit>> {
        let query: BTreeSet<String> = normalize::tokens(query).into_iter().collect();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, f64)> = self
            .search_tokens
            .iter()
            .enumerate()
            .filter(|(i, _)| country_matches(&self.entrances[*i], country))
            .filter_map(|(i, tokens)| {
                let shared = query.intersection(tokens).count();
                (shared > 0).then(|| (i, shared as f64 / query.len().max(tokens.len()) as f64))
            })
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(i, score)| SearchHit {
                entrance: self.entrances[i].clone(),
                score,
            })
            .collect())
    }
}
