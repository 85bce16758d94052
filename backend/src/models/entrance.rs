//! Building entrance as known by the registry.

use serde::{Deserialize, Serialize};

use crate::spatial::Srid;

/// One entrance of one building (EGID/EDID pair) with its address and location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildingEntrance {
    pub building_id: String,
    pub entrance_id: String,
    pub country_code: String,
    pub municipality_code: String,
    pub postal_code: String,
    pub locality: String,
    pub street_name: String,
    pub house_number: String,
    /// WGS84
    pub latitude: f64,
    pub longitude: f64,
    /// LV95
    pub east: f64,
    pub north: f64,
}

impl BuildingEntrance {
    /// Entrance location in the given reference system, as `(x, y)`.
    pub fn coordinates(&self, srid: Srid) -> (f64, f64) {
        match srid {
            Srid::Lv95 => (self.east, self.north),
            Srid::Wgs84 => (self.longitude, self.latitude),
        }
    }

    pub fn point(&self, srid: Srid) -> geo::Point<f64> {
        let (x, y) = self.coordinates(srid);
        geo::Point::new(x, y)
    }

    /// Street and house number as a single line.
    pub fn street_line(&self) -> String {
        if self.house_number.is_empty() {
            self.street_name.clone()
        } else {
            format!("{} {}", self.street_name, self.house_number)
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Entrance fixture used across module tests.
    pub fn entrance(building_id: &str, entrance_id: &str, street: &str, number: &str) -> BuildingEntrance {
        BuildingEntrance {
            building_id: building_id.to_string(),
            entrance_id: entrance_id.to_string(),
            country_code: "CH".to_string(),
            municipality_code: "351".to_string(),
            postal_code: "3011".to_string(),
            locality: "Bern".to_string(),
            street_name: street.to_string(),
            house_number: number.to_string(),
            latitude: 46.948,
            longitude: 7.447,
            east: 2_600_000.0,
            north: 1_200_000.0,
        }
    }
}
