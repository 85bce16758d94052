//! Spatial reference systems and their detection.

use geo::{coord, Rect};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::GeoJsonError;

/// Supported spatial reference systems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Srid {
    /// Swiss projected CH1903+ / LV95.
    Lv95,
    /// Geographic WGS84 longitude/latitude.
    Wgs84,
}

const LV95_ALIASES: &[&str] = &[
    "EPSG:2056",
    "urn:ogc:def:crs:EPSG::2056",
    "urn:ogc:def:crs:EPSG:6.6:2056",
    "http://www.opengis.net/def/crs/EPSG/0/2056",
    "2056",
    "LV95",
];

const WGS84_ALIASES: &[&str] = &[
    "EPSG:4326",
    "urn:ogc:def:crs:EPSG::4326",
    "urn:ogc:def:crs:OGC:1.3:CRS84",
    "urn:ogc:def:crs:OGC::CRS84",
    "http://www.opengis.net/def/crs/OGC/1.3/CRS84",
    "CRS84",
    "4326",
    "WGS84",
];

impl Srid {
    pub const ALL: [Srid; 2] = [Srid::Lv95, Srid::Wgs84];

    /// EPSG code.
    pub fn code(&self) -> u32 {
        match self {
            Srid::Lv95 => 2056,
            Srid::Wgs84 => 4326,
        }
    }

    /// Name used in the legacy GeoJSON `crs` member.
    pub fn crs_name(&self) -> String {
        format!("EPSG:{}", self.code())
    }

    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Srid::Lv95 => LV95_ALIASES,
            Srid::Wgs84 => WGS84_ALIASES,
        }
    }

    /// Case-insensitive alias lookup.
    pub fn from_alias(alias: &str) -> Option<Srid> {
        let alias = alias.trim();
        Srid::ALL
            .into_iter()
            .find(|srid| srid.aliases().iter().any(|a| a.eq_ignore_ascii_case(alias)))
    }

    pub fn from_code(code: u32) -> Option<Srid> {
        Srid::ALL.into_iter().find(|srid| srid.code() == code)
    }

    /// Area where coordinates of this system are plausible for registry data.
    pub fn bounds(&self) -> Rect<f64> {
        match self {
            Srid::Lv95 => Rect::new(
                coord! { x: 2_450_000.0, y: 1_050_000.0 },
                coord! { x: 2_850_000.0, y: 1_320_000.0 },
            ),
            Srid::Wgs84 => Rect::new(coord! { x: 5.5, y: 45.5 }, coord! { x: 11.0, y: 48.0 }),
        }
    }

    pub fn contains_position(&self, x: f64, y: f64) -> bool {
        let bounds = self.bounds();
        x >= bounds.min().x && x <= bounds.max().x && y >= bounds.min().y && y <= bounds.max().y
    }
}

impl fmt::Display for Srid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.crs_name())
    }
}

impl FromStr for Srid {
    type Err = GeoJsonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Srid::from_alias(s).ok_or_else(|| GeoJsonError::UnsupportedCrs(s.to_string()))
    }
}

impl Serialize for Srid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.code())
    }
}

impl<'de> Deserialize<'de> for Srid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Code(u32),
            Alias(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Code(code) => Srid::from_code(code)
                .ok_or_else(|| serde::de::Error::custom(format!("unsupported SRID {}", code))),
            Raw::Alias(alias) => alias.parse().map_err(serde::de::Error::custom),
        }
    }
}

// =============================================================================
// Detection
// =============================================================================

/// Outcome of inspecting a GeoJSON payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SridDetection {
    /// Taken from the legacy `crs` member.
    Declared(Srid),
    /// Inferred from the first coordinate.
    Guessed(Srid),
    /// Out of bounds or ambiguous; callers must not default.
    Unknown,
}

impl SridDetection {
    pub fn srid(&self) -> Option<Srid> {
        match self {
            SridDetection::Declared(srid) | SridDetection::Guessed(srid) => Some(*srid),
            SridDetection::Unknown => None,
        }
    }
}

/// Detect the reference system of raw GeoJSON text.
pub fn detect_srid(raw: &str) -> Result<SridDetection, GeoJsonError> {
    let value: Value = serde_json::from_str(raw)?;
    detect_srid_value(&value)
}

pub fn detect_srid_value(value: &Value) -> Result<SridDetection, GeoJsonError> {
    if let Some(crs) = value.get("crs").filter(|crs| !crs.is_null()) {
        let name = declared_crs_name(crs)?;
        return Srid::from_alias(name)
            .map(SridDetection::Declared)
            .ok_or_else(|| GeoJsonError::UnsupportedCrs(name.to_string()));
    }

    Ok(match representative_position(value) {
        Some((x, y)) => guess_srid(x, y),
        None => SridDetection::Unknown,
    })
}

/// Guess from a single position; both or neither bounding box is unknown.
pub fn guess_srid(x: f64, y: f64) -> SridDetection {
    match (
        Srid::Lv95.contains_position(x, y),
        Srid::Wgs84.contains_position(x, y),
    ) {
        (true, false) => SridDetection::Guessed(Srid::Lv95),
        (false, true) => SridDetection::Guessed(Srid::Wgs84),
        _ => SridDetection::Unknown,
    }
}

fn declared_crs_name(crs: &Value) -> Result<&str, GeoJsonError> {
    if crs.get("type").and_then(Value::as_str) != Some("name") {
        return Err(GeoJsonError::MalformedCrs(crs.to_string()));
    }
    crs.get("properties")
        .and_then(|p| p.get("name"))
        .and_then(Value::as_str)
        .ok_or_else(|| GeoJsonError::MalformedCrs(crs.to_string()))
}

/// First position of the first feature's geometry.
fn representative_position(value: &Value) -> Option<(f64, f64)> {
    let geometry = match value.get("type").and_then(Value::as_str)? {
        "FeatureCollection" => value.get("features")?.as_array()?.first()?.get("geometry")?,
        "Feature" => value.get("geometry")?,
        _ => value,
    };
    first_geometry_position(geometry)
}

fn first_geometry_position(geometry: &Value) -> Option<(f64, f64)> {
    if geometry.get("type").and_then(Value::as_str) == Some("GeometryCollection") {
        let first = geometry.get("geometries")?.as_array()?.first()?;
        return first_geometry_position(first);
    }

    let mut coordinates = geometry.get("coordinates")?;
    while let Some(first) = coordinates.as_array()?.first() {
        if first.is_number() {
            let position = coordinates.as_array()?;
            return Some((position.first()?.as_f64()?, position.get(1)?.as_f64()?));
        }
        coordinates = first;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aliases() {
        assert_eq!(Srid::from_alias("urn:ogc:def:crs:EPSG::2056"), Some(Srid::Lv95));
        assert_eq!(Srid::from_alias("epsg:4326"), Some(Srid::Wgs84));
        assert_eq!(Srid::from_alias("urn:ogc:def:crs:OGC:1.3:CRS84"), Some(Srid::Wgs84));
        assert_eq!(Srid::from_alias("EPSG:21781"), None);
    }

    #[test]
    fn test_declared_crs() {
        let raw = r#"{"type":"FeatureCollection","crs":{"type":"name","properties":{"name":"urn:ogc:def:crs:EPSG::2056"}},"features":[]}"#;
        assert_eq!(detect_srid(raw).unwrap(), SridDetection::Declared(Srid::Lv95));
    }

    #[test]
    fn test_unsupported_declared_crs() {
        let raw = r#"{"type":"FeatureCollection","crs":{"type":"name","properties":{"name":"EPSG:21781"}},"features":[]}"#;
        assert!(matches!(detect_srid(raw), Err(GeoJsonError::UnsupportedCrs(_))));
    }

    #[test]
    fn test_malformed_crs() {
        let raw = r#"{"type":"FeatureCollection","crs":{"type":"link","properties":{}},"features":[]}"#;
        assert!(matches!(detect_srid(raw), Err(GeoJsonError::MalformedCrs(_))));
    }

    #[test]
    fn test_guess_from_first_feature() {
        let lv95 = r#"{"type":"FeatureCollection","features":[{"type":"Feature","properties":{},
            "geometry":{"type":"Polygon","coordinates":[[[2600000,1200000],[2600100,1200000],[2600100,1200100],[2600000,1200000]]]}}]}"#;
        assert_eq!(detect_srid(lv95).unwrap(), SridDetection::Guessed(Srid::Lv95));

        let wgs84 = r#"{"type":"Feature","properties":{},"geometry":{"type":"Point","coordinates":[7.44,46.95,540]}}"#;
        assert_eq!(detect_srid(wgs84).unwrap(), SridDetection::Guessed(Srid::Wgs84));
    }

    #[test]
    fn test_out_of_bounds_is_unknown() {
        let raw = r#"{"type":"Point","coordinates":[-73.98,40.75]}"#;
        assert_eq!(detect_srid(raw).unwrap(), SridDetection::Unknown);
        assert_eq!(detect_srid(r#"{"type":"FeatureCollection","features":[]}"#).unwrap(), SridDetection::Unknown);
    }

    #[test]
    fn test_serde_accepts_code_and_alias() {
        assert_eq!(serde_json::to_string(&Srid::Lv95).unwrap(), "2056");
        assert_eq!(serde_json::from_str::<Srid>("4326").unwrap(), Srid::Wgs84);
        assert_eq!(serde_json::from_str::<Srid>("\"EPSG:2056\"").unwrap(), Srid::Lv95);
        assert!(serde_json::from_str::<Srid>("21781").is_err());
    }
}
