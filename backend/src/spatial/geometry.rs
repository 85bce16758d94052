//! GeoJSON reading and writing on top of `geo` types.
//!
//! Only the two first ordinates of a position are kept, so every geometry
//! read here is two dimensional.

use geo::{Coord, Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

use super::Srid;
use crate::error::GeoJsonError;

/// One input feature with flattened properties.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoFeature {
    pub geometry: Geometry<f64>,
    pub properties: BTreeMap<String, String>,
}

/// Features of a FeatureCollection, a single Feature or a bare geometry.
pub fn read_features(value: &Value) -> Result<Vec<GeoFeature>, GeoJsonError> {
    match value.get("type").and_then(Value::as_str) {
        Some("FeatureCollection") => value
            .get("features")
            .and_then(Value::as_array)
            .ok_or_else(|| GeoJsonError::InvalidGeometry("FeatureCollection without features".into()))?
            .iter()
            .enumerate()
            .map(|(i, feature)| read_feature(feature, i + 1))
            .collect(),
        Some("Feature") => Ok(vec![read_feature(value, 1)?]),
        Some(_) => Ok(vec![GeoFeature {
            geometry: geometry_from_json(value)?,
            properties: BTreeMap::new(),
        }]),
        None => Err(GeoJsonError::InvalidGeometry("missing type member".into())),
    }
}

fn read_feature(feature: &Value, index: usize) -> Result<GeoFeature, GeoJsonError> {
    let geometry = feature
        .get("geometry")
        .filter(|g| !g.is_null())
        .ok_or_else(|| GeoJsonError::InvalidGeometry(format!("feature {} has no geometry", index)))?;

    let properties = feature
        .get("properties")
        .and_then(Value::as_object)
        .map(flatten_properties)
        .unwrap_or_default();

    Ok(GeoFeature {
        geometry: geometry_from_json(geometry)?,
        properties,
    })
}

fn flatten_properties(properties: &Map<String, Value>) -> BTreeMap<String, String> {
    properties
        .iter()
        .map(|(key, value)| {
            let value = match value {
                Value::Null => String::new(),
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (key.clone(), value)
        })
        .collect()
}

// =============================================================================
// GeoJSON -> geo
// =============================================================================

pub fn geometry_from_json(value: &Value) -> Result<Geometry<f64>, GeoJsonError> {
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| GeoJsonError::InvalidGeometry("geometry without type".into()))?;

    if kind == "GeometryCollection" {
        let members = value
            .get("geometries")
            .and_then(Value::as_array)
            .ok_or_else(|| GeoJsonError::InvalidGeometry("GeometryCollection without geometries".into()))?
            .iter()
            .map(geometry_from_json)
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(Geometry::GeometryCollection(GeometryCollection::new_from(members)));
    }

    let coordinates = value
        .get("coordinates")
        .ok_or_else(|| GeoJsonError::InvalidGeometry(format!("{} without coordinates", kind)))?;

    Ok(match kind {
        "Point" => Geometry::Point(Point::from(position(coordinates)?)),
        "MultiPoint" => Geometry::MultiPoint(MultiPoint::new(
            positions(coordinates)?.into_iter().map(Point::from).collect(),
        )),
        "LineString" => Geometry::LineString(LineString::new(positions(coordinates)?)),
        "MultiLineString" => Geometry::MultiLineString(MultiLineString::new(
            array(coordinates)?
                .iter()
                .map(|line| positions(line).map(LineString::new))
                .collect::<Result<_, _>>()?,
        )),
        "Polygon" => Geometry::Polygon(polygon(coordinates)?),
        "MultiPolygon" => Geometry::MultiPolygon(MultiPolygon::new(
            array(coordinates)?
                .iter()
                .map(polygon)
                .collect::<Result<_, _>>()?,
        )),
        other => return Err(GeoJsonError::InvalidGeometry(format!("unsupported type {}", other))),
    })
}

fn array(value: &Value) -> Result<&Vec<Value>, GeoJsonError> {
    value
        .as_array()
        .ok_or_else(|| GeoJsonError::InvalidGeometry(format!("expected an array, got {}", value)))
}

fn position(value: &Value) -> Result<Coord<f64>, GeoJsonError> {
    let ordinates = array(value)?;
    let ordinate = |i: usize| {
        ordinates
            .get(i)
            .and_then(Value::as_f64)
            .ok_or_else(|| GeoJsonError::InvalidGeometry(format!("invalid position {}", value)))
    };
    Ok(Coord {
        x: ordinate(0)?,
        y: ordinate(1)?,
    })
}

fn positions(value: &Value) -> Result<Vec<Coord<f64>>, GeoJsonError> {
    array(value)?.iter().map(position).collect()
}

fn polygon(value: &Value) -> Result<Polygon<f64>, GeoJsonError> {
    let mut rings = array(value)?
        .iter()
        .map(|ring| positions(ring).map(LineString::new));
    let exterior = rings
        .next()
        .ok_or_else(|| GeoJsonError::InvalidGeometry("polygon without rings".into()))??;
    let interiors = rings.collect::<Result<Vec<_>, _>>()?;
    Ok(Polygon::new(exterior, interiors))
}

// =============================================================================
// geo -> GeoJSON
// =============================================================================

/// Legacy named `crs` member.
pub fn crs_member(srid: Srid) -> Value {
    json!({
        "type": "name",
        "properties": { "name": srid.crs_name() }
    })
}

/// GeoJSON geometry object, with a `crs` member when `srid` is given.
pub fn geometry_to_json(geometry: &Geometry<f64>, srid: Option<Srid>) -> Value {
    let mut value = geometry_value(geometry);
    if let (Some(srid), Value::Object(object)) = (srid, &mut value) {
        object.insert("crs".to_string(), crs_member(srid));
    }
    value
}

fn geometry_value(geometry: &Geometry<f64>) -> Value {
    match geometry {
        Geometry::Point(p) => json!({ "type": "Point", "coordinates": coord_value(&p.0) }),
        Geometry::MultiPoint(mp) => json!({
            "type": "MultiPoint",
            "coordinates": mp.0.iter().map(|p| coord_value(&p.0)).collect::<Vec<_>>(),
        }),
        Geometry::Line(line) => json!({
            "type": "LineString",
            "coordinates": [coord_value(&line.start), coord_value(&line.end)],
        }),
        Geometry::LineString(ls) => json!({ "type": "LineString", "coordinates": line_value(ls) }),
        Geometry::MultiLineString(mls) => json!({
            "type": "MultiLineString",
            "coordinates": mls.0.iter().map(line_value).collect::<Vec<_>>(),
        }),
        Geometry::Polygon(p) => json!({ "type": "Polygon", "coordinates": polygon_value(p) }),
        Geometry::MultiPolygon(mp) => json!({
            "type": "MultiPolygon",
            "coordinates": mp.0.iter().map(polygon_value).collect::<Vec<_>>(),
        }),
        Geometry::Rect(rect) => json!({ "type": "Polygon", "coordinates": polygon_value(&rect.to_polygon()) }),
        Geometry::Triangle(tri) => json!({ "type": "Polygon", "coordinates": polygon_value(&tri.to_polygon()) }),
        Geometry::GeometryCollection(gc) => json!({
            "type": "GeometryCollection",
            "geometries": gc.0.iter().map(geometry_value).collect::<Vec<_>>(),
        }),
    }
}

fn coord_value(c: &Coord<f64>) -> Value {
    json!([c.x, c.y])
}

fn line_value(line: &LineString<f64>) -> Vec<Value> {
    line.0.iter().map(coord_value).collect()
}

fn polygon_value(polygon: &Polygon<f64>) -> Vec<Vec<Value>> {
    std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .map(line_value)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forces_two_dimensions() {
        let value = json!({"type": "Polygon", "coordinates": [[[0, 0, 5], [4, 0, 5], [4, 4, 5], [0, 0, 5]]]});
        let geometry = geometry_from_json(&value).unwrap();
        let out = geometry_to_json(&geometry, None);
        assert_eq!(out["coordinates"][0][0], json!([0.0, 0.0]));
        assert_eq!(out["coordinates"][0][2], json!([4.0, 4.0]));
    }

    #[test]
    fn test_crs_attached() {
        let geometry = Geometry::Point(Point::new(2_600_000.0, 1_200_000.0));
        let out = geometry_to_json(&geometry, Some(Srid::Lv95));
        assert_eq!(out["crs"]["type"], "name");
        assert_eq!(out["crs"]["properties"]["name"], "EPSG:2056");
    }

    #[test]
    fn test_read_feature_collection() {
        let value = json!({
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "properties": {"zone": "A", "level": 3, "note": null},
                 "geometry": {"type": "Point", "coordinates": [7.4, 46.9]}},
                {"type": "Feature", "properties": null,
                 "geometry": {"type": "MultiPolygon", "coordinates": [[[[0, 0], [1, 0], [1, 1], [0, 0]]]]}}
            ]
        });
        let features = read_features(&value).unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(features[0].properties.get("zone").map(String::as_str), Some("A"));
        assert_eq!(features[0].properties.get("level").map(String::as_str), Some("3"));
        assert_eq!(features[0].properties.get("note").map(String::as_str), Some(""));
        assert!(features[1].properties.is_empty());
        assert!(matches!(features[1].geometry, Geometry::MultiPolygon(_)));
    }

    #[test]
    fn test_feature_without_geometry_is_invalid() {
        let value = json!({"type": "FeatureCollection", "features": [{"type": "Feature", "properties": {}, "geometry": null}]});
        let err = read_features(&value).unwrap_err();
        assert!(err.to_string().contains("feature 1"));
    }

    #[test]
    fn test_polygon_holes_survive() {
        let value = json!({"type": "Polygon", "coordinates": [
            [[0, 0], [10, 0], [10, 10], [0, 10], [0, 0]],
            [[4, 4], [6, 4], [6, 6], [4, 4]]
        ]});
        let Geometry::Polygon(polygon) = geometry_from_json(&value).unwrap() else {
            panic!("expected polygon");
        };
        assert_eq!(polygon.interiors().len(), 1);
    }
}
