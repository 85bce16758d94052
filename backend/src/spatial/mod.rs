//! Coordinate systems and GeoJSON handling.

pub mod geometry;
pub mod srid;

pub use geometry::{crs_member, geometry_from_json, geometry_to_json, read_features, GeoFeature};
pub use srid::{detect_srid, detect_srid_value, guess_srid, Srid, SridDetection};
