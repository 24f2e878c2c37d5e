//! Zone import from `GeoJSON` files.
//!
//! Accepts a `FeatureCollection` (or a single `Feature`) whose features carry
//! `Polygon` or `MultiPolygon` geometries and a name property.

use std::path::Path;

use geojson::{Feature, GeoJson};
use switchy_database::Database;

use crate::ZoneError;

/// Property used for the zone name when none is given.
pub const DEFAULT_NAME_FIELD: &str = "name";

/// A zone ready to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneFeature {
    /// Zone name.
    pub name: String,
    /// Geometry as a `GeoJSON` string.
    pub geometry_json: String,
}

/// Parses zones from `GeoJSON` text.
///
/// Features with a missing name or a non-polygonal geometry are skipped
/// with a warning.
///
/// # Errors
///
/// Returns [`ZoneError`] if the text is not `GeoJSON`, is a bare geometry,
/// or yields no usable zone.
pub fn parse_zones(text: &str, name_field: &str) -> Result<Vec<ZoneFeature>, ZoneError> {
    let features = match text.parse::<GeoJson>()? {
        GeoJson::FeatureCollection(fc) => fc.features,
        GeoJson::Feature(f) => vec![f],
        GeoJson::Geometry(_) => {
            return Err(ZoneError::Invalid {
                message: "expected a Feature or FeatureCollection, not a bare geometry"
                    .to_string(),
            });
        }
    };

    let total = features.len();
    let mut zones = Vec::with_capacity(total);

    for (i, feature) in features.iter().enumerate() {
        match normalize_feature(feature, name_field) {
            Ok(zone) => zones.push(zone),
            Err(reason) => log::warn!("Skipping feature {i}: {reason}"),
        }
    }

    if zones.is_empty() {
        return Err(ZoneError::Invalid {
            message: format!("none of the {total} features is a named polygon"),
        });
    }

    Ok(zones)
}

fn normalize_feature(feature: &Feature, name_field: &str) -> Result<ZoneFeature, String> {
    let name = feature
        .property(name_field)
        .and_then(|v| match v {
            serde_json::Value::String(s) => Some(s.trim().to_string()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("no `{name_field}` property"))?;

    let geometry = feature
        .geometry
        .as_ref()
        .ok_or_else(|| format!("zone {name} has no geometry"))?;

    match geo::Geometry::<f64>::try_from(geometry.clone()) {
        Ok(geo::Geometry::Polygon(_) | geo::Geometry::MultiPolygon(_)) => {}
        Ok(_) => return Err(format!("zone {name} is not a polygon")),
        Err(e) => return Err(format!("zone {name} has invalid geometry: {e}")),
    }

    let geometry_json =
        serde_json::to_string(geometry).map_err(|e| format!("zone {name}: {e}"))?;

    Ok(ZoneFeature {
        name,
        geometry_json,
    })
}

/// Reads a `GeoJSON` file and stores every zone in it, replacing zones with
/// the same name. Returns the number of zones stored.
///
/// # Errors
///
/// Returns [`ZoneError`] if the file cannot be read or parsed, or a zone
/// cannot be stored.
pub async fn import_file(
    db: &dyn Database,
    path: &Path,
    name_field: &str,
) -> Result<u64, ZoneError> {
    let text = std::fs::read_to_string(path)?;
    let zones = parse_zones(&text, name_field)?;
    log::info!("Importing {} zones from {}", zones.len(), path.display());

    let mut stored = 0u64;
    for zone in &zones {
        let id = vespawatch_database::zones::upsert_zone(db, &zone.name, &zone.geometry_json)
            .await?;
        log::debug!("Stored zone {} as {id}", zone.name);
        stored += 1;
    }

    Ok(stored)
}

#[cfg(test)]
mod tests {
    use super::*;

    const COLLECTION: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": {"name": "Zone Gent", "code": 4000},
                "geometry": {"type": "Polygon", "coordinates": [[[3.6,51.0],[3.8,51.0],[3.8,51.2],[3.6,51.0]]]}
            },
            {
                "type": "Feature",
                "properties": {"name": "  "},
                "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,0]]]}
            },
            {
                "type": "Feature",
                "properties": {"name": "Just a point"},
                "geometry": {"type": "Point", "coordinates": [4.0, 51.0]}
            },
            {
                "type": "Feature",
                "properties": {"name": "Zone Rand"},
                "geometry": {"type": "MultiPolygon", "coordinates": [[[[4,51],[5,51],[5,52],[4,51]]]]}
            }
        ]
    }"#;

    #[test]
    fn keeps_named_polygons_only() {
        let zones = parse_zones(COLLECTION, DEFAULT_NAME_FIELD).unwrap();
        let names: Vec<&str> = zones.iter().map(|z| z.name.as_str()).collect();
        assert_eq!(names, vec!["Zone Gent", "Zone Rand"]);
        assert!(zones[0].geometry_json.contains("\"Polygon\""));
    }

    #[test]
    fn custom_name_field_accepts_numbers() {
        let zones = parse_zones(COLLECTION, "code").unwrap();
        assert_eq!(zones.len(), 1);
        assert_eq!(zones[0].name, "4000");
    }

    #[test]
    fn bare_geometry_is_rejected() {
        let err = parse_zones(r#"{"type":"Polygon","coordinates":[[[0,0],[1,0],[1,1],[0,0]]]}"#, "name")
            .unwrap_err();
        assert!(matches!(err, ZoneError::Invalid { .. }));
    }

    #[test]
    fn no_usable_features_is_an_error() {
        let text = r#"{"type":"FeatureCollection","features":[]}"#;
        assert!(parse_zones(text, "name").is_err());
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(matches!(
            parse_zones("{not json", "name"),
            Err(ZoneError::GeoJson(_))
        ));
    }
}
