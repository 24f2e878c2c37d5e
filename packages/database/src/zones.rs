//! Fire-brigade zone storage.
//!
//! Boundaries are written with `ST_GeomFromGeoJSON` and read back with
//! `ST_AsGeoJSON`, so the Rust side only ever handles `GeoJSON` text.

use moosicbox_json_utils::database::ToValue as _;
use switchy_database::{Database, DatabaseValue};
use vespawatch_database_models::{ZoneGeometryRow, ZoneRow};

use crate::DbError;

/// Inserts or replaces a zone boundary by name. Polygons are promoted to
/// multipolygons.
///
/// # Errors
///
/// Returns [`DbError`] if the geometry is rejected or the database operation
/// fails.
pub async fn upsert_zone(db: &dyn Database, name: &str, geojson: &str) -> Result<i64, DbError> {
    let rows = db
        .query_raw_params(
            "INSERT INTO zones (name, mpolygon)
             VALUES ($1, ST_Multi(ST_SetSRID(ST_GeomFromGeoJSON($2), 4326)))
             ON CONFLICT (name) DO UPDATE SET mpolygon = EXCLUDED.mpolygon
             RETURNING id",
            &[
                DatabaseValue::String(name.to_string()),
                DatabaseValue::String(geojson.to_string()),
            ],
        )
        .await?;
    crate::returned_id(&rows, "zone")
}

/// Lists zones by name.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn list_zones(db: &dyn Database) -> Result<Vec<ZoneRow>, DbError> {
    let rows = db
        .query_raw_params("SELECT id, name FROM zones ORDER BY name", &[])
        .await?;

    Ok(rows
        .iter()
        .map(|row| ZoneRow {
            id: row.to_value("id").unwrap_or(0),
            name: row.to_value("name").unwrap_or_default(),
        })
        .collect())
}

/// Lists zones with their boundaries, for building an in-memory index.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn list_zone_geometries(db: &dyn Database) -> Result<Vec<ZoneGeometryRow>, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT id, name, ST_AsGeoJSON(mpolygon) AS geojson FROM zones ORDER BY id",
            &[],
        )
        .await?;

    Ok(rows
        .iter()
        .map(|row| ZoneGeometryRow {
            id: row.to_value("id").unwrap_or(0),
            name: row.to_value("name").unwrap_or_default(),
            geojson: row.to_value("geojson").unwrap_or_default(),
        })
        .collect())
}

/// Finds a zone by exact name.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn get_zone_by_name(db: &dyn Database, name: &str) -> Result<Option<ZoneRow>, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT id, name FROM zones WHERE name = $1",
            &[DatabaseValue::String(name.to_string())],
        )
        .await?;

    Ok(rows.first().map(|row| ZoneRow {
        id: row.to_value("id").unwrap_or(0),
        name: row.to_value("name").unwrap_or_default(),
    }))
}

/// Finds the zone that covers a point.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn zone_for_point(
    db: &dyn Database,
    latitude: f64,
    longitude: f64,
) -> Result<Option<ZoneRow>, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT id, name FROM zones
             WHERE ST_Covers(mpolygon, ST_SetSRID(ST_MakePoint($1, $2), 4326))
             ORDER BY id LIMIT 1",
            &[DatabaseValue::Real64(longitude), DatabaseValue::Real64(latitude)],
        )
        .await?;

    Ok(rows.first().map(|row| ZoneRow {
        id: row.to_value("id").unwrap_or(0),
        name: row.to_value("name").unwrap_or_default(),
    }))
}
