#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Fire-brigade zones.
//!
//! Zone polygons are imported from `GeoJSON` files into `PostGIS`, where
//! they drive access scoping for fire-brigade users. The same polygons can
//! be loaded into an in-memory R-tree for point lookups that do not need a
//! database round trip.

pub mod import;
pub mod index;

use thiserror::Error;

pub use index::ZoneIndex;

/// Errors that can occur during zone operations.
#[derive(Debug, Error)]
pub enum ZoneError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] vespawatch_database::DbError),

    /// Reading the input file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The input is not valid `GeoJSON`.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The input parsed but does not describe usable zones.
    #[error("Invalid zone data: {message}")]
    Invalid {
        /// Description of what went wrong.
        message: String,
    },
}
