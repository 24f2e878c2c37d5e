#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Database connection, queries, and migrations for Vespa-Watch.
//!
//! Uses `switchy_database` raw parameterized queries against `PostGIS` and
//! `switchy_schema` for embedded SQL migrations. Observation points are
//! stored as `geography(Point, 4326)`; zones as `geometry(MultiPolygon, 4326)`.

pub mod actions;
pub mod db;
pub mod observations;
pub mod paths;
pub mod pictures;
pub mod sql;
pub mod taxa;
pub mod users;
pub mod zones;

use include_dir::{Dir, include_dir};
use switchy_database::Database;
use switchy_schema::discovery::embedded::EmbeddedMigrationSource;
use switchy_schema::runner::MigrationRunner;

/// Embedded SQL migrations from the `migrations/` directory.
static MIGRATIONS_DIR: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/../../migrations");

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// Database query error.
    #[error("Database error: {0}")]
    Database(#[from] switchy_database::DatabaseError),

    /// Migration error.
    #[error("Migration error: {0}")]
    Migration(#[from] switchy_schema::MigrationError),

    /// Filesystem error while storing media.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Data conversion error.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },

    /// A uniqueness or relationship rule was violated.
    #[error("Conflict: {message}")]
    Conflict {
        /// Description of the conflict.
        message: String,
    },
}

/// Runs all pending database migrations.
///
/// # Errors
///
/// Returns [`DbError`] if any migration fails to apply.
pub async fn run_migrations(db: &dyn Database) -> Result<(), DbError> {
    let source = EmbeddedMigrationSource::new(&MIGRATIONS_DIR);
    let runner = MigrationRunner::new(Box::new(source));
    runner.run(db).await?;
    log::info!("Database migrations completed successfully");
    Ok(())
}

/// Reads the `id` column of the first returned row.
pub(crate) fn returned_id(rows: &[switchy_database::Row], what: &str) -> Result<i64, DbError> {
    use moosicbox_json_utils::database::ToValue as _;

    let row = rows.first().ok_or_else(|| DbError::Conversion {
        message: format!("No id returned for {what}"),
    })?;

    row.to_value("id").map_err(|e| DbError::Conversion {
        message: format!("Failed to parse {what} id: {e}"),
    })
}
