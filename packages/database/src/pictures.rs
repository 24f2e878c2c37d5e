//! Uploaded picture storage and queries.
//!
//! Files are written under the media root first; the row is attached to an
//! observation later, when the observation form is submitted with the
//! returned picture IDs.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use moosicbox_json_utils::database::ToValue as _;
use switchy_database::{Database, DatabaseValue, Row};
use vespawatch_database_models::PictureRow;
use vespawatch_observation_models::{Choice as _, ObservationKind};

use crate::DbError;
use crate::paths;
use crate::sql::utc;

fn picture_from_row(row: &Row) -> Result<PictureRow, DbError> {
    let kind_code: String = row.to_value("kind").unwrap_or_default();
    let kind = ObservationKind::from_code(&kind_code).ok_or_else(|| DbError::Conversion {
        message: format!("Unknown picture kind: {kind_code}"),
    })?;

    Ok(PictureRow {
        id: row.to_value("id").unwrap_or(0),
        kind,
        observation_id: row.to_value("observation_id").unwrap_or(None),
        path: row.to_value("path").unwrap_or_default(),
        created_at: utc(row.to_value("created_at").unwrap_or_default()),
    })
}

/// Writes an uploaded file below the media root and returns its path
/// relative to the root.
///
/// # Errors
///
/// Returns [`DbError::Io`] if the directory or file cannot be written.
async fn save_picture_file(
    media_root: &Path,
    kind: ObservationKind,
    file_name: &str,
    bytes: &[u8],
) -> Result<String, DbError> {
    let dir = paths::picture_dir(media_root, kind);
    paths::ensure_dir(&dir)?;
    tokio::fs::write(dir.join(file_name), bytes).await?;
    Ok(paths::picture_relative_path(kind, file_name))
}

/// Stores an upload: writes the file, then records the row. The file is
/// removed again when the row cannot be recorded. Returns the picture ID and
/// the relative path.
///
/// # Errors
///
/// Returns [`DbError`] if the file cannot be written or the row inserted.
pub async fn store_upload(
    db: &dyn Database,
    media_root: &Path,
    kind: ObservationKind,
    file_name: &str,
    bytes: &[u8],
) -> Result<(i64, String), DbError> {
    write_then_record(media_root, kind, file_name, bytes, |path| async move {
        insert_picture(db, kind, &path).await
    })
    .await
}

async fn write_then_record<F, Fut>(
    media_root: &Path,
    kind: ObservationKind,
    file_name: &str,
    bytes: &[u8],
    record: F,
) -> Result<(i64, String), DbError>
where
    F: FnOnce(String) -> Fut,
    Fut: Future<Output = Result<i64, DbError>>,
{
    let path = save_picture_file(media_root, kind, file_name, bytes).await?;

    match record(path.clone()).await {
        Ok(id) => Ok((id, path)),
        Err(e) => {
            remove_media_file(media_root, &path).await;
            Err(e)
        }
    }
}

/// Where a stored picture path lives on disk. Remote iNaturalist photos
/// have no local file.
fn local_file(media_root: &Path, path: &str) -> Option<PathBuf> {
    if path.starts_with("http://") || path.starts_with("https://") {
        None
    } else {
        Some(media_root.join(path.trim_start_matches('/')))
    }
}

async fn remove_media_file(media_root: &Path, path: &str) {
    let Some(file) = local_file(media_root, path) else {
        return;
    };
    match tokio::fs::remove_file(&file).await {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
            log::warn!("Could not remove {}: {e}", file.display());
        }
        _ => {}
    }
}

const PURGE_ORPHANS: &str = "DELETE FROM pictures
 WHERE observation_id IS NULL AND created_at < $1
 RETURNING path";

/// Deletes pictures that were uploaded before `uploaded_before` but never
/// attached to an observation, along with their files. Returns the number
/// of rows removed.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn purge_orphans(
    db: &dyn Database,
    media_root: &Path,
    uploaded_before: DateTime<Utc>,
) -> Result<u64, DbError> {
    let rows = db
        .query_raw_params(
            PURGE_ORPHANS,
            &[DatabaseValue::DateTime(uploaded_before.naive_utc())],
        )
        .await?;

    for row in &rows {
        let path: String = row.to_value("path").unwrap_or_default();
        remove_media_file(media_root, &path).await;
    }

    Ok(rows.len() as u64)
}

/// Records an uploaded picture that is not yet attached to an observation.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
async fn insert_picture(
    db: &dyn Database,
    kind: ObservationKind,
    path: &str,
) -> Result<i64, DbError> {
    let rows = db
        .query_raw_params(
            "INSERT INTO pictures (kind, path) VALUES ($1, $2) RETURNING id",
            &[
                DatabaseValue::String(kind.code().to_string()),
                DatabaseValue::String(path.to_string()),
            ],
        )
        .await?;
    crate::returned_id(&rows, "picture")
}

/// Records a remote picture (an iNaturalist photo URL) for an observation,
/// unless it is already known.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn add_remote_picture(
    db: &dyn Database,
    kind: ObservationKind,
    observation_id: i64,
    url: &str,
) -> Result<u64, DbError> {
    Ok(db
        .exec_raw_params(
            "INSERT INTO pictures (kind, observation_id, path)
             SELECT $1::TEXT, $2::BIGINT, $3::TEXT
             WHERE NOT EXISTS (
                SELECT 1 FROM pictures WHERE observation_id = $2 AND path = $3
             )",
            &[
                DatabaseValue::String(kind.code().to_string()),
                DatabaseValue::Int64(observation_id),
                DatabaseValue::String(url.to_string()),
            ],
        )
        .await?)
}

/// Fetches picture metadata.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn get_picture(db: &dyn Database, id: i64) -> Result<Option<PictureRow>, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT id, kind, observation_id, path, created_at FROM pictures WHERE id = $1",
            &[DatabaseValue::Int64(id)],
        )
        .await?;
    rows.first().map(picture_from_row).transpose()
}

/// Attaches unattached pictures of the matching kind to an observation.
///
/// Pictures already attached elsewhere, or uploaded for the other kind, are
/// left untouched. Returns the number attached.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn attach_pictures(
    db: &dyn Database,
    kind: ObservationKind,
    observation_id: i64,
    picture_ids: &[i64],
) -> Result<u64, DbError> {
    let mut attached = 0u64;

    for &picture_id in picture_ids {
        attached += db
            .exec_raw_params(
                "UPDATE pictures SET observation_id = $1
                 WHERE id = $2 AND kind = $3 AND observation_id IS NULL",
                &[
                    DatabaseValue::Int64(observation_id),
                    DatabaseValue::Int64(picture_id),
                    DatabaseValue::String(kind.code().to_string()),
                ],
            )
            .await?;
    }

    if attached < picture_ids.len() as u64 {
        log::warn!(
            "Attached {attached} of {} pictures to observation {observation_id}",
            picture_ids.len()
        );
    }

    Ok(attached)
}
