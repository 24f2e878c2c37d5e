//! User accounts and login sessions.

use chrono::{DateTime, Utc};
use moosicbox_json_utils::database::ToValue as _;
use switchy_database::{Database, DatabaseValue, Row};
use vespawatch_database_models::{NewUser, UserRow};

use crate::DbError;
use crate::sql::{opt_i64, opt_string};

const SELECT_USERS: &str = "SELECT u.id, u.username, u.email, u.password_hash,
        u.is_active, u.is_staff, u.is_superuser, u.zone_id
 FROM users u";

fn user_from_row(row: &Row) -> UserRow {
    UserRow {
        id: row.to_value("id").unwrap_or(0),
        username: row.to_value("username").unwrap_or_default(),
        email: row.to_value("email").unwrap_or(None),
        password_hash: row.to_value("password_hash").unwrap_or_default(),
        is_active: row.to_value("is_active").unwrap_or(false),
        is_staff: row.to_value("is_staff").unwrap_or(false),
        is_superuser: row.to_value("is_superuser").unwrap_or(false),
        zone_id: row.to_value("zone_id").unwrap_or(None),
    }
}

/// Creates a user.
///
/// # Errors
///
/// Returns [`DbError::Conflict`] if the username is taken, or [`DbError`] if
/// the database operation fails.
pub async fn insert_user(db: &dyn Database, user: &NewUser) -> Result<i64, DbError> {
    let rows = db
        .query_raw_params(
            "INSERT INTO users (username, email, password_hash, is_staff, is_superuser, zone_id)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (username) DO NOTHING
             RETURNING id",
            &[
                DatabaseValue::String(user.username.clone()),
                opt_string(user.email.as_deref()),
                DatabaseValue::String(user.password_hash.clone()),
                DatabaseValue::Bool(user.is_staff),
                DatabaseValue::Bool(user.is_superuser),
                opt_i64(user.zone_id),
            ],
        )
        .await?;

    if rows.is_empty() {
        return Err(DbError::Conflict {
            message: format!("User {} already exists", user.username),
        });
    }

    crate::returned_id(&rows, "user")
}

/// Looks up a user by login name.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn get_user_by_username(
    db: &dyn Database,
    username: &str,
) -> Result<Option<UserRow>, DbError> {
    let rows = db
        .query_raw_params(
            &format!("{SELECT_USERS} WHERE u.username = $1"),
            &[DatabaseValue::String(username.to_string())],
        )
        .await?;
    Ok(rows.first().map(user_from_row))
}

/// Replaces a user's contact email.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn update_email(
    db: &dyn Database,
    user_id: i64,
    email: Option<&str>,
) -> Result<u64, DbError> {
    Ok(db
        .exec_raw_params(
            "UPDATE users SET email = $1 WHERE id = $2",
            &[opt_string(email), DatabaseValue::Int64(user_id)],
        )
        .await?)
}

/// Creates a session for a user.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn create_session(
    db: &dyn Database,
    token: &str,
    user_id: i64,
    expires_at: DateTime<Utc>,
) -> Result<(), DbError> {
    db.exec_raw_params(
        "INSERT INTO sessions (token, user_id, expires_at) VALUES ($1, $2, $3)",
        &[
            DatabaseValue::String(token.to_string()),
            DatabaseValue::Int64(user_id),
            DatabaseValue::DateTime(expires_at.naive_utc()),
        ],
    )
    .await?;
    Ok(())
}

/// Resolves a session token to its active user. Expired sessions and
/// inactive users resolve to `None`.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn get_session_user(
    db: &dyn Database,
    token: &str,
    now: DateTime<Utc>,
) -> Result<Option<UserRow>, DbError> {
    let rows = db
        .query_raw_params(
            &format!(
                "{SELECT_USERS}
                 JOIN sessions s ON s.user_id = u.id
                 WHERE s.token = $1 AND s.expires_at > $2 AND u.is_active = TRUE"
            ),
            &[
                DatabaseValue::String(token.to_string()),
                DatabaseValue::DateTime(now.naive_utc()),
            ],
        )
        .await?;
    Ok(rows.first().map(user_from_row))
}

/// Deletes a session.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn delete_session(db: &dyn Database, token: &str) -> Result<u64, DbError> {
    Ok(db
        .exec_raw_params(
            "DELETE FROM sessions WHERE token = $1",
            &[DatabaseValue::String(token.to_string())],
        )
        .await?)
}

/// Removes expired sessions.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn purge_expired_sessions(db: &dyn Database, now: DateTime<Utc>) -> Result<u64, DbError> {
    let purged = db
        .exec_raw_params(
            "DELETE FROM sessions WHERE expires_at <= $1",
            &[DatabaseValue::DateTime(now.naive_utc())],
        )
        .await?;
    if purged > 0 {
        log::debug!("Purged {purged} expired sessions");
    }
    Ok(purged)
}
