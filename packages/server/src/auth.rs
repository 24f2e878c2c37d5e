//! Password hashing and session lookup.
//!
//! Passwords are stored as Argon2id PHC strings
//! (`$argon2id$v=19$m=...,t=...,p=...$<salt>$<hash>`). Sessions are random
//! tokens stored in the `sessions` table and presented either as the
//! [`SESSION_COOKIE`] cookie or as an `Authorization: Bearer` header.

use actix_web::HttpRequest;
use actix_web::http::header;
use argon2::Argon2;
use argon2::password_hash::{
    self, PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString,
};
use chrono::Utc;
use switchy_database::Database;
use vespawatch_database::users;
use vespawatch_database_models::UserRow;
use vespawatch_server_models::viewer::Viewer;

use crate::error::ApiError;

/// Cookie carrying the session token.
pub const SESSION_COOKIE: &str = "vespawatch_session";

/// Hashes a password with a fresh random salt.
///
/// # Errors
///
/// Returns an error if Argon2 rejects the input, e.g. a password longer
/// than its maximum length.
pub fn hash_password(password: &str) -> Result<String, password_hash::Error> {
    let salt = SaltString::encode_b64(uuid::Uuid::new_v4().as_bytes())?;
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}

/// Checks a password against a stored hash. Unknown formats never match.
#[must_use]
pub fn verify_password(password: &str, stored: &str) -> bool {
    PasswordHash::new(stored).is_ok_and(|hash| {
        Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok()
    })
}

/// A new random session token.
#[must_use]
pub fn new_session_token() -> String {
    format!(
        "{}{}",
        uuid::Uuid::new_v4().simple(),
        uuid::Uuid::new_v4().simple()
    )
}

/// The session token of a request, from the bearer header or the cookie.
#[must_use]
pub fn session_token(req: &HttpRequest) -> Option<String> {
    let bearer = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());

    bearer
        .map(ToString::to_string)
        .or_else(|| req.cookie(SESSION_COOKIE).map(|c| c.value().to_string()))
}

/// The logged-in user of a request, if the session is valid.
///
/// # Errors
///
/// Returns [`ApiError::Database`] if the session lookup fails.
pub async fn current_user(
    req: &HttpRequest,
    db: &dyn Database,
) -> Result<Option<UserRow>, ApiError> {
    let Some(token) = session_token(req) else {
        return Ok(None);
    };
    Ok(users::get_session_user(db, &token, Utc::now()).await?)
}

/// The viewer of a request; anonymous without a valid session.
///
/// # Errors
///
/// Returns [`ApiError::Database`] if the session lookup fails.
pub async fn current_viewer(req: &HttpRequest, db: &dyn Database) -> Result<Viewer, ApiError> {
    Ok(current_user(req, db)
        .await?
        .as_ref()
        .map_or_else(Viewer::anonymous, Viewer::from_user))
}

/// Passes authenticated viewers, `401` otherwise.
///
/// # Errors
///
/// Returns [`ApiError::Unauthorized`] for anonymous viewers.
pub fn logged_in(viewer: Viewer) -> Result<Viewer, ApiError> {
    if viewer.is_authenticated() {
        Ok(viewer)
    } else {
        Err(ApiError::Unauthorized)
    }
}

/// Passes staff, `401` for anonymous viewers and `403` for everyone else.
///
/// # Errors
///
/// Returns [`ApiError::Unauthorized`] or [`ApiError::Forbidden`].
pub fn staff_only(viewer: Viewer) -> Result<Viewer, ApiError> {
    let viewer = logged_in(viewer)?;
    if viewer.is_staff() {
        Ok(viewer)
    } else {
        Err(ApiError::Forbidden)
    }
}

/// Like [`current_viewer`], but answers `401` for anonymous requests.
///
/// # Errors
///
/// Returns [`ApiError::Unauthorized`] without a valid session.
pub async fn require_login(req: &HttpRequest, db: &dyn Database) -> Result<Viewer, ApiError> {
    logged_in(current_viewer(req, db).await?)
}

/// Like [`require_login`], but answers `403` for non-staff users.
///
/// # Errors
///
/// Returns [`ApiError::Unauthorized`] or [`ApiError::Forbidden`].
pub async fn require_staff(req: &HttpRequest, db: &dyn Database) -> Result<Viewer, ApiError> {
    staff_only(current_viewer(req, db).await?)
}
