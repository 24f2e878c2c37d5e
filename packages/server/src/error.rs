//! API error type and its JSON rendering.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use vespawatch_database::DbError;
use vespawatch_server_models::forms::FieldErrors;

/// Errors returned by the API handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The requested record does not exist or is outside the viewer's zone.
    #[error("{0}")]
    NotFound(String),

    /// The endpoint requires a login.
    #[error("Authentication required")]
    Unauthorized,

    /// The viewer is logged in but may not do this.
    #[error("Forbidden")]
    Forbidden,

    /// The request itself is malformed.
    #[error("{0}")]
    BadRequest(String),

    /// An observation or picture form failed validation.
    #[error("Invalid form")]
    Validation(FieldErrors),

    /// A management action form failed validation.
    #[error("Invalid management action")]
    ActionValidation(FieldErrors),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// File I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV serialization failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ApiError {
    pub fn not_found(what: &str, id: i64) -> Self {
        Self::NotFound(format!("{what} {id} not found"))
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::BadRequest(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::ActionValidation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Database(_) | Self::Io(_) | Self::Csv(_) | Self::Json(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            Self::Validation(errors) => serde_json::json!({ "errors": errors }),
            Self::ActionValidation(errors) => {
                serde_json::json!({ "result": "NOTOK", "errors": errors })
            }
            Self::Database(_) | Self::Io(_) | Self::Csv(_) | Self::Json(_) => {
                log::error!("{self}");
                serde_json::json!({ "error": "Internal server error" })
            }
            _ => serde_json::json!({ "error": self.to_string() }),
        };

        HttpResponse::build(self.status_code()).json(body)
    }
}

#[cfg(test)]
mod tests {
    use actix_web::body::to_bytes;

    use super::*;

    async fn body_json(err: &ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.error_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body()).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[actix_web::test]
    async fn action_validation_is_422_notok() {
        let mut errors = FieldErrors::new();
        errors.add("result", "This field is required.");

        let (status, json) = body_json(&ApiError::ActionValidation(errors)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json["result"], "NOTOK");
        assert_eq!(json["errors"]["result"][0], "This field is required.");
    }

    #[actix_web::test]
    async fn observation_validation_is_400() {
        let mut errors = FieldErrors::new();
        errors.add("latitude", "This field is required.");

        let (status, json) = body_json(&ApiError::Validation(errors)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json.get("result").is_none());
        assert_eq!(json["errors"]["latitude"][0], "This field is required.");
    }

    #[actix_web::test]
    async fn not_found_and_auth_errors() {
        let (status, json) = body_json(&ApiError::not_found("Nest", 9)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "Nest 9 not found");

        assert_eq!(
            ApiError::Unauthorized.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(ApiError::Forbidden.status_code(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn internal_errors_hide_details() {
        let err = ApiError::Io(std::io::Error::other("disk on fire"));
        let (status, json) = body_json(&err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "Internal server error");
    }
}
