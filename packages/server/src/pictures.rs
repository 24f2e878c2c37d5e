//! Picture upload and metadata endpoints.
//!
//! The upload widget posts the raw image bytes with the original file name
//! in `?filename=`. The returned `imageId` is later sent with the
//! observation form, which attaches the picture.

use actix_web::{HttpResponse, web};
use vespawatch_database::{paths, pictures};
use vespawatch_observation_models::ObservationKind;
use vespawatch_server_models::forms::FieldErrors;
use vespawatch_server_models::{ApiPicture, PictureSaved, PictureUploadParams, picture_type};

use crate::AppState;
use crate::error::ApiError;

/// Largest accepted upload.
pub const MAX_PICTURE_BYTES: usize = 10 * 1024 * 1024;

/// Extensions accepted for uploads.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "heic"];

/// Checks an upload, returning its lowercase extension.
///
/// # Errors
///
/// Returns the field errors for the `image` field.
pub fn validate_upload(filename: Option<&str>, bytes: &[u8]) -> Result<String, FieldErrors> {
    let mut errors = FieldErrors::new();

    if bytes.is_empty() {
        errors.add("image", "The submitted file is empty.");
    } else if bytes.len() > MAX_PICTURE_BYTES {
        errors.add("image", "The submitted file is too large.");
    }

    let ext = filename
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    if !IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        errors.add(
            "image",
            "Upload a valid image. The file you uploaded was either not an image or a corrupted image.",
        );
    }

    errors.into_result(ext)
}

async fn save(
    state: &AppState,
    kind: ObservationKind,
    params: &PictureUploadParams,
    body: &[u8],
) -> Result<HttpResponse, ApiError> {
    let original = params.filename.as_deref().unwrap_or_default();
    validate_upload(Some(original), body).map_err(ApiError::Validation)?;

    let file_name = paths::unique_file_name(original, &uuid::Uuid::new_v4().simple().to_string());
    let (image_id, path) =
        pictures::store_upload(state.db.as_ref(), &state.media_root, kind, &file_name, body)
            .await?;

    log::debug!("Stored {} picture {image_id} at {path}", kind.subject());
    Ok(HttpResponse::Ok().json(PictureSaved {
        image_id,
        picture_type: picture_type(kind),
        name: path,
    }))
}

/// `POST /api/individual_pictures/`
pub async fn upload_individual_picture(
    state: web::Data<AppState>,
    params: web::Query<PictureUploadParams>,
    body: web::Bytes,
) -> Result<HttpResponse, ApiError> {
    save(&state, ObservationKind::Individual, &params, &body).await
}

/// `POST /api/nest_pictures/`
pub async fn upload_nest_picture(
    state: web::Data<AppState>,
    params: web::Query<PictureUploadParams>,
    body: web::Bytes,
) -> Result<HttpResponse, ApiError> {
    save(&state, ObservationKind::Nest, &params, &body).await
}

/// `GET /api/pictures/{id}`
pub async fn get_picture(
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let picture = pictures::get_picture(state.db.as_ref(), id)
        .await?
        .ok_or_else(|| ApiError::not_found("Picture", id))?;
    Ok(HttpResponse::Ok().json(ApiPicture::from(picture)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_known_image_extensions() {
        assert_eq!(validate_upload(Some("Nest.JPG"), b"data").unwrap(), "jpg");
        assert_eq!(validate_upload(Some("a.b.webp"), b"data").unwrap(), "webp");
    }

    #[test]
    fn rejects_empty_and_non_images() {
        let errors = validate_upload(Some("x.png"), b"").unwrap_err();
        assert_eq!(errors.get("image").map(<[String]>::len), Some(1));

        let errors = validate_upload(Some("notes.txt"), b"data").unwrap_err();
        assert!(errors.get("image").is_some());

        let errors = validate_upload(None, b"data").unwrap_err();
        assert!(errors.get("image").is_some());
    }
}
