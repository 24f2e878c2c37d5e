//! Observation endpoints.

use actix_web::{HttpRequest, HttpResponse, web};
use chrono::Utc;
use serde_json::Value;
use vespawatch_database::{observations, pictures};
use vespawatch_database_models::{ObservationQuery, ObservationRow};
use vespawatch_observation_models::ObservationKind;
use vespawatch_server_models::forms::ObservationForm;
use vespawatch_server_models::viewer::Viewer;
use vespawatch_server_models::{
    ApiObservation, IndividualsResponse, LightObservation, NestsResponse, ObservationQueryParams,
    ObservationSaved, ObservationsResponse,
};

use crate::AppState;
use crate::auth;
use crate::error::ApiError;

/// The database query for a list request, or a `400` with a `bbox` field
/// error.
fn list_query(
    params: &ObservationQueryParams,
    kind: Option<ObservationKind>,
) -> Result<ObservationQuery, ApiError> {
    params.to_query(kind).map_err(ApiError::Validation)
}

/// Rows in the representation the request asked for: `light` column
/// values, or full observations with or without picture URLs.
fn render(
    rows: Vec<ObservationRow>,
    viewer: &Viewer,
    params: &ObservationQueryParams,
) -> Result<Vec<Value>, ApiError> {
    if params.light {
        return rows
            .iter()
            .map(|row| serde_json::to_value(LightObservation::from(row)).map_err(ApiError::from))
            .collect();
    }

    rows.into_iter()
        .map(|row| {
            let obs = ApiObservation::from_row(row, viewer);
            let obs = if params.include_pictures {
                obs
            } else {
                obs.without_pictures()
            };
            serde_json::to_value(obs).map_err(ApiError::from)
        })
        .collect()
}

async fn list(
    req: &HttpRequest,
    state: &AppState,
    params: &ObservationQueryParams,
    kind: Option<ObservationKind>,
) -> Result<Vec<Value>, ApiError> {
    let query = list_query(params, kind)?;
    let viewer = auth::current_viewer(req, state.db.as_ref()).await?;
    let rows = observations::list_observations(state.db.as_ref(), &query, viewer.scope()).await?;
    render(rows, &viewer, params)
}

async fn get_visible(
    state: &AppState,
    viewer: &Viewer,
    id: i64,
    kind: Option<ObservationKind>,
) -> Result<ObservationRow, ApiError> {
    let what = kind.map_or("Observation", |k| match k {
        ObservationKind::Individual => "Individual",
        ObservationKind::Nest => "Nest",
    });

    observations::get_observation(state.db.as_ref(), id, viewer.scope())
        .await?
        .filter(|row| kind.is_none_or(|k| row.kind == k))
        .ok_or_else(|| ApiError::not_found(what, id))
}

/// Staff may change observations created here; anything pulled from
/// iNaturalist is `403`.
fn check_observation_change(viewer: &Viewer, row: &ObservationRow) -> Result<(), ApiError> {
    if viewer.can_change_observation(row) {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

/// `GET /api/observations`
pub async fn list_observations(
    req: HttpRequest,
    state: web::Data<AppState>,
    params: web::Query<ObservationQueryParams>,
) -> Result<HttpResponse, ApiError> {
    let observations = list(&req, &state, &params, None).await?;
    Ok(HttpResponse::Ok().json(ObservationsResponse { observations }))
}

/// `GET /api/individuals`
pub async fn list_individuals(
    req: HttpRequest,
    state: web::Data<AppState>,
    params: web::Query<ObservationQueryParams>,
) -> Result<HttpResponse, ApiError> {
    let individuals = list(&req, &state, &params, Some(ObservationKind::Individual)).await?;
    Ok(HttpResponse::Ok().json(IndividualsResponse { individuals }))
}

/// `GET /api/nests`
pub async fn list_nests(
    req: HttpRequest,
    state: web::Data<AppState>,
    params: web::Query<ObservationQueryParams>,
) -> Result<HttpResponse, ApiError> {
    let nests = list(&req, &state, &params, Some(ObservationKind::Nest)).await?;
    Ok(HttpResponse::Ok().json(NestsResponse { nests }))
}

async fn get_one(
    req: &HttpRequest,
    state: &AppState,
    id: i64,
    kind: ObservationKind,
) -> Result<HttpResponse, ApiError> {
    let viewer = auth::current_viewer(req, state.db.as_ref()).await?;
    let row = get_visible(state, &viewer, id, Some(kind)).await?;
    Ok(HttpResponse::Ok().json(ApiObservation::from_row(row, &viewer)))
}

/// `GET /api/individuals/{id}`
pub async fn get_individual(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    get_one(&req, &state, path.into_inner(), ObservationKind::Individual).await
}

/// `GET /api/nests/{id}`
pub async fn get_nest(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    get_one(&req, &state, path.into_inner(), ObservationKind::Nest).await
}

async fn create(
    state: &AppState,
    form: &ObservationForm,
    kind: ObservationKind,
) -> Result<HttpResponse, ApiError> {
    let new = form
        .validate(kind, Utc::now())
        .map_err(ApiError::Validation)?;

    let id = observations::insert_observation(state.db.as_ref(), &new).await?;
    if !form.image_ids.is_empty() {
        pictures::attach_pictures(state.db.as_ref(), kind, id, &form.image_ids).await?;
    }

    let zone = observations::get_observation(
        state.db.as_ref(),
        id,
        vespawatch_database_models::Scope::Everything,
    )
    .await?
    .and_then(|row| row.zone_name);

    log::info!("Created {} observation {id}", kind.subject());
    Ok(HttpResponse::Created().json(ObservationSaved { id, zone }))
}

/// `POST /api/individuals`
pub async fn create_individual(
    state: web::Data<AppState>,
    form: web::Json<ObservationForm>,
) -> Result<HttpResponse, ApiError> {
    create(&state, &form, ObservationKind::Individual).await
}

/// `POST /api/nests`
pub async fn create_nest(
    state: web::Data<AppState>,
    form: web::Json<ObservationForm>,
) -> Result<HttpResponse, ApiError> {
    create(&state, &form, ObservationKind::Nest).await
}

/// `PUT /api/observations/{id}`
///
/// Staff only. Observations pulled from iNaturalist cannot be edited.
pub async fn update_observation(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<i64>,
    form: web::Json<ObservationForm>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let viewer = auth::require_staff(&req, state.db.as_ref()).await?;
    let existing = get_visible(&state, &viewer, id, None).await?;

    check_observation_change(&viewer, &existing)?;

    let updated = form
        .validate_edit(&existing, Utc::now())
        .map_err(ApiError::Validation)?;

    observations::update_observation(state.db.as_ref(), id, &updated).await?;
    if !form.image_ids.is_empty() {
        pictures::attach_pictures(state.db.as_ref(), existing.kind, id, &form.image_ids).await?;
    }

    log::info!(
        "Observation {id} updated by {}",
        viewer.username.as_deref().unwrap_or("?")
    );
    Ok(HttpResponse::Ok().json(ObservationSaved {
        id,
        zone: existing.zone_name,
    }))
}

/// `DELETE /api/observations/{id}`
///
/// Staff only. Pictures and the management action go with it.
pub async fn delete_observation(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let viewer = auth::require_staff(&req, state.db.as_ref()).await?;
    let existing = get_visible(&state, &viewer, id, None).await?;

    check_observation_change(&viewer, &existing)?;

    observations::delete_observation(state.db.as_ref(), id).await?;

    log::info!(
        "Observation {id} deleted by {}",
        viewer.username.as_deref().unwrap_or("?")
    );
    Ok(HttpResponse::Ok().json(serde_json::json!({ "result": "OK" })))
}
