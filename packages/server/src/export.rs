//! Staff-only CSV exports.

use actix_web::http::header;
use actix_web::{HttpRequest, HttpResponse, web};
use vespawatch_database::{actions, observations};
use vespawatch_database_models::{ManagementActionRow, ObservationQuery, ObservationRow, Scope};
use vespawatch_observation_models::{Choice, ObservationKind};

use crate::AppState;
use crate::auth;
use crate::error::ApiError;

const COMMON_HEADERS: &[&str] = &[
    "pk",
    "Observation time",
    "Species",
    "Latitude",
    "Longitude",
    "Zone",
    "Originates in Vespawatch",
    "iNaturalist ID",
    "iNaturalist species",
    "iNaturalist vv confirmed",
    "Created at",
    "Comments",
];

const NEST_HEADERS: &[&str] = &["Height", "Size", "Duplicate of (pk)", "Management action"];

const INDIVIDUAL_HEADERS: &[&str] = &["Individual count", "Behaviour"];

const ACTION_HEADERS: &[&str] = &[
    "Nest (pk)",
    "Date and time nest removal",
    "User",
    "Outcome",
    "Time on site (in minutes)",
    "Number of people",
    "Method",
    "Product",
    "Aftercare",
    "Nest site",
    "Nest type",
    "Problems",
    "Comments",
];

fn opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn label<C: Choice>(value: Option<C>) -> String {
    value.map(|c| c.label().to_string()).unwrap_or_default()
}

fn into_bytes(writer: csv::Writer<Vec<u8>>) -> Result<Vec<u8>, ApiError> {
    writer
        .into_inner()
        .map_err(|e| ApiError::Io(e.into_error()))
}

/// Writes observations of one kind as CSV, header row first.
///
/// # Errors
///
/// Returns [`ApiError::Csv`] if a record cannot be written.
pub fn observations_csv(kind: ObservationKind, rows: &[ObservationRow]) -> Result<Vec<u8>, ApiError> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    let specific = match kind {
        ObservationKind::Nest => NEST_HEADERS,
        ObservationKind::Individual => INDIVIDUAL_HEADERS,
    };
    writer.write_record(COMMON_HEADERS.iter().chain(specific))?;

    for row in rows {
        let mut record = vec![
            row.id.to_string(),
            row.observation_time.to_rfc3339(),
            row.species_name(),
            row.latitude.to_string(),
            row.longitude.to_string(),
            row.zone_name.clone().unwrap_or_default(),
            row.originates_in_vespawatch.to_string(),
            opt(row.inaturalist_id),
            row.inaturalist_species.clone().unwrap_or_default(),
            opt(row.inat_vv_confirmed),
            row.created_at.to_rfc3339(),
            row.comments.clone(),
        ];

        match kind {
            ObservationKind::Nest => {
                record.push(label(row.nest_height));
                record.push(label(row.nest_size));
                record.push(opt(row.duplicate_of_id));
                record.push(label(row.action_result));
            }
            ObservationKind::Individual => {
                record.push(opt(row.individual_count));
                record.push(label(row.behaviour));
            }
        }

        writer.write_record(&record)?;
    }

    into_bytes(writer)
}

/// Writes management actions as CSV, header row first.
///
/// # Errors
///
/// Returns [`ApiError::Csv`] if a record cannot be written.
pub fn actions_csv(rows: &[ManagementActionRow]) -> Result<Vec<u8>, ApiError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(ACTION_HEADERS)?;

    for row in rows {
        let problems = row
            .problems
            .iter()
            .map(|p| p.label())
            .collect::<Vec<_>>()
            .join("; ");

        writer.write_record([
            row.nest_id.to_string(),
            row.action_time.to_rfc3339(),
            row.username.clone().unwrap_or_default(),
            row.result.label().to_string(),
            opt(row.duration_minutes),
            opt(row.number_of_persons),
            label(row.method),
            label(row.product),
            label(row.aftercare),
            label(row.nest_site),
            label(row.nest_type),
            problems,
            row.comments.clone(),
        ])?;
    }

    into_bytes(writer)
}

fn attachment(filename: &str, bytes: Vec<u8>) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/csv")
        .insert_header((
            header::CONTENT_DISPOSITION,
            format!(r#"attachment; filename="{filename}""#),
        ))
        .body(bytes)
}

async fn export_observations(
    req: &HttpRequest,
    state: &AppState,
    kind: ObservationKind,
    filename: &str,
) -> Result<HttpResponse, ApiError> {
    auth::require_staff(req, state.db.as_ref()).await?;

    let query = ObservationQuery {
        kind: Some(kind),
        ..ObservationQuery::default()
    };
    let rows = observations::list_observations(state.db.as_ref(), &query, Scope::Everything).await?;
    log::info!("Exporting {} {} observations", rows.len(), kind.subject());

    Ok(attachment(filename, observations_csv(kind, &rows)?))
}

/// `GET /api/csv_export/nests/`
pub async fn export_nests(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    export_observations(&req, &state, ObservationKind::Nest, "nests.csv").await
}

/// `GET /api/csv_export/individuals/`
pub async fn export_individuals(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    export_observations(&req, &state, ObservationKind::Individual, "individuals.csv").await
}

/// `GET /api/csv_export/management_actions/`
pub async fn export_actions(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    auth::require_staff(&req, state.db.as_ref()).await?;

    let rows = actions::list_actions(state.db.as_ref(), Scope::Everything).await?;
    log::info!("Exporting {} management actions", rows.len());

    Ok(attachment("management_actions.csv", actions_csv(&rows)?))
}
