//! Management action endpoints. All of them require a login; zone users
//! only reach nests in their zone.

use actix_web::{HttpRequest, HttpResponse, web};
use vespawatch_database::{DbError, actions, observations};
use vespawatch_database_models::{ManagementActionRow, ObservationRow};
use vespawatch_observation_models::{Choice, ObservationKind};
use vespawatch_server_models::forms::{FieldErrors, ManagementActionForm};
use vespawatch_server_models::viewer::Viewer;
use vespawatch_server_models::{ActionIdParams, ActionSaved, ApiChoice, ApiManagementAction, choices};

use crate::AppState;
use crate::auth;
use crate::error::ApiError;

fn nest_error(message: &str) -> ApiError {
    let mut errors = FieldErrors::new();
    errors.add("nest", message);
    ApiError::ActionValidation(errors)
}

/// `GET /api/action_results` and the other choice lists.
pub async fn list_choices<C: Choice>() -> HttpResponse {
    let list: Vec<ApiChoice> = choices::<C>();
    HttpResponse::Ok().json(list)
}

/// Staff change any action, everyone else only the ones they recorded.
fn check_action_change(viewer: &Viewer, existing: &ManagementActionRow) -> Result<(), ApiError> {
    if viewer.can_change_action(existing) {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

/// A new action needs a visible nest to attach to.
fn check_nest_target(nest: Option<&ObservationRow>, nest_id: i64) -> Result<(), ApiError> {
    match nest {
        None => Err(nest_error(&format!(
            "Select a valid choice. {nest_id} is not one of the available choices."
        ))),
        Some(row) if row.kind != ObservationKind::Nest => Err(nest_error(
            "Management actions can only be attached to nests.",
        )),
        Some(_) => Ok(()),
    }
}

/// A nest holds at most one action; the unique index reports the second.
fn insert_error(error: DbError) -> ApiError {
    match error {
        DbError::Conflict { .. } => nest_error("Management action with this Nest already exists."),
        e => e.into(),
    }
}

/// `POST /api/save_management_action/`
///
/// Creates an action, or updates the one named by `actionId`.
pub async fn save_action(
    req: HttpRequest,
    state: web::Data<AppState>,
    form: web::Json<ManagementActionForm>,
) -> Result<HttpResponse, ApiError> {
    let viewer = auth::require_login(&req, state.db.as_ref()).await?;
    let db = state.db.as_ref();

    if let Some(action_id) = form.action_id {
        let existing = actions::get_action(db, action_id, viewer.scope())
            .await?
            .ok_or_else(|| ApiError::not_found("Management action", action_id))?;

        check_action_change(&viewer, &existing)?;

        let mut action = form
            .validate(existing.user_id)
            .map_err(ApiError::ActionValidation)?;
        action.nest_id = existing.nest_id;

        actions::update_action(db, action_id, &action).await?;
        log::info!("Management action {action_id} updated");

        return Ok(HttpResponse::Created().json(ActionSaved {
            result: "OK",
            action_id,
        }));
    }

    let action = form
        .validate(viewer.user_id)
        .map_err(ApiError::ActionValidation)?;

    let nest = observations::get_observation(db, action.nest_id, viewer.scope()).await?;
    check_nest_target(nest.as_ref(), action.nest_id)?;

    let action_id = actions::insert_action(db, &action)
        .await
        .map_err(insert_error)?;

    log::info!(
        "Management action {action_id} recorded for nest {}",
        action.nest_id
    );
    Ok(HttpResponse::Created().json(ActionSaved {
        result: "OK",
        action_id,
    }))
}

/// `GET /api/get_management_action/?action_id=`
pub async fn get_action(
    req: HttpRequest,
    state: web::Data<AppState>,
    params: web::Query<ActionIdParams>,
) -> Result<HttpResponse, ApiError> {
    let viewer = auth::require_login(&req, state.db.as_ref()).await?;

    let action = actions::get_action(state.db.as_ref(), params.action_id, viewer.scope())
        .await?
        .ok_or_else(|| ApiError::not_found("Management action", params.action_id))?;

    Ok(HttpResponse::Ok().json(ApiManagementAction::from(action)))
}

/// `DELETE /api/delete_management_action/?action_id=`
pub async fn delete_action(
    req: HttpRequest,
    state: web::Data<AppState>,
    params: web::Query<ActionIdParams>,
) -> Result<HttpResponse, ApiError> {
    let viewer = auth::require_login(&req, state.db.as_ref()).await?;

    let action = actions::get_action(state.db.as_ref(), params.action_id, viewer.scope())
        .await?
        .ok_or_else(|| ApiError::not_found("Management action", params.action_id))?;

    check_action_change(&viewer, &action)?;

    actions::delete_action(state.db.as_ref(), action.id).await?;
    log::info!("Management action {} deleted", action.id);

    Ok(HttpResponse::Ok().json(serde_json::json!({ "result": "OK" })))
}

#[cfg(test)]
mod tests {
    use actix_web::ResponseError as _;
    use actix_web::http::StatusCode;
    use actix_web::{App, test};
    use chrono::Utc;
    use vespawatch_database_models::ObserverInfo;
    use vespawatch_observation_models::{ActionProblem, ActionResult, NestType};
    use vespawatch_server_models::viewer::Role;

    use super::*;

    fn viewer(user_id: i64, role: Role) -> Viewer {
        Viewer {
            user_id: Some(user_id),
            username: Some(format!("user{user_id}")),
            role,
        }
    }

    fn action_by(user_id: i64) -> ManagementActionRow {
        ManagementActionRow {
            id: 7,
            nest_id: 3,
            user_id: Some(user_id),
            username: None,
            action_time: Utc::now(),
            duration_minutes: None,
            number_of_persons: None,
            comments: String::new(),
            result: ActionResult::SuccessfullyTreated,
            method: None,
            product: None,
            aftercare: None,
            nest_site: None,
            nest_type: None,
            problems: Vec::new(),
        }
    }

    fn observation(kind: ObservationKind) -> ObservationRow {
        ObservationRow {
            id: 3,
            kind,
            taxon_id: Some(1),
            taxon_name: None,
            location: String::new(),
            observation_time: Utc::now(),
            comments: String::new(),
            latitude: 50.9,
            longitude: 4.4,
            zone_id: Some(2),
            zone_name: None,
            inaturalist_id: None,
            inaturalist_species: None,
            inat_vv_confirmed: None,
            originates_in_vespawatch: true,
            observer: ObserverInfo::default(),
            individual_count: None,
            behaviour: None,
            nest_height: None,
            nest_size: None,
            duplicate_of_id: None,
            action_result: None,
            action_id: None,
            picture_paths: Vec::new(),
            created_at: Utc::now(),
        }
    }

    fn nest_field_error(error: &ApiError) -> Option<&[String]> {
        match error {
            ApiError::ActionValidation(errors) => errors.get("nest"),
            _ => None,
        }
    }

    #[::std::prelude::v1::test]
    fn zone_user_cannot_change_someone_elses_action() {
        let zone_user = viewer(5, Role::ZoneScoped { zone_id: 2 });

        let err = check_action_change(&zone_user, &action_by(9)).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);

        assert!(check_action_change(&zone_user, &action_by(5)).is_ok());
        assert!(check_action_change(&viewer(1, Role::Staff), &action_by(9)).is_ok());
    }

    #[::std::prelude::v1::test]
    fn second_action_on_a_nest_is_a_nest_error() {
        let err = insert_error(DbError::Conflict {
            message: "duplicate".to_string(),
        });
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            nest_field_error(&err),
            Some(&["Management action with this Nest already exists.".to_string()][..])
        );

        let other = insert_error(DbError::Conversion {
            message: "bad".to_string(),
        });
        assert_eq!(other.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[::std::prelude::v1::test]
    fn actions_attach_only_to_visible_nests() {
        let individual = observation(ObservationKind::Individual);
        let err = check_nest_target(Some(&individual), 3).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(nest_field_error(&err).is_some());

        let missing = check_nest_target(None, 44).unwrap_err();
        assert!(nest_field_error(&missing).unwrap()[0].contains("44"));

        let nest = observation(ObservationKind::Nest);
        assert!(check_nest_target(Some(&nest), 3).is_ok());
    }

    #[actix_web::test]
    async fn nest_type_choices_are_listed() {
        let app = test::init_service(App::new().route(
            "/api/action_nest_types",
            web::get().to(list_choices::<NestType>),
        ))
        .await;

        let req = test::TestRequest::get()
            .uri("/api/action_nest_types")
            .to_request();
        let body: Vec<ApiChoice> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.len(), NestType::all().len());
        assert_eq!(body[0].value, "ACTIVE_PRIMARY_NEST");
    }

    #[actix_web::test]
    async fn choice_endpoints_list_value_label_pairs() {
        let app = test::init_service(
            App::new()
                .route(
                    "/api/action_results",
                    web::get().to(list_choices::<ActionResult>),
                )
                .route(
                    "/api/action_problems",
                    web::get().to(list_choices::<ActionProblem>),
                ),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/action_results")
            .to_request();
        let body: Vec<ApiChoice> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.len(), ActionResult::all().len());
        assert_eq!(body[0].value, "ST");
        assert_eq!(body[0].label, "Successfully treated");

        let req = test::TestRequest::get()
            .uri("/api/action_problems")
            .to_request();
        let body: Vec<ApiChoice> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.len(), ActionProblem::all().len());
        assert!(body.iter().all(|c| !c.label.is_empty()));
    }
}
