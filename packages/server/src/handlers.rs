//! Health, configuration, zone lookup, and session endpoints.

use actix_web::cookie::{Cookie, SameSite, time};
use actix_web::{HttpRequest, HttpResponse, web};
use chrono::{Duration, Utc};
use vespawatch_database::{users, zones};
use vespawatch_server_models::forms::{LoginForm, ProfileForm};
use vespawatch_server_models::{ApiHealth, ApiUser, ApiZone, LoginResponse, ZoneLookupParams};

use crate::AppState;
use crate::auth::{self, SESSION_COOKIE};
use crate::error::ApiError;

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `GET /api/config`
pub async fn config(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(&state.js_config)
}

/// `GET /api/zone?lat=&lon=`
///
/// Answers from the in-memory index loaded at startup, and from the
/// database when the index has no zones yet.
pub async fn zone_lookup(
    state: web::Data<AppState>,
    params: web::Query<ZoneLookupParams>,
) -> Result<HttpResponse, ApiError> {
    if !(-90.0..=90.0).contains(&params.lat) || !(-180.0..=180.0).contains(&params.lon) {
        return Err(ApiError::BadRequest(
            "Coordinates out of range".to_string(),
        ));
    }

    let zone = if state.zone_index.is_empty() {
        zones::zone_for_point(state.db.as_ref(), params.lat, params.lon)
            .await?
            .map(ApiZone::from)
    } else {
        state
            .zone_index
            .lookup(params.lon, params.lat)
            .map(|(id, name)| ApiZone {
                id,
                name: name.to_string(),
            })
    };

    Ok(HttpResponse::Ok().json(serde_json::json!({ "zone": zone })))
}

/// `POST /api/login`
pub async fn login(
    state: web::Data<AppState>,
    form: web::Json<LoginForm>,
) -> Result<HttpResponse, ApiError> {
    let user = users::get_user_by_username(state.db.as_ref(), form.username.trim())
        .await?
        .filter(|u| u.is_active && auth::verify_password(&form.password, &u.password_hash));

    let Some(user) = user else {
        log::info!("Failed login for {:?}", form.username);
        return Err(ApiError::Unauthorized);
    };

    let token = auth::new_session_token();
    let days = state.settings.server.session_days.max(1);
    let expires_at = Utc::now() + Duration::days(days);
    users::create_session(state.db.as_ref(), &token, user.id, expires_at).await?;

    let cookie = Cookie::build(SESSION_COOKIE, token.clone())
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::days(days))
        .finish();

    log::info!("User {} logged in", user.username);
    Ok(HttpResponse::Ok().cookie(cookie).json(LoginResponse {
        token,
        expires_at,
        user: ApiUser::from(&user),
    }))
}

/// `POST /api/logout`
pub async fn logout(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    if let Some(token) = auth::session_token(&req) {
        users::delete_session(state.db.as_ref(), &token).await?;
    }

    let mut removal = Cookie::build(SESSION_COOKIE, "").path("/").finish();
    removal.make_removal();

    Ok(HttpResponse::Ok()
        .cookie(removal)
        .json(serde_json::json!({ "result": "OK" })))
}

/// `GET /api/me`
pub async fn me(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let user = auth::current_user(&req, state.db.as_ref())
        .await?
        .ok_or(ApiError::Unauthorized)?;
    Ok(HttpResponse::Ok().json(ApiUser::from(&user)))
}

/// `PUT /api/me`
///
/// Lets a logged-in user change their own contact email.
pub async fn update_me(
    req: HttpRequest,
    state: web::Data<AppState>,
    form: web::Json<ProfileForm>,
) -> Result<HttpResponse, ApiError> {
    let mut user = auth::current_user(&req, state.db.as_ref())
        .await?
        .ok_or(ApiError::Unauthorized)?;

    let email = form.validate().map_err(ApiError::Validation)?;
    users::update_email(state.db.as_ref(), user.id, email.as_deref()).await?;
    user.email = email;

    log::info!("User {} updated their profile", user.username);
    Ok(HttpResponse::Ok().json(ApiUser::from(&user)))
}

#[cfg(test)]
mod tests {
    use actix_web::{App, test};

    use super::*;

    #[actix_web::test]
    async fn health_reports_version() {
        let app =
            test::init_service(App::new().route("/api/health", web::get().to(health))).await;

        let req = test::TestRequest::get().uri("/api/health").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["healthy"], true);
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }
}
