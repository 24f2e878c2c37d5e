#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web server for Vespa-Watch.
//!
//! Renders the HTML page shells, serves the JSON API used by the map,
//! form, and management widgets, and serves the static bundle and uploaded
//! media. Zone-scoped users are restricted through the [`Scope`] of their
//! [`Viewer`] in every observation query.
//!
//! [`Scope`]: vespawatch_database_models::Scope
//! [`Viewer`]: vespawatch_server_models::viewer::Viewer

mod actions;
pub mod auth;
pub mod error;
mod export;
mod handlers;
pub mod interactive;
mod observations;
mod pages;
mod pictures;

use std::path::PathBuf;
use std::sync::Arc;

use actix_cors::Cors;
use actix_files::Files;
use actix_web::{App, HttpServer, middleware, web};
use chrono::{Duration, Utc};
use switchy_database::Database;
use vespawatch_database::{db, paths, run_migrations, users};
use vespawatch_observation_models::{
    ActionAftercare, ActionMethod, ActionProblem, ActionProduct, ActionResult, NestSite, NestType,
};
use vespawatch_server_models::config::JsConfig;
use vespawatch_settings::Settings;
use vespawatch_zone::ZoneIndex;

/// Unattached uploads older than this are removed at startup.
pub const ORPHAN_PICTURE_HOURS: i64 = 24;

/// Shared application state.
pub struct AppState {
    /// `PostGIS` database connection.
    pub db: Arc<dyn Database>,
    /// Loaded settings.
    pub settings: Arc<Settings>,
    /// Config object embedded in pages, built once from the settings.
    pub js_config: JsConfig,
    /// Directory uploaded pictures are written to.
    pub media_root: PathBuf,
    /// Zone polygons for point lookups, loaded at startup.
    pub zone_index: Arc<ZoneIndex>,
}

/// Registers every page and API route.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .route("/config", web::get().to(handlers::config))
            .route("/zone", web::get().to(handlers::zone_lookup))
            .route("/login", web::post().to(handlers::login))
            .route("/logout", web::post().to(handlers::logout))
            .route("/me", web::get().to(handlers::me))
            .route("/me", web::put().to(handlers::update_me))
            .route("/observations", web::get().to(observations::list_observations))
            .route(
                "/observations/{id}",
                web::put().to(observations::update_observation),
            )
            .route(
                "/observations/{id}",
                web::delete().to(observations::delete_observation),
            )
            .route("/individuals", web::get().to(observations::list_individuals))
            .route("/individuals", web::post().to(observations::create_individual))
            .route("/individuals/{id}", web::get().to(observations::get_individual))
            .route("/nests", web::get().to(observations::list_nests))
            .route("/nests", web::post().to(observations::create_nest))
            .route("/nests/{id}", web::get().to(observations::get_nest))
            .route(
                "/action_results",
                web::get().to(actions::list_choices::<ActionResult>),
            )
            .route(
                "/action_methods",
                web::get().to(actions::list_choices::<ActionMethod>),
            )
            .route(
                "/action_products",
                web::get().to(actions::list_choices::<ActionProduct>),
            )
            .route(
                "/action_aftercare",
                web::get().to(actions::list_choices::<ActionAftercare>),
            )
            .route(
                "/action_nest_sites",
                web::get().to(actions::list_choices::<NestSite>),
            )
            .route(
                "/action_nest_types",
                web::get().to(actions::list_choices::<NestType>),
            )
            .route(
                "/action_problems",
                web::get().to(actions::list_choices::<ActionProblem>),
            )
            .route("/save_management_action/", web::post().to(actions::save_action))
            .route("/get_management_action/", web::get().to(actions::get_action))
            .route(
                "/delete_management_action/",
                web::delete().to(actions::delete_action),
            )
            .route(
                "/individual_pictures/",
                web::post().to(pictures::upload_individual_picture),
            )
            .route("/nest_pictures/", web::post().to(pictures::upload_nest_picture))
            .route("/pictures/{id}", web::get().to(pictures::get_picture))
            .route("/csv_export/nests/", web::get().to(export::export_nests))
            .route(
                "/csv_export/individuals/",
                web::get().to(export::export_individuals),
            )
            .route(
                "/csv_export/management_actions/",
                web::get().to(export::export_actions),
            ),
    )
    .route("/", web::get().to(pages::home))
    .route("/obs/", web::get().to(pages::latest_observations))
    .route(
        "/obs/individual/",
        web::get().to(pages::redirect_to("/obs/individual/add/")),
    )
    .route("/obs/nest/", web::get().to(pages::redirect_to("/obs/nest/add/")))
    .route("/profile", web::get().to(pages::profile))
    .route("/management/", web::get().to(pages::management))
    .route("/management/nest/{id}/", web::get().to(pages::nest_detail));

    for page in pages::INFO_PAGES {
        cfg.route(page.path, web::get().to(pages::info_page(*page)));
    }
}

/// Starts the Vespa-Watch server.
///
/// Connects to the database, runs migrations, purges expired sessions,
/// loads the zone index, and serves until shut down. The caller provides
/// the async runtime (e.g. via `#[actix_web::main]`).
///
/// # Errors
///
/// Returns an error if the database connection, migrations, or zone loading
/// fail, or if the HTTP server fails to bind.
#[allow(clippy::future_not_send)]
pub async fn run_server(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    log::info!("Connecting to database...");
    let db_conn = db::connect(&settings.server.database_url).await?;

    log::info!("Running migrations...");
    run_migrations(db_conn.as_ref()).await?;

    let purged = users::purge_expired_sessions(db_conn.as_ref(), Utc::now()).await?;
    if purged > 0 {
        log::info!("Purged {purged} expired sessions");
    }

    let media_root = settings.media_root_or(paths::default_media_root);
    paths::ensure_dir(&media_root)?;

    let orphans = vespawatch_database::pictures::purge_orphans(
        db_conn.as_ref(),
        &media_root,
        Utc::now() - Duration::hours(ORPHAN_PICTURE_HOURS),
    )
    .await?;
    if orphans > 0 {
        log::info!("Removed {orphans} pictures never attached to an observation");
    }

    log::info!("Loading zones...");
    let zone_index = ZoneIndex::load(db_conn.as_ref()).await?;
    log::info!("Loaded {} zones", zone_index.len());
    let static_dir = settings.server.static_dir.clone();
    let static_mount = settings.site.static_root.trim_end_matches('/').to_string();

    let bind_addr = settings.server.bind_addr.clone();
    let port = settings.server.port;

    let state = web::Data::new(AppState {
        db: Arc::from(db_conn),
        js_config: JsConfig::from_settings(&settings),
        settings: Arc::new(settings),
        media_root: media_root.clone(),
        zone_index: Arc::new(zone_index),
    });

    log::info!("Starting server on {bind_addr}:{port}");

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .app_data(web::PayloadConfig::new(pictures::MAX_PICTURE_BYTES))
            .app_data(web::JsonConfig::default().limit(1024 * 1024))
            .configure(configure)
            .service(Files::new("/media", media_root.clone()))
            .service(Files::new(&static_mount, static_dir.clone()))
    })
    .bind((bind_addr, port))?
    .run()
    .await?;

    Ok(())
}
