//! Subcommand implementations shared by the argument parser and the
//! interactive menu.

use std::error::Error;
use std::path::Path;

use switchy_database::Database;
use vespawatch_cli_utils::{IndicatifProgress, MultiProgress};
use vespawatch_database::{db, observations, run_migrations, users, zones};
use vespawatch_database_models::NewUser;
use vespawatch_inaturalist::InatClient;
use vespawatch_settings::Settings;
use vespawatch_sync::SyncStats;

type CliResult<T = ()> = Result<T, Box<dyn Error>>;

/// Connects to the configured database and brings the schema up to date.
async fn open(settings: &Settings) -> CliResult<Box<dyn Database>> {
    let db = db::connect(&settings.server.database_url).await?;
    run_migrations(db.as_ref()).await?;
    Ok(db)
}

pub async fn migrate(settings: &Settings) -> CliResult {
    open(settings).await?;
    log::info!("Database schema is up to date");
    Ok(())
}

/// Runs the server on its own actix system, since actix-web cannot share
/// the CLI's tokio runtime.
pub async fn serve(settings: Settings, interactive: bool) -> CliResult {
    tokio::task::spawn_blocking(move || {
        let system = actix_web::rt::System::new();
        let result = if interactive {
            system.block_on(vespawatch_server::interactive::run(settings))
        } else {
            system.block_on(vespawatch_server::run_server(settings))
        };
        result.map_err(|e| e.to_string())
    })
    .await??;

    Ok(())
}

fn normalized_username(username: &str) -> CliResult<String> {
    let username = username.trim();
    if username.is_empty() || username.chars().any(char::is_whitespace) {
        return Err(format!("Invalid username {username:?}").into());
    }
    Ok(username.to_string())
}

async fn create_user(
    db: &dyn Database,
    username: &str,
    email: Option<String>,
    is_superuser: bool,
    zone_id: Option<i64>,
) -> CliResult<i64> {
    let password = vespawatch_cli_utils::prompt_new_password()?;

    let user = NewUser {
        username: normalized_username(username)?,
        email: email.filter(|e| !e.trim().is_empty()),
        password_hash: vespawatch_server::auth::hash_password(&password)
            .map_err(|e| format!("Could not hash password: {e}"))?,
        is_staff: is_superuser,
        is_superuser,
        zone_id,
    };

    let id = users::insert_user(db, &user).await?;
    log::info!("Created user {} ({id})", user.username);
    Ok(id)
}

pub async fn create_superuser(
    settings: &Settings,
    username: &str,
    email: Option<String>,
) -> CliResult {
    let db = open(settings).await?;
    create_user(db.as_ref(), username, email, true, None).await?;
    Ok(())
}

/// Creates a fire-brigade user restricted to the named zone.
pub async fn create_firefighter(
    settings: &Settings,
    username: &str,
    zone: &str,
    email: Option<String>,
) -> CliResult {
    let db = open(settings).await?;

    let zone_row = zones::get_zone_by_name(db.as_ref(), zone.trim())
        .await?
        .ok_or_else(|| format!("No zone named {zone:?}. Run import-zones first"))?;

    create_user(db.as_ref(), username, email, false, Some(zone_row.id)).await?;
    Ok(())
}

/// Imports zones, then assigns the new zones to observations that had none.
pub async fn import_zones(settings: &Settings, path: &Path, name_field: &str) -> CliResult {
    let db = open(settings).await?;

    let stored = vespawatch_zone::import::import_file(db.as_ref(), path, name_field).await?;
    log::info!("Stored {stored} zones");

    observations::assign_missing_zones(db.as_ref()).await?;
    Ok(())
}

pub async fn list_zones(settings: &Settings) -> CliResult {
    let db = open(settings).await?;
    let rows = zones::list_zones(db.as_ref()).await?;

    if rows.is_empty() {
        println!("No zones imported.");
    }
    for zone in rows {
        println!("{:>5}  {}", zone.id, zone.name);
    }
    Ok(())
}

pub async fn assign_zones(settings: &Settings) -> CliResult {
    let db = open(settings).await?;
    let updated = observations::assign_missing_zones(db.as_ref()).await?;
    println!("Assigned zones to {updated} observations");
    Ok(())
}

async fn pull_with(
    db: &dyn Database,
    settings: &Settings,
    multi: &MultiProgress,
    limit: Option<u64>,
) -> CliResult<SyncStats> {
    let client = InatClient::new(settings.inaturalist.clone())?;
    let stats = vespawatch_sync::pull(db, &client, limit, IndicatifProgress::pull_bar(multi)).await?;
    Ok(stats)
}

async fn push_with(
    db: &dyn Database,
    settings: &Settings,
    multi: &MultiProgress,
) -> CliResult<SyncStats> {
    if !settings.inaturalist.has_credentials() {
        return Err("iNaturalist credentials are not configured".into());
    }

    let mut client = InatClient::new(settings.inaturalist.clone())?;
    client.authenticate().await?;

    let stats = vespawatch_sync::push(db, &client, IndicatifProgress::push_bar(multi)).await?;
    Ok(stats)
}

pub async fn sync_pull(settings: &Settings, multi: &MultiProgress, limit: Option<u64>) -> CliResult {
    let db = open(settings).await?;
    let stats = pull_with(db.as_ref(), settings, multi, limit).await?;
    log::info!("Pull finished: {stats}");
    Ok(())
}

pub async fn sync_push(settings: &Settings, multi: &MultiProgress) -> CliResult {
    let db = open(settings).await?;
    let stats = push_with(db.as_ref(), settings, multi).await?;
    log::info!("Push finished: {stats}");
    Ok(())
}

/// Pulls, then pushes. The push is skipped with a warning when no
/// credentials are configured.
pub async fn sync(settings: &Settings, multi: &MultiProgress, limit: Option<u64>) -> CliResult {
    let db = open(settings).await?;

    let mut stats = pull_with(db.as_ref(), settings, multi, limit).await?;

    if settings.inaturalist.has_credentials() {
        let pushed = push_with(db.as_ref(), settings, multi).await?;
        stats.merge(&pushed);
    } else {
        log::warn!("No iNaturalist credentials configured, skipping push");
    }

    log::info!("Sync finished: {stats}");
    Ok(())
}
