#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Administration CLI for Vespa-Watch.
//!
//! Runs migrations, creates users, imports fire-brigade zones, syncs with
//! iNaturalist, and starts the web server. Without a subcommand, an
//! interactive menu asks which task to run.
//!
//! Uses `indicatif-log-bridge` (via [`vespawatch_cli_utils::init_logger`])
//! so that sync progress bars and log lines share the terminal.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use dialoguer::{Input, Select};
use vespawatch_cli_utils::MultiProgress;
use vespawatch_settings::Settings;
use vespawatch_zone::import::DEFAULT_NAME_FIELD;

#[derive(Parser)]
#[command(name = "vespawatch", about = "Vespa-Watch administration")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,

    /// Start the web server
    Serve,

    /// Create a staff user with every permission
    CreateSuperuser {
        /// Login name
        #[arg(long)]
        username: String,

        /// Contact email
        #[arg(long)]
        email: Option<String>,
    },

    /// Create a fire-brigade user restricted to one zone
    CreateFirefighter {
        /// Login name
        #[arg(long)]
        username: String,

        /// Name of the zone, as imported with `import-zones`
        #[arg(long)]
        zone: String,

        /// Contact email
        #[arg(long)]
        email: Option<String>,
    },

    /// Import zone polygons from a GeoJSON file
    ImportZones {
        /// Path to a GeoJSON `FeatureCollection`
        geojson: PathBuf,

        /// Feature property holding the zone name
        #[arg(long, default_value = DEFAULT_NAME_FIELD)]
        name_field: String,
    },

    /// List imported zones
    ListZones,

    /// Pull observations from iNaturalist
    SyncPull {
        /// Stop after this many observations
        #[arg(long)]
        limit: Option<u64>,
    },

    /// Push Vespa-Watch observations to iNaturalist
    SyncPush,

    /// Pull from iNaturalist, then push to it
    Sync {
        /// Stop pulling after this many observations
        #[arg(long)]
        limit: Option<u64>,
    },

    /// Assign zones to observations that have none
    AssignZones,
}

/// Tasks offered by the interactive menu.
enum Task {
    Serve,
    Sync,
    SyncPull,
    SyncPush,
    Migrate,
    CreateSuperuser,
    CreateFirefighter,
    ImportZones,
    ListZones,
    AssignZones,
}

impl Task {
    const ALL: &[Self] = &[
        Self::Serve,
        Self::Sync,
        Self::SyncPull,
        Self::SyncPush,
        Self::Migrate,
        Self::CreateSuperuser,
        Self::CreateFirefighter,
        Self::ImportZones,
        Self::ListZones,
        Self::AssignZones,
    ];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::Serve => "Start server",
            Self::Sync => "Sync with iNaturalist",
            Self::SyncPull => "Pull from iNaturalist",
            Self::SyncPush => "Push to iNaturalist",
            Self::Migrate => "Run migrations",
            Self::CreateSuperuser => "Create superuser",
            Self::CreateFirefighter => "Create fire-brigade user",
            Self::ImportZones => "Import zones",
            Self::ListZones => "List zones",
            Self::AssignZones => "Assign zones to observations",
        }
    }
}

fn prompt(label: &str) -> Result<String, dialoguer::Error> {
    Input::new().with_prompt(label).interact_text()
}

fn prompt_optional(label: &str) -> Result<Option<String>, dialoguer::Error> {
    let value: String = Input::new()
        .with_prompt(label)
        .allow_empty(true)
        .interact_text()?;
    Ok(Some(value).filter(|v| !v.trim().is_empty()))
}

fn prompt_limit() -> Result<Option<u64>, dialoguer::Error> {
    let value: u64 = Input::new()
        .with_prompt("Maximum observations to pull (0 = no limit)")
        .default(0)
        .interact_text()?;
    Ok(Some(value).filter(|&v| v > 0))
}

async fn interactive(
    settings: Settings,
    multi: &MultiProgress,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("Vespa-Watch");
    println!();

    let labels: Vec<&str> = Task::ALL.iter().map(Task::label).collect();

    let idx = Select::new()
        .with_prompt("What would you like to do?")
        .items(&labels)
        .default(0)
        .interact()?;

    match Task::ALL[idx] {
        Task::Serve => commands::serve(settings, true).await,
        Task::Sync => commands::sync(&settings, multi, prompt_limit()?).await,
        Task::SyncPull => commands::sync_pull(&settings, multi, prompt_limit()?).await,
        Task::SyncPush => commands::sync_push(&settings, multi).await,
        Task::Migrate => commands::migrate(&settings).await,
        Task::CreateSuperuser => {
            let username = prompt("Username")?;
            let email = prompt_optional("Email (optional)")?;
            commands::create_superuser(&settings, &username, email).await
        }
        Task::CreateFirefighter => {
            let username = prompt("Username")?;
            let zone = prompt("Zone name")?;
            let email = prompt_optional("Email (optional)")?;
            commands::create_firefighter(&settings, &username, &zone, email).await
        }
        Task::ImportZones => {
            let path = PathBuf::from(prompt("GeoJSON file")?);
            let name_field: String = Input::new()
                .with_prompt("Name property")
                .default(DEFAULT_NAME_FIELD.to_string())
                .interact_text()?;
            commands::import_zones(&settings, &path, &name_field).await
        }
        Task::ListZones => commands::list_zones(&settings).await,
        Task::AssignZones => commands::assign_zones(&settings).await,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = vespawatch_cli_utils::init_logger();
    let cli = Cli::parse();
    let settings = Settings::load()?;

    let Some(command) = cli.command else {
        return interactive(settings, &multi).await;
    };

    match command {
        Commands::Migrate => commands::migrate(&settings).await,
        Commands::Serve => commands::serve(settings, false).await,
        Commands::CreateSuperuser { username, email } => {
            commands::create_superuser(&settings, &username, email).await
        }
        Commands::CreateFirefighter {
            username,
            zone,
            email,
        } => commands::create_firefighter(&settings, &username, &zone, email).await,
        Commands::ImportZones {
            geojson,
            name_field,
        } => commands::import_zones(&settings, &geojson, &name_field).await,
        Commands::ListZones => commands::list_zones(&settings).await,
        Commands::SyncPull { limit } => commands::sync_pull(&settings, &multi, limit).await,
        Commands::SyncPush => commands::sync_push(&settings, &multi).await,
        Commands::Sync { limit } => commands::sync(&settings, &multi, limit).await,
        Commands::AssignZones => commands::assign_zones(&settings).await,
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory as _;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn firefighter_requires_zone() {
        assert!(Cli::try_parse_from(["vespawatch", "create-firefighter", "--username", "a"]).is_err());

        let cli = Cli::try_parse_from([
            "vespawatch",
            "create-firefighter",
            "--username",
            "brandweer",
            "--zone",
            "Leuven",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::CreateFirefighter { ref zone, .. }) if zone == "Leuven"
        ));
    }

    #[test]
    fn import_zones_defaults_name_field() {
        let cli = Cli::try_parse_from(["vespawatch", "import-zones", "zones.geojson"]).unwrap();
        let Some(Commands::ImportZones { name_field, .. }) = cli.command else {
            panic!("expected import-zones");
        };
        assert_eq!(name_field, DEFAULT_NAME_FIELD);
    }

    #[test]
    fn sync_pull_accepts_limit() {
        let cli = Cli::try_parse_from(["vespawatch", "sync-pull", "--limit", "50"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::SyncPull { limit: Some(50) })));
    }
}
