//! seed-match - record matching and merge engine CLI
//!
//! Runs match, unmatch, tip, column mapping and import operations against
//! the configured SEED database. Results are printed to stdout as JSON; logs
//! go to stderr.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use seed_common::config::{RootFolderInitializer, RootFolderResolver, TomlConfig};
use seed_common::db::init_database;
use seed_common::events::EventBus;
use seed_common::{OrganizationId, SnapshotId};
use seed_match::models::{ImportFile, MappingRequest, MatchType, SourceType};
use seed_match::{ImportOrchestrator, MatchService};

/// Command-line arguments for seed-match
#[derive(Parser, Debug)]
#[command(name = "seed-match")]
#[command(about = "Record matching and merge engine for SEED building data")]
#[command(version)]
struct Args {
    /// Root folder holding the database
    #[arg(short, long, env = "SEED_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Configuration file (defaults to the platform config file)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Merge two tip snapshots
    Match {
        first: SnapshotId,
        second: SnapshotId,
        /// Match confidence (0.0-1.0)
        #[arg(long, default_value_t = 1.0)]
        confidence: f64,
        /// Snapshot whose non-blank values win (defaults to FIRST)
        #[arg(long)]
        default: Option<SnapshotId>,
    },

    /// Split a snapshot out of its merged lineage
    Unmatch { snapshot: SnapshotId },

    /// Show the tip of a snapshot's lineage
    Tip { snapshot: SnapshotId },

    /// Show or replace column mappings
    Mappings {
        #[arg(long)]
        organization: OrganizationId,
        /// JSON file with `[{"from_field", "to_field"}]` entries to store
        #[arg(long)]
        set: Option<PathBuf>,
    },

    /// Import parsed rows (JSON array of objects)
    Import {
        #[arg(long)]
        organization: OrganizationId,
        /// Raw source type, e.g. PORTFOLIO_RAW or ASSESSED_RAW
        #[arg(long)]
        source_type: SourceType,
        /// JSON file with the rows
        rows: PathBuf,
        /// Import batch name (defaults to the rows file name)
        #[arg(long)]
        name: Option<String>,
    },
}

/// Parsed cell values; non-string JSON values keep their JSON text
fn row_from_json(row: BTreeMap<String, Value>) -> BTreeMap<String, String> {
    row.into_iter()
        .map(|(header, value)| {
            let cell = match value {
                Value::String(s) => s,
                Value::Null => String::new(),
                other => other.to_string(),
            };
            (header, cell)
        })
        .collect()
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => TomlConfig::load(path)
            .with_context(|| format!("Failed to load configuration {}", path.display()))?,
        None => TomlConfig::load_or_default(),
    };

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting seed-match {}", env!("CARGO_PKG_VERSION"));
    config
        .matching
        .validate()
        .context("Invalid [matching] configuration")?;

    // Resolve root folder and open the database
    let root_folder = RootFolderResolver::new("seed-match")
        .with_cli_arg(args.root_folder.clone())
        .with_toml_config(config.clone())
        .resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to initialize root folder")?;
    let db_path = config
        .database_path
        .clone()
        .unwrap_or_else(|| initializer.database_path());
    info!("Database: {}", db_path.display());

    let db = init_database(&db_path)
        .await
        .context("Failed to open database")?;
    let event_bus = EventBus::new(config.matching.event_capacity);
    let matches = MatchService::new(db.clone(), event_bus.clone(), config.matching.clone());

    match args.command {
        Command::Match {
            first,
            second,
            confidence,
            default,
        } => {
            let outcome = matches
                .save_match(first, second, confidence, default, MatchType::Manual)
                .await?;
            print_json(&json!({
                "merged": outcome.merged,
                "canonical_building": outcome.canonical_building,
                "deactivated": outcome.deactivated,
            }))?;
        }

        Command::Unmatch { snapshot } => {
            let outcome = matches.unmatch(snapshot).await?;
            print_json(&json!({
                "deleted": outcome.deleted,
                "restored": outcome.restored,
                "reactivated": outcome.reactivated,
                "replayed": outcome.replayed,
                "remaining_tip": outcome.remaining_tip,
            }))?;
        }

        Command::Tip { snapshot } => {
            let tip = matches.tip(snapshot).await?;
            print_json(&serde_json::to_value(&tip)?)?;
        }

        Command::Mappings { organization, set } => {
            if let Some(path) = set {
                let content = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                let requests: Vec<MappingRequest> = serde_json::from_str(&content)
                    .with_context(|| format!("Invalid mapping file {}", path.display()))?;
                matches.create_mappings(organization, &requests).await?;
            }
            let table = matches.column_mappings(organization).await?;
            print_json(&json!({
                "mappings": table.direct,
                "concat": table.concat,
            }))?;
        }

        Command::Import {
            organization,
            source_type,
            rows,
            name,
        } => {
            let content = std::fs::read_to_string(&rows)
                .with_context(|| format!("Failed to read {}", rows.display()))?;
            let parsed: Vec<BTreeMap<String, Value>> = serde_json::from_str(&content)
                .with_context(|| format!("Rows file {} must be a JSON array of objects", rows.display()))?;
            let file_name = rows
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| rows.display().to_string());

            let orchestrator = ImportOrchestrator::new(db.clone(), event_bus.clone(), config.matching.clone());
            let record = orchestrator
                .create_import_record(organization, name.as_deref().unwrap_or(&file_name))
                .await?;
            let file = ImportFile::new(record.id, file_name, source_type);
            let summary = orchestrator
                .import_file(&record, file, parsed.into_iter().map(row_from_json).collect())
                .await?;
            print_json(&json!({
                "import_record": summary.import_record_id,
                "statistics": summary.statistics,
            }))?;
        }
    }

    Ok(())
}
