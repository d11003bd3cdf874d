//! Scheduled cleanup of persisted rooms.
//!
//! Deletes rooms older than the age threshold and rooms whose whole roster
//! has been disconnected for longer than the staleness window.

use clap::Parser;
use spymaster::maintenance::{run_maintenance, MaintenanceOptions};
use spymaster::store::JsonFileStore;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about = "Delete expired rooms from the spymaster data directory")]
struct Args {
    /// Directory holding the room documents
    #[arg(long, env = "SPYMASTER_DATA_DIR")]
    data_dir: PathBuf,

    /// Report what would be deleted without deleting anything
    #[arg(long)]
    dry_run: bool,

    /// Delete rooms created more than this many hours ago
    #[arg(long, env = "SPYMASTER_MAX_AGE_HOURS", default_value_t = 24)]
    max_age_hours: i64,

    /// Delete rooms whose players have all been gone this many minutes
    #[arg(long, env = "SPYMASTER_STALE_MINUTES", default_value_t = 30)]
    stale_minutes: i64,

    /// Only delete rooms whose players have all disconnected, regardless of age
    #[arg(long)]
    disconnected_only: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "spymaster=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let options = MaintenanceOptions {
        max_age: chrono::Duration::hours(args.max_age_hours),
        stale_after: chrono::Duration::minutes(args.stale_minutes),
        disconnected_only: args.disconnected_only,
        dry_run: args.dry_run,
    };

    tracing::info!(
        data_dir = %args.data_dir.display(),
        max_age_hours = args.max_age_hours,
        stale_minutes = args.stale_minutes,
        disconnected_only = args.disconnected_only,
        dry_run = args.dry_run,
        "Starting maintenance run"
    );

    let store = JsonFileStore::new(&args.data_dir);
    match run_maintenance(&store, &options, chrono::Utc::now()).await {
        Ok(report) => {
            let verb = if report.dry_run { "would delete" } else { "deleted" };
            println!(
                "examined {} rooms, {} {}",
                report.examined,
                verb,
                report.deleted.len()
            );
            for (code, reason) in &report.deleted {
                println!("  {code}: {reason:?}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("Maintenance run failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
