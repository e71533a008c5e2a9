//! # Tally Backoffice Entry Point
//!
//! Boots the gateway: configuration, logging, database and migrations.
//! Prints a JSON startup report and exits; the desktop shell links the
//! library and calls the services directly.
//!
//! ## Usage
//! ```bash
//! tally-backoffice                         # platform config.toml or defaults
//! tally-backoffice --config ./tally.toml
//! TALLY_DB_PATH=./dev.db tally-backoffice
//! ```

use serde::Serialize;
use std::env;
use std::path::PathBuf;
use tracing::{info, warn};

use tally_backoffice::config::AppConfig;
use tally_backoffice::{init_tracing, Backoffice};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StartupReport {
    database: PathBuf,
    healthy: bool,
    migrations_applied: usize,
    migrations_pending: Vec<String>,
    clients: i64,
    active_products: i64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    let mut config_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Tally Backoffice");
                println!();
                println!("Usage: tally-backoffice [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --config <PATH>  Config file (default: platform config dir)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            other => {
                eprintln!("Ignoring unknown argument: {}", other);
            }
        }
        i += 1;
    }

    let config = AppConfig::load(config_path)?;
    init_tracing(config.debug_db);

    info!("Starting Tally Backoffice");

    let backoffice = Backoffice::open(&config).await?;
    let db = backoffice.database();

    let status = db.migration_status().await?;
    if !status.pending.is_empty() {
        warn!(pending = ?status.pending, "Migrations still pending after startup");
    }

    let report = StartupReport {
        database: config.database_path()?,
        healthy: db.health_check().await,
        migrations_applied: status.applied,
        migrations_pending: status.pending,
        clients: db.clients().count().await?,
        active_products: db.products().count().await?,
    };

    info!(
        healthy = report.healthy,
        migrations_applied = report.migrations_applied,
        "Backoffice ready"
    );
    println!("{}", serde_json::to_string_pretty(&report)?);

    backoffice.close().await;
    Ok(())
}
