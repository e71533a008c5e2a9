//! # tally-backoffice
//!
//! Service layer for the order / invoice / client-debt backend.
//!
//! ## Startup Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Application Startup                               │
//! │                                                                         │
//! │  1. Load Configuration ───────────────────────────────────────────────► │
//! │     • config.toml (platform config dir or explicit path)                │
//! │     • TALLY_* environment overrides                                     │
//! │                                                                         │
//! │  2. Initialize Logging ───────────────────────────────────────────────► │
//! │     • tracing-subscriber with env filter                                │
//! │     • RUST_LOG wins; otherwise debug_db picks the fallback filter       │
//! │                                                                         │
//! │  3. Open Database ────────────────────────────────────────────────────► │
//! │     • SQLite pool, liveness check                                       │
//! │     • Embedded + directory migrations                                   │
//! │                                                                         │
//! │  4. Build Services ───────────────────────────────────────────────────► │
//! │     • Client / Product / Order / Invoice, sharing one Database          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod services;

use tracing::info;
use tracing_subscriber::EnvFilter;

use config::AppConfig;
use error::AppResult;
use services::{ClientService, InvoiceService, OrderService, ProductService};
use tally_db::Database;

/// Every service, wired to one database.
#[derive(Debug, Clone)]
pub struct Backoffice {
    db: Database,
    pub clients: ClientService,
    pub products: ProductService,
    pub orders: OrderService,
    pub invoices: InvoiceService,
}

impl Backoffice {
    /// Opens the configured database and builds the services.
    pub async fn open(config: &AppConfig) -> AppResult<Self> {
        let db_config = config.db_config()?;
        info!(path = ?config.database_path()?, "Opening database");

        let db = Database::new(db_config).await?;
        Ok(Self::with_database(db, config))
    }

    /// Builds the services around an already-open database.
    pub fn with_database(db: Database, config: &AppConfig) -> Self {
        let defaults = config.defaults.clone();

        Backoffice {
            clients: ClientService::new(db.clone(), defaults.clone()),
            products: ProductService::new(db.clone(), defaults.clone()),
            orders: OrderService::new(db.clone(), defaults.clone()),
            invoices: InvoiceService::new(db.clone(), defaults),
            db,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub async fn close(&self) {
        self.db.close().await;
    }
}

/// Initializes the tracing subscriber for structured logging.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=tally_db=trace` - Trace the database crate only
/// - Default: `info,tally=debug,sqlx=warn`, or `debug,sqlx=info` with `debug_db`
pub fn init_tracing(debug_db: bool) {
    let fallback = if debug_db {
        "debug,sqlx=info"
    } else {
        "info,tally=debug,sqlx=warn"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
