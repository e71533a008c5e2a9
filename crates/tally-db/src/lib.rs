//! # tally-db: Database Layer for Tally
//!
//! This crate provides database access for Tally. It uses SQLite for
//! local storage with sqlx for async operations, and it owns every
//! transaction boundary, including the order / client-debt ledger.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Tally Data Flow                                │
//! │                                                                         │
//! │  Backoffice service (OrderService::create)                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     tally-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded + │  │   │
//! │  │   │               │    │ ClientRepo    │    │   optional   │  │   │
//! │  │   │ SqlitePool    │◄───│ ProductRepo   │    │   directory) │  │   │
//! │  │   │ Health checks │    │ OrderRepo ★   │    │ 001_init     │  │   │
//! │  │   │               │    │ InvoiceRepo   │    │ 002_debt     │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                         ★ debt ledger engine                   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (tally.db)                  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded and filesystem schema migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tally_db::{Database, DbConfig};
//!
//! // Connects and applies migrations
//! let db = Database::new(DbConfig::new("path/to/tally.db")).await?;
//!
//! let order = db.orders().create_order(&draft).await?;
//! let reversed = db.orders().cancel_order_and_adjust_debt(order.id).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use migrations::MigrationStatus;
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::client::ClientRepository;
pub use repository::invoice::InvoiceRepository;
pub use repository::order::OrderRepository;
pub use repository::product::ProductRepository;
