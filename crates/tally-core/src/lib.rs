//! # tally-core: Pure Business Logic for Tally
//!
//! Domain types, integer money, the totals calculator and input
//! validation. Nothing here touches a database, a file or a clock-driven
//! side effect.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Tally Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Shell (desktop UI, CLI, PDF/report code)           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ in-process calls                       │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              backoffice services (validate + orchestrate)       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tally-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │  totals   │  │ validation│  │   │
//! │  │   │  Order    │  │   Money   │  │ order /   │  │   rules   │  │   │
//! │  │   │  Invoice  │  │  format   │  │ invoice   │  │  paging   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │         tally-db (SQLite, migrations, debt ledger engine)       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example Usage
//!
//! ```rust
//! use tally_core::totals::calc_invoice_totals;
//! use tally_core::InvoiceItemDraft;
//!
//! let item = InvoiceItemDraft {
//!     product_id: None,
//!     name_snapshot: "Cement 50kg".into(),
//!     sku_snapshot: None,
//!     qty: 3,
//!     unit_price_cents: 700,
//!     currency: "DZD".into(),
//! };
//!
//! // 10% discount, then 5% tax on the discounted amount (truncated)
//! let totals = calc_invoice_totals(&[item], 10, 5);
//! assert_eq!(totals.total_cents, 1984);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod totals;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use totals::{LineItem, Totals};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Page size used when a caller asks for `limit <= 0`.
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Upper bound on a single page of any listing.
pub const MAX_PAGE_SIZE: i64 = 100;

/// Maximum length of client, product and line-item names.
pub const MAX_NAME_LENGTH: usize = 200;

/// Largest quantity accepted on a single line.
pub const MAX_QUANTITY: i64 = 1_000_000;

/// Largest unit price accepted, in cents (one billion whole units).
///
/// `MAX_QUANTITY * MAX_UNIT_PRICE_CENTS` stays well inside `i64`.
pub const MAX_UNIT_PRICE_CENTS: i64 = 100_000_000_000;

/// Currency stamped on order lines that arrive without one.
pub const DEFAULT_ORDER_CURRENCY: &str = "USD";

/// Currency stamped on products that arrive without one.
pub const DEFAULT_PRODUCT_CURRENCY: &str = "DZD";
