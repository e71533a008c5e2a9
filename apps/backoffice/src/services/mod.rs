//! # Services
//!
//! The boundary the shell calls. Every service validates its input with
//! `tally_core::validation` before `tally-db` opens a transaction, and
//! returns [`AppResult`](crate::error::AppResult).
//!
//! ## Service Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Service          Repository            Ledger effect                   │
//! │  ───────          ──────────            ─────────────                   │
//! │  ClientService    ClientRepository      adjust_debt (manual)            │
//! │  ProductService   ProductRepository     none                            │
//! │  OrderService     OrderRepository       create (+), cancel (-)          │
//! │  InvoiceService   InvoiceRepository     none; debt is order-driven      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod client;
pub mod invoice;
pub mod order;
pub mod product;

pub use client::ClientService;
pub use invoice::InvoiceService;
pub use order::OrderService;
pub use product::ProductService;

use serde::Serialize;
use tally_core::validation::clamp_page;

use crate::config::DefaultsConfig;

/// One page of a list call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Matching rows across all pages
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Resolves `limit` / `offset` for a list call.
///
/// `None` takes the configured page size; the result is clamped to
/// `1..=MAX_PAGE_SIZE` with a non-negative offset.
pub(crate) fn page_bounds(
    defaults: &DefaultsConfig,
    limit: Option<i64>,
    offset: Option<i64>,
) -> (i64, i64) {
    clamp_page(
        limit.unwrap_or(defaults.page_size),
        offset.unwrap_or(0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_bounds() {
        let defaults = DefaultsConfig {
            page_size: 50,
            ..DefaultsConfig::default()
        };

        assert_eq!(page_bounds(&defaults, None, None), (50, 0));
        assert_eq!(page_bounds(&defaults, Some(0), Some(-3)), (20, 0));
        assert_eq!(page_bounds(&defaults, Some(1000), Some(10)), (100, 10));
    }
}
