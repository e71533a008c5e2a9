//! # Repository Module
//!
//! Database repository implementations for Tally.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  Backoffice service                                                    │
//! │       │                                                                 │
//! │       │  db.orders().create_order(&draft)                              │
//! │       ▼                                                                 │
//! │  OrderRepository (ledger engine)                                       │
//! │  ├── create_order / update_order                                       │
//! │  ├── cancel_order_and_adjust_debt                                      │
//! │  └── delete_canceled_orders_for_client                                 │
//! │       │                                                                 │
//! │       │  pool.begin() ... tx.commit()                                  │
//! │       ▼                                                                 │
//! │  helpers in this module (take &mut SqliteConnection)                   │
//! │  ├── next_document_number   ORD-2026-0001 / INV-2026-0001              │
//! │  ├── client_debt            read the running balance                   │
//! │  ├── shift_client_debt      add a delta, clamp at 0                    │
//! │  └── insert_debt_entry      append to the debt journal                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ClientRepository`](client::ClientRepository) - Clients, manual debt adjustments, debt journal
//! - [`ProductRepository`](product::ProductRepository) - Product catalogue
//! - [`OrderRepository`](order::OrderRepository) - Orders and the client debt ledger
//! - [`InvoiceRepository`](invoice::InvoiceRepository) - Invoices and payments

pub mod client;
pub mod invoice;
pub mod order;
pub mod product;

use chrono::{Datelike, Utc};
use sqlx::SqliteConnection;
use tally_core::money::Money;
use tally_core::{DebtEntry, DebtEntryKind};

use crate::error::{DbError, DbResult};

// =============================================================================
// Document Numbering
// =============================================================================

/// Which numbered document a sequence belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DocumentKind {
    Order,
    Invoice,
}

impl DocumentKind {
    fn code(self) -> &'static str {
        match self {
            DocumentKind::Order => "ORD",
            DocumentKind::Invoice => "INV",
        }
    }
}

/// Generates the next `<CODE>-<year>-<seq:04>` number.
///
/// ## How It Works
/// ```text
/// existing: ORD-2026-0001, ORD-2026-0002, ORD-2026-0005
///                                              │
/// MAX(suffix) = 5  ──────────────────────────► ORD-2026-0006
/// ```
///
/// Taken from the highest existing suffix, so a purged order never hands
/// its number out twice. Must run inside the inserting transaction.
pub(crate) async fn next_document_number(
    conn: &mut SqliteConnection,
    kind: DocumentKind,
) -> DbResult<String> {
    let prefix = format!("{}-{}-", kind.code(), Utc::now().year());
    let pattern = format!("{}%", prefix);
    // substr() is 1-based
    let suffix_start = prefix.len() as i64 + 1;

    let sql = match kind {
        DocumentKind::Order => {
            r#"SELECT COALESCE(MAX(CAST(substr(order_number, ?2) AS INTEGER)), 0)
               FROM "order" WHERE order_number LIKE ?1"#
        }
        DocumentKind::Invoice => {
            r#"SELECT COALESCE(MAX(CAST(substr(invoice_number, ?2) AS INTEGER)), 0)
               FROM invoice WHERE invoice_number LIKE ?1"#
        }
    };

    let last: i64 = sqlx::query_scalar(sql)
        .bind(&pattern)
        .bind(suffix_start)
        .fetch_one(&mut *conn)
        .await?;

    Ok(format!("{}{:04}", prefix, last + 1))
}

// =============================================================================
// Client Debt
// =============================================================================

/// Reads a client's current balance.
///
/// `NotFound` when the client does not exist.
pub(crate) async fn client_debt(conn: &mut SqliteConnection, client_id: i64) -> DbResult<i64> {
    sqlx::query_scalar::<_, i64>("SELECT debt_cents FROM client WHERE id = ?1")
        .bind(client_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Client", client_id))
}

/// Balance before and after a shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DebtShift {
    pub previous: i64,
    pub new: i64,
}

impl DebtShift {
    /// The change actually applied after clamping.
    pub fn applied(&self) -> i64 {
        self.new - self.previous
    }

    pub fn is_noop(&self) -> bool {
        self.new == self.previous
    }
}

/// Adds `delta` to a client's balance, clamping the result at 0.
///
/// The row is only written when the balance actually moves.
pub(crate) async fn shift_client_debt(
    conn: &mut SqliteConnection,
    client_id: i64,
    delta: i64,
) -> DbResult<DebtShift> {
    let previous = client_debt(conn, client_id).await?;
    let new = previous.saturating_add(delta).max(0);

    if new != previous {
        sqlx::query("UPDATE client SET debt_cents = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(new)
            .bind(Utc::now())
            .bind(client_id)
            .execute(&mut *conn)
            .await?;
    }

    Ok(DebtShift { previous, new })
}

/// Appends one journal row for a balance movement.
pub(crate) async fn insert_debt_entry(
    conn: &mut SqliteConnection,
    client_id: i64,
    order_id: Option<i64>,
    kind: DebtEntryKind,
    shift: DebtShift,
    notes: Option<&str>,
) -> DbResult<DebtEntry> {
    let result = sqlx::query(
        r#"
        INSERT INTO debt_entry (
            client_id, order_id, kind,
            previous_debt_cents, new_debt_cents, adjustment_cents,
            notes, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(client_id)
    .bind(order_id)
    .bind(kind)
    .bind(shift.previous)
    .bind(shift.new)
    .bind(shift.applied())
    .bind(notes)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    let entry = sqlx::query_as::<_, DebtEntry>("SELECT * FROM debt_entry WHERE id = ?1")
        .bind(result.last_insert_rowid())
        .fetch_one(&mut *conn)
        .await?;

    Ok(entry)
}

/// `%query%` for LIKE filters, or `None` when the query is blank.
pub(crate) fn like_pattern(query: Option<&str>) -> Option<String> {
    query
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(|q| format!("%{}%", q))
}

// =============================================================================
// Line Amounts
// =============================================================================

/// `qty × unit price` for line `index`, or `AmountOutOfRange`.
pub(crate) fn checked_line_total(index: usize, qty: i64, unit_price_cents: i64) -> DbResult<Money> {
    Money::from_cents(unit_price_cents)
        .checked_multiply_quantity(qty)
        .ok_or_else(|| {
            DbError::amount_out_of_range(format!(
                "items[{}]: {} x {} cents overflows",
                index, qty, unit_price_cents
            ))
        })
}

/// Adds `amount` to a running total, or `AmountOutOfRange`.
pub(crate) fn checked_accumulate(total: Money, amount: Money, what: &str) -> DbResult<Money> {
    total
        .checked_add(amount)
        .ok_or_else(|| DbError::amount_out_of_range(format!("{} overflows", what)))
}
