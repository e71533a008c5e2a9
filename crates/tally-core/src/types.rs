//! # Domain Types
//!
//! Records for clients, products, orders, invoices, payments and debt
//! entries, plus the drafts and patches the shell sends in.
//!
//! ## Snapshot Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Product { name: "Cement 50kg", sku: "CEM-50", price: 1200 }            │
//! │       │                                                                 │
//! │       │ copied when the order is written                                │
//! │       ▼                                                                 │
//! │  OrderItem { name_snapshot, sku_snapshot, unit_price_cents: 1200 }      │
//! │                                                                         │
//! │  Later: product renamed / repriced / deleted                            │
//! │       → OrderItem keeps its copy, product_id becomes NULL on delete     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! IDs are SQLite rowids (`i64`). Money is `i64` cents. Percentages are
//! whole numbers in `0..=100`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::CoreError;
use crate::money::Money;
use crate::totals::LineItem;

// =============================================================================
// Order Status
// =============================================================================

/// Lifecycle state of an order.
///
/// ```text
/// PENDING ──► CONFIRMED
///    │    ──► COMPLETED   (terminal by convention)
///    └────► CANCELED    (terminal; debt reversed if nothing invoiced)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, Default)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[ts(export)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Canceled,
    Completed,
}

impl OrderStatus {
    /// Every status, in display order.
    pub const ALL: [OrderStatus; 4] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Canceled,
        OrderStatus::Completed,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Canceled => "CANCELED",
            OrderStatus::Completed => "COMPLETED",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| CoreError::InvalidStatus {
                kind: "order",
                value: s.to_string(),
            })
    }
}

// =============================================================================
// Invoice Status
// =============================================================================

/// Status string of an invoice. No core operation transitions it; the
/// shell sets it explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, Default)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[ts(export)]
#[serde(rename_all = "UPPERCASE")]
pub enum InvoiceStatus {
    #[default]
    Draft,
    Issued,
    Paid,
    Canceled,
}

impl InvoiceStatus {
    pub const ALL: [InvoiceStatus; 4] = [
        InvoiceStatus::Draft,
        InvoiceStatus::Issued,
        InvoiceStatus::Paid,
        InvoiceStatus::Canceled,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "DRAFT",
            InvoiceStatus::Issued => "ISSUED",
            InvoiceStatus::Paid => "PAID",
            InvoiceStatus::Canceled => "CANCELED",
        }
    }
}

impl FromStr for InvoiceStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        InvoiceStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| CoreError::InvalidStatus {
                kind: "invoice",
                value: s.to_string(),
            })
    }
}

// =============================================================================
// Payment Method
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentMethod {
    Cash,
    Card,
    /// Bank transfer.
    Transfer,
    Other,
}

// =============================================================================
// Debt Entry Kind
// =============================================================================

/// What moved a client's debt balance.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DebtEntryKind {
    /// Order items were added to the balance.
    OrderCreated,
    /// A cancel took the order's total back off the balance.
    OrderCanceled,
    /// An operator adjusted the balance by hand.
    ManualAdjustment,
}

// =============================================================================
// Client
// =============================================================================

/// A customer with a running debt balance.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Client {
    pub id: i64,
    pub name: String,
    pub phone: Option<String>,
    pub address: Option<String>,

    /// Amount owed from non-canceled orders, in cents. Never negative.
    pub debt_cents: i64,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Client {
    #[inline]
    pub fn debt(&self) -> Money {
        Money::from_cents(self.debt_cents)
    }
}

/// Fields for creating a client.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewClient {
    pub name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    /// Opening balance carried over from a previous system.
    #[serde(default)]
    pub debt_cents: i64,
}

/// Contact fields that can be edited. The balance moves only through
/// orders and explicit adjustments.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ClientUpdate {
    pub id: i64,
    pub name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// One recorded movement of a client's balance.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct DebtEntry {
    pub id: i64,
    pub client_id: i64,
    pub order_id: Option<i64>,
    pub kind: DebtEntryKind,
    pub previous_debt_cents: i64,
    pub new_debt_cents: i64,
    /// `new - previous`: the change actually applied after clamping.
    pub adjustment_cents: i64,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Product
// =============================================================================

/// A sellable item.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: i64,
    pub sku: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub unit_price_cents: i64,
    pub currency: String,
    pub active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Product {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// Builds an order line from this product's current name, sku and price.
    pub fn to_order_item(&self, qty: i64, discount_percent: i64) -> OrderItemDraft {
        OrderItemDraft {
            product_id: Some(self.id),
            name_snapshot: self.name.clone(),
            sku_snapshot: self.sku.clone(),
            qty,
            unit_price_cents: self.unit_price_cents,
            discount_percent,
            currency: self.currency.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewProduct {
    pub sku: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub unit_price_cents: i64,
    /// Empty means "use the configured product currency".
    #[serde(default)]
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductUpdate {
    pub id: i64,
    pub sku: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub unit_price_cents: i64,
    pub currency: String,
}

/// How many orders reference a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductUsage {
    /// Orders of any status.
    pub total: i64,
    /// Orders that are not CANCELED.
    pub active: i64,
}

// =============================================================================
// Order
// =============================================================================

/// Order header.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Order {
    pub id: i64,
    /// `ORD-<year>-<seq>`, e.g. `ORD-2026-0007`.
    pub order_number: String,
    pub client_id: i64,
    pub status: OrderStatus,
    pub notes: Option<String>,

    /// Seeds per-item discounts in the UI. Never applied to totals.
    pub discount_percent: i64,

    #[ts(as = "String")]
    pub issue_date: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub due_date: Option<DateTime<Utc>>,

    /// Client debt right after this order's last ledger transaction.
    pub client_debt_snapshot_cents: Option<i64>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A stored order line.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: Option<i64>,
    pub name_snapshot: String,
    pub sku_snapshot: Option<String>,
    pub qty: i64,
    pub unit_price_cents: i64,
    pub discount_percent: i64,
    pub currency: String,
    /// `qty × unit_price_cents`, before the item discount.
    pub total_cents: i64,
}

/// An order line as submitted by the shell.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderItemDraft {
    pub product_id: Option<i64>,
    pub name_snapshot: String,
    pub sku_snapshot: Option<String>,
    pub qty: i64,
    pub unit_price_cents: i64,
    #[serde(default)]
    pub discount_percent: i64,
    #[serde(default)]
    pub currency: String,
}

/// Input for creating an order.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderDraft {
    pub client_id: i64,
    pub notes: Option<String>,
    #[serde(default)]
    pub discount_percent: i64,
    #[ts(as = "Option<String>")]
    pub issue_date: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub due_date: Option<DateTime<Utc>>,
    pub items: Vec<OrderItemDraft>,
}

/// Partial update of an order. `None` leaves the column untouched;
/// `items: Some(..)` replaces every line.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderUpdate {
    pub id: i64,
    pub status: Option<OrderStatus>,
    pub notes: Option<String>,
    pub discount_percent: Option<i64>,
    #[ts(as = "Option<String>")]
    pub due_date: Option<DateTime<Utc>>,
    pub items: Option<Vec<OrderItemDraft>>,
}

impl OrderUpdate {
    /// True when at least one header column would change.
    pub fn touches_header(&self) -> bool {
        self.status.is_some()
            || self.notes.is_some()
            || self.discount_percent.is_some()
            || self.due_date.is_some()
    }
}

/// Sort orders for order listings. Each maps to a fixed ORDER BY clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderSort {
    #[default]
    NewestFirst,
    OldestFirst,
    NumberAsc,
    NumberDesc,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderFilters {
    pub client_id: Option<i64>,
    pub status: Option<OrderStatus>,
    /// Matched against the order number and client name.
    pub query: Option<String>,
    #[serde(default)]
    pub sort: OrderSort,
}

/// An order with its client, items and computed totals.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderDetail {
    pub order: Order,
    pub client: Client,
    pub items: Vec<OrderItem>,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
}

// =============================================================================
// Invoice
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Invoice {
    pub id: i64,
    /// `INV-<year>-<seq>`.
    pub invoice_number: String,
    pub order_id: Option<i64>,
    pub client_id: i64,
    pub status: InvoiceStatus,
    #[ts(as = "String")]
    pub issue_date: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub due_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub subtotal_cents: i64,
    pub discount_percent: i64,
    pub tax_percent: i64,
    pub total_cents: i64,
    pub currency: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A stored invoice line. No per-item discount.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct InvoiceItem {
    pub id: i64,
    pub invoice_id: i64,
    pub product_id: Option<i64>,
    pub name_snapshot: String,
    pub sku_snapshot: Option<String>,
    pub qty: i64,
    pub unit_price_cents: i64,
    pub currency: String,
    pub total_cents: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InvoiceItemDraft {
    pub product_id: Option<i64>,
    pub name_snapshot: String,
    pub sku_snapshot: Option<String>,
    pub qty: i64,
    pub unit_price_cents: i64,
    #[serde(default)]
    pub currency: String,
}

impl From<&OrderItem> for InvoiceItemDraft {
    fn from(item: &OrderItem) -> Self {
        InvoiceItemDraft {
            product_id: item.product_id,
            name_snapshot: item.name_snapshot.clone(),
            sku_snapshot: item.sku_snapshot.clone(),
            qty: item.qty,
            unit_price_cents: item.unit_price_cents,
            currency: item.currency.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InvoiceDraft {
    pub order_id: Option<i64>,
    pub client_id: i64,
    pub notes: Option<String>,
    #[serde(default)]
    pub discount_percent: i64,
    #[serde(default)]
    pub tax_percent: i64,
    #[ts(as = "Option<String>")]
    pub issue_date: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub due_date: Option<DateTime<Utc>>,
    pub items: Vec<InvoiceItemDraft>,
    /// Empty falls back to the first item's currency.
    #[serde(default)]
    pub currency: String,
}

/// Header values that replace what would be copied from an order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InvoiceOverrides {
    #[ts(as = "Option<String>")]
    pub issue_date: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub due_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub discount_percent: Option<i64>,
    pub tax_percent: Option<i64>,
}

/// Invoice with items, payments and the paid / outstanding amounts.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InvoiceDetail {
    pub invoice: Invoice,
    pub client: Client,
    pub items: Vec<InvoiceItem>,
    pub payments: Vec<Payment>,
    pub paid_cents: i64,
    pub balance_cents: i64,
}

/// One row of an invoice listing.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct InvoiceSummary {
    pub id: i64,
    pub invoice_number: String,
    pub client_id: i64,
    pub client_name: String,
    pub status: InvoiceStatus,
    #[ts(as = "String")]
    pub issue_date: DateTime<Utc>,
    pub total_cents: i64,
    pub paid_cents: i64,
    pub currency: String,
}

// =============================================================================
// Payment
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Payment {
    pub id: i64,
    pub invoice_id: i64,
    pub amount_cents: i64,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    #[ts(as = "String")]
    pub paid_at: DateTime<Utc>,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentDraft {
    pub invoice_id: i64,
    pub amount_cents: i64,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    #[ts(as = "Option<String>")]
    pub paid_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

// =============================================================================
// LineItem impls
// =============================================================================

impl LineItem for OrderItem {
    fn qty(&self) -> i64 {
        self.qty
    }
    fn unit_price_cents(&self) -> i64 {
        self.unit_price_cents
    }
    fn discount_percent(&self) -> i64 {
        self.discount_percent
    }
}

impl LineItem for OrderItemDraft {
    fn qty(&self) -> i64 {
        self.qty
    }
    fn unit_price_cents(&self) -> i64 {
        self.unit_price_cents
    }
    fn discount_percent(&self) -> i64 {
        self.discount_percent
    }
}

impl LineItem for InvoiceItem {
    fn qty(&self) -> i64 {
        self.qty
    }
    fn unit_price_cents(&self) -> i64 {
        self.unit_price_cents
    }
}

impl LineItem for InvoiceItemDraft {
    fn qty(&self) -> i64 {
        self.qty
    }
    fn unit_price_cents(&self) -> i64 {
        self.unit_price_cents
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
