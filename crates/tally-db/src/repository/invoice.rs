//! # Invoice Repository
//!
//! Invoices, their items, and payments recorded against them.
//!
//! Invoices never touch client debt. Paid and outstanding amounts are
//! summed from payment rows on every read:
//!
//! ```text
//! invoice.total_cents ─┐
//!                      ├── balance = total − Σ payment.amount_cents
//! payment rows ────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use super::{checked_accumulate, checked_line_total, next_document_number, DocumentKind};
use crate::error::{DbError, DbResult, StepContext};
use tally_core::money::Money;
use tally_core::totals::{calc_invoice_totals, calculate_invoice_balance};
use tally_core::{
    Client, Invoice, InvoiceDetail, InvoiceDraft, InvoiceItem, InvoiceItemDraft,
    InvoiceOverrides, InvoiceStatus, InvoiceSummary, Order, OrderItem, OrderStatus, Payment,
    PaymentDraft, DEFAULT_ORDER_CURRENCY,
};

/// Repository for invoice and payment database operations.
#[derive(Debug, Clone)]
pub struct InvoiceRepository {
    pool: SqlitePool,
}

impl InvoiceRepository {
    /// Creates a new InvoiceRepository.
    pub fn new(pool: SqlitePool) -> Self {
        InvoiceRepository { pool }
    }

    /// Creates a DRAFT invoice with its items.
    ///
    /// ## Steps (one transaction)
    /// 1. Next `INV-<year>-<seq>` number
    /// 2. Insert header with zero totals
    /// 3. Insert items with `qty × price` line totals
    /// 4. Write subtotal and total from `calc_invoice_totals`
    pub async fn create_invoice(&self, draft: &InvoiceDraft) -> DbResult<Invoice> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        let invoice_id = insert_invoice(&mut tx, draft).await?;

        let invoice = fetch_invoice(&mut tx, invoice_id)
            .await
            .step("reload invoice")?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(
            invoice_id,
            invoice_number = %invoice.invoice_number,
            client_id = invoice.client_id,
            total_cents = invoice.total_cents,
            "Invoice created"
        );

        Ok(invoice)
    }

    /// Invoices an order: same client, same item snapshots.
    ///
    /// Discount defaults to the order's `discount_percent`, tax to 0.
    ///
    /// ## Returns
    /// * `Err(DbError::NotFound)` - Order doesn't exist
    /// * `Err(DbError::InvalidState)` - Order is CANCELED
    pub async fn create_invoice_from_order(
        &self,
        order_id: i64,
        overrides: &InvoiceOverrides,
    ) -> DbResult<Invoice> {
        debug!(order_id, "Creating invoice from order");

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        let order = sqlx::query_as::<_, Order>(r#"SELECT * FROM "order" WHERE id = ?1"#)
            .bind(order_id)
            .fetch_optional(&mut *tx)
            .await
            .step("load order")?
            .ok_or_else(|| DbError::not_found("Order", order_id))?;

        if order.status == OrderStatus::Canceled {
            return Err(DbError::invalid_state(format!(
                "order {} is canceled and cannot be invoiced",
                order.order_number
            )));
        }

        let items =
            sqlx::query_as::<_, OrderItem>("SELECT * FROM order_item WHERE order_id = ?1 ORDER BY id")
                .bind(order_id)
                .fetch_all(&mut *tx)
                .await
                .step("load order items")?;

        let draft = InvoiceDraft {
            order_id: Some(order.id),
            client_id: order.client_id,
            notes: overrides.notes.clone().or_else(|| order.notes.clone()),
            discount_percent: overrides.discount_percent.unwrap_or(order.discount_percent),
            tax_percent: overrides.tax_percent.unwrap_or(0),
            issue_date: overrides.issue_date,
            due_date: overrides.due_date.or(order.due_date),
            items: items.iter().map(InvoiceItemDraft::from).collect(),
            currency: String::new(),
        };

        let invoice_id = insert_invoice(&mut tx, &draft).await?;

        let invoice = fetch_invoice(&mut tx, invoice_id)
            .await
            .step("reload invoice")?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(
            invoice_id,
            invoice_number = %invoice.invoice_number,
            order_number = %order.order_number,
            total_cents = invoice.total_cents,
            "Invoice created from order"
        );

        Ok(invoice)
    }

    /// Gets an invoice header by ID.
    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Invoice>> {
        let invoice = sqlx::query_as::<_, Invoice>("SELECT * FROM invoice WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(invoice)
    }

    /// Invoice with client, items, payments, paid and balance.
    pub async fn get_invoice_detail(&self, id: i64) -> DbResult<Option<InvoiceDetail>> {
        let Some(invoice) = self.get_by_id(id).await? else {
            return Ok(None);
        };

        let client = sqlx::query_as::<_, Client>("SELECT * FROM client WHERE id = ?1")
            .bind(invoice.client_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Client", invoice.client_id))?;

        let items = sqlx::query_as::<_, InvoiceItem>(
            "SELECT * FROM invoice_item WHERE invoice_id = ?1 ORDER BY id",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let payments = self.get_payments(id).await?;
        let paid_cents = payments.iter().map(|p| p.amount_cents).sum();
        let balance_cents = calculate_invoice_balance(invoice.total_cents, &payments);

        Ok(Some(InvoiceDetail {
            invoice,
            client,
            items,
            payments,
            paid_cents,
            balance_cents,
        }))
    }

    /// Lists invoice headers, newest first.
    pub async fn list_invoices(
        &self,
        limit: i64,
        offset: i64,
    ) -> DbResult<(Vec<InvoiceSummary>, i64)> {
        let invoices = sqlx::query_as::<_, InvoiceSummary>(
            r#"
            SELECT
                i.id,
                i.invoice_number,
                i.client_id,
                c.name AS client_name,
                i.status,
                i.issue_date,
                i.total_cents,
                COALESCE(
                    (SELECT SUM(p.amount_cents) FROM payment p WHERE p.invoice_id = i.id),
                    0
                ) AS paid_cents,
                i.currency
            FROM invoice i
            JOIN client c ON c.id = i.client_id
            ORDER BY i.created_at DESC, i.id DESC
            LIMIT ?1 OFFSET ?2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM invoice")
            .fetch_one(&self.pool)
            .await?;

        Ok((invoices, total))
    }

    /// Records a payment. Neither the invoice status nor client debt changes.
    ///
    /// ## Returns
    /// * `Err(DbError::NotFound)` - Invoice doesn't exist
    pub async fn record_payment(&self, payment: &PaymentDraft) -> DbResult<Payment> {
        debug!(
            invoice_id = payment.invoice_id,
            amount_cents = payment.amount_cents,
            method = ?payment.method,
            "Recording payment"
        );

        if self.get_by_id(payment.invoice_id).await?.is_none() {
            return Err(DbError::not_found("Invoice", payment.invoice_id));
        }

        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO payment (
                invoice_id, amount_cents, method, reference, paid_at, notes, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(payment.invoice_id)
        .bind(payment.amount_cents)
        .bind(payment.method)
        .bind(payment.reference.as_deref())
        .bind(payment.paid_at.unwrap_or(now))
        .bind(payment.notes.as_deref())
        .bind(now)
        .execute(&self.pool)
        .await?;

        let recorded = sqlx::query_as::<_, Payment>("SELECT * FROM payment WHERE id = ?1")
            .bind(result.last_insert_rowid())
            .fetch_one(&self.pool)
            .await?;

        info!(
            payment_id = recorded.id,
            invoice_id = recorded.invoice_id,
            amount_cents = recorded.amount_cents,
            "Payment recorded"
        );

        Ok(recorded)
    }

    /// Payments for an invoice, oldest first.
    pub async fn get_payments(&self, invoice_id: i64) -> DbResult<Vec<Payment>> {
        let payments = sqlx::query_as::<_, Payment>(
            "SELECT * FROM payment WHERE invoice_id = ?1 ORDER BY paid_at, id",
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(payments)
    }

    /// Sets the status string. No other operation changes it.
    pub async fn set_invoice_status(&self, id: i64, status: InvoiceStatus) -> DbResult<Invoice> {
        let result = sqlx::query("UPDATE invoice SET status = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(status)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Invoice", id));
        }

        info!(invoice_id = id, status = status.as_str(), "Invoice status set");

        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Invoice", id))
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================

/// Header currency: explicit, else the first line's, else the order default.
fn invoice_currency(draft: &InvoiceDraft) -> String {
    let explicit = draft.currency.trim();
    if !explicit.is_empty() {
        return explicit.to_string();
    }

    draft
        .items
        .iter()
        .map(|item| item.currency.trim())
        .find(|code| !code.is_empty())
        .unwrap_or(DEFAULT_ORDER_CURRENCY)
        .to_string()
}

/// Inserts header and items and writes the computed totals.
async fn insert_invoice(conn: &mut SqliteConnection, draft: &InvoiceDraft) -> DbResult<i64> {
    let invoice_number = next_document_number(conn, DocumentKind::Invoice)
        .await
        .step("generate invoice number")?;

    let client_exists: Option<i64> = sqlx::query_scalar("SELECT id FROM client WHERE id = ?1")
        .bind(draft.client_id)
        .fetch_optional(&mut *conn)
        .await
        .step("load client")?;
    if client_exists.is_none() {
        return Err(DbError::not_found("Client", draft.client_id).at_step("load client"));
    }

    let currency = invoice_currency(draft);
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO invoice (
            invoice_number, order_id, client_id, status, issue_date, due_date, notes,
            subtotal_cents, discount_percent, tax_percent, total_cents, currency, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8, ?9, 0, ?10, ?11)
        "#,
    )
    .bind(&invoice_number)
    .bind(draft.order_id)
    .bind(draft.client_id)
    .bind(InvoiceStatus::Draft)
    .bind(draft.issue_date.unwrap_or(now))
    .bind(draft.due_date)
    .bind(draft.notes.as_deref())
    .bind(draft.discount_percent)
    .bind(draft.tax_percent)
    .bind(&currency)
    .bind(now)
    .execute(&mut *conn)
    .await
    .step("insert invoice header")?;

    let invoice_id = result.last_insert_rowid();
    let mut subtotal = Money::zero();

    for (index, item) in draft.items.iter().enumerate() {
        let line_total = checked_line_total(index, item.qty, item.unit_price_cents)
            .step("insert invoice items")?;
        subtotal = checked_accumulate(subtotal, line_total, "invoice subtotal")
            .step("insert invoice items")?;

        let line_currency = match item.currency.trim() {
            "" => currency.as_str(),
            code => code,
        };

        sqlx::query(
            r#"
            INSERT INTO invoice_item (
                invoice_id, product_id, name_snapshot, sku_snapshot,
                qty, unit_price_cents, currency, total_cents
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(invoice_id)
        .bind(item.product_id)
        .bind(item.name_snapshot.trim())
        .bind(item.sku_snapshot.as_deref())
        .bind(item.qty)
        .bind(item.unit_price_cents)
        .bind(line_currency)
        .bind(line_total.cents())
        .execute(&mut *conn)
        .await
        .step("insert invoice items")?;
    }

    let totals = calc_invoice_totals(&draft.items, draft.discount_percent, draft.tax_percent);
    // Tax can push the total past the subtotal
    let taxable = Money::from_cents(totals.subtotal_cents - totals.discount_cents);
    checked_accumulate(taxable, Money::from_cents(totals.tax_cents), "invoice total")
        .step("store invoice totals")?;

    sqlx::query("UPDATE invoice SET subtotal_cents = ?2, total_cents = ?3 WHERE id = ?1")
        .bind(invoice_id)
        .bind(totals.subtotal_cents)
        .bind(totals.total_cents)
        .execute(&mut *conn)
        .await
        .step("store invoice totals")?;

    Ok(invoice_id)
}

async fn fetch_invoice(conn: &mut SqliteConnection, invoice_id: i64) -> DbResult<Invoice> {
    sqlx::query_as::<_, Invoice>("SELECT * FROM invoice WHERE id = ?1")
        .bind(invoice_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Invoice", invoice_id))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::Datelike;
    use tally_core::{NewClient, OrderDraft, OrderItemDraft, PaymentMethod};

    async fn setup() -> (Database, Client) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let client = db
            .clients()
            .create(&NewClient {
                name: "Atelier Benali".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        (db, client)
    }

    fn cement_draft(client_id: i64) -> InvoiceDraft {
        InvoiceDraft {
            order_id: None,
            client_id,
            notes: None,
            discount_percent: 10,
            tax_percent: 5,
            issue_date: None,
            due_date: None,
            items: vec![InvoiceItemDraft {
                product_id: None,
                name_snapshot: "Cement 50kg".to_string(),
                sku_snapshot: Some("CEM-50".to_string()),
                qty: 3,
                unit_price_cents: 700,
                currency: "DZD".to_string(),
            }],
            currency: String::new(),
        }
    }

    fn payment(invoice_id: i64, amount_cents: i64) -> PaymentDraft {
        PaymentDraft {
            invoice_id,
            amount_cents,
            method: PaymentMethod::Transfer,
            reference: Some("VIR-0091".to_string()),
            paid_at: None,
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_create_invoice_stores_totals() {
        let (db, client) = setup().await;
        let invoice = db.invoices().create_invoice(&cement_draft(client.id)).await.unwrap();

        assert_eq!(invoice.invoice_number, format!("INV-{}-0001", Utc::now().year()));
        assert_eq!(invoice.status, InvoiceStatus::Draft);
        assert_eq!(invoice.subtotal_cents, 2100);
        assert_eq!(invoice.total_cents, 1984);
        assert_eq!(invoice.currency, "DZD");

        // Invoices are outside the debt ledger
        let client = db.clients().get_by_id(client.id).await.unwrap().unwrap();
        assert_eq!(client.debt_cents, 0);
    }

    #[tokio::test]
    async fn test_create_invoice_unknown_client() {
        let (db, _client) = setup().await;
        let err = db.invoices().create_invoice(&cement_draft(404)).await.unwrap_err();

        assert!(err.is_not_found());
        let (invoices, total) = db.invoices().list_invoices(20, 0).await.unwrap();
        assert!(invoices.is_empty());
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn test_create_invoice_overflow_writes_nothing() {
        let (db, client) = setup().await;

        let mut draft = cement_draft(client.id);
        draft.items[0].qty = 4_000_000_000;
        draft.items[0].unit_price_cents = 4_000_000_000;

        let err = db.invoices().create_invoice(&draft).await.unwrap_err();
        assert!(matches!(err.root(), DbError::AmountOutOfRange { .. }));
        assert_eq!(err.step(), Some("insert invoice items"));

        // A subtotal that fits can still overflow once tax is added
        let mut draft = cement_draft(client.id);
        draft.discount_percent = 0;
        draft.tax_percent = 100;
        draft.items[0].qty = 1;
        draft.items[0].unit_price_cents = i64::MAX - 10;

        let err = db.invoices().create_invoice(&draft).await.unwrap_err();
        assert!(matches!(err.root(), DbError::AmountOutOfRange { .. }));
        assert_eq!(err.step(), Some("store invoice totals"));

        let (invoices, total) = db.invoices().list_invoices(20, 0).await.unwrap();
        assert!(invoices.is_empty());
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn test_payments_and_balance() {
        let (db, client) = setup().await;
        let invoices = db.invoices();
        let invoice = invoices.create_invoice(&cement_draft(client.id)).await.unwrap();

        invoices.record_payment(&payment(invoice.id, 1000)).await.unwrap();
        invoices.record_payment(&payment(invoice.id, 484)).await.unwrap();

        let detail = invoices.get_invoice_detail(invoice.id).await.unwrap().unwrap();
        assert_eq!(detail.payments.len(), 2);
        assert_eq!(detail.paid_cents, 1484);
        assert_eq!(detail.balance_cents, 500);
        assert_eq!(detail.items[0].total_cents, 2100);
        assert_eq!(detail.client.name, "Atelier Benali");

        // Payments never move the status
        assert_eq!(detail.invoice.status, InvoiceStatus::Draft);

        let (summaries, total) = invoices.list_invoices(20, 0).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(summaries[0].paid_cents, 1484);
        assert_eq!(summaries[0].client_name, "Atelier Benali");

        let err = invoices.record_payment(&payment(999, 100)).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_set_status() {
        let (db, client) = setup().await;
        let invoices = db.invoices();
        let invoice = invoices.create_invoice(&cement_draft(client.id)).await.unwrap();

        let issued = invoices
            .set_invoice_status(invoice.id, InvoiceStatus::Issued)
            .await
            .unwrap();
        assert_eq!(issued.status, InvoiceStatus::Issued);
        assert!(issued.updated_at.is_some());

        assert!(invoices
            .set_invoice_status(999, InvoiceStatus::Paid)
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn test_invoice_from_order() {
        let (db, client) = setup().await;
        let order = db
            .orders()
            .create_order(&OrderDraft {
                client_id: client.id,
                notes: Some("site B".to_string()),
                discount_percent: 10,
                issue_date: None,
                due_date: None,
                items: vec![OrderItemDraft {
                    product_id: None,
                    name_snapshot: "Cement 50kg".to_string(),
                    sku_snapshot: None,
                    qty: 3,
                    unit_price_cents: 700,
                    discount_percent: 0,
                    currency: "DZD".to_string(),
                }],
            })
            .await
            .unwrap();

        let invoice = db
            .invoices()
            .create_invoice_from_order(
                order.id,
                &InvoiceOverrides {
                    tax_percent: Some(5),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(invoice.order_id, Some(order.id));
        assert_eq!(invoice.client_id, client.id);
        assert_eq!(invoice.discount_percent, 10);
        assert_eq!(invoice.tax_percent, 5);
        assert_eq!(invoice.total_cents, 1984);
        assert_eq!(invoice.notes.as_deref(), Some("site B"));
        assert_eq!(invoice.currency, "DZD");

        let missing = db
            .invoices()
            .create_invoice_from_order(999, &InvoiceOverrides::default())
            .await
            .unwrap_err();
        assert!(missing.is_not_found());
    }

    #[tokio::test]
    async fn test_canceled_order_cannot_be_invoiced() {
        let (db, client) = setup().await;
        let order = db
            .orders()
            .create_order(&OrderDraft {
                client_id: client.id,
                notes: None,
                discount_percent: 0,
                issue_date: None,
                due_date: None,
                items: vec![OrderItemDraft {
                    product_id: None,
                    name_snapshot: "Bolt".to_string(),
                    sku_snapshot: None,
                    qty: 1,
                    unit_price_cents: 50,
                    discount_percent: 0,
                    currency: "USD".to_string(),
                }],
            })
            .await
            .unwrap();
        db.orders().cancel_order_and_adjust_debt(order.id).await.unwrap();

        let err = db
            .invoices()
            .create_invoice_from_order(order.id, &InvoiceOverrides::default())
            .await
            .unwrap_err();
        assert!(matches!(err.root(), DbError::InvalidState { .. }));
    }
}
