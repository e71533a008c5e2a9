//! # Order Repository (Debt Ledger Engine)
//!
//! Orders, their items, and the client debt they carry.
//!
//! ## Order Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Order Lifecycle                                   │
//! │                                                                         │
//! │  1. CREATE                                                             │
//! │     └── create_order() → Order { status: PENDING }                     │
//! │         ├── insert header + items                                      │
//! │         ├── client.debt_cents += Σ net item totals                     │
//! │         └── snapshot = client.debt_cents                               │
//! │                                                                         │
//! │  2. (OPTIONAL) UPDATE                                                  │
//! │     └── update_order() → header patched, items replaced wholesale      │
//! │         └── debt untouched, snapshot refreshed                         │
//! │                                                                         │
//! │  3. (OPTIONAL) CANCEL                                                  │
//! │     └── cancel_order_and_adjust_debt() → Order { status: CANCELED }    │
//! │         └── debt -= total, only when no invoice/payment references it │
//! │                                                                         │
//! │  4. (OPTIONAL) PURGE                                                   │
//! │     └── delete_canceled_orders_for_client() → rows gone               │
//! │         └── unblocks client deletion                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every mutation runs in a single transaction. A failing step surfaces as
//! `DbError::Step { step, .. }` and the dropped transaction rolls back.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use super::{
    checked_accumulate, checked_line_total, client_debt, insert_debt_entry, like_pattern,
    next_document_number, shift_client_debt, DocumentKind,
};
use crate::error::{DbError, DbResult, StepContext};
use tally_core::money::Money;
use tally_core::totals::{calc_order_totals, order_debt_total};
use tally_core::{
    Client, DebtEntryKind, Order, OrderDetail, OrderDraft, OrderFilters, OrderItem,
    OrderItemDraft, OrderSort, OrderStatus, OrderUpdate, ProductUsage,
};

/// Repository for order database operations.
///
/// ## Usage
/// ```rust,ignore
/// let orders = db.orders();
/// let order = orders.create_order(&draft).await?;
/// let reversed = orders.cancel_order_and_adjust_debt(order.id).await?;
/// ```
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    // =========================================================================
    // Ledger Mutations
    // =========================================================================

    /// Creates a PENDING order and charges its item total to the client.
    ///
    /// ## Steps (one transaction)
    /// 1. Next `ORD-<year>-<seq>` number
    /// 2. Read client debt (NotFound if the client is missing)
    /// 3. Insert header with a NULL snapshot
    /// 4. Insert items, summing `qty × price − item discount`
    /// 5. Add that sum to `client.debt_cents` when positive
    /// 6. Store the client's debt as the order snapshot
    ///
    /// The order-level `discount_percent` is stored but not subtracted.
    pub async fn create_order(&self, draft: &OrderDraft) -> DbResult<Order> {
        debug!(
            client_id = draft.client_id,
            items = draft.items.len(),
            "Creating order"
        );

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        let order_number = next_document_number(&mut tx, DocumentKind::Order)
            .await
            .step("generate order number")?;

        let debt_before = client_debt(&mut tx, draft.client_id)
            .await
            .step("load client debt")?;

        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO "order" (
                order_number, client_id, status, notes, discount_percent,
                issue_date, due_date, client_debt_snapshot_cents, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL, ?8)
            "#,
        )
        .bind(&order_number)
        .bind(draft.client_id)
        .bind(OrderStatus::Pending)
        .bind(draft.notes.as_deref())
        .bind(draft.discount_percent)
        .bind(draft.issue_date.unwrap_or(now))
        .bind(draft.due_date)
        .bind(now)
        .execute(&mut *tx)
        .await
        .step("insert order header")?;

        let order_id = result.last_insert_rowid();

        let order_total = insert_items(&mut tx, order_id, &draft.items)
            .await
            .step("insert order items")?;

        if order_total > 0 {
            let shift = shift_client_debt(&mut tx, draft.client_id, order_total)
                .await
                .step("increment client debt")?;

            if !shift.is_noop() {
                insert_debt_entry(
                    &mut tx,
                    draft.client_id,
                    Some(order_id),
                    DebtEntryKind::OrderCreated,
                    shift,
                    None,
                )
                .await
                .step("record debt entry")?;
            }
        }

        let debt_after = refresh_debt_snapshot(&mut tx, order_id, draft.client_id)
            .await
            .step("store debt snapshot")?;

        let order = fetch_order(&mut tx, order_id).await.step("reload order")?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(
            order_id,
            order_number = %order.order_number,
            client_id = draft.client_id,
            total_cents = order_total,
            debt_before,
            debt_after,
            "Order created"
        );

        Ok(order)
    }

    /// Patches header fields and/or replaces every item.
    ///
    /// Client debt is never adjusted here, even when the new items total
    /// differently. The snapshot is refreshed regardless.
    ///
    /// ## Returns
    /// * `Err(DbError::NotFound)` - Order doesn't exist
    pub async fn update_order(&self, update: &OrderUpdate) -> DbResult<Order> {
        debug!(
            order_id = update.id,
            header = update.touches_header(),
            replace_items = update.items.is_some(),
            "Updating order"
        );

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        let (_status, client_id) = load_status(&mut tx, update.id)
            .await
            .step("load order")?;

        let previous_total = items_total(&mut tx, update.id)
            .await
            .step("load order items")?;

        if update.touches_header() {
            sqlx::query(
                r#"
                UPDATE "order" SET
                    status = COALESCE(?2, status),
                    notes = COALESCE(?3, notes),
                    discount_percent = COALESCE(?4, discount_percent),
                    due_date = COALESCE(?5, due_date),
                    updated_at = ?6
                WHERE id = ?1
                "#,
            )
            .bind(update.id)
            .bind(update.status)
            .bind(update.notes.as_deref())
            .bind(update.discount_percent)
            .bind(update.due_date)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await
            .step("update order header")?;
        }

        let mut new_total = previous_total;
        if let Some(items) = &update.items {
            sqlx::query("DELETE FROM order_item WHERE order_id = ?1")
                .bind(update.id)
                .execute(&mut *tx)
                .await
                .step("delete order items")?;

            new_total = insert_items(&mut tx, update.id, items)
                .await
                .step("insert order items")?;
        }

        let debt = refresh_debt_snapshot(&mut tx, update.id, client_id)
            .await
            .step("store debt snapshot")?;

        let order = fetch_order(&mut tx, update.id).await.step("reload order")?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(
            order_id = update.id,
            previous_total_cents = previous_total,
            new_total_cents = new_total,
            debt_cents = debt,
            "Order updated"
        );

        Ok(order)
    }

    /// Cancels an order and, when nothing was invoiced or paid against it,
    /// takes its item total back off the client's debt (clamped at 0).
    ///
    /// ## Decision Table
    /// ```text
    /// already CANCELED            → no-op, 0
    /// invoice or payment exists   → status = CANCELED, debt untouched, 0
    /// total = 0                   → status = CANCELED, 0
    /// otherwise                   → status = CANCELED, debt -= total
    /// ```
    ///
    /// ## Returns
    /// The amount actually subtracted from the client's debt.
    pub async fn cancel_order_and_adjust_debt(&self, order_id: i64) -> DbResult<i64> {
        debug!(order_id, "Canceling order");

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        let (status, client_id) = load_status(&mut tx, order_id)
            .await
            .step("load order")?;

        if status == OrderStatus::Canceled {
            debug!(order_id, "Order already canceled");
            return Ok(0);
        }

        let total = items_total(&mut tx, order_id)
            .await
            .step("load order items")?;

        let invoices: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM invoice WHERE order_id = ?1")
            .bind(order_id)
            .fetch_one(&mut *tx)
            .await
            .step("count referencing invoices")?;

        let payments: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM payment p
            JOIN invoice i ON i.id = p.invoice_id
            WHERE i.order_id = ?1
            "#,
        )
        .bind(order_id)
        .fetch_one(&mut *tx)
        .await
        .step("count referencing payments")?;

        sqlx::query(r#"UPDATE "order" SET status = ?2, updated_at = ?3 WHERE id = ?1"#)
            .bind(order_id)
            .bind(OrderStatus::Canceled)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await
            .step("mark order canceled")?;

        let mut reversed = 0;
        if invoices == 0 && payments == 0 && total > 0 {
            let shift = shift_client_debt(&mut tx, client_id, -total)
                .await
                .step("decrement client debt")?;

            if !shift.is_noop() {
                insert_debt_entry(
                    &mut tx,
                    client_id,
                    Some(order_id),
                    DebtEntryKind::OrderCanceled,
                    shift,
                    None,
                )
                .await
                .step("record debt entry")?;
            }

            reversed = -shift.applied();
        }

        let debt_after = refresh_debt_snapshot(&mut tx, order_id, client_id)
            .await
            .step("store debt snapshot")?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(
            order_id,
            client_id,
            total_cents = total,
            invoices,
            payments,
            reversed_cents = reversed,
            debt_before = debt_after + reversed,
            debt_after,
            "Order canceled"
        );

        Ok(reversed)
    }

    /// Purges every CANCELED order of one client together with its items.
    ///
    /// Orders still referenced by an invoice are kept. Returns how many
    /// orders were removed.
    pub async fn delete_canceled_orders_for_client(&self, client_id: i64) -> DbResult<u64> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        let ids: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT id FROM "order"
            WHERE client_id = ?1
              AND status = ?2
              AND id NOT IN (SELECT order_id FROM invoice WHERE order_id IS NOT NULL)
            ORDER BY id
            "#,
        )
        .bind(client_id)
        .bind(OrderStatus::Canceled)
        .fetch_all(&mut *tx)
        .await
        .step("select canceled orders")?;

        if ids.is_empty() {
            debug!(client_id, "No canceled orders to purge");
            return Ok(0);
        }

        for &id in &ids {
            sqlx::query("DELETE FROM order_item WHERE order_id = ?1")
                .bind(id)
                .execute(&mut *tx)
                .await
                .step("delete canceled order items")?;
        }

        let mut removed = 0;
        for &id in &ids {
            removed += sqlx::query(r#"DELETE FROM "order" WHERE id = ?1"#)
                .bind(id)
                .execute(&mut *tx)
                .await
                .step("delete canceled orders")?
                .rows_affected();
        }

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(client_id, removed, "Purged canceled orders");
        Ok(removed)
    }

    // =========================================================================
    // Read Side
    // =========================================================================

    /// Gets an order header by ID.
    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(r#"SELECT * FROM "order" WHERE id = ?1"#)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(order)
    }

    pub async fn get_items(&self, order_id: i64) -> DbResult<Vec<OrderItem>> {
        let items =
            sqlx::query_as::<_, OrderItem>("SELECT * FROM order_item WHERE order_id = ?1 ORDER BY id")
                .bind(order_id)
                .fetch_all(&self.pool)
                .await?;

        Ok(items)
    }

    /// Order with client, items and read-time totals.
    ///
    /// Totals pass an order-level discount of 0: it never applies to orders.
    pub async fn get_order_detail(&self, id: i64) -> DbResult<Option<OrderDetail>> {
        match self.get_by_id(id).await? {
            Some(order) => Ok(Some(self.detail_for(order).await?)),
            None => Ok(None),
        }
    }

    /// Lists orders with their details.
    ///
    /// ## Filters
    /// - `client_id` - one client only
    /// - `status` - one status only
    /// - `query` - LIKE on order number or client name
    ///
    /// Returns one page plus the total number of matching orders.
    pub async fn list_orders(
        &self,
        filters: &OrderFilters,
        limit: i64,
        offset: i64,
    ) -> DbResult<(Vec<OrderDetail>, i64)> {
        let pattern = like_pattern(filters.query.as_deref());

        let sql = format!(
            r#"
            SELECT o.* FROM "order" o
            JOIN client c ON c.id = o.client_id
            WHERE (?1 IS NULL OR o.client_id = ?1)
              AND (?2 IS NULL OR o.status = ?2)
              AND (?3 IS NULL OR o.order_number LIKE ?3 OR c.name LIKE ?3)
            ORDER BY {}
            LIMIT ?4 OFFSET ?5
            "#,
            sort_clause(filters.sort)
        );

        let orders = sqlx::query_as::<_, Order>(&sql)
            .bind(filters.client_id)
            .bind(filters.status)
            .bind(pattern.as_deref())
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM "order" o
            JOIN client c ON c.id = o.client_id
            WHERE (?1 IS NULL OR o.client_id = ?1)
              AND (?2 IS NULL OR o.status = ?2)
              AND (?3 IS NULL OR o.order_number LIKE ?3 OR c.name LIKE ?3)
            "#,
        )
        .bind(filters.client_id)
        .bind(filters.status)
        .bind(pattern.as_deref())
        .fetch_one(&self.pool)
        .await?;

        let mut details = Vec::with_capacity(orders.len());
        for order in orders {
            details.push(self.detail_for(order).await?);
        }

        debug!(count = details.len(), total, "Listed orders");
        Ok((details, total))
    }

    /// True when the client has any order that is not CANCELED.
    pub async fn has_active_orders_for_client(&self, client_id: i64) -> DbResult<bool> {
        let count: i64 =
            sqlx::query_scalar(r#"SELECT COUNT(*) FROM "order" WHERE client_id = ?1 AND status != ?2"#)
                .bind(client_id)
                .bind(OrderStatus::Canceled)
                .fetch_one(&self.pool)
                .await?;

        Ok(count > 0)
    }

    /// How many orders (all / non-canceled) contain the product.
    pub async fn product_usage(&self, product_id: i64) -> DbResult<ProductUsage> {
        let (total, active): (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(DISTINCT o.id),
                COUNT(DISTINCT CASE WHEN o.status != ?2 THEN o.id END)
            FROM order_item oi
            JOIN "order" o ON o.id = oi.order_id
            WHERE oi.product_id = ?1
            "#,
        )
        .bind(product_id)
        .bind(OrderStatus::Canceled)
        .fetch_one(&self.pool)
        .await?;

        Ok(ProductUsage { total, active })
    }

    async fn detail_for(&self, order: Order) -> DbResult<OrderDetail> {
        let client = sqlx::query_as::<_, Client>("SELECT * FROM client WHERE id = ?1")
            .bind(order.client_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Client", order.client_id))?;

        let items = self.get_items(order.id).await?;
        let totals = calc_order_totals(&items, 0);

        Ok(OrderDetail {
            order,
            client,
            items,
            subtotal_cents: totals.subtotal_cents,
            discount_cents: totals.discount_cents,
            tax_cents: totals.tax_cents,
            total_cents: totals.total_cents,
        })
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================

fn sort_clause(sort: OrderSort) -> &'static str {
    match sort {
        OrderSort::NewestFirst => "o.created_at DESC, o.id DESC",
        OrderSort::OldestFirst => "o.created_at ASC, o.id ASC",
        OrderSort::NumberAsc => "o.order_number ASC",
        OrderSort::NumberDesc => "o.order_number DESC",
    }
}

async fn load_status(conn: &mut SqliteConnection, order_id: i64) -> DbResult<(OrderStatus, i64)> {
    sqlx::query_as::<_, (OrderStatus, i64)>(r#"SELECT status, client_id FROM "order" WHERE id = ?1"#)
        .bind(order_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Order", order_id))
}

async fn fetch_order(conn: &mut SqliteConnection, order_id: i64) -> DbResult<Order> {
    sqlx::query_as::<_, Order>(r#"SELECT * FROM "order" WHERE id = ?1"#)
        .bind(order_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Order", order_id))
}

/// Inserts lines and returns their summed net total.
///
/// A line or total that overflows `i64` fails with `AmountOutOfRange`
/// before that line is written.
async fn insert_items(
    conn: &mut SqliteConnection,
    order_id: i64,
    items: &[OrderItemDraft],
) -> DbResult<i64> {
    let mut order_total = Money::zero();

    for (index, item) in items.iter().enumerate() {
        let line_total = checked_line_total(index, item.qty, item.unit_price_cents)?;
        let net_total = line_total.less_percent(item.discount_percent);
        order_total = checked_accumulate(order_total, net_total, "order total")?;

        sqlx::query(
            r#"
            INSERT INTO order_item (
                order_id, product_id, name_snapshot, sku_snapshot,
                qty, unit_price_cents, discount_percent, currency, total_cents
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(order_id)
        .bind(item.product_id)
        .bind(item.name_snapshot.trim())
        .bind(item.sku_snapshot.as_deref())
        .bind(item.qty)
        .bind(item.unit_price_cents)
        .bind(item.discount_percent)
        .bind(&item.currency)
        .bind(line_total.cents())
        .execute(&mut *conn)
        .await?;
    }

    Ok(order_total.cents())
}

/// Recomputes an order's net total from its stored items.
async fn items_total(conn: &mut SqliteConnection, order_id: i64) -> DbResult<i64> {
    let items =
        sqlx::query_as::<_, OrderItem>("SELECT * FROM order_item WHERE order_id = ?1 ORDER BY id")
            .bind(order_id)
            .fetch_all(&mut *conn)
            .await?;

    Ok(order_debt_total(&items))
}

/// Copies the client's current debt onto the order. Returns that debt.
async fn refresh_debt_snapshot(
    conn: &mut SqliteConnection,
    order_id: i64,
    client_id: i64,
) -> DbResult<i64> {
    let debt = client_debt(conn, client_id).await?;

    sqlx::query(r#"UPDATE "order" SET client_debt_snapshot_cents = ?1 WHERE id = ?2"#)
        .bind(debt)
        .bind(order_id)
        .execute(&mut *conn)
        .await?;

    Ok(debt)
}

// =============================================================================
// Unit Tests
// =============================================================================
