//! # Order Service
//!
//! Validates order drafts and updates, then hands them to the ledger
//! engine in `tally-db`.
//!
//! ## Status Changes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  update { status: CANCELED, notes: "..." }                             │
//! │       │                                                                 │
//! │       ├──► cancel(id)             debt reversal rules apply            │
//! │       │                                                                 │
//! │       └──► update_order { status: None, notes: "..." }                 │
//! │                                                                         │
//! │  cancel(id) on COMPLETED ──► INVALID_STATE                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use tracing::{debug, info};

use super::{page_bounds, Page};
use crate::config::DefaultsConfig;
use crate::error::{AppError, AppResult};
use tally_core::validation::{
    validate_id, validate_order_items, validate_percent, validate_search_query,
};
use tally_core::{
    Order, OrderDetail, OrderDraft, OrderFilters, OrderItemDraft, OrderStatus, OrderUpdate,
};
use tally_db::Database;

/// Order operations exposed to the shell.
#[derive(Debug, Clone)]
pub struct OrderService {
    db: Database,
    defaults: DefaultsConfig,
}

impl OrderService {
    pub fn new(db: Database, defaults: DefaultsConfig) -> Self {
        OrderService { db, defaults }
    }

    /// Creates an order and charges its item total to the client.
    ///
    /// An order discount outside `0..=100` is stored as 0; it never
    /// affects the charged amount either way.
    pub async fn create(&self, mut draft: OrderDraft) -> AppResult<Order> {
        validate_id("client_id", draft.client_id)?;
        self.fill_currency(&mut draft.items);
        validate_order_items(&draft.items)?;

        if !(0..=100).contains(&draft.discount_percent) {
            debug!(
                discount_percent = draft.discount_percent,
                "Order discount out of range, storing 0"
            );
            draft.discount_percent = 0;
        }

        if self.db.clients().get_by_id(draft.client_id).await?.is_none() {
            return Err(AppError::not_found("Client", draft.client_id));
        }

        Ok(self.db.orders().create_order(&draft).await?)
    }

    /// Gets an order with its client, items and totals.
    pub async fn get(&self, id: i64) -> AppResult<OrderDetail> {
        validate_id("order_id", id)?;

        self.db
            .orders()
            .get_order_detail(id)
            .await?
            .ok_or_else(|| AppError::not_found("Order", id))
    }

    pub async fn list(
        &self,
        mut filters: OrderFilters,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> AppResult<Page<OrderDetail>> {
        if let Some(client_id) = filters.client_id {
            validate_id("client_id", client_id)?;
        }
        filters.query = match filters.query.take() {
            Some(query) => Some(validate_search_query(&query)?).filter(|q| !q.is_empty()),
            None => None,
        };
        let (limit, offset) = page_bounds(&self.defaults, limit, offset);

        let (items, total) = self.db.orders().list_orders(&filters, limit, offset).await?;

        Ok(Page {
            items,
            total,
            limit,
            offset,
        })
    }

    /// Applies a partial update.
    ///
    /// Replacing items does not move client debt; only the snapshot is
    /// refreshed. A move to CANCELED goes through [`OrderService::cancel`].
    pub async fn update(&self, mut update: OrderUpdate) -> AppResult<Order> {
        validate_id("order_id", update.id)?;
        if let Some(pct) = update.discount_percent {
            validate_percent("discount_percent", pct)?;
        }
        if let Some(items) = update.items.as_mut() {
            self.fill_currency(items);
            validate_order_items(items)?;
        }

        self.load(update.id).await?;

        if update.status == Some(OrderStatus::Canceled) {
            self.cancel(update.id).await?;
            update.status = None;

            if !update.touches_header() && update.items.is_none() {
                return self.load(update.id).await;
            }
        }

        Ok(self.db.orders().update_order(&update).await?)
    }

    /// Cancels an order, reversing its debt when nothing was invoiced or
    /// paid against it. Returns the amount taken off the client's balance.
    pub async fn cancel(&self, id: i64) -> AppResult<i64> {
        validate_id("order_id", id)?;

        let order = self.load(id).await?;
        if order.status == OrderStatus::Completed {
            return Err(AppError::invalid_state(format!(
                "order {} is completed and cannot be canceled",
                order.order_number
            )));
        }

        let reversed = self.db.orders().cancel_order_and_adjust_debt(id).await?;
        info!(order_id = id, reversed_cents = reversed, "Order canceled");

        Ok(reversed)
    }

    /// Every order status, in display order.
    pub fn statuses(&self) -> &'static [OrderStatus] {
        &OrderStatus::ALL
    }

    async fn load(&self, id: i64) -> AppResult<Order> {
        self.db
            .orders()
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("Order", id))
    }

    fn fill_currency(&self, items: &mut [OrderItemDraft]) {
        for item in items.iter_mut().filter(|i| i.currency.trim().is_empty()) {
            item.currency = self.defaults.order_currency.clone();
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use tally_core::NewClient;
    use tally_db::DbConfig;

    async fn setup() -> (Database, OrderService, i64) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let client = db
            .clients()
            .create(&NewClient {
                name: "Batimat Oran".to_string(),
                ..NewClient::default()
            })
            .await
            .unwrap();
        let service = OrderService::new(db.clone(), DefaultsConfig::default());
        (db, service, client.id)
    }

    fn item(qty: i64, price: i64, discount: i64) -> OrderItemDraft {
        OrderItemDraft {
            product_id: None,
            name_snapshot: "Wall Paint 15L".to_string(),
            sku_snapshot: None,
            qty,
            unit_price_cents: price,
            discount_percent: discount,
            currency: String::new(),
        }
    }

    fn draft(client_id: i64, items: Vec<OrderItemDraft>) -> OrderDraft {
        OrderDraft {
            client_id,
            notes: None,
            discount_percent: 0,
            issue_date: None,
            due_date: None,
            items,
        }
    }

    #[tokio::test]
    async fn test_create_validates_items() {
        let (_db, service, client_id) = setup().await;

        let cases = [
            vec![],
            vec![item(0, 500, 0)],
            vec![item(1, 0, 0)],
            vec![item(1, 500, 101)],
            vec![OrderItemDraft {
                name_snapshot: " ".to_string(),
                ..item(1, 500, 0)
            }],
        ];
        for items in cases {
            let err = service.create(draft(client_id, items)).await.unwrap_err();
            assert_eq!(err.code, ErrorCode::ValidationError);
        }

        let err = service.create(draft(0, vec![item(1, 500, 0)])).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn test_create_rejects_amounts_that_overflow() {
        let (db, service, client_id) = setup().await;

        let err = service
            .create(draft(client_id, vec![item(4_000_000_000, 4_000_000_000, 0)]))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
        assert_eq!(err.message, "items[0].qty must be between 1 and 1000000");

        let err = service
            .create(draft(client_id, vec![item(2, i64::MAX, 0)]))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        let order = service
            .create(draft(
                client_id,
                vec![item(tally_core::MAX_QUANTITY, tally_core::MAX_UNIT_PRICE_CENTS, 0)],
            ))
            .await
            .unwrap();
        assert_eq!(order.client_debt_snapshot_cents, Some(100_000_000_000_000_000));

        let client = db.clients().get_by_id(client_id).await.unwrap().unwrap();
        assert_eq!(client.debt_cents, 100_000_000_000_000_000);
    }

    #[tokio::test]
    async fn test_create_rejects_unknown_client() {
        let (_db, service, _client_id) = setup().await;

        let err = service.create(draft(77, vec![item(1, 500, 0)])).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_create_fills_currency_and_coerces_discount() {
        let (db, service, client_id) = setup().await;

        let order = service
            .create(OrderDraft {
                discount_percent: 150,
                ..draft(client_id, vec![item(2, 500, 0), item(1, 1000, 10)])
            })
            .await
            .unwrap();

        assert_eq!(order.discount_percent, 0);
        assert_eq!(order.client_debt_snapshot_cents, Some(1900));

        let items = db.orders().get_items(order.id).await.unwrap();
        assert!(items.iter().all(|i| i.currency == "USD"));
    }

    #[tokio::test]
    async fn test_update_to_canceled_reverses_debt() {
        let (db, service, client_id) = setup().await;
        let order = service
            .create(draft(client_id, vec![item(2, 500, 0), item(1, 1000, 10)]))
            .await
            .unwrap();

        let updated = service
            .update(OrderUpdate {
                id: order.id,
                status: Some(OrderStatus::Canceled),
                notes: Some("client changed their mind".to_string()),
                ..OrderUpdate::default()
            })
            .await
            .unwrap();

        assert_eq!(updated.status, OrderStatus::Canceled);
        assert_eq!(updated.notes.as_deref(), Some("client changed their mind"));

        let client = db.clients().get_by_id(client_id).await.unwrap().unwrap();
        assert_eq!(client.debt_cents, 0);

        // Second cancel is a no-op
        assert_eq!(service.cancel(order.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_update_validation() {
        let (_db, service, client_id) = setup().await;
        let order = service
            .create(draft(client_id, vec![item(1, 500, 0)]))
            .await
            .unwrap();

        let err = service
            .update(OrderUpdate {
                id: order.id,
                discount_percent: Some(-1),
                ..OrderUpdate::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        let err = service
            .update(OrderUpdate {
                id: order.id,
                items: Some(vec![]),
                ..OrderUpdate::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        let err = service
            .update(OrderUpdate {
                id: 999,
                notes: Some("x".to_string()),
                ..OrderUpdate::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_cancel_refuses_completed() {
        let (db, service, client_id) = setup().await;
        let order = service
            .create(draft(client_id, vec![item(3, 700, 0)]))
            .await
            .unwrap();

        service
            .update(OrderUpdate {
                id: order.id,
                status: Some(OrderStatus::Completed),
                ..OrderUpdate::default()
            })
            .await
            .unwrap();

        let err = service.cancel(order.id).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidState);

        let client = db.clients().get_by_id(client_id).await.unwrap().unwrap();
        assert_eq!(client.debt_cents, 2100);
    }

    #[tokio::test]
    async fn test_get_and_list() {
        let (_db, service, client_id) = setup().await;
        let order = service
            .create(draft(client_id, vec![item(2, 500, 0), item(1, 1000, 10)]))
            .await
            .unwrap();

        let detail = service.get(order.id).await.unwrap();
        assert_eq!(detail.total_cents, 1900);
        assert_eq!(detail.client.name, "Batimat Oran");

        let page = service
            .list(
                OrderFilters {
                    query: Some("   ".to_string()),
                    ..OrderFilters::default()
                },
                None,
                None,
            )
            .await
            .unwrap();
        assert_eq!(page.total, 1);

        let page = service
            .list(
                OrderFilters {
                    status: Some(OrderStatus::Canceled),
                    ..OrderFilters::default()
                },
                None,
                None,
            )
            .await
            .unwrap();
        assert_eq!(page.total, 0);

        assert_eq!(service.statuses().len(), 4);
    }
}
