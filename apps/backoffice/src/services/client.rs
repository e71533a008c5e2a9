//! # Client Service
//!
//! Client CRUD, manual debt adjustments and the guarded delete flow.
//!
//! ## Delete Remediation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    delete(client_id)                                    │
//! │                                                                         │
//! │  id ≤ 0 ?                         ──► VALIDATION_ERROR                  │
//! │  client missing ?                 ──► NOT_FOUND                         │
//! │  any non-canceled order ?         ──► INTEGRITY_VIOLATION               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DELETE client ── FK refused ──► purge canceled orders ──► DELETE again │
//! │       │                                                    │            │
//! │       ▼                                                    ▼            │
//! │      Ok                                  still refused ──► INTEGRITY    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use tracing::{debug, info, warn};

use super::{page_bounds, Page};
use crate::config::DefaultsConfig;
use crate::error::{AppError, AppResult};
use tally_core::validation::{
    validate_id, validate_name, validate_opening_debt, validate_search_query,
};
use tally_core::{Client, ClientUpdate, DebtEntry, NewClient};
use tally_db::Database;

/// Client operations exposed to the shell.
#[derive(Debug, Clone)]
pub struct ClientService {
    db: Database,
    defaults: DefaultsConfig,
}

impl ClientService {
    pub fn new(db: Database, defaults: DefaultsConfig) -> Self {
        ClientService { db, defaults }
    }

    /// Creates a client with an optional opening balance.
    pub async fn create(&self, client: NewClient) -> AppResult<Client> {
        validate_name("name", &client.name)?;
        validate_opening_debt(client.debt_cents)?;

        Ok(self.db.clients().create(&client).await?)
    }

    /// Gets a client by ID.
    pub async fn get(&self, id: i64) -> AppResult<Client> {
        validate_id("client_id", id)?;

        self.db
            .clients()
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("Client", id))
    }

    /// Lists clients whose name or phone matches `query`.
    pub async fn list(
        &self,
        query: &str,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> AppResult<Page<Client>> {
        let query = validate_search_query(query)?;
        let (limit, offset) = page_bounds(&self.defaults, limit, offset);

        let (items, total) = self.db.clients().list(&query, limit, offset).await?;

        Ok(Page {
            items,
            total,
            limit,
            offset,
        })
    }

    /// Updates name, phone and address. Debt is not touched.
    pub async fn update(&self, update: ClientUpdate) -> AppResult<Client> {
        validate_id("client_id", update.id)?;
        validate_name("name", &update.name)?;

        Ok(self.db.clients().update(&update).await?)
    }

    /// Moves the client's balance by `delta_cents`, clamped at 0.
    pub async fn adjust_debt(
        &self,
        client_id: i64,
        delta_cents: i64,
        notes: Option<String>,
    ) -> AppResult<(Client, DebtEntry)> {
        validate_id("client_id", client_id)?;
        if delta_cents == 0 {
            return Err(AppError::validation("delta_cents must not be zero"));
        }

        let notes = notes
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty());

        Ok(self
            .db
            .clients()
            .adjust_debt(client_id, delta_cents, notes)
            .await?)
    }

    /// Debt journal for one client, newest first.
    pub async fn debt_entries(
        &self,
        client_id: i64,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> AppResult<Vec<DebtEntry>> {
        self.get(client_id).await?;
        let (limit, offset) = page_bounds(&self.defaults, limit, offset);

        Ok(self
            .db
            .clients()
            .debt_entries(client_id, limit, offset)
            .await?)
    }

    /// Deletes a client once nothing but canceled orders reference it.
    pub async fn delete(&self, id: i64) -> AppResult<()> {
        validate_id("client_id", id)?;
        self.get(id).await?;

        if self.db.orders().has_active_orders_for_client(id).await? {
            return Err(AppError::integrity("client has non-canceled orders"));
        }

        match self.db.clients().delete(id).await {
            Ok(()) => return Ok(()),
            Err(e) if e.root().is_foreign_key_violation() => {
                debug!(client_id = id, "Client delete refused, purging canceled orders");
            }
            Err(e) => return Err(e.into()),
        }

        let purged = self.db.orders().delete_canceled_orders_for_client(id).await?;

        match self.db.clients().delete(id).await {
            Ok(()) => {
                info!(client_id = id, purged, "Client deleted after purging canceled orders");
                Ok(())
            }
            Err(e) if e.root().is_foreign_key_violation() => {
                warn!(client_id = id, purged, "Client still referenced after purge");
                Err(AppError::integrity(
                    "client is still referenced by invoices or invoiced orders",
                ))
            }
            Err(e) => Err(e.into()),
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
    use tally_core::{InvoiceOverrides, OrderDraft, OrderItemDraft};
    use tally_db::DbConfig;

    async fn service() -> (Database, ClientService) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let service = ClientService::new(db.clone(), DefaultsConfig::default());
        (db, service)
    }

    fn new_client(name: &str) -> NewClient {
        NewClient {
            name: name.to_string(),
            ..NewClient::default()
        }
    }

    fn draft(client_id: i64) -> OrderDraft {
        OrderDraft {
            client_id,
            notes: None,
            discount_percent: 0,
            issue_date: None,
            due_date: None,
            items: vec![OrderItemDraft {
                product_id: None,
                name_snapshot: "Cement 50kg".to_string(),
                sku_snapshot: None,
                qty: 2,
                unit_price_cents: 1200,
                discount_percent: 0,
                currency: "USD".to_string(),
            }],
        }
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_input() {
        let (_db, service) = service().await;

        let err = service.create(new_client("   ")).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        let err = service
            .create(NewClient {
                debt_cents: -1,
                ..new_client("Atelier Benali")
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        let err = service.get(0).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        let err = service.get(99).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_list_pages() {
        let (_db, service) = service().await;
        for name in ["Benali", "Amrani", "Saidi"] {
            service.create(new_client(name)).await.unwrap();
        }

        let page = service.list("", Some(2), None).await.unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].name, "Amrani");

        let page = service.list("  sai ", None, None).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.limit, 20);
    }

    #[tokio::test]
    async fn test_adjust_debt() {
        let (_db, service) = service().await;
        let client = service.create(new_client("Amrani")).await.unwrap();

        let err = service.adjust_debt(client.id, 0, None).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        let (client, entry) = service
            .adjust_debt(client.id, 750, Some("  opening stock  ".into()))
            .await
            .unwrap();
        assert_eq!(client.debt_cents, 750);
        assert_eq!(entry.notes.as_deref(), Some("opening stock"));

        let entries = service.debt_entries(client.id, None, None).await.unwrap();
        assert_eq!(entries.len(), 1);

        let err = service.adjust_debt(404, 10, None).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_delete_refused_with_active_orders() {
        let (db, service) = service().await;
        let client = service.create(new_client("Saidi")).await.unwrap();
        db.orders().create_order(&draft(client.id)).await.unwrap();

        let err = service.delete(client.id).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::IntegrityViolation);
        assert_eq!(err.message, "client has non-canceled orders");
        assert!(service.get(client.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_purges_canceled_orders() {
        let (db, service) = service().await;
        let client = service.create(new_client("Khelifi")).await.unwrap();
        let first = db.orders().create_order(&draft(client.id)).await.unwrap();
        let second = db.orders().create_order(&draft(client.id)).await.unwrap();

        db.orders().cancel_order_and_adjust_debt(first.id).await.unwrap();
        db.orders().cancel_order_and_adjust_debt(second.id).await.unwrap();

        service.delete(client.id).await.unwrap();

        let err = service.get(client.id).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
        assert!(db.orders().get_by_id(first.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_refused_when_invoice_remains() {
        let (db, service) = service().await;
        let client = service.create(new_client("Haddad")).await.unwrap();
        let order = db.orders().create_order(&draft(client.id)).await.unwrap();
        db.invoices()
            .create_invoice_from_order(order.id, &InvoiceOverrides::default())
            .await
            .unwrap();
        db.orders().cancel_order_and_adjust_debt(order.id).await.unwrap();

        let err = service.delete(client.id).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::IntegrityViolation);

        // The invoiced order survives the purge attempt
        assert!(db.orders().get_by_id(order.id).await.unwrap().is_some());
    }
}
