//! # Client Repository
//!
//! Database operations for clients and their debt journal.
//!
//! ## Key Operations
//! - CRUD on contact fields
//! - Manual debt adjustments (clamped at 0, journaled)
//! - Debt journal listing
//!
//! The running balance is never edited by [`ClientRepository::update`];
//! orders move it through [`OrderRepository`](super::order::OrderRepository)
//! and operators through [`ClientRepository::adjust_debt`].

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};

use super::{insert_debt_entry, like_pattern, shift_client_debt};
use crate::error::{DbError, DbResult, StepContext};
use tally_core::{Client, ClientUpdate, DebtEntry, DebtEntryKind, NewClient};

/// Repository for client database operations.
#[derive(Debug, Clone)]
pub struct ClientRepository {
    pool: SqlitePool,
}

impl ClientRepository {
    /// Creates a new ClientRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ClientRepository { pool }
    }

    /// Inserts a client with its opening balance.
    pub async fn create(&self, client: &NewClient) -> DbResult<Client> {
        debug!(name = %client.name, debt_cents = client.debt_cents, "Creating client");

        let result = sqlx::query(
            r#"
            INSERT INTO client (name, phone, address, debt_cents, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(client.name.trim())
        .bind(client.phone.as_deref())
        .bind(client.address.as_deref())
        .bind(client.debt_cents)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Client", id))
    }

    /// Gets a client by its ID.
    ///
    /// ## Returns
    /// * `Ok(Some(Client))` - Client found
    /// * `Ok(None)` - Client not found
    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Client>> {
        let client = sqlx::query_as::<_, Client>("SELECT * FROM client WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(client)
    }

    /// Lists clients by name, optionally filtered by name or phone.
    ///
    /// Returns one page plus the total number of matching rows.
    pub async fn list(&self, query: &str, limit: i64, offset: i64) -> DbResult<(Vec<Client>, i64)> {
        let pattern = like_pattern(Some(query));

        let clients = sqlx::query_as::<_, Client>(
            r#"
            SELECT * FROM client
            WHERE (?1 IS NULL OR name LIKE ?1 OR phone LIKE ?1)
            ORDER BY name COLLATE NOCASE, id
            LIMIT ?2 OFFSET ?3
            "#,
        )
        .bind(pattern.as_deref())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM client WHERE (?1 IS NULL OR name LIKE ?1 OR phone LIKE ?1)",
        )
        .bind(pattern.as_deref())
        .fetch_one(&self.pool)
        .await?;

        debug!(count = clients.len(), total, "Listed clients");
        Ok((clients, total))
    }

    /// Updates name, phone and address.
    ///
    /// ## Returns
    /// * `Err(DbError::NotFound)` - Client doesn't exist
    pub async fn update(&self, update: &ClientUpdate) -> DbResult<Client> {
        debug!(id = update.id, "Updating client");

        let result = sqlx::query(
            r#"
            UPDATE client SET
                name = ?2,
                phone = ?3,
                address = ?4,
                updated_at = ?5
            WHERE id = ?1
            "#,
        )
        .bind(update.id)
        .bind(update.name.trim())
        .bind(update.phone.as_deref())
        .bind(update.address.as_deref())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Client", update.id));
        }

        self.get_by_id(update.id)
            .await?
            .ok_or_else(|| DbError::not_found("Client", update.id))
    }

    /// Deletes a client.
    ///
    /// ## Returns
    /// * `Err(DbError::NotFound)` - Client doesn't exist
    /// * `Err(DbError::ForeignKeyViolation)` - Orders or invoices still
    ///   reference the client (including canceled orders)
    pub async fn delete(&self, id: i64) -> DbResult<()> {
        debug!(id, "Deleting client");

        let result = sqlx::query("DELETE FROM client WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Client", id));
        }

        info!(client_id = id, "Client deleted");
        Ok(())
    }

    /// Moves a client's balance by hand.
    ///
    /// The new balance is clamped at 0, so `adjustment_cents` on the
    /// returned entry may be smaller in magnitude than `delta_cents`.
    /// A journal row is always written for an explicit adjustment.
    pub async fn adjust_debt(
        &self,
        client_id: i64,
        delta_cents: i64,
        notes: Option<&str>,
    ) -> DbResult<(Client, DebtEntry)> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        let shift = shift_client_debt(&mut tx, client_id, delta_cents)
            .await
            .step("shift client debt")?;

        let entry = insert_debt_entry(
            &mut tx,
            client_id,
            None,
            DebtEntryKind::ManualAdjustment,
            shift,
            notes,
        )
        .await
        .step("record debt entry")?;

        let client = sqlx::query_as::<_, Client>("SELECT * FROM client WHERE id = ?1")
            .bind(client_id)
            .fetch_one(&mut *tx)
            .await
            .step("reload client")?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(
            client_id,
            requested_cents = delta_cents,
            debt_before = shift.previous,
            debt_after = shift.new,
            "Client debt adjusted"
        );

        Ok((client, entry))
    }

    /// Debt journal for one client, newest first.
    pub async fn debt_entries(
        &self,
        client_id: i64,
        limit: i64,
        offset: i64,
    ) -> DbResult<Vec<DebtEntry>> {
        let entries = sqlx::query_as::<_, DebtEntry>(
            r#"
            SELECT * FROM debt_entry
            WHERE client_id = ?1
            ORDER BY id DESC
            LIMIT ?2 OFFSET ?3
            "#,
        )
        .bind(client_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Counts clients (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM client")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    fn new_client(name: &str, debt_cents: i64) -> NewClient {
        NewClient {
            name: name.to_string(),
            phone: Some("0555 12 34 56".to_string()),
            address: None,
            debt_cents,
        }
    }

    #[tokio::test]
    async fn test_create_and_list() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.clients();

        let benali = repo.create(&new_client("Atelier Benali", 0)).await.unwrap();
        repo.create(&new_client("Quincaillerie Amrani", 2500)).await.unwrap();

        assert_eq!(benali.debt_cents, 0);
        assert!(benali.updated_at.is_none());

        let (all, total) = repo.list("", 20, 0).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(all[0].name, "Atelier Benali");

        let (found, total) = repo.list("amrani", 20, 0).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(found[0].debt_cents, 2500);

        let (by_phone, _) = repo.list("0555", 20, 0).await.unwrap();
        assert_eq!(by_phone.len(), 2);
    }

    #[tokio::test]
    async fn test_update_keeps_debt() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.clients();
        let client = repo.create(&new_client("Benali", 700)).await.unwrap();

        let updated = repo
            .update(&ClientUpdate {
                id: client.id,
                name: "Atelier Benali".to_string(),
                phone: None,
                address: Some("12 rue Didouche".to_string()),
            })
            .await
            .unwrap();

        assert_eq!(updated.name, "Atelier Benali");
        assert_eq!(updated.phone, None);
        assert_eq!(updated.debt_cents, 700);
        assert!(updated.updated_at.is_some());

        let missing = repo
            .update(&ClientUpdate {
                id: 999,
                name: "Ghost".to_string(),
                phone: None,
                address: None,
            })
            .await
            .unwrap_err();
        assert!(missing.is_not_found());
    }

    #[tokio::test]
    async fn test_adjust_debt_clamps_and_journals() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.clients();
        let client = repo.create(&new_client("Benali", 300)).await.unwrap();

        let (client, entry) = repo
            .adjust_debt(client.id, 200, Some("carried over"))
            .await
            .unwrap();
        assert_eq!(client.debt_cents, 500);
        assert_eq!(entry.kind, DebtEntryKind::ManualAdjustment);
        assert_eq!(entry.adjustment_cents, 200);
        assert_eq!(entry.notes.as_deref(), Some("carried over"));

        // Paying back more than is owed stops at zero
        let (client, entry) = repo.adjust_debt(client.id, -2000, None).await.unwrap();
        assert_eq!(client.debt_cents, 0);
        assert_eq!(entry.previous_debt_cents, 500);
        assert_eq!(entry.new_debt_cents, 0);
        assert_eq!(entry.adjustment_cents, -500);

        let entries = repo.debt_entries(client.id, 20, 0).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].adjustment_cents, -500);

        // opening balance + journal = current balance
        let journal: i64 = entries.iter().map(|e| e.adjustment_cents).sum();
        assert_eq!(300 + journal, client.debt_cents);
    }

    #[tokio::test]
    async fn test_adjust_debt_unknown_client() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let err = db.clients().adjust_debt(42, 100, None).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.step(), Some("shift client debt"));
    }

    #[tokio::test]
    async fn test_delete() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.clients();
        let client = repo.create(&new_client("Benali", 0)).await.unwrap();
        repo.adjust_debt(client.id, 100, None).await.unwrap();

        // Journal rows go with the client
        repo.delete(client.id).await.unwrap();
        assert!(repo.get_by_id(client.id).await.unwrap().is_none());
        assert!(repo.debt_entries(client.id, 20, 0).await.unwrap().is_empty());

        assert!(repo.delete(client.id).await.unwrap_err().is_not_found());
    }
}
