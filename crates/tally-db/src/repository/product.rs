//! # Product Repository
//!
//! Database operations for products.
//!
//! ## Key Operations
//! - CRUD operations
//! - Name / SKU search with LIKE
//! - Activate / deactivate
//!
//! ## Snapshots, Not References
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Why Deleting A Product Is Safe                       │
//! │                                                                         │
//! │  product       id=4  "Cement 50kg"  CEM-50  1200                       │
//! │     ▲                                                                   │
//! │     │ product_id (ON DELETE SET NULL)                                  │
//! │     │                                                                   │
//! │  order_item    product_id=4  name_snapshot="Cement 50kg"  1200         │
//! │                                                                         │
//! │  DELETE product 4                                                      │
//! │     → order_item.product_id = NULL, snapshot columns untouched         │
//! │                                                                         │
//! │  The service still refuses while a non-canceled order uses it.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};

use super::like_pattern;
use crate::error::{DbError, DbResult};
use tally_core::{NewProduct, Product, ProductUpdate, DEFAULT_PRODUCT_CURRENCY};

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = ProductRepository::new(pool);
///
/// // Search active products
/// let (page, total) = repo.list("cement", Some(true), 20, 0).await?;
///
/// // Get by ID
/// let product = repo.get_by_id(4).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Inserts a new product.
    ///
    /// ## Returns
    /// * `Ok(Product)` - Inserted product with generated fields
    /// * `Err(DbError::UniqueViolation)` - SKU already exists
    pub async fn create(&self, product: &NewProduct) -> DbResult<Product> {
        debug!(sku = ?product.sku, name = %product.name, "Inserting product");

        let currency = currency_or_default(&product.currency);

        let result = sqlx::query(
            r#"
            INSERT INTO product (
                sku, name, description, unit_price_cents, currency, active, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6)
            "#,
        )
        .bind(product.sku.as_deref())
        .bind(product.name.trim())
        .bind(product.description.as_deref())
        .bind(product.unit_price_cents)
        .bind(currency)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| sku_conflict(e, product.sku.as_deref()))?;

        let id = result.last_insert_rowid();
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))
    }

    /// Gets a product by its ID.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found
    /// * `Ok(None)` - Product not found
    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM product WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Gets a product by its SKU.
    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM product WHERE sku = ?1")
            .bind(sku)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Lists products sorted by name.
    ///
    /// ## Arguments
    /// * `query` - Matched against name and SKU; empty means no filter
    /// * `active` - `Some(true)` for active only, `None` for all
    pub async fn list(
        &self,
        query: &str,
        active: Option<bool>,
        limit: i64,
        offset: i64,
    ) -> DbResult<(Vec<Product>, i64)> {
        let pattern = like_pattern(Some(query));

        debug!(query = %query, ?active, limit, offset, "Listing products");

        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT * FROM product
            WHERE (?1 IS NULL OR name LIKE ?1 OR sku LIKE ?1)
              AND (?2 IS NULL OR active = ?2)
            ORDER BY name COLLATE NOCASE, id
            LIMIT ?3 OFFSET ?4
            "#,
        )
        .bind(pattern.as_deref())
        .bind(active)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM product
            WHERE (?1 IS NULL OR name LIKE ?1 OR sku LIKE ?1)
              AND (?2 IS NULL OR active = ?2)
            "#,
        )
        .bind(pattern.as_deref())
        .bind(active)
        .fetch_one(&self.pool)
        .await?;

        Ok((products, total))
    }

    /// Updates an existing product.
    ///
    /// Historical order and invoice lines keep their own snapshot.
    ///
    /// ## Returns
    /// * `Err(DbError::NotFound)` - Product doesn't exist
    /// * `Err(DbError::UniqueViolation)` - SKU taken by another product
    pub async fn update(&self, product: &ProductUpdate) -> DbResult<Product> {
        debug!(id = product.id, "Updating product");

        let result = sqlx::query(
            r#"
            UPDATE product SET
                sku = ?2,
                name = ?3,
                description = ?4,
                unit_price_cents = ?5,
                currency = ?6,
                updated_at = ?7
            WHERE id = ?1
            "#,
        )
        .bind(product.id)
        .bind(product.sku.as_deref())
        .bind(product.name.trim())
        .bind(product.description.as_deref())
        .bind(product.unit_price_cents)
        .bind(currency_or_default(&product.currency))
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| sku_conflict(e, product.sku.as_deref()))?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", product.id));
        }

        self.get_by_id(product.id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", product.id))
    }

    /// Activates or deactivates a product.
    ///
    /// Inactive products stay referenced by old orders and drop out of
    /// `list(.., Some(true), ..)`.
    pub async fn set_active(&self, id: i64, active: bool) -> DbResult<Product> {
        debug!(id, active, "Setting product active flag");

        let result = sqlx::query("UPDATE product SET active = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(active)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))
    }

    /// Hard-deletes a product. Line items referencing it get `product_id = NULL`.
    pub async fn delete(&self, id: i64) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM product WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        info!(product_id = id, "Product deleted");
        Ok(())
    }

    /// Counts active products (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM product WHERE active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

fn currency_or_default(currency: &str) -> &str {
    match currency.trim() {
        "" => DEFAULT_PRODUCT_CURRENCY,
        code => code,
    }
}

/// Puts the offending SKU into a UNIQUE violation.
fn sku_conflict(err: sqlx::Error, sku: Option<&str>) -> DbError {
    match DbError::from(err) {
        DbError::UniqueViolation { .. } => DbError::duplicate("sku", sku.unwrap_or_default()),
        other => other,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    fn cement() -> NewProduct {
        NewProduct {
            sku: Some("CEM-50".to_string()),
            name: "Cement 50kg".to_string(),
            description: None,
            unit_price_cents: 1200,
            currency: String::new(),
        }
    }

    #[tokio::test]
    async fn test_create_defaults_currency() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = db.products().create(&cement()).await.unwrap();

        assert_eq!(product.currency, "DZD");
        assert!(product.active);
        assert_eq!(product.price().to_string(), "12.00");
    }

    #[tokio::test]
    async fn test_duplicate_sku() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();
        repo.create(&cement()).await.unwrap();

        let err = repo.create(&cement()).await.unwrap_err();
        match err {
            DbError::UniqueViolation { field, value } => {
                assert_eq!(field, "sku");
                assert_eq!(value, "CEM-50");
            }
            other => panic!("expected UniqueViolation, got {other:?}"),
        }

        // SKU is optional; many products may have none
        let loose = NewProduct {
            sku: None,
            ..cement()
        };
        repo.create(&loose).await.unwrap();
        repo.create(&loose).await.unwrap();
    }

    #[tokio::test]
    async fn test_list_and_deactivate() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();
        let cement = repo.create(&cement()).await.unwrap();
        repo.create(&NewProduct {
            sku: Some("REB-12".to_string()),
            name: "Rebar 12mm".to_string(),
            description: Some("6m bar".to_string()),
            unit_price_cents: 850,
            currency: "DZD".to_string(),
        })
        .await
        .unwrap();

        let (found, total) = repo.list("reb", None, 20, 0).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(found[0].sku.as_deref(), Some("REB-12"));

        repo.set_active(cement.id, false).await.unwrap();
        let (active, total) = repo.list("", Some(true), 20, 0).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(active[0].name, "Rebar 12mm");
        assert_eq!(repo.count().await.unwrap(), 1);

        let (all, _) = repo.list("", None, 20, 0).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();
        let product = repo.create(&cement()).await.unwrap();

        let updated = repo
            .update(&ProductUpdate {
                id: product.id,
                sku: product.sku.clone(),
                name: "Cement 50kg (grey)".to_string(),
                description: None,
                unit_price_cents: 1350,
                currency: "DZD".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(updated.unit_price_cents, 1350);
        assert!(updated.updated_at.is_some());
        assert_eq!(
            repo.get_by_sku("CEM-50").await.unwrap().map(|p| p.id),
            Some(product.id)
        );

        repo.delete(product.id).await.unwrap();
        assert!(repo.get_by_id(product.id).await.unwrap().is_none());
        assert!(repo.delete(product.id).await.unwrap_err().is_not_found());
    }
}
