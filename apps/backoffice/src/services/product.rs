//! # Product Service
//!
//! Catalogue maintenance. Products only seed line-item snapshots; editing
//! or deleting one never rewrites an existing order or invoice.

use tracing::debug;

use super::{page_bounds, Page};
use crate::config::DefaultsConfig;
use crate::error::{AppError, AppResult};
use tally_core::validation::{
    validate_id, validate_name, validate_product_price, validate_search_query, validate_sku,
};
use tally_core::{NewProduct, Product, ProductUpdate, ValidationError};
use tally_db::Database;

/// Product operations exposed to the shell.
#[derive(Debug, Clone)]
pub struct ProductService {
    db: Database,
    defaults: DefaultsConfig,
}

impl ProductService {
    pub fn new(db: Database, defaults: DefaultsConfig) -> Self {
        ProductService { db, defaults }
    }

    pub async fn create(&self, mut product: NewProduct) -> AppResult<Product> {
        validate_name("name", &product.name)?;
        validate_product_price(product.unit_price_cents)?;
        product.sku = normalize_sku(product.sku.take())?;
        product.currency = self.currency_or_default(&product.currency);

        Ok(self.db.products().create(&product).await?)
    }

    pub async fn get(&self, id: i64) -> AppResult<Product> {
        validate_id("product_id", id)?;

        self.db
            .products()
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("Product", id))
    }

    /// Lists products matching `query` on name or SKU.
    ///
    /// `active: Some(true)` hides deactivated products.
    pub async fn list(
        &self,
        query: &str,
        active: Option<bool>,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> AppResult<Page<Product>> {
        let query = validate_search_query(query)?;
        let (limit, offset) = page_bounds(&self.defaults, limit, offset);

        let (items, total) = self
            .db
            .products()
            .list(&query, active, limit, offset)
            .await?;

        Ok(Page {
            items,
            total,
            limit,
            offset,
        })
    }

    pub async fn update(&self, mut update: ProductUpdate) -> AppResult<Product> {
        validate_id("product_id", update.id)?;
        validate_name("name", &update.name)?;
        validate_product_price(update.unit_price_cents)?;
        update.sku = normalize_sku(update.sku.take())?;
        update.currency = self.currency_or_default(&update.currency);

        Ok(self.db.products().update(&update).await?)
    }

    pub async fn activate(&self, id: i64) -> AppResult<Product> {
        validate_id("product_id", id)?;
        Ok(self.db.products().set_active(id, true).await?)
    }

    pub async fn deactivate(&self, id: i64) -> AppResult<Product> {
        validate_id("product_id", id)?;
        Ok(self.db.products().set_active(id, false).await?)
    }

    /// Deletes a product no live order uses.
    ///
    /// Canceled orders keep their snapshot lines with `product_id` cleared.
    pub async fn delete(&self, id: i64) -> AppResult<()> {
        self.get(id).await?;

        let usage = self.db.orders().product_usage(id).await?;
        if usage.active > 0 {
            return Err(AppError::integrity(format!(
                "product is used by {} non-canceled order(s)",
                usage.active
            )));
        }

        debug!(product_id = id, canceled_uses = usage.total, "Deleting product");

        match self.db.products().delete(id).await {
            Ok(()) => Ok(()),
            Err(e) if e.root().is_foreign_key_violation() => {
                Err(AppError::integrity("product is still referenced"))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn currency_or_default(&self, currency: &str) -> String {
        match currency.trim() {
            "" => self.defaults.product_currency.clone(),
            code => code.to_string(),
        }
    }
}

/// Trims a SKU; blank means "no SKU".
fn normalize_sku(sku: Option<String>) -> Result<Option<String>, ValidationError> {
    match sku.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(sku) => {
            validate_sku(sku)?;
            Ok(Some(sku.to_string()))
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
