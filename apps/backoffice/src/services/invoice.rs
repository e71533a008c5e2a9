//! # Invoice Service
//!
//! Invoices and payments. Nothing here moves client debt: the balance
//! follows orders, and payments are tracked per invoice.

use super::{page_bounds, Page};
use crate::config::DefaultsConfig;
use crate::error::{AppError, AppResult};
use tally_core::validation::{
    validate_id, validate_invoice_items, validate_payment_amount, validate_percent,
};
use tally_core::{
    Invoice, InvoiceDetail, InvoiceDraft, InvoiceOverrides, InvoiceStatus, InvoiceSummary,
    Payment, PaymentDraft,
};
use tally_db::Database;

/// Invoice operations exposed to the shell.
#[derive(Debug, Clone)]
pub struct InvoiceService {
    db: Database,
    defaults: DefaultsConfig,
}

impl InvoiceService {
    pub fn new(db: Database, defaults: DefaultsConfig) -> Self {
        InvoiceService { db, defaults }
    }

    /// Creates a standalone DRAFT invoice.
    pub async fn create(&self, mut draft: InvoiceDraft) -> AppResult<Invoice> {
        validate_id("client_id", draft.client_id)?;
        if let Some(order_id) = draft.order_id {
            validate_id("order_id", order_id)?;
        }
        validate_percent("discount_percent", draft.discount_percent)?;
        validate_percent("tax_percent", draft.tax_percent)?;
        validate_invoice_items(&draft.items)?;

        let no_currency = draft.currency.trim().is_empty()
            && draft.items.iter().all(|i| i.currency.trim().is_empty());
        if no_currency {
            draft.currency = self.defaults.order_currency.clone();
        }

        Ok(self.db.invoices().create_invoice(&draft).await?)
    }

    /// Invoices an existing order, copying its item snapshots.
    pub async fn create_from_order(
        &self,
        order_id: i64,
        overrides: InvoiceOverrides,
    ) -> AppResult<Invoice> {
        validate_id("order_id", order_id)?;
        if let Some(pct) = overrides.discount_percent {
            validate_percent("discount_percent", pct)?;
        }
        if let Some(pct) = overrides.tax_percent {
            validate_percent("tax_percent", pct)?;
        }

        Ok(self
            .db
            .invoices()
            .create_invoice_from_order(order_id, &overrides)
            .await?)
    }

    /// Gets an invoice with items, payments and balance.
    pub async fn get(&self, id: i64) -> AppResult<InvoiceDetail> {
        validate_id("invoice_id", id)?;

        self.db
            .invoices()
            .get_invoice_detail(id)
            .await?
            .ok_or_else(|| AppError::not_found("Invoice", id))
    }

    pub async fn list(
        &self,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> AppResult<Page<InvoiceSummary>> {
        let (limit, offset) = page_bounds(&self.defaults, limit, offset);
        let (items, total) = self.db.invoices().list_invoices(limit, offset).await?;

        Ok(Page {
            items,
            total,
            limit,
            offset,
        })
    }

    pub async fn record_payment(&self, payment: PaymentDraft) -> AppResult<Payment> {
        validate_id("invoice_id", payment.invoice_id)?;
        validate_payment_amount(payment.amount_cents)?;

        Ok(self.db.invoices().record_payment(&payment).await?)
    }

    pub async fn set_status(&self, id: i64, status: InvoiceStatus) -> AppResult<Invoice> {
        validate_id("invoice_id", id)?;

        Ok(self.db.invoices().set_invoice_status(id, status).await?)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
