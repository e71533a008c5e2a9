//! # Validation Module
//!
//! Input rules checked by the service layer before the ledger opens a
//! transaction.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Shell (desktop UI / CLI)                                     │
//! │  └── Basic format checks, immediate feedback                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Service layer (backoffice)                                   │
//! │  └── THIS MODULE: business rule validation, nothing written yet        │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL / CHECK constraints (debt_cents >= 0, qty > 0)           │
//! │  ├── UNIQUE constraints (sku, order_number, invoice_number)            │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Item errors name the offending line, e.g. `items[1].qty must be positive`.

use crate::error::ValidationError;
use crate::types::{InvoiceItemDraft, OrderItemDraft};
use crate::{
    DEFAULT_PAGE_SIZE, MAX_NAME_LENGTH, MAX_PAGE_SIZE, MAX_QUANTITY, MAX_UNIT_PRICE_CENTS,
};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Identifier Validators
// =============================================================================

/// Validates a row id supplied by the caller.
///
/// ```rust
/// use tally_core::validation::validate_id;
///
/// assert!(validate_id("client_id", 7).is_ok());
/// assert!(validate_id("client_id", 0).is_err());
/// ```
pub fn validate_id(field: &str, id: i64) -> ValidationResult<()> {
    if id <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// String Validators
// =============================================================================

/// Validates a display name (client, product, line snapshot).
///
/// ## Rules
/// - Must not be empty after trimming
/// - At most MAX_NAME_LENGTH characters
pub fn validate_name(field: &str, name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NAME_LENGTH,
        });
    }

    Ok(())
}

/// Validates a SKU.
///
/// ## Rules
/// - Must not be empty
/// - At most 50 characters
/// - Letters, digits, hyphens and underscores only
///
/// ```rust
/// use tally_core::validation::validate_sku;
///
/// assert!(validate_sku("CEM-50").is_ok());
/// assert!(validate_sku("has space").is_err());
/// ```
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();

    if sku.is_empty() {
        return Err(ValidationError::Required {
            field: "sku".to_string(),
        });
    }

    if sku.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "sku".to_string(),
            max: 50,
        });
    }

    if !sku
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "sku".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Trims a list/search query. Empty means "no filter".
pub fn validate_search_query(query: &str) -> ValidationResult<String> {
    let query = query.trim();

    if query.len() > 100 {
        return Err(ValidationError::TooLong {
            field: "query".to_string(),
            max: 100,
        });
    }

    Ok(query.to_string())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity. Must be positive.
pub fn validate_quantity(field: &str, qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    if qty > MAX_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 1,
            max: MAX_QUANTITY,
        });
    }
    Ok(())
}

/// Validates an order/invoice line price. Must be positive and at most
/// [`MAX_UNIT_PRICE_CENTS`].
pub fn validate_unit_price(field: &str, cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    if cents > MAX_UNIT_PRICE_CENTS {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 1,
            max: MAX_UNIT_PRICE_CENTS,
        });
    }
    Ok(())
}

/// Validates a catalogue price. Zero is allowed (free items).
pub fn validate_product_price(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: "unit_price_cents".to_string(),
        });
    }
    if cents > MAX_UNIT_PRICE_CENTS {
        return Err(ValidationError::OutOfRange {
            field: "unit_price_cents".to_string(),
            min: 0,
            max: MAX_UNIT_PRICE_CENTS,
        });
    }
    Ok(())
}

/// Validates a whole-number percentage in `0..=100`.
pub fn validate_percent(field: &str, pct: i64) -> ValidationResult<()> {
    if !(0..=100).contains(&pct) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: 100,
        });
    }
    Ok(())
}

/// Validates an opening debt balance.
pub fn validate_opening_debt(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: "debt_cents".to_string(),
        });
    }
    Ok(())
}

/// Validates a payment amount in cents. Must be positive.
pub fn validate_payment_amount(cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "amount_cents".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Line Item Validators
// =============================================================================

/// Validates a full set of order lines.
///
/// ## Rules
/// - At least one line
/// - Each line: non-empty name, qty in `1..=MAX_QUANTITY`, price in
///   `1..=MAX_UNIT_PRICE_CENTS`, discount in `0..=100`
pub fn validate_order_items(items: &[OrderItemDraft]) -> ValidationResult<()> {
    if items.is_empty() {
        return Err(ValidationError::Empty {
            field: "items".to_string(),
        });
    }

    for (i, item) in items.iter().enumerate() {
        validate_name(&format!("items[{i}].name_snapshot"), &item.name_snapshot)?;
        validate_quantity(&format!("items[{i}].qty"), item.qty)?;
        validate_unit_price(&format!("items[{i}].unit_price_cents"), item.unit_price_cents)?;
        validate_percent(&format!("items[{i}].discount_percent"), item.discount_percent)?;
    }

    Ok(())
}

/// Validates a full set of invoice lines.
pub fn validate_invoice_items(items: &[InvoiceItemDraft]) -> ValidationResult<()> {
    if items.is_empty() {
        return Err(ValidationError::Empty {
            field: "items".to_string(),
        });
    }

    for (i, item) in items.iter().enumerate() {
        validate_name(&format!("items[{i}].name_snapshot"), &item.name_snapshot)?;
        validate_quantity(&format!("items[{i}].qty"), item.qty)?;
        validate_unit_price(&format!("items[{i}].unit_price_cents"), item.unit_price_cents)?;
    }

    Ok(())
}

// =============================================================================
// Pagination
// =============================================================================

/// Normalises list pagination.
///
/// A limit of zero or less becomes DEFAULT_PAGE_SIZE, anything above
/// MAX_PAGE_SIZE is capped, and a negative offset becomes 0.
///
/// ```rust
/// use tally_core::validation::clamp_page;
///
/// assert_eq!(clamp_page(0, -5), (20, 0));
/// assert_eq!(clamp_page(500, 40), (100, 40));
/// ```
pub fn clamp_page(limit: i64, offset: i64) -> (i64, i64) {
    let limit = if limit <= 0 {
        DEFAULT_PAGE_SIZE
    } else {
        limit.min(MAX_PAGE_SIZE)
    };
    (limit, offset.max(0))
}

// =============================================================================
// Unit Tests
// =============================================================================
