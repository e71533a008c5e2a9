//! # Totals Calculator
//!
//! Pure functions that turn line items into subtotal / discount / tax /
//! total amounts. Used by the ledger engine (debt arithmetic), by the
//! detail views, and by PDF/report code outside this workspace.
//!
//! ## Order vs Invoice
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ORDER                                                                  │
//! │    subtotal = Σ qty × price                                             │
//! │    discount = Σ line × item_pct / 100  +  subtotal × order_pct / 100    │
//! │    tax      = 0                                                         │
//! │    total    = subtotal − discount                                       │
//! │                                                                         │
//! │    Read paths pass order_pct = 0: the header percent is a UI helper.    │
//! │                                                                         │
//! │  INVOICE                                                                │
//! │    subtotal = Σ qty × price                       (no per-item pct)     │
//! │    discount = subtotal × pct / 100                (only if 0 < pct ≤ 100)│
//! │    tax      = (subtotal − discount) × tax / 100   (only if 0 < tax ≤ 100)│
//! │    total    = subtotal − discount + tax                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every percentage step truncates toward zero. Nothing is rounded.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::Payment;

/// Anything with a quantity, a unit price and (optionally) a discount.
pub trait LineItem {
    fn qty(&self) -> i64;
    fn unit_price_cents(&self) -> i64;

    /// Per-item discount percent. Invoice lines have none.
    fn discount_percent(&self) -> i64 {
        0
    }

    /// `qty × unit price`, before any discount.
    fn line_subtotal(&self) -> Money {
        Money::from_cents(self.unit_price_cents()).multiply_quantity(self.qty())
    }
}

/// Computed amounts, all in cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Totals {
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
}

/// Line total after its own discount: `line − line × pct / 100`.
///
/// This is the amount a single order line adds to the client's debt.
pub fn item_net_total(qty: i64, unit_price_cents: i64, discount_percent: i64) -> i64 {
    Money::from_cents(unit_price_cents)
        .multiply_quantity(qty)
        .less_percent(discount_percent)
        .cents()
}

/// Sum of every line's net total. Equals `calc_order_totals(items, 0).total_cents`.
pub fn order_debt_total<T: LineItem>(items: &[T]) -> i64 {
    items
        .iter()
        .map(|item| item_net_total(item.qty(), item.unit_price_cents(), item.discount_percent()))
        .sum()
}

/// Computes order totals.
///
/// `order_discount_percent` is added as a second discount level on the
/// subtotal, whatever its value; callers validate it. Ledger and detail
/// code pass `0` because the stored header percent does not affect what
/// the client owes.
///
/// ## Example
/// ```rust
/// use tally_core::totals::calc_order_totals;
/// use tally_core::OrderItemDraft;
///
/// let line = |qty, price, pct| OrderItemDraft {
///     product_id: None,
///     name_snapshot: "x".into(),
///     sku_snapshot: None,
///     qty,
///     unit_price_cents: price,
///     discount_percent: pct,
///     currency: "DZD".into(),
/// };
/// let totals = calc_order_totals(&[line(2, 500, 0), line(1, 1000, 10)], 0);
/// assert_eq!(totals.subtotal_cents, 2000);
/// assert_eq!(totals.discount_cents, 100);
/// assert_eq!(totals.total_cents, 1900);
/// ```
pub fn calc_order_totals<T: LineItem>(items: &[T], order_discount_percent: i64) -> Totals {
    let mut subtotal = Money::zero();
    let mut discount = Money::zero();

    for item in items {
        let line = item.line_subtotal();
        subtotal += line;
        discount += line.percent_of(item.discount_percent());
    }

    discount += subtotal.percent_of(order_discount_percent);

    Totals {
        subtotal_cents: subtotal.cents(),
        discount_cents: discount.cents(),
        tax_cents: 0,
        total_cents: (subtotal - discount).cents(),
    }
}

/// Computes invoice totals. Tax applies to the discounted amount.
///
/// A percent of 0, or one outside `1..=100`, contributes nothing.
pub fn calc_invoice_totals<T: LineItem>(items: &[T], discount_percent: i64, tax_percent: i64) -> Totals {
    let subtotal: Money = items.iter().map(|item| item.line_subtotal()).sum();

    let discount = if in_percent_range(discount_percent) {
        subtotal.percent_of(discount_percent)
    } else {
        Money::zero()
    };

    let taxable = subtotal - discount;
    let tax = if in_percent_range(tax_percent) {
        taxable.percent_of(tax_percent)
    } else {
        Money::zero()
    };

    Totals {
        subtotal_cents: subtotal.cents(),
        discount_cents: discount.cents(),
        tax_cents: tax.cents(),
        total_cents: (taxable + tax).cents(),
    }
}

/// `total − Σ payments`. Negative when overpaid.
pub fn calculate_invoice_balance(total_cents: i64, payments: &[Payment]) -> i64 {
    total_cents - payments.iter().map(|p| p.amount_cents).sum::<i64>()
}

#[inline]
fn in_percent_range(pct: i64) -> bool {
    pct > 0 && pct <= 100
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{InvoiceItemDraft, OrderItemDraft, PaymentMethod};
    use chrono::Utc;

    fn order_line(qty: i64, price: i64, pct: i64) -> OrderItemDraft {
        OrderItemDraft {
            product_id: None,
            name_snapshot: "item".to_string(),
            sku_snapshot: None,
            qty,
            unit_price_cents: price,
            discount_percent: pct,
            currency: "DZD".to_string(),
        }
    }

    fn invoice_line(qty: i64, price: i64) -> InvoiceItemDraft {
        InvoiceItemDraft {
            product_id: None,
            name_snapshot: "item".to_string(),
            sku_snapshot: None,
            qty,
            unit_price_cents: price,
            currency: "DZD".to_string(),
        }
    }

    #[test]
    fn test_order_totals_two_lines() {
        let items = [order_line(2, 500, 0), order_line(1, 1000, 10)];
        let totals = calc_order_totals(&items, 0);

        assert_eq!(
            totals,
            Totals {
                subtotal_cents: 2000,
                discount_cents: 100,
                tax_cents: 0,
                total_cents: 1900,
            }
        );
        assert_eq!(order_debt_total(&items), 1900);
    }

    /// 333 × 33% = 109.89 per line. Truncation gives 109 each (327 total);
    /// rounding would give 110 each (330).
    #[test]
    fn test_order_discount_truncates_per_line() {
        let items = [order_line(1, 333, 33), order_line(1, 333, 33), order_line(1, 333, 33)];
        let totals = calc_order_totals(&items, 0);

        assert_eq!(totals.subtotal_cents, 999);
        assert_eq!(totals.discount_cents, 327);
        assert_eq!(totals.total_cents, 672);
        assert_eq!(order_debt_total(&items), 672);
    }

    #[test]
    fn test_order_level_discount_is_additive() {
        let items = [order_line(1, 1000, 10)];
        let totals = calc_order_totals(&items, 5);

        // 100 from the item, 50 from the header on the 1000 subtotal
        assert_eq!(totals.discount_cents, 150);
        assert_eq!(totals.total_cents, 850);
        // Debt ignores the header percent
        assert_eq!(order_debt_total(&items), 900);
    }

    #[test]
    fn test_order_level_discount_is_not_range_gated() {
        let items = [order_line(2, 500, 0), order_line(1, 1000, 10)];

        let totals = calc_order_totals(&items, 10);
        assert_eq!(totals.discount_cents, 300);
        assert_eq!(totals.total_cents, 1700);

        // Out-of-range values flow through the formula unchanged
        let totals = calc_order_totals(&items, 150);
        assert_eq!(totals.discount_cents, 100 + 3000);
        assert_eq!(totals.total_cents, -1100);
    }

    #[test]
    fn test_order_totals_invariants_hold() {
        let cases: Vec<Vec<OrderItemDraft>> = vec![
            vec![],
            vec![order_line(7, 1, 99)],
            vec![order_line(3, 999, 100), order_line(2, 1, 50)],
            vec![order_line(13, 77, 0), order_line(1, 5, 1), order_line(4, 250, 33)],
        ];

        for items in cases {
            let t = calc_order_totals(&items, 0);
            assert_eq!(t.total_cents, t.subtotal_cents - t.discount_cents);
            assert!(t.discount_cents >= 0);
            assert!(t.discount_cents <= t.subtotal_cents);
            assert_eq!(t.total_cents, order_debt_total(&items));
        }
    }

    #[test]
    fn test_invoice_totals_with_discount_and_tax() {
        let totals = calc_invoice_totals(&[invoice_line(3, 700)], 10, 5);

        assert_eq!(totals.subtotal_cents, 2100);
        assert_eq!(totals.discount_cents, 210);
        // taxable 1890 × 5% = 94.5 → 94
        assert_eq!(totals.tax_cents, 94);
        assert_eq!(totals.total_cents, 1984);
    }

    #[test]
    fn test_invoice_discount_truncates_on_subtotal() {
        let items = [invoice_line(1, 333), invoice_line(1, 333), invoice_line(1, 333)];
        let totals = calc_invoice_totals(&items, 33, 0);

        // 999 × 33% = 329.67 → 329
        assert_eq!(totals.discount_cents, 329);
        assert_eq!(totals.total_cents, 670);
    }

    #[test]
    fn test_invoice_out_of_range_percents_are_ignored() {
        let items = [invoice_line(1, 1000)];

        let totals = calc_invoice_totals(&items, 150, -5);
        assert_eq!(totals.discount_cents, 0);
        assert_eq!(totals.tax_cents, 0);
        assert_eq!(totals.total_cents, 1000);
    }

    #[test]
    fn test_invoice_balance() {
        let now = Utc::now();
        let payment = |amount| Payment {
            id: 0,
            invoice_id: 1,
            amount_cents: amount,
            method: PaymentMethod::Cash,
            reference: None,
            paid_at: now,
            notes: None,
            created_at: now,
        };

        assert_eq!(calculate_invoice_balance(1984, &[]), 1984);
        assert_eq!(calculate_invoice_balance(1984, &[payment(1000), payment(500)]), 484);
        assert_eq!(calculate_invoice_balance(1000, &[payment(1200)]), -200);
    }
}
