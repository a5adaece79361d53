//! Totals calculator: line items + discount + tax policy → monetary breakdown.
//!
//! Pure decimal arithmetic. Every derived field is rounded to 2 decimal
//! places before it leaves this module, so cent-level drift cannot reach
//! storage.

use rust_decimal::{Decimal, RoundingStrategy};
use service_core::error::AppError;

use crate::models::{DiscountType, ResolvedLineItem};

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Discount policy applied to a subtotal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Discount {
    pub discount_type: DiscountType,
    pub value: Decimal,
}

/// Monetary breakdown of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TotalsBreakdown {
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
}

/// Round a monetary value to 2 decimal places, midpoint away from zero.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Amount of a single line: `round(quantity * unit_price, 2)`.
pub fn line_amount(quantity: Decimal, unit_price: Decimal) -> Decimal {
    round_money(quantity * unit_price)
}

fn validate_line(index: usize, quantity: Decimal, unit_price: Decimal) -> Result<(), AppError> {
    if quantity <= Decimal::ZERO {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Line item {}: quantity must be positive, got {}",
            index + 1,
            quantity
        )));
    }
    if unit_price < Decimal::ZERO {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Line item {}: unit price must not be negative, got {}",
            index + 1,
            unit_price
        )));
    }
    Ok(())
}

fn subtotal_of(line_items: &[ResolvedLineItem]) -> Result<Decimal, AppError> {
    if line_items.is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Document must have at least one line item"
        )));
    }
    let mut subtotal = Decimal::ZERO;
    for (i, item) in line_items.iter().enumerate() {
        validate_line(i, item.quantity, item.unit_price)?;
        // Line amounts are never trusted from the caller.
        subtotal += line_amount(item.quantity, item.unit_price);
    }
    Ok(round_money(subtotal))
}

fn discount_amount_of(subtotal: Decimal, discount: &Discount) -> Result<Decimal, AppError> {
    match discount.discount_type {
        DiscountType::Percentage => {
            if discount.value < Decimal::ZERO || discount.value > HUNDRED {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Percentage discount must be between 0 and 100, got {}",
                    discount.value
                )));
            }
            Ok(round_money(subtotal * discount.value / HUNDRED))
        }
        DiscountType::Fixed => {
            if discount.value < Decimal::ZERO {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Fixed discount must not be negative, got {}",
                    discount.value
                )));
            }
            // A fixed discount larger than the subtotal would produce a
            // negative taxable amount; rejected rather than clamped.
            if discount.value > subtotal {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Fixed discount {} exceeds subtotal {}",
                    discount.value,
                    subtotal
                )));
            }
            Ok(round_money(discount.value))
        }
    }
}

/// Compute the monetary breakdown of a quotation:
/// subtotal → discount → taxable amount → tax → total.
pub fn compute_totals(
    line_items: &[ResolvedLineItem],
    discount: Option<&Discount>,
    tax_rate_percent: Decimal,
) -> Result<TotalsBreakdown, AppError> {
    if tax_rate_percent < Decimal::ZERO {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Tax rate must not be negative, got {}",
            tax_rate_percent
        )));
    }

    let subtotal = subtotal_of(line_items)?;
    let discount_amount = match discount {
        Some(d) => discount_amount_of(subtotal, d)?,
        None => Decimal::ZERO,
    };
    let taxable_amount = subtotal - discount_amount;
    let tax_amount = round_money(taxable_amount * tax_rate_percent / HUNDRED);
    let total_amount = round_money(taxable_amount + tax_amount);

    Ok(TotalsBreakdown {
        subtotal,
        discount_amount,
        tax_amount,
        total_amount,
    })
}

/// Compute the monetary breakdown of an invoice. Invoices carry no discount
/// concept: tax applies to the full subtotal.
pub fn compute_invoice_totals(
    line_items: &[ResolvedLineItem],
    tax_rate_percent: Decimal,
) -> Result<TotalsBreakdown, AppError> {
    compute_totals(line_items, None, tax_rate_percent)
}
