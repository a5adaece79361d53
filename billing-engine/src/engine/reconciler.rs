//! Ledger reconciler: derives `balance_due` and the overdue flag, and
//! guards payment application.
//!
//! Invariant: `balance_due == round(total_amount - amount_paid, 2)`, always
//! derived, never independently settable. Any update that touches line
//! items or tax re-runs the totals calculator and re-derives the balance in
//! the same transaction.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use service_core::error::AppError;

use crate::engine::totals::round_money;
use crate::models::InvoiceStatus;

/// The derived outstanding balance of an invoice.
pub fn balance_due(total_amount: Decimal, amount_paid: Decimal) -> Decimal {
    round_money(total_amount - amount_paid)
}

/// Apply a payment delta to an invoice's paid amount.
///
/// Returns the new `(amount_paid, balance_due)` pair. The delta must be
/// positive and must not push the balance below zero.
pub fn apply_payment(
    total_amount: Decimal,
    amount_paid: Decimal,
    delta: Decimal,
) -> Result<(Decimal, Decimal), AppError> {
    if delta <= Decimal::ZERO {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Payment amount must be positive, got {}",
            delta
        )));
    }
    let new_paid = round_money(amount_paid + delta);
    let new_balance = balance_due(total_amount, new_paid);
    if new_balance < Decimal::ZERO {
        return Err(AppError::Overpayment(anyhow::anyhow!(
            "Payment of {} exceeds balance due {}",
            delta,
            balance_due(total_amount, amount_paid)
        )));
    }
    Ok((new_paid, new_balance))
}

/// Whether an invoice is overdue: an outstanding balance past the due date.
pub fn is_overdue(due_date: NaiveDate, balance: Decimal, today: NaiveDate) -> bool {
    balance > Decimal::ZERO && due_date < today
}

/// The status an invoice presents to readers.
///
/// Overdue is derived here rather than trusted from storage, so a stale
/// stored status never hides an overdue invoice. Draft and terminal states
/// are reported as stored.
pub fn effective_status(
    stored: InvoiceStatus,
    due_date: NaiveDate,
    balance: Decimal,
    today: NaiveDate,
) -> InvoiceStatus {
    match stored {
        InvoiceStatus::Sent | InvoiceStatus::PendingPayment | InvoiceStatus::Overdue
            if is_overdue(due_date, balance, today) =>
        {
            InvoiceStatus::Overdue
        }
        other => other,
    }
}

/// Status an invoice settles into after a payment: `paid` once the balance
/// reaches zero, otherwise the stored status is kept.
pub fn status_after_payment(stored: InvoiceStatus, new_balance: Decimal) -> InvoiceStatus {
    if new_balance == Decimal::ZERO {
        InvoiceStatus::Paid
    } else {
        stored
    }
}
