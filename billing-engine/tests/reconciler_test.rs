//! Ledger reconciler tests.

use billing_engine::engine::reconciler::{
    apply_payment, balance_due, effective_status, is_overdue, status_after_payment,
};
use billing_engine::models::InvoiceStatus;
use chrono::NaiveDate;
use rust_decimal_macros::dec;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn balance_is_total_minus_paid() {
    assert_eq!(balance_due(dec!(132.00), dec!(0)), dec!(132.00));
    assert_eq!(balance_due(dec!(132.00), dec!(100.00)), dec!(32.00));
    assert_eq!(balance_due(dec!(132.00), dec!(132.00)), dec!(0.00));
}

#[test]
fn full_payment_settles_the_invoice() {
    let (paid, balance) = apply_payment(dec!(500.00), dec!(0), dec!(500.00)).unwrap();
    assert_eq!(paid, dec!(500.00));
    assert_eq!(balance, dec!(0.00));
    assert_eq!(
        status_after_payment(InvoiceStatus::PendingPayment, balance),
        InvoiceStatus::Paid
    );
}

#[test]
fn partial_payment_keeps_the_stored_status() {
    let (paid, balance) = apply_payment(dec!(500.00), dec!(0), dec!(200.00)).unwrap();
    assert_eq!(paid, dec!(200.00));
    assert_eq!(balance, dec!(300.00));
    assert_eq!(
        status_after_payment(InvoiceStatus::PendingPayment, balance),
        InvoiceStatus::PendingPayment
    );
    assert_eq!(
        status_after_payment(InvoiceStatus::Overdue, balance),
        InvoiceStatus::Overdue
    );
}

#[test]
fn payments_accumulate() {
    let (paid, balance) = apply_payment(dec!(500.00), dec!(200.00), dec!(300.00)).unwrap();
    assert_eq!(paid, dec!(500.00));
    assert_eq!(balance, dec!(0.00));
}

#[test]
fn overpayment_is_rejected() {
    assert!(apply_payment(dec!(500.00), dec!(0), dec!(500.01)).is_err());
    assert!(apply_payment(dec!(500.00), dec!(450.00), dec!(100.00)).is_err());
}

#[test]
fn non_positive_payment_is_rejected() {
    assert!(apply_payment(dec!(500.00), dec!(0), dec!(0)).is_err());
    assert!(apply_payment(dec!(500.00), dec!(0), dec!(-10.00)).is_err());
}

#[test]
fn overdue_requires_outstanding_balance_past_due_date() {
    let due = date(2026, 8, 1);

    assert!(is_overdue(due, dec!(50.00), date(2026, 8, 15)));
    // Due today is not overdue
    assert!(!is_overdue(due, dec!(50.00), due));
    // Not yet due
    assert!(!is_overdue(due, dec!(50.00), date(2026, 7, 20)));
    // Settled invoices never go overdue
    assert!(!is_overdue(due, dec!(0.00), date(2026, 8, 15)));
}

#[test]
fn effective_status_derives_overdue_at_read_time() {
    let due = date(2026, 8, 1);
    let today = date(2026, 8, 15);

    assert_eq!(
        effective_status(InvoiceStatus::Sent, due, dec!(50.00), today),
        InvoiceStatus::Overdue
    );
    assert_eq!(
        effective_status(InvoiceStatus::PendingPayment, due, dec!(50.00), today),
        InvoiceStatus::Overdue
    );
}

#[test]
fn effective_status_leaves_draft_and_terminal_states_alone() {
    let due = date(2026, 8, 1);
    let today = date(2026, 8, 15);

    assert_eq!(
        effective_status(InvoiceStatus::Draft, due, dec!(50.00), today),
        InvoiceStatus::Draft
    );
    assert_eq!(
        effective_status(InvoiceStatus::Paid, due, dec!(0.00), today),
        InvoiceStatus::Paid
    );
    assert_eq!(
        effective_status(InvoiceStatus::Cancelled, due, dec!(50.00), today),
        InvoiceStatus::Cancelled
    );
}

#[test]
fn effective_status_is_idempotent() {
    let due = date(2026, 8, 1);
    let today = date(2026, 8, 15);

    let once = effective_status(InvoiceStatus::PendingPayment, due, dec!(50.00), today);
    let twice = effective_status(once, due, dec!(50.00), today);
    assert_eq!(once, twice);
}

#[test]
fn not_yet_due_invoice_keeps_stored_status() {
    let due = date(2026, 9, 1);
    let today = date(2026, 8, 15);

    assert_eq!(
        effective_status(InvoiceStatus::Sent, due, dec!(50.00), today),
        InvoiceStatus::Sent
    );
}
