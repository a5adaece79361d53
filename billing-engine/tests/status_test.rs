//! Status state machine tests.

use billing_engine::engine::{
    ensure_invoice_transition, ensure_payment_transition, ensure_quotation_transition,
};
use billing_engine::models::{InvoiceStatus, OutgoingPaymentStatus, QuotationStatus};

#[test]
fn quotation_happy_path() {
    use QuotationStatus::*;
    assert!(ensure_quotation_transition(Draft, Sent).is_ok());
    assert!(ensure_quotation_transition(Sent, Accepted).is_ok());
    assert!(ensure_quotation_transition(Sent, Rejected).is_ok());
    assert!(ensure_quotation_transition(Sent, Expired).is_ok());
    assert!(ensure_quotation_transition(Accepted, Converted).is_ok());
}

#[test]
fn quotation_cannot_return_to_draft_once_sent() {
    use QuotationStatus::*;
    assert!(ensure_quotation_transition(Sent, Draft).is_err());
    assert!(ensure_quotation_transition(Accepted, Draft).is_err());
}

#[test]
fn quotation_terminal_states_admit_nothing() {
    use QuotationStatus::*;
    for terminal in [Rejected, Expired, Converted] {
        assert!(terminal.is_terminal());
        for next in [Draft, Sent, Accepted, Converted] {
            if next != terminal {
                assert!(
                    ensure_quotation_transition(terminal, next).is_err(),
                    "{:?} -> {:?} should be rejected",
                    terminal,
                    next
                );
            }
        }
    }
}

#[test]
fn quotation_cannot_skip_sent() {
    use QuotationStatus::*;
    assert!(ensure_quotation_transition(Draft, Accepted).is_err());
    assert!(ensure_quotation_transition(Draft, Converted).is_err());
    assert!(ensure_quotation_transition(Sent, Converted).is_err());
}

#[test]
fn same_state_is_a_noop() {
    assert!(ensure_quotation_transition(QuotationStatus::Sent, QuotationStatus::Sent).is_ok());
    assert!(ensure_invoice_transition(InvoiceStatus::Draft, InvoiceStatus::Draft).is_ok());
    assert!(ensure_payment_transition(
        OutgoingPaymentStatus::Processing,
        OutgoingPaymentStatus::Processing
    )
    .is_ok());
}

#[test]
fn invoice_happy_path() {
    use InvoiceStatus::*;
    assert!(ensure_invoice_transition(Draft, Sent).is_ok());
    assert!(ensure_invoice_transition(Sent, PendingPayment).is_ok());
    assert!(ensure_invoice_transition(PendingPayment, Paid).is_ok());
    assert!(ensure_invoice_transition(PendingPayment, Overdue).is_ok());
    assert!(ensure_invoice_transition(PendingPayment, Cancelled).is_ok());
    assert!(ensure_invoice_transition(Overdue, Paid).is_ok());
    assert!(ensure_invoice_transition(Overdue, Cancelled).is_ok());
}

#[test]
fn invoice_cannot_skip_states() {
    use InvoiceStatus::*;
    assert!(ensure_invoice_transition(Draft, Paid).is_err());
    assert!(ensure_invoice_transition(Draft, PendingPayment).is_err());
    assert!(ensure_invoice_transition(Sent, Paid).is_err());
}

#[test]
fn invoice_terminal_states_admit_nothing() {
    use InvoiceStatus::*;
    for terminal in [Paid, Cancelled] {
        assert!(terminal.is_terminal());
        assert!(ensure_invoice_transition(terminal, Draft).is_err());
        assert!(ensure_invoice_transition(terminal, Sent).is_err());
        assert!(ensure_invoice_transition(terminal, PendingPayment).is_err());
    }
    assert!(ensure_invoice_transition(Paid, Cancelled).is_err());
    assert!(ensure_invoice_transition(Cancelled, Paid).is_err());
}

#[test]
fn payment_happy_path() {
    use OutgoingPaymentStatus::*;
    assert!(ensure_payment_transition(Scheduled, Processing).is_ok());
    assert!(ensure_payment_transition(Processing, Paid).is_ok());
    assert!(ensure_payment_transition(Processing, Failed).is_ok());
    assert!(ensure_payment_transition(Scheduled, Cancelled).is_ok());
    assert!(ensure_payment_transition(Processing, Cancelled).is_ok());
}

#[test]
fn payment_terminal_states_admit_nothing() {
    use OutgoingPaymentStatus::*;
    for terminal in [Paid, Failed, Cancelled] {
        assert!(terminal.is_terminal());
        assert!(ensure_payment_transition(terminal, Scheduled).is_err());
        assert!(ensure_payment_transition(terminal, Processing).is_err());
    }
    assert!(ensure_payment_transition(Scheduled, Paid).is_err());
    assert!(ensure_payment_transition(Scheduled, Failed).is_err());
}

#[test]
fn status_strings_round_trip() {
    for status in [
        QuotationStatus::Draft,
        QuotationStatus::Sent,
        QuotationStatus::Accepted,
        QuotationStatus::Rejected,
        QuotationStatus::Expired,
        QuotationStatus::Converted,
    ] {
        assert_eq!(QuotationStatus::from_string(status.as_str()), status);
    }
    for status in [
        InvoiceStatus::Draft,
        InvoiceStatus::Sent,
        InvoiceStatus::PendingPayment,
        InvoiceStatus::Paid,
        InvoiceStatus::Overdue,
        InvoiceStatus::Cancelled,
    ] {
        assert_eq!(InvoiceStatus::from_string(status.as_str()), status);
    }
}
