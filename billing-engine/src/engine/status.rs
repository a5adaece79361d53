//! Status state machine for quotations, invoices and outgoing payments.
//!
//! Each document type has a fixed permitted-transition table; anything
//! outside it fails with `InvalidTransition`. Transitions are never retried
//! automatically — a retry could apply a transition twice.

use service_core::error::AppError;

use crate::models::{InvoiceStatus, OutgoingPaymentStatus, QuotationStatus};

fn invalid(doc: &str, from: &str, to: &str) -> AppError {
    AppError::InvalidTransition(anyhow::anyhow!(
        "{} cannot move from '{}' to '{}'",
        doc,
        from,
        to
    ))
}

impl QuotationStatus {
    /// Permitted: draft → sent → {accepted, rejected, expired};
    /// accepted → converted. A quotation that has been sent can no longer be
    /// reset to draft.
    pub fn can_transition_to(self, next: QuotationStatus) -> bool {
        use QuotationStatus::*;
        matches!(
            (self, next),
            (Draft, Sent)
                | (Sent, Accepted)
                | (Sent, Rejected)
                | (Sent, Expired)
                | (Accepted, Converted)
        )
    }

    pub fn is_terminal(self) -> bool {
        use QuotationStatus::*;
        matches!(self, Rejected | Expired | Converted)
    }
}

impl InvoiceStatus {
    /// Permitted: draft → sent → pending_payment → {paid, overdue,
    /// cancelled}. `overdue` here is the pinned form; the derived read-time
    /// flag lives in the reconciler.
    pub fn can_transition_to(self, next: InvoiceStatus) -> bool {
        use InvoiceStatus::*;
        matches!(
            (self, next),
            (Draft, Sent)
                | (Sent, PendingPayment)
                | (PendingPayment, Paid)
                | (PendingPayment, Overdue)
                | (PendingPayment, Cancelled)
                | (Overdue, Paid)
                | (Overdue, Cancelled)
        )
    }

    pub fn is_terminal(self) -> bool {
        use InvoiceStatus::*;
        matches!(self, Paid | Cancelled)
    }
}

impl OutgoingPaymentStatus {
    /// Permitted: scheduled → processing → {paid, failed}; any non-terminal
    /// state → cancelled.
    pub fn can_transition_to(self, next: OutgoingPaymentStatus) -> bool {
        use OutgoingPaymentStatus::*;
        matches!(
            (self, next),
            (Scheduled, Processing)
                | (Processing, Paid)
                | (Processing, Failed)
                | (Scheduled, Cancelled)
                | (Processing, Cancelled)
        )
    }

    pub fn is_terminal(self) -> bool {
        use OutgoingPaymentStatus::*;
        matches!(self, Paid | Failed | Cancelled)
    }
}

/// Validate a requested quotation transition. Same-state requests are a
/// no-op and always allowed.
pub fn ensure_quotation_transition(
    from: QuotationStatus,
    to: QuotationStatus,
) -> Result<(), AppError> {
    if from == to || from.can_transition_to(to) {
        Ok(())
    } else {
        Err(invalid("Quotation", from.as_str(), to.as_str()))
    }
}

/// Validate a requested invoice transition.
pub fn ensure_invoice_transition(from: InvoiceStatus, to: InvoiceStatus) -> Result<(), AppError> {
    if from == to || from.can_transition_to(to) {
        Ok(())
    } else {
        Err(invalid("Invoice", from.as_str(), to.as_str()))
    }
}

/// Validate a requested outgoing-payment transition.
pub fn ensure_payment_transition(
    from: OutgoingPaymentStatus,
    to: OutgoingPaymentStatus,
) -> Result<(), AppError> {
    if from == to || from.can_transition_to(to) {
        Ok(())
    } else {
        Err(invalid("Outgoing payment", from.as_str(), to.as_str()))
    }
}
