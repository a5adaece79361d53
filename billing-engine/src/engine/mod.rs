//! The engine core: pure calculation, resolution and lifecycle rules.
//!
//! Dependency order, leaves first: totals → numbering → resolver → status →
//! reconciler. Orchestration against the store lives in
//! `services::database`.

pub mod numbering;
pub mod reconciler;
pub mod resolver;
pub mod status;
pub mod totals;

pub use numbering::{client_code, format_document_number, DocumentKind};
pub use reconciler::{apply_payment, balance_due, effective_status, is_overdue};
pub use resolver::{resolve_line_item, resolve_payee, snapshot_client, ClientSnapshot};
pub use status::{
    ensure_invoice_transition, ensure_payment_transition, ensure_quotation_transition,
};
pub use totals::{compute_invoice_totals, compute_totals, Discount, TotalsBreakdown};
