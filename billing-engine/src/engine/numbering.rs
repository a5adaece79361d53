//! Document numbering: unique, ordered, human-readable identifiers.
//!
//! Formatting is pure; the sequence itself comes from the
//! `document_counters` table, bumped atomically inside the creating
//! transaction (see `Database::next_document_number`). Sequences reset per
//! year so the year segment embedded in the number stays meaningful; client
//! codes are not year-scoped and live in the year-0 bucket.

use chrono::{Datelike, NaiveDate};

/// Document types that receive engine-assigned numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Quotation,
    Invoice,
    Payment,
    Client,
}

impl DocumentKind {
    /// Counter key in the `document_counters` table.
    pub fn counter_key(&self) -> &'static str {
        match self {
            DocumentKind::Quotation => "quotation",
            DocumentKind::Invoice => "invoice",
            DocumentKind::Payment => "payment",
            DocumentKind::Client => "client",
        }
    }

    pub fn prefix(&self) -> &'static str {
        match self {
            DocumentKind::Quotation => "QUO",
            DocumentKind::Invoice => "INV",
            DocumentKind::Payment => "PAY",
            DocumentKind::Client => "CLT",
        }
    }

    /// The counter bucket a document created on `date` draws from.
    pub fn period_year(&self, date: NaiveDate) -> i32 {
        match self {
            DocumentKind::Client => 0,
            _ => date.year(),
        }
    }
}

/// Format a document number, e.g. `QUO-2026-0042`. The sequence is
/// zero-padded to 4 digits and widens beyond 9999.
pub fn format_document_number(kind: DocumentKind, year: i32, seq: i64) -> String {
    match kind {
        DocumentKind::Client => client_code(seq),
        _ => format!("{}-{}-{:04}", kind.prefix(), year, seq),
    }
}

/// Format a client code, e.g. `CLT0007`.
pub fn client_code(seq: i64) -> String {
    format!("CLT{:04}", seq)
}
