//! Line item models shared by quotations and invoices.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Caller-supplied line item.
///
/// `product_id = None` means a free-form custom item, in which case
/// `product_name` and `unit_price` must be supplied. For catalog items the
/// resolver fills both from the product snapshot and caller values are
/// ignored.
#[derive(Debug, Clone)]
pub struct LineItemInput {
    pub product_id: Option<Uuid>,
    pub product_name: Option<String>,
    pub description: Option<String>,
    pub quantity: Decimal,
    pub unit_price: Option<Decimal>,
}

/// A line item after reference resolution: name and unit price are fixed and
/// `amount == round(quantity * unit_price, 2)`, recomputed server-side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedLineItem {
    pub product_id: Option<Uuid>,
    pub product_name: String,
    pub description: Option<String>,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub amount: Decimal,
}

/// Persisted line item on a quotation.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QuotationLineItem {
    pub line_item_id: Uuid,
    pub quotation_id: Uuid,
    pub product_id: Option<Uuid>,
    pub product_name: String,
    pub description: Option<String>,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub amount: Decimal,
    pub sort_order: i32,
    pub created_utc: DateTime<Utc>,
}

/// Persisted line item on an invoice.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InvoiceLineItem {
    pub line_item_id: Uuid,
    pub invoice_id: Uuid,
    pub product_id: Option<Uuid>,
    pub product_name: String,
    pub description: Option<String>,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub amount: Decimal,
    pub sort_order: i32,
    pub created_utc: DateTime<Utc>,
}
