//! Quotation model for billing-engine.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::LineItemInput;

/// Quotation lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotationStatus {
    Draft,
    Sent,
    Accepted,
    Rejected,
    Expired,
    Converted,
}

impl QuotationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuotationStatus::Draft => "draft",
            QuotationStatus::Sent => "sent",
            QuotationStatus::Accepted => "accepted",
            QuotationStatus::Rejected => "rejected",
            QuotationStatus::Expired => "expired",
            QuotationStatus::Converted => "converted",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "sent" => QuotationStatus::Sent,
            "accepted" => QuotationStatus::Accepted,
            "rejected" => QuotationStatus::Rejected,
            "expired" => QuotationStatus::Expired,
            "converted" => QuotationStatus::Converted,
            _ => QuotationStatus::Draft,
        }
    }
}

/// Discount policy applied to a quotation subtotal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    Percentage,
    Fixed,
}

impl DiscountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountType::Percentage => "percentage",
            DiscountType::Fixed => "fixed",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "fixed" => DiscountType::Fixed,
            _ => DiscountType::Percentage,
        }
    }
}

/// Quotation document. Client name/email are an immutable snapshot taken at
/// create/update time; monetary fields are always derived server-side.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Quotation {
    pub quotation_id: Uuid,
    pub quotation_number: String,
    pub client_id: Uuid,
    pub client_name: String,
    pub client_email: String,
    pub quotation_date: NaiveDate,
    pub valid_until_date: NaiveDate,
    pub discount_type: Option<String>,
    pub discount_value: Option<Decimal>,
    pub tax_rate_percent: Decimal,
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
    pub status: String,
    pub converted_invoice_id: Option<Uuid>,
    pub notes: Option<String>,
    pub created_by: i64,
    pub revision: i64,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

/// Input for creating a quotation.
#[derive(Debug, Clone)]
pub struct CreateQuotation {
    pub client_id: Uuid,
    pub quotation_date: NaiveDate,
    pub valid_until_date: NaiveDate,
    pub discount_type: Option<DiscountType>,
    pub discount_value: Option<Decimal>,
    pub tax_rate_percent: Decimal,
    pub line_items: Vec<LineItemInput>,
    pub notes: Option<String>,
    pub created_by: i64,
}

/// Input for updating a quotation.
///
/// `line_items = None` leaves the existing items untouched; `Some(items)`
/// replaces them wholesale inside the update transaction.
#[derive(Debug, Clone, Default)]
pub struct UpdateQuotation {
    pub quotation_date: Option<NaiveDate>,
    pub valid_until_date: Option<NaiveDate>,
    pub discount_type: Option<DiscountType>,
    pub discount_value: Option<Decimal>,
    pub clear_discount: bool,
    pub tax_rate_percent: Option<Decimal>,
    pub line_items: Option<Vec<LineItemInput>>,
    pub status: Option<QuotationStatus>,
    pub notes: Option<String>,
    pub revision: i64,
}

/// Filter parameters for listing quotations.
#[derive(Debug, Clone, Default)]
pub struct ListQuotationsFilter {
    pub status: Option<QuotationStatus>,
    pub client_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}
