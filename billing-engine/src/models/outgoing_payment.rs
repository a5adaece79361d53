//! Outgoing payment model for billing-engine.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// What kind of obligation an outgoing payment settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentCategory {
    Expense,
    StaffSalary,
    Subscription,
    Other,
}

impl PaymentCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentCategory::Expense => "expense",
            PaymentCategory::StaffSalary => "staff_salary",
            PaymentCategory::Subscription => "subscription",
            PaymentCategory::Other => "other",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "staff_salary" => PaymentCategory::StaffSalary,
            "subscription" => PaymentCategory::Subscription,
            "other" => PaymentCategory::Other,
            _ => PaymentCategory::Expense,
        }
    }
}

/// Outgoing payment lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutgoingPaymentStatus {
    Scheduled,
    Processing,
    Paid,
    Failed,
    Cancelled,
}

impl OutgoingPaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutgoingPaymentStatus::Scheduled => "scheduled",
            OutgoingPaymentStatus::Processing => "processing",
            OutgoingPaymentStatus::Paid => "paid",
            OutgoingPaymentStatus::Failed => "failed",
            OutgoingPaymentStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "processing" => OutgoingPaymentStatus::Processing,
            "paid" => OutgoingPaymentStatus::Paid,
            "failed" => OutgoingPaymentStatus::Failed,
            "cancelled" => OutgoingPaymentStatus::Cancelled,
            _ => OutgoingPaymentStatus::Scheduled,
        }
    }
}

/// Polymorphic payee reference: exactly one field is set, matched to the
/// payment category by the resolver.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PayeeInput {
    pub staff_id: Option<i64>,
    pub product_id: Option<Uuid>,
    pub payee_name: Option<String>,
    pub expense_category: Option<String>,
}

/// Outgoing payment record.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OutgoingPayment {
    pub payment_id: Uuid,
    pub payment_number: String,
    pub payment_category: String,
    pub staff_id: Option<i64>,
    pub product_id: Option<Uuid>,
    pub payee_name: Option<String>,
    pub expense_category: Option<String>,
    pub amount: Decimal,
    pub payment_date: NaiveDate,
    pub payment_method: String,
    pub status: String,
    pub notes: Option<String>,
    pub created_by: i64,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

/// Input for recording an outgoing payment.
#[derive(Debug, Clone)]
pub struct CreateOutgoingPayment {
    pub payment_category: PaymentCategory,
    pub payee: PayeeInput,
    pub amount: Decimal,
    pub payment_date: NaiveDate,
    pub payment_method: String,
    pub notes: Option<String>,
    pub created_by: i64,
}

/// Filter parameters for listing outgoing payments.
#[derive(Debug, Clone, Default)]
pub struct ListOutgoingPaymentsFilter {
    pub status: Option<OutgoingPaymentStatus>,
    pub category: Option<PaymentCategory>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}
