//! Client model for billing-engine.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Client account status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientStatus {
    Active,
    Inactive,
}

impl ClientStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientStatus::Active => "active",
            ClientStatus::Inactive => "inactive",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "inactive" => ClientStatus::Inactive,
            _ => ClientStatus::Active,
        }
    }
}

/// Client business identity and billing policy.
///
/// `total_spent` is an aggregate maintained by the payment path; it is never
/// accepted from the caller.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Client {
    pub client_id: Uuid,
    pub client_code: String,
    pub business_name: String,
    pub contact_person: Option<String>,
    pub email: String,
    pub phone: Option<String>,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub payment_schedule: Option<String>,
    pub payment_terms: Option<String>,
    pub status: String,
    pub total_spent: Decimal,
    pub created_by: i64,
    pub revision: i64,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

/// Input for creating a client.
#[derive(Debug, Clone)]
pub struct CreateClient {
    pub business_name: String,
    pub contact_person: Option<String>,
    pub email: String,
    pub phone: Option<String>,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub payment_schedule: Option<String>,
    pub payment_terms: Option<String>,
    pub created_by: i64,
}

/// Input for updating a client.
#[derive(Debug, Clone, Default)]
pub struct UpdateClient {
    pub business_name: Option<String>,
    pub contact_person: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub payment_schedule: Option<String>,
    pub payment_terms: Option<String>,
    pub status: Option<ClientStatus>,
    pub revision: i64,
}

/// Filter parameters for listing clients.
#[derive(Debug, Clone, Default)]
pub struct ListClientsFilter {
    pub status: Option<ClientStatus>,
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}
