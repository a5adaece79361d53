//! Reference resolver: turns live client/product records into the immutable
//! snapshots embedded in documents, and validates polymorphic payee
//! references on outgoing payments.
//!
//! Snapshots are value objects: once embedded, later edits to the underlying
//! client or product never alter historical documents.

use rust_decimal::Decimal;
use service_core::error::AppError;
use uuid::Uuid;

use crate::engine::totals::line_amount;
use crate::models::{
    Client, ClientStatus, LineItemInput, PayeeInput, PaymentCategory, Product, ResolvedLineItem,
};

/// Denormalized client fields embedded in a document at create/update time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSnapshot {
    pub client_id: Uuid,
    pub name: String,
    pub email: String,
}

/// Snapshot an active client. Inactive or missing clients do not resolve.
pub fn snapshot_client(client: &Client) -> Result<ClientSnapshot, AppError> {
    if ClientStatus::from_string(&client.status) != ClientStatus::Active {
        return Err(AppError::NotFound(anyhow::anyhow!(
            "Client {} is not active",
            client.client_code
        )));
    }
    Ok(ClientSnapshot {
        client_id: client.client_id,
        name: client.business_name.clone(),
        email: client.email.clone(),
    })
}

/// Resolve one line item.
///
/// Catalog items (`product` present) take name and unit price from the
/// product snapshot; custom items (`product_id` null) require caller-supplied
/// name and unit price. The line amount is recomputed here regardless of what
/// the caller sent.
pub fn resolve_line_item(
    product: Option<&Product>,
    input: &LineItemInput,
) -> Result<ResolvedLineItem, AppError> {
    let (product_id, product_name, unit_price) = match (input.product_id, product) {
        (Some(id), Some(p)) => {
            if p.product_id != id {
                return Err(AppError::InternalError(anyhow::anyhow!(
                    "Resolved product {} does not match requested {}",
                    p.product_id,
                    id
                )));
            }
            (Some(id), p.name.clone(), p.effective_price())
        }
        (Some(id), None) => {
            return Err(AppError::NotFound(anyhow::anyhow!(
                "Product {} not found",
                id
            )));
        }
        (None, _) => {
            let name = input
                .product_name
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .ok_or_else(|| {
                    AppError::BadRequest(anyhow::anyhow!(
                        "Custom line item requires a product name"
                    ))
                })?;
            let price = input.unit_price.ok_or_else(|| {
                AppError::BadRequest(anyhow::anyhow!(
                    "Custom line item '{}' requires a unit price",
                    name
                ))
            })?;
            (None, name.to_string(), price)
        }
    };

    Ok(ResolvedLineItem {
        product_id,
        product_name,
        description: input.description.clone(),
        quantity: input.quantity,
        unit_price,
        amount: line_amount(input.quantity, unit_price),
    })
}

/// Validate that an outgoing payment names exactly the payee reference its
/// category requires, and nothing else.
pub fn resolve_payee(category: PaymentCategory, payee: &PayeeInput) -> Result<(), AppError> {
    let set_fields = [
        payee.staff_id.is_some(),
        payee.product_id.is_some(),
        payee
            .payee_name
            .as_deref()
            .is_some_and(|n| !n.trim().is_empty()),
        payee
            .expense_category
            .as_deref()
            .is_some_and(|c| !c.trim().is_empty()),
    ]
    .iter()
    .filter(|set| **set)
    .count();

    if set_fields != 1 {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Outgoing payment must reference exactly one payee, got {}",
            set_fields
        )));
    }

    let matches_category = match category {
        PaymentCategory::StaffSalary => payee.staff_id.is_some(),
        PaymentCategory::Subscription => payee.product_id.is_some(),
        PaymentCategory::Expense => payee.expense_category.is_some(),
        PaymentCategory::Other => payee.payee_name.is_some(),
    };
    if !matches_category {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Payee reference does not match payment category '{}'",
            category.as_str()
        )));
    }

    Ok(())
}

/// Validate the amount on an outgoing payment.
pub fn validate_payment_amount(amount: Decimal) -> Result<(), AppError> {
    if amount <= Decimal::ZERO {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Payment amount must be positive, got {}",
            amount
        )));
    }
    Ok(())
}
