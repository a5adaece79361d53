//! Invoice handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::{
        CreateInvoiceRequest, InvoiceListResponse, InvoiceResponse, InvoiceSummary,
        ListInvoicesQuery, RecordPaymentRequest, UpdateInvoiceRequest,
    },
    middleware::ActorContext,
    models::ListInvoicesFilter,
    AppState,
};

/// Create an invoice.
pub async fn create_invoice(
    State(state): State<AppState>,
    actor: ActorContext,
    Json(payload): Json<CreateInvoiceRequest>,
) -> Result<(StatusCode, Json<InvoiceResponse>), AppError> {
    payload.validate()?;

    let (invoice, items) = state
        .db
        .create_invoice(&payload.into_input(actor.user_id))
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(InvoiceResponse::new(invoice, items)),
    ))
}

/// Get an invoice with its line items and derived effective status.
pub async fn get_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<InvoiceResponse>, AppError> {
    let (invoice, items) = state
        .db
        .get_invoice(invoice_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

    Ok(Json(InvoiceResponse::new(invoice, items)))
}

/// List invoices.
pub async fn list_invoices(
    State(state): State<AppState>,
    Query(query): Query<ListInvoicesQuery>,
) -> Result<Json<InvoiceListResponse>, AppError> {
    let filter = ListInvoicesFilter {
        status: query.status,
        client_id: query.client_id,
        start_date: query.start_date,
        end_date: query.end_date,
        page_size: query.page_size,
        page_token: query.page_token,
    };
    let invoices = state.db.list_invoices(&filter).await?;

    let next_page_token = if invoices.len() as i32 == query.page_size.clamp(1, 100) {
        invoices.last().map(|i| i.invoice_id)
    } else {
        None
    };

    Ok(Json(InvoiceListResponse::new(invoices, next_page_token)))
}

/// Update an invoice: content edits in draft, status changes per the
/// transition table.
pub async fn update_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
    Json(payload): Json<UpdateInvoiceRequest>,
) -> Result<Json<InvoiceResponse>, AppError> {
    let (invoice, items) = state.db.update_invoice(invoice_id, &payload.into()).await?;

    Ok(Json(InvoiceResponse::new(invoice, items)))
}

/// Delete a draft invoice.
pub async fn delete_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if state.db.delete_invoice(invoice_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(anyhow::anyhow!("Invoice not found")))
    }
}

/// Record a payment against an invoice.
pub async fn record_payment(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
    Json(payload): Json<RecordPaymentRequest>,
) -> Result<Json<InvoiceSummary>, AppError> {
    let invoice = state
        .db
        .record_invoice_payment(invoice_id, payload.amount)
        .await?;

    Ok(Json(InvoiceSummary::new(invoice)))
}
