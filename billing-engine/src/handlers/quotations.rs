//! Quotation handlers.

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
        ConvertQuotationRequest, CreateQuotationRequest, InvoiceResponse, ListQuotationsQuery,
        QuotationListResponse, QuotationResponse, UpdateQuotationRequest,
    },
    middleware::ActorContext,
    models::ListQuotationsFilter,
    AppState,
};

/// Create a quotation.
pub async fn create_quotation(
    State(state): State<AppState>,
    actor: ActorContext,
    Json(payload): Json<CreateQuotationRequest>,
) -> Result<(StatusCode, Json<QuotationResponse>), AppError> {
    payload.validate()?;

    let (quotation, items) = state
        .db
        .create_quotation(&payload.into_input(actor.user_id))
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(QuotationResponse::new(quotation, items)),
    ))
}

/// Get a quotation with its line items.
pub async fn get_quotation(
    State(state): State<AppState>,
    Path(quotation_id): Path<Uuid>,
) -> Result<Json<QuotationResponse>, AppError> {
    let (quotation, items) = state
        .db
        .get_quotation(quotation_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Quotation not found")))?;

    Ok(Json(QuotationResponse::new(quotation, items)))
}

/// List quotations.
pub async fn list_quotations(
    State(state): State<AppState>,
    Query(query): Query<ListQuotationsQuery>,
) -> Result<Json<QuotationListResponse>, AppError> {
    let filter = ListQuotationsFilter {
        status: query.status,
        client_id: query.client_id,
        start_date: query.start_date,
        end_date: query.end_date,
        page_size: query.page_size,
        page_token: query.page_token,
    };
    let quotations = state.db.list_quotations(&filter).await?;

    let next_page_token = if quotations.len() as i32 == query.page_size.clamp(1, 100) {
        quotations.last().map(|q| q.quotation_id)
    } else {
        None
    };

    Ok(Json(QuotationListResponse {
        quotations,
        next_page_token,
    }))
}

/// Update a quotation: content edits in draft, status changes per the
/// transition table.
pub async fn update_quotation(
    State(state): State<AppState>,
    Path(quotation_id): Path<Uuid>,
    Json(payload): Json<UpdateQuotationRequest>,
) -> Result<Json<QuotationResponse>, AppError> {
    let (quotation, items) = state
        .db
        .update_quotation(quotation_id, &payload.into())
        .await?;

    Ok(Json(QuotationResponse::new(quotation, items)))
}

/// Convert an accepted quotation into a draft invoice.
pub async fn convert_quotation(
    State(state): State<AppState>,
    actor: ActorContext,
    Path(quotation_id): Path<Uuid>,
    Json(payload): Json<ConvertQuotationRequest>,
) -> Result<(StatusCode, Json<InvoiceResponse>), AppError> {
    let (invoice, items) = state
        .db
        .convert_quotation(
            quotation_id,
            payload.issue_date,
            payload.due_date,
            actor.user_id,
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(InvoiceResponse::new(invoice, items)),
    ))
}
