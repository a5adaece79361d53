//! Outgoing payment handlers.

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
        CreateOutgoingPaymentRequest, ListOutgoingPaymentsQuery, OutgoingPaymentListResponse,
        UpdatePaymentStatusRequest,
    },
    middleware::ActorContext,
    models::{ListOutgoingPaymentsFilter, OutgoingPayment},
    AppState,
};

/// Record an outgoing payment.
pub async fn create_payment(
    State(state): State<AppState>,
    actor: ActorContext,
    Json(payload): Json<CreateOutgoingPaymentRequest>,
) -> Result<(StatusCode, Json<OutgoingPayment>), AppError> {
    payload.validate()?;

    let payment = state
        .db
        .create_outgoing_payment(&payload.into_input(actor.user_id))
        .await?;

    Ok((StatusCode::CREATED, Json(payment)))
}

/// Get an outgoing payment by ID.
pub async fn get_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<Uuid>,
) -> Result<Json<OutgoingPayment>, AppError> {
    let payment = state
        .db
        .get_outgoing_payment(payment_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Outgoing payment not found")))?;

    Ok(Json(payment))
}

/// List outgoing payments.
pub async fn list_payments(
    State(state): State<AppState>,
    Query(query): Query<ListOutgoingPaymentsQuery>,
) -> Result<Json<OutgoingPaymentListResponse>, AppError> {
    let filter = ListOutgoingPaymentsFilter {
        status: query.status,
        category: query.category,
        start_date: query.start_date,
        end_date: query.end_date,
        page_size: query.page_size,
        page_token: query.page_token,
    };
    let payments = state.db.list_outgoing_payments(&filter).await?;

    let next_page_token = if payments.len() as i32 == query.page_size.clamp(1, 100) {
        payments.last().map(|p| p.payment_id)
    } else {
        None
    };

    Ok(Json(OutgoingPaymentListResponse {
        payments,
        next_page_token,
    }))
}

/// Transition an outgoing payment's status.
pub async fn update_payment_status(
    State(state): State<AppState>,
    Path(payment_id): Path<Uuid>,
    Json(payload): Json<UpdatePaymentStatusRequest>,
) -> Result<Json<OutgoingPayment>, AppError> {
    let payment = state
        .db
        .update_outgoing_payment_status(payment_id, payload.status)
        .await?;

    Ok(Json(payment))
}
