//! Client handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::{ClientListResponse, CreateClientRequest, ListClientsQuery, UpdateClientRequest},
    middleware::ActorContext,
    models::{Client, ListClientsFilter},
    AppState,
};

/// Create a new client.
pub async fn create_client(
    State(state): State<AppState>,
    actor: ActorContext,
    Json(payload): Json<CreateClientRequest>,
) -> Result<(StatusCode, Json<Client>), AppError> {
    payload.validate()?;

    let client = state
        .db
        .create_client(&payload.into_input(actor.user_id))
        .await?;

    Ok((StatusCode::CREATED, Json(client)))
}

/// Get a client by ID.
pub async fn get_client(
    State(state): State<AppState>,
    Path(client_id): Path<Uuid>,
) -> Result<Json<Client>, AppError> {
    let client = state
        .db
        .get_client(client_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Client not found")))?;

    Ok(Json(client))
}

/// List clients with keyset pagination.
pub async fn list_clients(
    State(state): State<AppState>,
    Query(query): Query<ListClientsQuery>,
) -> Result<Json<ClientListResponse>, AppError> {
    let filter = ListClientsFilter {
        status: query.status,
        page_size: query.page_size,
        page_token: query.page_token,
    };
    let clients = state.db.list_clients(&filter).await?;

    let next_page_token = if clients.len() as i32 == query.page_size.clamp(1, 100) {
        clients.last().map(|c| c.client_id)
    } else {
        None
    };

    Ok(Json(ClientListResponse {
        clients,
        next_page_token,
    }))
}

/// Update a client.
pub async fn update_client(
    State(state): State<AppState>,
    Path(client_id): Path<Uuid>,
    Json(payload): Json<UpdateClientRequest>,
) -> Result<Json<Client>, AppError> {
    payload.validate()?;

    let client = state.db.update_client(client_id, &payload.into()).await?;

    Ok(Json(client))
}

/// Delete a client. Fails with Conflict while documents reference it.
pub async fn delete_client(
    State(state): State<AppState>,
    Path(client_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if state.db.delete_client(client_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(anyhow::anyhow!("Client not found")))
    }
}
