//! Product catalog handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::{CreateProductRequest, ListProductsQuery, ProductListResponse, UpdateProductRequest},
    middleware::ActorContext,
    models::{CreateProduct, ListProductsFilter, Product, UpdateProduct},
    AppState,
};

/// Create a product.
pub async fn create_product(
    State(state): State<AppState>,
    actor: ActorContext,
    Json(payload): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    payload.validate()?;

    let input = CreateProduct {
        name: payload.name,
        description: payload.description,
        price: payload.price,
        sale_price: payload.sale_price,
        tax_rate: payload.tax_rate,
        stock_quantity: payload.stock_quantity,
        is_service: payload.is_service,
        created_by: actor.user_id,
    };
    let product = state.db.create_product(&input).await?;

    Ok((StatusCode::CREATED, Json(product)))
}

/// Get a product by ID.
pub async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<Json<Product>, AppError> {
    let product = state
        .db
        .get_product(product_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Product not found")))?;

    Ok(Json(product))
}

/// List products.
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ListProductsQuery>,
) -> Result<Json<ProductListResponse>, AppError> {
    let filter = ListProductsFilter {
        active_only: query.active_only,
        page_size: query.page_size,
        page_token: query.page_token,
    };
    let products = state.db.list_products(&filter).await?;

    let next_page_token = if products.len() as i32 == query.page_size.clamp(1, 100) {
        products.last().map(|p| p.product_id)
    } else {
        None
    };

    Ok(Json(ProductListResponse {
        products,
        next_page_token,
    }))
}

/// Update a product. Documents that already embed this product's snapshot
/// are unaffected.
pub async fn update_product(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
    Json(payload): Json<UpdateProductRequest>,
) -> Result<Json<Product>, AppError> {
    payload.validate()?;

    let input = UpdateProduct {
        name: payload.name,
        description: payload.description,
        price: payload.price,
        sale_price: payload.sale_price,
        tax_rate: payload.tax_rate,
        stock_quantity: payload.stock_quantity,
        is_service: payload.is_service,
        active: payload.active,
    };
    let product = state
        .db
        .update_product(product_id, &input)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Product not found")))?;

    Ok(Json(product))
}
