//! Totals preview handler: prices a document without persisting it.

use axum::{extract::State, Json};
use service_core::error::AppError;
use validator::Validate;

use crate::{
    dtos::{ComputeTotalsRequest, TotalsResponse},
    engine::{resolver, totals, Discount},
    models::LineItemInput,
    AppState,
};

/// Run the totals calculator against caller-supplied line items. Catalog
/// references are resolved against the live product table, exactly as the
/// create paths do.
pub async fn compute_totals(
    State(state): State<AppState>,
    Json(payload): Json<ComputeTotalsRequest>,
) -> Result<Json<TotalsResponse>, AppError> {
    payload.validate()?;

    let discount = match (payload.discount_type, payload.discount_value) {
        (Some(t), Some(v)) => Some(Discount {
            discount_type: t,
            value: v,
        }),
        (None, None) => None,
        _ => {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Discount requires both a type and a value"
            )))
        }
    };

    let mut resolved = Vec::with_capacity(payload.line_items.len());
    for item in payload.line_items {
        let input = LineItemInput::from(item);
        let product = match input.product_id {
            Some(id) => state.db.get_product(id).await?,
            None => None,
        };
        resolved.push(resolver::resolve_line_item(product.as_ref(), &input)?);
    }

    let breakdown =
        totals::compute_totals(&resolved, discount.as_ref(), payload.tax_rate_percent)?;

    Ok(Json(TotalsResponse {
        subtotal: breakdown.subtotal,
        discount_amount: breakdown.discount_amount,
        tax_amount: breakdown.tax_amount,
        total_amount: breakdown.total_amount,
    }))
}
