//! Actor context middleware.
//!
//! Extracts the acting user from the `X-User-ID` header. The header is set
//! by the upstream gateway after authentication; documents record it as
//! `created_by`.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use service_core::error::AppError;

/// The authenticated user a request acts on behalf of.
#[derive(Debug, Clone, Copy)]
pub struct ActorContext {
    pub user_id: i64,
}

#[async_trait]
impl<S> FromRequestParts<S> for ActorContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get("X-User-ID")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::BadRequest(anyhow::anyhow!("Missing X-User-ID header"))
            })?
            .parse::<i64>()
            .map_err(|_| {
                AppError::BadRequest(anyhow::anyhow!("X-User-ID header must be an integer"))
            })?;

        tracing::Span::current().record("user_id", user_id);

        Ok(ActorContext { user_id })
    }
}
