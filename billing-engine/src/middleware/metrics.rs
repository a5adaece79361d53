//! Request metrics middleware.

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::services::metrics::{ERRORS_TOTAL, HTTP_REQUESTS_TOTAL};

/// Count every request by method and response status; server errors also
/// bump the error counter.
pub async fn metrics_middleware(req: Request, next: Next) -> Response {
    let method = req.method().to_string();
    let response = next.run(req).await;

    let status = response.status();
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, status.as_str()])
        .inc();
    if status.is_server_error() {
        ERRORS_TOTAL.with_label_values(&["http_5xx"]).inc();
    }

    response
}
