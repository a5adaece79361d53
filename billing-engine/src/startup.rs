//! Application startup and lifecycle management.

use axum::{
    routing::{get, patch, post},
    Router,
};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::handlers;
use crate::services::Database;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Config,
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Build the application: connect, migrate, and wire up the router.
    pub async fn build(config: Config) -> Result<Self, AppError> {
        let db = Database::new(
            config.database.url.expose_secret(),
            config.database.max_connections,
            config.database.min_connections,
        )
        .await?;

        db.run_migrations().await?;

        let state = AppState {
            db,
            config: config.clone(),
        };

        let router = Router::new()
            .route("/health", get(handlers::health_check))
            .route("/ready", get(handlers::readiness_check))
            .route("/metrics", get(handlers::metrics))
            // Clients
            .route(
                "/clients",
                post(handlers::clients::create_client).get(handlers::clients::list_clients),
            )
            .route(
                "/clients/:id",
                get(handlers::clients::get_client)
                    .patch(handlers::clients::update_client)
                    .delete(handlers::clients::delete_client),
            )
            // Products
            .route(
                "/products",
                post(handlers::products::create_product).get(handlers::products::list_products),
            )
            .route(
                "/products/:id",
                get(handlers::products::get_product).patch(handlers::products::update_product),
            )
            // Quotations
            .route(
                "/quotations",
                post(handlers::quotations::create_quotation)
                    .get(handlers::quotations::list_quotations),
            )
            .route(
                "/quotations/:id",
                get(handlers::quotations::get_quotation)
                    .patch(handlers::quotations::update_quotation),
            )
            .route(
                "/quotations/:id/convert",
                post(handlers::quotations::convert_quotation),
            )
            // Invoices
            .route(
                "/invoices",
                post(handlers::invoices::create_invoice).get(handlers::invoices::list_invoices),
            )
            .route(
                "/invoices/:id",
                get(handlers::invoices::get_invoice)
                    .patch(handlers::invoices::update_invoice)
                    .delete(handlers::invoices::delete_invoice),
            )
            .route(
                "/invoices/:id/payments",
                post(handlers::invoices::record_payment),
            )
            // Outgoing payments
            .route(
                "/payments",
                post(handlers::payments::create_payment).get(handlers::payments::list_payments),
            )
            .route("/payments/:id", get(handlers::payments::get_payment))
            .route(
                "/payments/:id/status",
                patch(handlers::payments::update_payment_status),
            )
            // Pricing preview
            .route("/totals/compute", post(handlers::totals::compute_totals))
            .layer(axum::middleware::from_fn(
                crate::middleware::metrics_middleware,
            ))
            .layer(
                TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                    let request_id = request
                        .headers()
                        .get("x-request-id")
                        .and_then(|value| value.to_str().ok())
                        .unwrap_or("-");

                    tracing::info_span!(
                        "http_request",
                        request_id = %request_id,
                        method = %request.method(),
                        uri = %request.uri(),
                        user_id = tracing::field::Empty,
                    )
                }),
            )
            .with_state(state);

        // Bind the listener (port 0 = random port for testing)
        let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("billing-engine listening on port {}", port);

        Ok(Self {
            port,
            listener,
            router,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        axum::serve(self.listener, self.router).await
    }
}
