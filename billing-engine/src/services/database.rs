//! Database service for billing-engine.
//!
//! All multi-record writes (document + line-item replacement, conversion,
//! payment application) run inside a single transaction; a failure partway
//! rolls the whole operation back. Document numbers are allocated from the
//! `document_counters` table inside the same transaction, so two concurrent
//! callers can never observe the same number.

use crate::engine::{
    ensure_invoice_transition, ensure_payment_transition, ensure_quotation_transition,
    numbering::{format_document_number, DocumentKind},
    reconciler, resolver, totals, Discount,
};
use crate::models::{
    Client, CreateClient, CreateInvoice, CreateOutgoingPayment, CreateProduct, CreateQuotation,
    DiscountType, Invoice, InvoiceLineItem, InvoiceStatus, LineItemInput, ListClientsFilter,
    ListInvoicesFilter, ListOutgoingPaymentsFilter, ListProductsFilter, ListQuotationsFilter,
    OutgoingPayment, OutgoingPaymentStatus, Product, Quotation, QuotationLineItem,
    QuotationStatus, ResolvedLineItem, UpdateClient, UpdateInvoice, UpdateProduct,
    UpdateQuotation,
};
use crate::services::metrics::{DB_QUERY_DURATION, DOCUMENTS_TOTAL, PAYMENTS_RECORDED_TOTAL};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

/// Bounded retry for numbering collisions only; transitions are never
/// retried.
const NUMBERING_RETRIES: u32 = 3;

const CLIENT_COLUMNS: &str = "client_id, client_code, business_name, contact_person, email, phone, \
    address_line1, address_line2, city, state, postal_code, country, \
    payment_schedule, payment_terms, status, total_spent, created_by, revision, \
    created_utc, updated_utc";

const PRODUCT_COLUMNS: &str = "product_id, name, description, price, sale_price, tax_rate, \
    stock_quantity, is_service, active, created_by, created_utc, updated_utc";

const QUOTATION_COLUMNS: &str = "quotation_id, quotation_number, client_id, client_name, \
    client_email, quotation_date, valid_until_date, discount_type, discount_value, \
    tax_rate_percent, subtotal, discount_amount, tax_amount, total_amount, status, \
    converted_invoice_id, notes, created_by, revision, created_utc, updated_utc";

const QUOTATION_ITEM_COLUMNS: &str = "line_item_id, quotation_id, product_id, product_name, \
    description, quantity, unit_price, amount, sort_order, created_utc";

const INVOICE_COLUMNS: &str = "invoice_id, invoice_number, client_id, client_name, client_email, \
    issue_date, due_date, tax_rate_percent, subtotal, tax_amount, total_amount, amount_paid, \
    balance_due, status, source_quotation_id, notes, created_by, revision, created_utc, \
    updated_utc";

const INVOICE_ITEM_COLUMNS: &str = "line_item_id, invoice_id, product_id, product_name, \
    description, quantity, unit_price, amount, sort_order, created_utc";

const PAYMENT_COLUMNS: &str = "payment_id, payment_number, payment_category, staff_id, \
    product_id, payee_name, expense_category, amount, payment_date, payment_method, status, \
    notes, created_by, created_utc, updated_utc";

fn db_err(context: &str, e: sqlx::Error) -> AppError {
    AppError::DatabaseError(anyhow::anyhow!("{}: {}", context, e))
}

fn unique_or_db_err(context: &str, conflict: &str, e: sqlx::Error) -> AppError {
    match e {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => {
            AppError::Conflict(anyhow::anyhow!("{}", conflict))
        }
        _ => db_err(context, e),
    }
}

/// Outcome of a single client INSERT attempt. A unique violation on the
/// allocated `client_code` is retryable with a fresh sequence value; any
/// other failure is final.
enum ClientInsert {
    Created(Client),
    CodeCollision,
}

/// Matches the unique constraint backing `clients.client_code` in the
/// schema migration.
fn is_client_code_constraint(constraint: Option<&str>) -> bool {
    constraint == Some("clients_client_code_key")
}

/// Build the discount policy from a type/value pair; both or neither.
fn discount_from_parts(
    discount_type: Option<DiscountType>,
    discount_value: Option<Decimal>,
) -> Result<Option<Discount>, AppError> {
    match (discount_type, discount_value) {
        (Some(t), Some(v)) => Ok(Some(Discount {
            discount_type: t,
            value: v,
        })),
        (None, None) => Ok(None),
        _ => Err(AppError::BadRequest(anyhow::anyhow!(
            "Discount requires both a type and a value"
        ))),
    }
}

impl From<&QuotationLineItem> for ResolvedLineItem {
    fn from(item: &QuotationLineItem) -> Self {
        ResolvedLineItem {
            product_id: item.product_id,
            product_name: item.product_name.clone(),
            description: item.description.clone(),
            quantity: item.quantity,
            unit_price: item.unit_price,
            amount: item.amount,
        }
    }
}

impl From<&InvoiceLineItem> for ResolvedLineItem {
    fn from(item: &InvoiceLineItem) -> Self {
        ResolvedLineItem {
            product_id: item.product_id,
            product_name: item.product_name.clone(),
            description: item.description.clone(),
            quantity: item.quantity,
            unit_price: item.unit_price,
            amount: item.amount,
        }
    }
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "billing-engine"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| db_err("Health check failed", e))?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Numbering
    // -------------------------------------------------------------------------

    /// Allocate the next document number inside the caller's transaction.
    ///
    /// The upsert takes a row lock on the `(doc_type, period_year)` counter,
    /// so concurrent callers serialize here and never see the same value.
    async fn next_document_number(
        tx: &mut Transaction<'_, Postgres>,
        kind: DocumentKind,
        date: NaiveDate,
    ) -> Result<String, AppError> {
        let year = kind.period_year(date);
        let seq: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO document_counters (doc_type, period_year, last_value)
            VALUES ($1, $2, 1)
            ON CONFLICT (doc_type, period_year)
            DO UPDATE SET last_value = document_counters.last_value + 1
            RETURNING last_value
            "#,
        )
        .bind(kind.counter_key())
        .bind(year)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| db_err("Failed to allocate document number", e))?;

        Ok(format_document_number(kind, year, seq))
    }

    // -------------------------------------------------------------------------
    // Snapshot helpers (inside a transaction)
    // -------------------------------------------------------------------------

    async fn fetch_client_for_snapshot(
        tx: &mut Transaction<'_, Postgres>,
        client_id: Uuid,
    ) -> Result<resolver::ClientSnapshot, AppError> {
        let client = sqlx::query_as::<_, Client>(&format!(
            "SELECT {} FROM clients WHERE client_id = $1",
            CLIENT_COLUMNS
        ))
        .bind(client_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| db_err("Failed to get client", e))?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Client {} not found", client_id)))?;

        resolver::snapshot_client(&client)
    }

    async fn resolve_line_inputs(
        tx: &mut Transaction<'_, Postgres>,
        inputs: &[LineItemInput],
    ) -> Result<Vec<ResolvedLineItem>, AppError> {
        let mut resolved = Vec::with_capacity(inputs.len());
        for input in inputs {
            let product = match input.product_id {
                Some(id) => sqlx::query_as::<_, Product>(&format!(
                    "SELECT {} FROM products WHERE product_id = $1",
                    PRODUCT_COLUMNS
                ))
                .bind(id)
                .fetch_optional(&mut **tx)
                .await
                .map_err(|e| db_err("Failed to get product", e))?,
                None => None,
            };
            resolved.push(resolver::resolve_line_item(product.as_ref(), input)?);
        }
        Ok(resolved)
    }

    // -------------------------------------------------------------------------
    // Client Operations
    // -------------------------------------------------------------------------

    /// Create a new client, assigning its `CLT{seq}` code.
    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn create_client(&self, input: &CreateClient) -> Result<Client, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_client"])
            .start_timer();

        for _ in 0..NUMBERING_RETRIES {
            match self.try_create_client(input).await? {
                ClientInsert::Created(client) => {
                    timer.observe_duration();
                    info!(client_id = %client.client_id, client_code = %client.client_code, "Client created");
                    return Ok(client);
                }
                // Only a code collision is retried with a fresh sequence
                // value; an email conflict surfaces as Conflict immediately.
                ClientInsert::CodeCollision => continue,
            }
        }
        Err(AppError::Conflict(anyhow::anyhow!(
            "Client code allocation collided repeatedly"
        )))
    }

    async fn try_create_client(&self, input: &CreateClient) -> Result<ClientInsert, AppError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_err("Failed to begin transaction", e))?;

        let today = chrono::Utc::now().date_naive();
        let client_code =
            Self::next_document_number(&mut tx, DocumentKind::Client, today).await?;

        let inserted = sqlx::query_as::<_, Client>(&format!(
            r#"
            INSERT INTO clients (
                client_id, client_code, business_name, contact_person, email, phone,
                address_line1, address_line2, city, state, postal_code, country,
                payment_schedule, payment_terms, status, total_spent, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, 'active', 0, $15)
            RETURNING {}
            "#,
            CLIENT_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&client_code)
        .bind(&input.business_name)
        .bind(&input.contact_person)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.address_line1)
        .bind(&input.address_line2)
        .bind(&input.city)
        .bind(&input.state)
        .bind(&input.postal_code)
        .bind(&input.country)
        .bind(&input.payment_schedule)
        .bind(&input.payment_terms)
        .bind(input.created_by)
        .fetch_one(&mut *tx)
        .await;

        let client = match inserted {
            Ok(client) => client,
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                if is_client_code_constraint(db.constraint()) {
                    return Ok(ClientInsert::CodeCollision);
                }
                return Err(AppError::Conflict(anyhow::anyhow!(
                    "A client with email '{}' already exists",
                    input.email
                )));
            }
            Err(e) => return Err(db_err("Failed to create client", e)),
        };

        tx.commit()
            .await
            .map_err(|e| db_err("Failed to commit transaction", e))?;

        Ok(ClientInsert::Created(client))
    }

    /// Get a client by ID.
    #[instrument(skip(self), fields(client_id = %client_id))]
    pub async fn get_client(&self, client_id: Uuid) -> Result<Option<Client>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_client"])
            .start_timer();

        let client = sqlx::query_as::<_, Client>(&format!(
            "SELECT {} FROM clients WHERE client_id = $1",
            CLIENT_COLUMNS
        ))
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_err("Failed to get client", e))?;

        timer.observe_duration();

        Ok(client)
    }

    /// List clients.
    #[instrument(skip(self, filter))]
    pub async fn list_clients(&self, filter: &ListClientsFilter) -> Result<Vec<Client>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_clients"])
            .start_timer();

        let limit = filter.page_size.clamp(1, 100) as i64;
        let status_str = filter.status.map(|s| s.as_str().to_string());

        let clients = sqlx::query_as::<_, Client>(&format!(
            r#"
            SELECT {}
            FROM clients
            WHERE ($1::varchar IS NULL OR status = $1)
              AND ($2::uuid IS NULL OR client_id > $2)
            ORDER BY client_id
            LIMIT $3
            "#,
            CLIENT_COLUMNS
        ))
        .bind(&status_str)
        .bind(filter.page_token)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("Failed to list clients", e))?;

        timer.observe_duration();

        Ok(clients)
    }

    /// Update a client. The caller's revision is compared-and-swapped; a
    /// stale revision fails with Conflict.
    #[instrument(skip(self, input), fields(client_id = %client_id))]
    pub async fn update_client(
        &self,
        client_id: Uuid,
        input: &UpdateClient,
    ) -> Result<Client, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_client"])
            .start_timer();

        let status_str = input.status.map(|s| s.as_str().to_string());

        let updated = sqlx::query_as::<_, Client>(&format!(
            r#"
            UPDATE clients
            SET business_name = COALESCE($3, business_name),
                contact_person = COALESCE($4, contact_person),
                email = COALESCE($5, email),
                phone = COALESCE($6, phone),
                address_line1 = COALESCE($7, address_line1),
                address_line2 = COALESCE($8, address_line2),
                city = COALESCE($9, city),
                state = COALESCE($10, state),
                postal_code = COALESCE($11, postal_code),
                country = COALESCE($12, country),
                payment_schedule = COALESCE($13, payment_schedule),
                payment_terms = COALESCE($14, payment_terms),
                status = COALESCE($15, status),
                revision = revision + 1,
                updated_utc = NOW()
            WHERE client_id = $1 AND revision = $2
            RETURNING {}
            "#,
            CLIENT_COLUMNS
        ))
        .bind(client_id)
        .bind(input.revision)
        .bind(&input.business_name)
        .bind(&input.contact_person)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.address_line1)
        .bind(&input.address_line2)
        .bind(&input.city)
        .bind(&input.state)
        .bind(&input.postal_code)
        .bind(&input.country)
        .bind(&input.payment_schedule)
        .bind(&input.payment_terms)
        .bind(&status_str)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            unique_or_db_err(
                "Failed to update client",
                "A client with that email already exists",
                e,
            )
        })?;

        timer.observe_duration();

        match updated {
            Some(client) => Ok(client),
            None => {
                // Either absent or a stale revision; disambiguate for the caller.
                match self.get_client(client_id).await? {
                    Some(current) => Err(AppError::Conflict(anyhow::anyhow!(
                        "Client was modified concurrently (expected revision {}, found {})",
                        input.revision,
                        current.revision
                    ))),
                    None => Err(AppError::NotFound(anyhow::anyhow!(
                        "Client {} not found",
                        client_id
                    ))),
                }
            }
        }
    }

    /// Delete a client. Rejected while any document references it.
    #[instrument(skip(self), fields(client_id = %client_id))]
    pub async fn delete_client(&self, client_id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_client"])
            .start_timer();

        let result = sqlx::query("DELETE FROM clients WHERE client_id = $1")
            .bind(client_id)
            .execute(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => {
                    AppError::Conflict(anyhow::anyhow!(
                        "Client is referenced by existing documents and cannot be deleted"
                    ))
                }
                _ => db_err("Failed to delete client", e),
            })?;

        timer.observe_duration();

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(client_id = %client_id, "Client deleted");
        }
        Ok(deleted)
    }

    // -------------------------------------------------------------------------
    // Product Operations
    // -------------------------------------------------------------------------

    /// Create a product.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_product(&self, input: &CreateProduct) -> Result<Product, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_product"])
            .start_timer();

        if input.price < Decimal::ZERO || input.sale_price.is_some_and(|p| p < Decimal::ZERO) {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Product prices must not be negative"
            )));
        }

        let product = sqlx::query_as::<_, Product>(&format!(
            r#"
            INSERT INTO products (
                product_id, name, description, price, sale_price, tax_rate,
                stock_quantity, is_service, active, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, TRUE, $9)
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.price)
        .bind(input.sale_price)
        .bind(input.tax_rate)
        .bind(input.stock_quantity)
        .bind(input.is_service)
        .bind(input.created_by)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_err("Failed to create product", e))?;

        timer.observe_duration();

        info!(product_id = %product.product_id, "Product created");

        Ok(product)
    }

    /// Get a product by ID.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn get_product(&self, product_id: Uuid) -> Result<Option<Product>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_product"])
            .start_timer();

        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {} FROM products WHERE product_id = $1",
            PRODUCT_COLUMNS
        ))
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_err("Failed to get product", e))?;

        timer.observe_duration();

        Ok(product)
    }

    /// List products.
    #[instrument(skip(self, filter))]
    pub async fn list_products(
        &self,
        filter: &ListProductsFilter,
    ) -> Result<Vec<Product>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_products"])
            .start_timer();

        let limit = filter.page_size.clamp(1, 100) as i64;

        let products = sqlx::query_as::<_, Product>(&format!(
            r#"
            SELECT {}
            FROM products
            WHERE ($1::bool = FALSE OR active = TRUE)
              AND ($2::uuid IS NULL OR product_id > $2)
            ORDER BY product_id
            LIMIT $3
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(filter.active_only)
        .bind(filter.page_token)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("Failed to list products", e))?;

        timer.observe_duration();

        Ok(products)
    }

    /// Update a product. Historical documents keep their snapshots; this
    /// only changes what future documents will embed.
    #[instrument(skip(self, input), fields(product_id = %product_id))]
    pub async fn update_product(
        &self,
        product_id: Uuid,
        input: &UpdateProduct,
    ) -> Result<Option<Product>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_product"])
            .start_timer();

        let product = sqlx::query_as::<_, Product>(&format!(
            r#"
            UPDATE products
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                price = COALESCE($4, price),
                sale_price = COALESCE($5, sale_price),
                tax_rate = COALESCE($6, tax_rate),
                stock_quantity = COALESCE($7, stock_quantity),
                is_service = COALESCE($8, is_service),
                active = COALESCE($9, active),
                updated_utc = NOW()
            WHERE product_id = $1
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(product_id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.price)
        .bind(input.sale_price)
        .bind(input.tax_rate)
        .bind(input.stock_quantity)
        .bind(input.is_service)
        .bind(input.active)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_err("Failed to update product", e))?;

        timer.observe_duration();

        Ok(product)
    }

    // -------------------------------------------------------------------------
    // Quotation Operations
    // -------------------------------------------------------------------------

    /// Create a quotation: snapshot the client, resolve and price the line
    /// items, compute totals, assign a number, and write document + items
    /// atomically.
    #[instrument(skip(self, input), fields(client_id = %input.client_id))]
    pub async fn create_quotation(
        &self,
        input: &CreateQuotation,
    ) -> Result<(Quotation, Vec<QuotationLineItem>), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_quotation"])
            .start_timer();

        if input.valid_until_date < input.quotation_date {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Valid-until date {} is before quotation date {}",
                input.valid_until_date,
                input.quotation_date
            )));
        }

        let mut last_err = AppError::InternalError(anyhow::anyhow!("unreachable"));
        for _ in 0..NUMBERING_RETRIES {
            match self.try_create_quotation(input).await {
                Ok(created) => {
                    timer.observe_duration();
                    DOCUMENTS_TOTAL
                        .with_label_values(&["quotation", "draft"])
                        .inc();
                    info!(
                        quotation_id = %created.0.quotation_id,
                        quotation_number = %created.0.quotation_number,
                        "Quotation created"
                    );
                    return Ok(created);
                }
                Err(AppError::Conflict(e)) => last_err = AppError::Conflict(e),
                Err(e) => return Err(e),
            }
        }
        Err(last_err)
    }

    async fn try_create_quotation(
        &self,
        input: &CreateQuotation,
    ) -> Result<(Quotation, Vec<QuotationLineItem>), AppError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_err("Failed to begin transaction", e))?;

        let snapshot = Self::fetch_client_for_snapshot(&mut tx, input.client_id).await?;
        let resolved = Self::resolve_line_inputs(&mut tx, &input.line_items).await?;
        let discount = discount_from_parts(input.discount_type, input.discount_value)?;
        let breakdown =
            totals::compute_totals(&resolved, discount.as_ref(), input.tax_rate_percent)?;

        let quotation_number =
            Self::next_document_number(&mut tx, DocumentKind::Quotation, input.quotation_date)
                .await?;

        let quotation = sqlx::query_as::<_, Quotation>(&format!(
            r#"
            INSERT INTO quotations (
                quotation_id, quotation_number, client_id, client_name, client_email,
                quotation_date, valid_until_date, discount_type, discount_value,
                tax_rate_percent, subtotal, discount_amount, tax_amount, total_amount,
                status, notes, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, 'draft', $15, $16)
            RETURNING {}
            "#,
            QUOTATION_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&quotation_number)
        .bind(snapshot.client_id)
        .bind(&snapshot.name)
        .bind(&snapshot.email)
        .bind(input.quotation_date)
        .bind(input.valid_until_date)
        .bind(input.discount_type.map(|t| t.as_str().to_string()))
        .bind(input.discount_value)
        .bind(input.tax_rate_percent)
        .bind(breakdown.subtotal)
        .bind(breakdown.discount_amount)
        .bind(breakdown.tax_amount)
        .bind(breakdown.total_amount)
        .bind(&input.notes)
        .bind(input.created_by)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            unique_or_db_err(
                "Failed to create quotation",
                "Quotation number collision",
                e,
            )
        })?;

        let items =
            Self::insert_quotation_items(&mut tx, quotation.quotation_id, &resolved).await?;

        tx.commit()
            .await
            .map_err(|e| db_err("Failed to commit transaction", e))?;

        Ok((quotation, items))
    }

    async fn insert_quotation_items(
        tx: &mut Transaction<'_, Postgres>,
        quotation_id: Uuid,
        resolved: &[ResolvedLineItem],
    ) -> Result<Vec<QuotationLineItem>, AppError> {
        let mut items = Vec::with_capacity(resolved.len());
        for (i, line) in resolved.iter().enumerate() {
            let item = sqlx::query_as::<_, QuotationLineItem>(&format!(
                r#"
                INSERT INTO quotation_line_items (
                    line_item_id, quotation_id, product_id, product_name, description,
                    quantity, unit_price, amount, sort_order
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                RETURNING {}
                "#,
                QUOTATION_ITEM_COLUMNS
            ))
            .bind(Uuid::new_v4())
            .bind(quotation_id)
            .bind(line.product_id)
            .bind(&line.product_name)
            .bind(&line.description)
            .bind(line.quantity)
            .bind(line.unit_price)
            .bind(line.amount)
            .bind(i as i32)
            .fetch_one(&mut **tx)
            .await
            .map_err(|e| db_err("Failed to insert line item", e))?;
            items.push(item);
        }
        Ok(items)
    }

    /// Get a quotation with its line items.
    #[instrument(skip(self), fields(quotation_id = %quotation_id))]
    pub async fn get_quotation(
        &self,
        quotation_id: Uuid,
    ) -> Result<Option<(Quotation, Vec<QuotationLineItem>)>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_quotation"])
            .start_timer();

        let quotation = sqlx::query_as::<_, Quotation>(&format!(
            "SELECT {} FROM quotations WHERE quotation_id = $1",
            QUOTATION_COLUMNS
        ))
        .bind(quotation_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_err("Failed to get quotation", e))?;

        let result = match quotation {
            Some(q) => {
                let items = sqlx::query_as::<_, QuotationLineItem>(&format!(
                    "SELECT {} FROM quotation_line_items WHERE quotation_id = $1 ORDER BY sort_order",
                    QUOTATION_ITEM_COLUMNS
                ))
                .bind(quotation_id)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| db_err("Failed to get line items", e))?;
                Some((q, items))
            }
            None => None,
        };

        timer.observe_duration();

        Ok(result)
    }

    /// List quotations.
    #[instrument(skip(self, filter))]
    pub async fn list_quotations(
        &self,
        filter: &ListQuotationsFilter,
    ) -> Result<Vec<Quotation>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_quotations"])
            .start_timer();

        let limit = filter.page_size.clamp(1, 100) as i64;
        let status_str = filter.status.map(|s| s.as_str().to_string());

        let quotations = sqlx::query_as::<_, Quotation>(&format!(
            r#"
            SELECT {}
            FROM quotations
            WHERE ($1::varchar IS NULL OR status = $1)
              AND ($2::uuid IS NULL OR client_id = $2)
              AND ($3::date IS NULL OR quotation_date >= $3)
              AND ($4::date IS NULL OR quotation_date <= $4)
              AND ($5::uuid IS NULL OR quotation_id > $5)
            ORDER BY quotation_id
            LIMIT $6
            "#,
            QUOTATION_COLUMNS
        ))
        .bind(&status_str)
        .bind(filter.client_id)
        .bind(filter.start_date)
        .bind(filter.end_date)
        .bind(filter.page_token)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("Failed to list quotations", e))?;

        timer.observe_duration();

        Ok(quotations)
    }

    /// Update a quotation.
    ///
    /// Content edits (dates, discount, tax, line items) are allowed only in
    /// draft; status changes follow the transition table. Everything is
    /// re-derived and written atomically: snapshot, totals, line-item
    /// replacement, revision bump.
    #[instrument(skip(self, input), fields(quotation_id = %quotation_id))]
    pub async fn update_quotation(
        &self,
        quotation_id: Uuid,
        input: &UpdateQuotation,
    ) -> Result<(Quotation, Vec<QuotationLineItem>), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_quotation"])
            .start_timer();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_err("Failed to begin transaction", e))?;

        let existing = sqlx::query_as::<_, Quotation>(&format!(
            "SELECT {} FROM quotations WHERE quotation_id = $1 FOR UPDATE",
            QUOTATION_COLUMNS
        ))
        .bind(quotation_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| db_err("Failed to get quotation", e))?
        .ok_or_else(|| {
            AppError::NotFound(anyhow::anyhow!("Quotation {} not found", quotation_id))
        })?;

        if input.revision != existing.revision {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Quotation was modified concurrently (expected revision {}, found {})",
                input.revision,
                existing.revision
            )));
        }

        let current_status = QuotationStatus::from_string(&existing.status);
        let next_status = input.status.unwrap_or(current_status);
        ensure_quotation_transition(current_status, next_status)?;
        if next_status == QuotationStatus::Converted {
            return Err(AppError::InvalidTransition(anyhow::anyhow!(
                "Quotations are converted via the convert operation, not a status patch"
            )));
        }

        let content_change = input.quotation_date.is_some()
            || input.valid_until_date.is_some()
            || input.discount_type.is_some()
            || input.discount_value.is_some()
            || input.clear_discount
            || input.tax_rate_percent.is_some()
            || input.line_items.is_some();
        if content_change && current_status != QuotationStatus::Draft {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Only draft quotations can be edited"
            )));
        }

        let quotation_date = input.quotation_date.unwrap_or(existing.quotation_date);
        let valid_until_date = input.valid_until_date.unwrap_or(existing.valid_until_date);
        if valid_until_date < quotation_date {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Valid-until date {} is before quotation date {}",
                valid_until_date,
                quotation_date
            )));
        }

        // Merge the discount policy; `clear_discount` wins.
        let (discount_type, discount_value) = if input.clear_discount {
            (None, None)
        } else {
            (
                input.discount_type.or_else(|| {
                    existing
                        .discount_type
                        .as_deref()
                        .map(DiscountType::from_string)
                }),
                input.discount_value.or(existing.discount_value),
            )
        };
        let discount = discount_from_parts(discount_type, discount_value)?;
        let tax_rate_percent = input.tax_rate_percent.unwrap_or(existing.tax_rate_percent);

        // Drafts re-snapshot the client on every edit; once sent, the
        // embedded snapshot is immutable.
        let (client_name, client_email) = if current_status == QuotationStatus::Draft {
            let snapshot = Self::fetch_client_for_snapshot(&mut tx, existing.client_id).await?;
            (snapshot.name, snapshot.email)
        } else {
            (existing.client_name.clone(), existing.client_email.clone())
        };
        let resolved = match &input.line_items {
            Some(items) => Self::resolve_line_inputs(&mut tx, items).await?,
            None => sqlx::query_as::<_, QuotationLineItem>(&format!(
                "SELECT {} FROM quotation_line_items WHERE quotation_id = $1 ORDER BY sort_order",
                QUOTATION_ITEM_COLUMNS
            ))
            .bind(quotation_id)
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| db_err("Failed to get line items", e))?
            .iter()
            .map(ResolvedLineItem::from)
            .collect(),
        };
        let breakdown = totals::compute_totals(&resolved, discount.as_ref(), tax_rate_percent)?;

        let quotation = sqlx::query_as::<_, Quotation>(&format!(
            r#"
            UPDATE quotations
            SET client_name = $3,
                client_email = $4,
                quotation_date = $5,
                valid_until_date = $6,
                discount_type = $7,
                discount_value = $8,
                tax_rate_percent = $9,
                subtotal = $10,
                discount_amount = $11,
                tax_amount = $12,
                total_amount = $13,
                status = $14,
                notes = COALESCE($15, notes),
                revision = revision + 1,
                updated_utc = NOW()
            WHERE quotation_id = $1 AND revision = $2
            RETURNING {}
            "#,
            QUOTATION_COLUMNS
        ))
        .bind(quotation_id)
        .bind(input.revision)
        .bind(&client_name)
        .bind(&client_email)
        .bind(quotation_date)
        .bind(valid_until_date)
        .bind(discount.map(|d| d.discount_type.as_str().to_string()))
        .bind(discount.map(|d| d.value))
        .bind(tax_rate_percent)
        .bind(breakdown.subtotal)
        .bind(breakdown.discount_amount)
        .bind(breakdown.tax_amount)
        .bind(breakdown.total_amount)
        .bind(next_status.as_str())
        .bind(&input.notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| db_err("Failed to update quotation", e))?;

        // Line-item replacement is delete-then-recreate inside this
        // transaction, so no reader observes an itemless document.
        let items = if input.line_items.is_some() {
            sqlx::query("DELETE FROM quotation_line_items WHERE quotation_id = $1")
                .bind(quotation_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| db_err("Failed to replace line items", e))?;
            Self::insert_quotation_items(&mut tx, quotation_id, &resolved).await?
        } else {
            sqlx::query_as::<_, QuotationLineItem>(&format!(
                "SELECT {} FROM quotation_line_items WHERE quotation_id = $1 ORDER BY sort_order",
                QUOTATION_ITEM_COLUMNS
            ))
            .bind(quotation_id)
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| db_err("Failed to get line items", e))?
        };

        tx.commit()
            .await
            .map_err(|e| db_err("Failed to commit transaction", e))?;

        timer.observe_duration();

        if next_status != current_status {
            DOCUMENTS_TOTAL
                .with_label_values(&["quotation", next_status.as_str()])
                .inc();
        }
        info!(quotation_id = %quotation.quotation_id, status = %quotation.status, "Quotation updated");

        Ok((quotation, items))
    }

    /// Convert an accepted quotation into an invoice.
    ///
    /// Cross-document operation in one transaction: the quotation moves to
    /// `converted`, and a draft invoice is created carrying the quotation's
    /// client snapshot and line items, re-totalled on the invoice path.
    #[instrument(skip(self), fields(quotation_id = %quotation_id))]
    pub async fn convert_quotation(
        &self,
        quotation_id: Uuid,
        issue_date: NaiveDate,
        due_date: NaiveDate,
        created_by: i64,
    ) -> Result<(Invoice, Vec<InvoiceLineItem>), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["convert_quotation"])
            .start_timer();

        if due_date < issue_date {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Due date {} is before issue date {}",
                due_date,
                issue_date
            )));
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_err("Failed to begin transaction", e))?;

        let quotation = sqlx::query_as::<_, Quotation>(&format!(
            "SELECT {} FROM quotations WHERE quotation_id = $1 FOR UPDATE",
            QUOTATION_COLUMNS
        ))
        .bind(quotation_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| db_err("Failed to get quotation", e))?
        .ok_or_else(|| {
            AppError::NotFound(anyhow::anyhow!("Quotation {} not found", quotation_id))
        })?;

        let current_status = QuotationStatus::from_string(&quotation.status);
        ensure_quotation_transition(current_status, QuotationStatus::Converted)?;

        let quotation_items = sqlx::query_as::<_, QuotationLineItem>(&format!(
            "SELECT {} FROM quotation_line_items WHERE quotation_id = $1 ORDER BY sort_order",
            QUOTATION_ITEM_COLUMNS
        ))
        .bind(quotation_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| db_err("Failed to get line items", e))?;

        let resolved: Vec<ResolvedLineItem> =
            quotation_items.iter().map(ResolvedLineItem::from).collect();
        // Invoices carry no discount; tax applies to the full subtotal.
        let breakdown = totals::compute_invoice_totals(&resolved, quotation.tax_rate_percent)?;

        let invoice_number =
            Self::next_document_number(&mut tx, DocumentKind::Invoice, issue_date).await?;

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            INSERT INTO invoices (
                invoice_id, invoice_number, client_id, client_name, client_email,
                issue_date, due_date, tax_rate_percent, subtotal, tax_amount,
                total_amount, amount_paid, balance_due, status, source_quotation_id,
                notes, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 0, $11, 'draft', $12, $13, $14)
            RETURNING {}
            "#,
            INVOICE_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&invoice_number)
        .bind(quotation.client_id)
        .bind(&quotation.client_name)
        .bind(&quotation.client_email)
        .bind(issue_date)
        .bind(due_date)
        .bind(quotation.tax_rate_percent)
        .bind(breakdown.subtotal)
        .bind(breakdown.tax_amount)
        .bind(breakdown.total_amount)
        .bind(quotation_id)
        .bind(&quotation.notes)
        .bind(created_by)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            unique_or_db_err("Failed to create invoice", "Invoice number collision", e)
        })?;

        let items = Self::insert_invoice_items(&mut tx, invoice.invoice_id, &resolved).await?;

        sqlx::query(
            r#"
            UPDATE quotations
            SET status = 'converted',
                converted_invoice_id = $2,
                revision = revision + 1,
                updated_utc = NOW()
            WHERE quotation_id = $1
            "#,
        )
        .bind(quotation_id)
        .bind(invoice.invoice_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| db_err("Failed to mark quotation converted", e))?;

        tx.commit()
            .await
            .map_err(|e| db_err("Failed to commit transaction", e))?;

        timer.observe_duration();

        DOCUMENTS_TOTAL
            .with_label_values(&["quotation", "converted"])
            .inc();
        DOCUMENTS_TOTAL
            .with_label_values(&["invoice", "draft"])
            .inc();
        info!(
            quotation_id = %quotation_id,
            invoice_id = %invoice.invoice_id,
            invoice_number = %invoice.invoice_number,
            "Quotation converted to invoice"
        );

        Ok((invoice, items))
    }

    // -------------------------------------------------------------------------
    // Invoice Operations
    // -------------------------------------------------------------------------

    /// Create an invoice.
    #[instrument(skip(self, input), fields(client_id = %input.client_id))]
    pub async fn create_invoice(
        &self,
        input: &CreateInvoice,
    ) -> Result<(Invoice, Vec<InvoiceLineItem>), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_invoice"])
            .start_timer();

        if input.due_date < input.issue_date {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Due date {} is before issue date {}",
                input.due_date,
                input.issue_date
            )));
        }

        let mut last_err = AppError::InternalError(anyhow::anyhow!("unreachable"));
        for _ in 0..NUMBERING_RETRIES {
            match self.try_create_invoice(input).await {
                Ok(created) => {
                    timer.observe_duration();
                    DOCUMENTS_TOTAL
                        .with_label_values(&["invoice", "draft"])
                        .inc();
                    info!(
                        invoice_id = %created.0.invoice_id,
                        invoice_number = %created.0.invoice_number,
                        "Invoice created"
                    );
                    return Ok(created);
                }
                Err(AppError::Conflict(e)) => last_err = AppError::Conflict(e),
                Err(e) => return Err(e),
            }
        }
        Err(last_err)
    }

    async fn try_create_invoice(
        &self,
        input: &CreateInvoice,
    ) -> Result<(Invoice, Vec<InvoiceLineItem>), AppError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_err("Failed to begin transaction", e))?;

        let snapshot = Self::fetch_client_for_snapshot(&mut tx, input.client_id).await?;
        let resolved = Self::resolve_line_inputs(&mut tx, &input.line_items).await?;
        let breakdown = totals::compute_invoice_totals(&resolved, input.tax_rate_percent)?;

        let invoice_number =
            Self::next_document_number(&mut tx, DocumentKind::Invoice, input.issue_date).await?;

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            INSERT INTO invoices (
                invoice_id, invoice_number, client_id, client_name, client_email,
                issue_date, due_date, tax_rate_percent, subtotal, tax_amount,
                total_amount, amount_paid, balance_due, status, notes, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 0, $11, 'draft', $12, $13)
            RETURNING {}
            "#,
            INVOICE_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&invoice_number)
        .bind(snapshot.client_id)
        .bind(&snapshot.name)
        .bind(&snapshot.email)
        .bind(input.issue_date)
        .bind(input.due_date)
        .bind(input.tax_rate_percent)
        .bind(breakdown.subtotal)
        .bind(breakdown.tax_amount)
        .bind(breakdown.total_amount)
        .bind(&input.notes)
        .bind(input.created_by)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            unique_or_db_err("Failed to create invoice", "Invoice number collision", e)
        })?;

        let items = Self::insert_invoice_items(&mut tx, invoice.invoice_id, &resolved).await?;

        tx.commit()
            .await
            .map_err(|e| db_err("Failed to commit transaction", e))?;

        Ok((invoice, items))
    }

    async fn insert_invoice_items(
        tx: &mut Transaction<'_, Postgres>,
        invoice_id: Uuid,
        resolved: &[ResolvedLineItem],
    ) -> Result<Vec<InvoiceLineItem>, AppError> {
        let mut items = Vec::with_capacity(resolved.len());
        for (i, line) in resolved.iter().enumerate() {
            let item = sqlx::query_as::<_, InvoiceLineItem>(&format!(
                r#"
                INSERT INTO invoice_line_items (
                    line_item_id, invoice_id, product_id, product_name, description,
                    quantity, unit_price, amount, sort_order
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                RETURNING {}
                "#,
                INVOICE_ITEM_COLUMNS
            ))
            .bind(Uuid::new_v4())
            .bind(invoice_id)
            .bind(line.product_id)
            .bind(&line.product_name)
            .bind(&line.description)
            .bind(line.quantity)
            .bind(line.unit_price)
            .bind(line.amount)
            .bind(i as i32)
            .fetch_one(&mut **tx)
            .await
            .map_err(|e| db_err("Failed to insert line item", e))?;
            items.push(item);
        }
        Ok(items)
    }

    /// Get an invoice with its line items.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn get_invoice(
        &self,
        invoice_id: Uuid,
    ) -> Result<Option<(Invoice, Vec<InvoiceLineItem>)>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_invoice"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {} FROM invoices WHERE invoice_id = $1",
            INVOICE_COLUMNS
        ))
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_err("Failed to get invoice", e))?;

        let result = match invoice {
            Some(inv) => {
                let items = sqlx::query_as::<_, InvoiceLineItem>(&format!(
                    "SELECT {} FROM invoice_line_items WHERE invoice_id = $1 ORDER BY sort_order",
                    INVOICE_ITEM_COLUMNS
                ))
                .bind(invoice_id)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| db_err("Failed to get line items", e))?;
                Some((inv, items))
            }
            None => None,
        };

        timer.observe_duration();

        Ok(result)
    }

    /// List invoices.
    #[instrument(skip(self, filter))]
    pub async fn list_invoices(
        &self,
        filter: &ListInvoicesFilter,
    ) -> Result<Vec<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_invoices"])
            .start_timer();

        let limit = filter.page_size.clamp(1, 100) as i64;
        let status_str = filter.status.map(|s| s.as_str().to_string());

        let invoices = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            SELECT {}
            FROM invoices
            WHERE ($1::varchar IS NULL OR status = $1)
              AND ($2::uuid IS NULL OR client_id = $2)
              AND ($3::date IS NULL OR issue_date >= $3)
              AND ($4::date IS NULL OR issue_date <= $4)
              AND ($5::uuid IS NULL OR invoice_id > $5)
            ORDER BY invoice_id
            LIMIT $6
            "#,
            INVOICE_COLUMNS
        ))
        .bind(&status_str)
        .bind(filter.client_id)
        .bind(filter.start_date)
        .bind(filter.end_date)
        .bind(filter.page_token)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("Failed to list invoices", e))?;

        timer.observe_duration();

        Ok(invoices)
    }

    /// Update an invoice. Content edits only in draft; status changes follow
    /// the transition table; totals and balance are re-derived atomically.
    #[instrument(skip(self, input), fields(invoice_id = %invoice_id))]
    pub async fn update_invoice(
        &self,
        invoice_id: Uuid,
        input: &UpdateInvoice,
    ) -> Result<(Invoice, Vec<InvoiceLineItem>), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_invoice"])
            .start_timer();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_err("Failed to begin transaction", e))?;

        let existing = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {} FROM invoices WHERE invoice_id = $1 FOR UPDATE",
            INVOICE_COLUMNS
        ))
        .bind(invoice_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| db_err("Failed to get invoice", e))?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice {} not found", invoice_id)))?;

        if input.revision != existing.revision {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Invoice was modified concurrently (expected revision {}, found {})",
                input.revision,
                existing.revision
            )));
        }

        let current_status = InvoiceStatus::from_string(&existing.status);
        let next_status = input.status.unwrap_or(current_status);
        ensure_invoice_transition(current_status, next_status)?;

        let content_change = input.issue_date.is_some()
            || input.due_date.is_some()
            || input.tax_rate_percent.is_some()
            || input.line_items.is_some();
        if content_change && current_status != InvoiceStatus::Draft {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Only draft invoices can be edited"
            )));
        }

        let issue_date = input.issue_date.unwrap_or(existing.issue_date);
        let due_date = input.due_date.unwrap_or(existing.due_date);
        if due_date < issue_date {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Due date {} is before issue date {}",
                due_date,
                issue_date
            )));
        }
        let tax_rate_percent = input.tax_rate_percent.unwrap_or(existing.tax_rate_percent);

        let (client_name, client_email) = if current_status == InvoiceStatus::Draft {
            let snapshot = Self::fetch_client_for_snapshot(&mut tx, existing.client_id).await?;
            (snapshot.name, snapshot.email)
        } else {
            (existing.client_name.clone(), existing.client_email.clone())
        };
        let resolved = match &input.line_items {
            Some(items) => Self::resolve_line_inputs(&mut tx, items).await?,
            None => sqlx::query_as::<_, InvoiceLineItem>(&format!(
                "SELECT {} FROM invoice_line_items WHERE invoice_id = $1 ORDER BY sort_order",
                INVOICE_ITEM_COLUMNS
            ))
            .bind(invoice_id)
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| db_err("Failed to get line items", e))?
            .iter()
            .map(ResolvedLineItem::from)
            .collect(),
        };
        let breakdown = totals::compute_invoice_totals(&resolved, tax_rate_percent)?;

        // Changing totals without re-deriving the balance would violate the
        // ledger invariant, so both always move together.
        let balance_due = reconciler::balance_due(breakdown.total_amount, existing.amount_paid);
        if balance_due < Decimal::ZERO {
            return Err(AppError::Overpayment(anyhow::anyhow!(
                "New total {} is below the amount already paid {}",
                breakdown.total_amount,
                existing.amount_paid
            )));
        }

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            UPDATE invoices
            SET client_name = $3,
                client_email = $4,
                issue_date = $5,
                due_date = $6,
                tax_rate_percent = $7,
                subtotal = $8,
                tax_amount = $9,
                total_amount = $10,
                balance_due = $11,
                status = $12,
                notes = COALESCE($13, notes),
                revision = revision + 1,
                updated_utc = NOW()
            WHERE invoice_id = $1 AND revision = $2
            RETURNING {}
            "#,
            INVOICE_COLUMNS
        ))
        .bind(invoice_id)
        .bind(input.revision)
        .bind(&client_name)
        .bind(&client_email)
        .bind(issue_date)
        .bind(due_date)
        .bind(tax_rate_percent)
        .bind(breakdown.subtotal)
        .bind(breakdown.tax_amount)
        .bind(breakdown.total_amount)
        .bind(balance_due)
        .bind(next_status.as_str())
        .bind(&input.notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| db_err("Failed to update invoice", e))?;

        let items = if input.line_items.is_some() {
            sqlx::query("DELETE FROM invoice_line_items WHERE invoice_id = $1")
                .bind(invoice_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| db_err("Failed to replace line items", e))?;
            Self::insert_invoice_items(&mut tx, invoice_id, &resolved).await?
        } else {
            sqlx::query_as::<_, InvoiceLineItem>(&format!(
                "SELECT {} FROM invoice_line_items WHERE invoice_id = $1 ORDER BY sort_order",
                INVOICE_ITEM_COLUMNS
            ))
            .bind(invoice_id)
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| db_err("Failed to get line items", e))?
        };

        tx.commit()
            .await
            .map_err(|e| db_err("Failed to commit transaction", e))?;

        timer.observe_duration();

        if next_status != current_status {
            DOCUMENTS_TOTAL
                .with_label_values(&["invoice", next_status.as_str()])
                .inc();
        }
        info!(invoice_id = %invoice.invoice_id, status = %invoice.status, "Invoice updated");

        Ok((invoice, items))
    }

    /// Delete a draft invoice.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn delete_invoice(&self, invoice_id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_invoice"])
            .start_timer();

        let existing = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {} FROM invoices WHERE invoice_id = $1",
            INVOICE_COLUMNS
        ))
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_err("Failed to get invoice", e))?;

        match existing {
            Some(inv) if inv.status == "draft" => {}
            Some(_) => {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Only draft invoices can be deleted"
                )))
            }
            None => return Ok(false),
        };

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_err("Failed to begin transaction", e))?;

        sqlx::query("DELETE FROM invoice_line_items WHERE invoice_id = $1")
            .bind(invoice_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_err("Failed to delete line items", e))?;

        let result = sqlx::query("DELETE FROM invoices WHERE invoice_id = $1 AND status = 'draft'")
            .bind(invoice_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_err("Failed to delete invoice", e))?;

        tx.commit()
            .await
            .map_err(|e| db_err("Failed to commit transaction", e))?;

        timer.observe_duration();

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(invoice_id = %invoice_id, "Draft invoice deleted");
        }
        Ok(deleted)
    }

    /// Record a payment against an invoice.
    ///
    /// Applies the delta through the reconciler (overpayment fails), sets
    /// `paid` when the balance reaches zero, and bumps the client's
    /// `total_spent` — all in one transaction.
    #[instrument(skip(self), fields(invoice_id = %invoice_id, amount = %amount))]
    pub async fn record_invoice_payment(
        &self,
        invoice_id: Uuid,
        amount: Decimal,
    ) -> Result<Invoice, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["record_invoice_payment"])
            .start_timer();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_err("Failed to begin transaction", e))?;

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {} FROM invoices WHERE invoice_id = $1 FOR UPDATE",
            INVOICE_COLUMNS
        ))
        .bind(invoice_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| db_err("Failed to get invoice", e))?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice {} not found", invoice_id)))?;

        let status = InvoiceStatus::from_string(&invoice.status);
        if !matches!(
            status,
            InvoiceStatus::Sent | InvoiceStatus::PendingPayment | InvoiceStatus::Overdue
        ) {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Cannot record a payment against a '{}' invoice",
                invoice.status
            )));
        }

        let (new_paid, new_balance) =
            reconciler::apply_payment(invoice.total_amount, invoice.amount_paid, amount)?;
        let new_status = reconciler::status_after_payment(status, new_balance);

        let updated = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            UPDATE invoices
            SET amount_paid = $2,
                balance_due = $3,
                status = $4,
                revision = revision + 1,
                updated_utc = NOW()
            WHERE invoice_id = $1
            RETURNING {}
            "#,
            INVOICE_COLUMNS
        ))
        .bind(invoice_id)
        .bind(new_paid)
        .bind(new_balance)
        .bind(new_status.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| db_err("Failed to apply payment", e))?;

        sqlx::query(
            "UPDATE clients SET total_spent = total_spent + $2, updated_utc = NOW() WHERE client_id = $1",
        )
        .bind(invoice.client_id)
        .bind(amount)
        .execute(&mut *tx)
        .await
        .map_err(|e| db_err("Failed to update client total spent", e))?;

        tx.commit()
            .await
            .map_err(|e| db_err("Failed to commit transaction", e))?;

        timer.observe_duration();

        let outcome = if new_status == InvoiceStatus::Paid {
            "settled"
        } else {
            "partial"
        };
        PAYMENTS_RECORDED_TOTAL.with_label_values(&[outcome]).inc();
        info!(
            invoice_id = %invoice_id,
            amount = %amount,
            balance_due = %new_balance,
            outcome = outcome,
            "Payment recorded"
        );

        Ok(updated)
    }

    // -------------------------------------------------------------------------
    // Outgoing Payment Operations
    // -------------------------------------------------------------------------

    /// Record an outgoing payment.
    #[instrument(skip(self, input), fields(category = %input.payment_category.as_str()))]
    pub async fn create_outgoing_payment(
        &self,
        input: &CreateOutgoingPayment,
    ) -> Result<OutgoingPayment, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_outgoing_payment"])
            .start_timer();

        resolver::validate_payment_amount(input.amount)?;
        resolver::resolve_payee(input.payment_category, &input.payee)?;

        let mut last_err = AppError::InternalError(anyhow::anyhow!("unreachable"));
        for _ in 0..NUMBERING_RETRIES {
            match self.try_create_outgoing_payment(input).await {
                Ok(payment) => {
                    timer.observe_duration();
                    DOCUMENTS_TOTAL
                        .with_label_values(&["outgoing_payment", "scheduled"])
                        .inc();
                    info!(
                        payment_id = %payment.payment_id,
                        payment_number = %payment.payment_number,
                        "Outgoing payment recorded"
                    );
                    return Ok(payment);
                }
                Err(AppError::Conflict(e)) => last_err = AppError::Conflict(e),
                Err(e) => return Err(e),
            }
        }
        Err(last_err)
    }

    async fn try_create_outgoing_payment(
        &self,
        input: &CreateOutgoingPayment,
    ) -> Result<OutgoingPayment, AppError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_err("Failed to begin transaction", e))?;

        // A subscription payee must reference a real product.
        if let Some(product_id) = input.payee.product_id {
            let exists: Option<Uuid> =
                sqlx::query_scalar("SELECT product_id FROM products WHERE product_id = $1")
                    .bind(product_id)
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(|e| db_err("Failed to get product", e))?;
            if exists.is_none() {
                return Err(AppError::NotFound(anyhow::anyhow!(
                    "Product {} not found",
                    product_id
                )));
            }
        }

        let payment_number =
            Self::next_document_number(&mut tx, DocumentKind::Payment, input.payment_date).await?;

        let payment = sqlx::query_as::<_, OutgoingPayment>(&format!(
            r#"
            INSERT INTO outgoing_payments (
                payment_id, payment_number, payment_category, staff_id, product_id,
                payee_name, expense_category, amount, payment_date, payment_method,
                status, notes, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 'scheduled', $11, $12)
            RETURNING {}
            "#,
            PAYMENT_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&payment_number)
        .bind(input.payment_category.as_str())
        .bind(input.payee.staff_id)
        .bind(input.payee.product_id)
        .bind(&input.payee.payee_name)
        .bind(&input.payee.expense_category)
        .bind(input.amount)
        .bind(input.payment_date)
        .bind(&input.payment_method)
        .bind(&input.notes)
        .bind(input.created_by)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            unique_or_db_err(
                "Failed to create outgoing payment",
                "Payment number collision",
                e,
            )
        })?;

        tx.commit()
            .await
            .map_err(|e| db_err("Failed to commit transaction", e))?;

        Ok(payment)
    }

    /// Get an outgoing payment by ID.
    #[instrument(skip(self), fields(payment_id = %payment_id))]
    pub async fn get_outgoing_payment(
        &self,
        payment_id: Uuid,
    ) -> Result<Option<OutgoingPayment>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_outgoing_payment"])
            .start_timer();

        let payment = sqlx::query_as::<_, OutgoingPayment>(&format!(
            "SELECT {} FROM outgoing_payments WHERE payment_id = $1",
            PAYMENT_COLUMNS
        ))
        .bind(payment_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_err("Failed to get outgoing payment", e))?;

        timer.observe_duration();

        Ok(payment)
    }

    /// List outgoing payments.
    #[instrument(skip(self, filter))]
    pub async fn list_outgoing_payments(
        &self,
        filter: &ListOutgoingPaymentsFilter,
    ) -> Result<Vec<OutgoingPayment>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_outgoing_payments"])
            .start_timer();

        let limit = filter.page_size.clamp(1, 100) as i64;
        let status_str = filter.status.map(|s| s.as_str().to_string());
        let category_str = filter.category.map(|c| c.as_str().to_string());

        let payments = sqlx::query_as::<_, OutgoingPayment>(&format!(
            r#"
            SELECT {}
            FROM outgoing_payments
            WHERE ($1::varchar IS NULL OR status = $1)
              AND ($2::varchar IS NULL OR payment_category = $2)
              AND ($3::date IS NULL OR payment_date >= $3)
              AND ($4::date IS NULL OR payment_date <= $4)
              AND ($5::uuid IS NULL OR payment_id > $5)
            ORDER BY payment_id
            LIMIT $6
            "#,
            PAYMENT_COLUMNS
        ))
        .bind(&status_str)
        .bind(&category_str)
        .bind(filter.start_date)
        .bind(filter.end_date)
        .bind(filter.page_token)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("Failed to list outgoing payments", e))?;

        timer.observe_duration();

        Ok(payments)
    }

    /// Transition an outgoing payment's status.
    ///
    /// The UPDATE is guarded by the status we validated against, so a
    /// concurrent transition makes this a no-op surfaced as Conflict rather
    /// than a double-applied transition.
    #[instrument(skip(self), fields(payment_id = %payment_id, next = %next.as_str()))]
    pub async fn update_outgoing_payment_status(
        &self,
        payment_id: Uuid,
        next: OutgoingPaymentStatus,
    ) -> Result<OutgoingPayment, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_outgoing_payment_status"])
            .start_timer();

        let existing = self
            .get_outgoing_payment(payment_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(anyhow::anyhow!("Outgoing payment {} not found", payment_id))
            })?;

        let current = OutgoingPaymentStatus::from_string(&existing.status);
        ensure_payment_transition(current, next)?;

        let payment = sqlx::query_as::<_, OutgoingPayment>(&format!(
            r#"
            UPDATE outgoing_payments
            SET status = $3, updated_utc = NOW()
            WHERE payment_id = $1 AND status = $2
            RETURNING {}
            "#,
            PAYMENT_COLUMNS
        ))
        .bind(payment_id)
        .bind(current.as_str())
        .bind(next.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_err("Failed to update outgoing payment", e))?
        .ok_or_else(|| {
            AppError::Conflict(anyhow::anyhow!(
                "Outgoing payment was transitioned concurrently"
            ))
        })?;

        timer.observe_duration();

        DOCUMENTS_TOTAL
            .with_label_values(&["outgoing_payment", next.as_str()])
            .inc();
        info!(payment_id = %payment_id, status = %payment.status, "Outgoing payment updated");

        Ok(payment)
    }
}

#[cfg(test)]
mod tests {
    use super::is_client_code_constraint;

    #[test]
    fn only_the_code_constraint_is_a_retryable_collision() {
        assert!(is_client_code_constraint(Some("clients_client_code_key")));
        assert!(!is_client_code_constraint(Some("clients_email_key")));
        assert!(!is_client_code_constraint(None));
    }
}
