//! Request/response types for the HTTP surface.
//!
//! Requests carry only caller-settable fields; every derived value (numbers,
//! snapshots, totals, balances) comes back in the response computed
//! server-side.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::engine::reconciler;
use crate::models::{
    Client, ClientStatus, CreateClient, CreateInvoice, CreateOutgoingPayment, CreateQuotation,
    DiscountType, Invoice, InvoiceLineItem, InvoiceStatus, LineItemInput, OutgoingPayment,
    OutgoingPaymentStatus, PayeeInput, PaymentCategory, Product, Quotation, QuotationLineItem,
    QuotationStatus, UpdateClient, UpdateInvoice, UpdateQuotation,
};

fn default_page_size() -> i32 {
    50
}

// -----------------------------------------------------------------------------
// Line items
// -----------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct LineItemRequest {
    pub product_id: Option<Uuid>,
    pub product_name: Option<String>,
    pub description: Option<String>,
    pub quantity: Decimal,
    pub unit_price: Option<Decimal>,
}

impl From<LineItemRequest> for LineItemInput {
    fn from(req: LineItemRequest) -> Self {
        LineItemInput {
            product_id: req.product_id,
            product_name: req.product_name,
            description: req.description,
            quantity: req.quantity,
            unit_price: req.unit_price,
        }
    }
}

fn into_line_inputs(items: Vec<LineItemRequest>) -> Vec<LineItemInput> {
    items.into_iter().map(LineItemInput::from).collect()
}

// -----------------------------------------------------------------------------
// Clients
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct CreateClientRequest {
    #[validate(length(min = 1, max = 200))]
    pub business_name: String,
    pub contact_person: Option<String>,
    #[validate(email)]
    pub email: String,
    pub phone: Option<String>,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub payment_schedule: Option<String>,
    pub payment_terms: Option<String>,
}

impl CreateClientRequest {
    pub fn into_input(self, created_by: i64) -> CreateClient {
        CreateClient {
            business_name: self.business_name,
            contact_person: self.contact_person,
            email: self.email,
            phone: self.phone,
            address_line1: self.address_line1,
            address_line2: self.address_line2,
            city: self.city,
            state: self.state,
            postal_code: self.postal_code,
            country: self.country,
            payment_schedule: self.payment_schedule,
            payment_terms: self.payment_terms,
            created_by,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateClientRequest {
    #[validate(length(min = 1, max = 200))]
    pub business_name: Option<String>,
    pub contact_person: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub payment_schedule: Option<String>,
    pub payment_terms: Option<String>,
    pub status: Option<ClientStatus>,
    pub revision: i64,
}

impl From<UpdateClientRequest> for UpdateClient {
    fn from(req: UpdateClientRequest) -> Self {
        UpdateClient {
            business_name: req.business_name,
            contact_person: req.contact_person,
            email: req.email,
            phone: req.phone,
            address_line1: req.address_line1,
            address_line2: req.address_line2,
            city: req.city,
            state: req.state,
            postal_code: req.postal_code,
            country: req.country,
            payment_schedule: req.payment_schedule,
            payment_terms: req.payment_terms,
            status: req.status,
            revision: req.revision,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListClientsQuery {
    pub status: Option<ClientStatus>,
    #[serde(default = "default_page_size")]
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}

#[derive(Serialize)]
pub struct ClientListResponse {
    pub clients: Vec<Client>,
    pub next_page_token: Option<Uuid>,
}

// -----------------------------------------------------------------------------
// Products
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub sale_price: Option<Decimal>,
    #[serde(default)]
    pub tax_rate: Decimal,
    pub stock_quantity: Option<i32>,
    #[serde(default)]
    pub is_service: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub sale_price: Option<Decimal>,
    pub tax_rate: Option<Decimal>,
    pub stock_quantity: Option<i32>,
    pub is_service: Option<bool>,
    pub active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ListProductsQuery {
    #[serde(default)]
    pub active_only: bool,
    #[serde(default = "default_page_size")]
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}

#[derive(Serialize)]
pub struct ProductListResponse {
    pub products: Vec<Product>,
    pub next_page_token: Option<Uuid>,
}

// -----------------------------------------------------------------------------
// Quotations
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuotationRequest {
    pub client_id: Uuid,
    pub quotation_date: NaiveDate,
    pub valid_until_date: NaiveDate,
    pub discount_type: Option<DiscountType>,
    pub discount_value: Option<Decimal>,
    #[serde(default)]
    pub tax_rate_percent: Decimal,
    #[validate(length(min = 1))]
    pub line_items: Vec<LineItemRequest>,
    pub notes: Option<String>,
}

impl CreateQuotationRequest {
    pub fn into_input(self, created_by: i64) -> CreateQuotation {
        CreateQuotation {
            client_id: self.client_id,
            quotation_date: self.quotation_date,
            valid_until_date: self.valid_until_date,
            discount_type: self.discount_type,
            discount_value: self.discount_value,
            tax_rate_percent: self.tax_rate_percent,
            line_items: into_line_inputs(self.line_items),
            notes: self.notes,
            created_by,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuotationRequest {
    pub quotation_date: Option<NaiveDate>,
    pub valid_until_date: Option<NaiveDate>,
    pub discount_type: Option<DiscountType>,
    pub discount_value: Option<Decimal>,
    #[serde(default)]
    pub clear_discount: bool,
    pub tax_rate_percent: Option<Decimal>,
    pub line_items: Option<Vec<LineItemRequest>>,
    pub status: Option<QuotationStatus>,
    pub notes: Option<String>,
    pub revision: i64,
}

impl From<UpdateQuotationRequest> for UpdateQuotation {
    fn from(req: UpdateQuotationRequest) -> Self {
        UpdateQuotation {
            quotation_date: req.quotation_date,
            valid_until_date: req.valid_until_date,
            discount_type: req.discount_type,
            discount_value: req.discount_value,
            clear_discount: req.clear_discount,
            tax_rate_percent: req.tax_rate_percent,
            line_items: req.line_items.map(into_line_inputs),
            status: req.status,
            notes: req.notes,
            revision: req.revision,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ConvertQuotationRequest {
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct ListQuotationsQuery {
    pub status: Option<QuotationStatus>,
    pub client_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    #[serde(default = "default_page_size")]
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}

#[derive(Serialize)]
pub struct QuotationResponse {
    #[serde(flatten)]
    pub quotation: Quotation,
    pub line_items: Vec<QuotationLineItem>,
}

impl QuotationResponse {
    pub fn new(quotation: Quotation, line_items: Vec<QuotationLineItem>) -> Self {
        Self {
            quotation,
            line_items,
        }
    }
}

#[derive(Serialize)]
pub struct QuotationListResponse {
    pub quotations: Vec<Quotation>,
    pub next_page_token: Option<Uuid>,
}

// -----------------------------------------------------------------------------
// Invoices
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct CreateInvoiceRequest {
    pub client_id: Uuid,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub tax_rate_percent: Decimal,
    #[validate(length(min = 1))]
    pub line_items: Vec<LineItemRequest>,
    pub notes: Option<String>,
}

impl CreateInvoiceRequest {
    pub fn into_input(self, created_by: i64) -> CreateInvoice {
        CreateInvoice {
            client_id: self.client_id,
            issue_date: self.issue_date,
            due_date: self.due_date,
            tax_rate_percent: self.tax_rate_percent,
            line_items: into_line_inputs(self.line_items),
            notes: self.notes,
            created_by,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateInvoiceRequest {
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub tax_rate_percent: Option<Decimal>,
    pub line_items: Option<Vec<LineItemRequest>>,
    pub status: Option<InvoiceStatus>,
    pub notes: Option<String>,
    pub revision: i64,
}

impl From<UpdateInvoiceRequest> for UpdateInvoice {
    fn from(req: UpdateInvoiceRequest) -> Self {
        UpdateInvoice {
            issue_date: req.issue_date,
            due_date: req.due_date,
            tax_rate_percent: req.tax_rate_percent,
            line_items: req.line_items.map(into_line_inputs),
            status: req.status,
            notes: req.notes,
            revision: req.revision,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RecordPaymentRequest {
    pub amount: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct ListInvoicesQuery {
    pub status: Option<InvoiceStatus>,
    pub client_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    #[serde(default = "default_page_size")]
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}

/// Invoice as presented to readers: `effective_status` overlays the stored
/// status with the derived overdue check.
#[derive(Serialize)]
pub struct InvoiceResponse {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub effective_status: InvoiceStatus,
    pub line_items: Vec<InvoiceLineItem>,
}

impl InvoiceResponse {
    pub fn new(invoice: Invoice, line_items: Vec<InvoiceLineItem>) -> Self {
        let effective_status = reconciler::effective_status(
            InvoiceStatus::from_string(&invoice.status),
            invoice.due_date,
            invoice.balance_due,
            chrono::Utc::now().date_naive(),
        );
        Self {
            invoice,
            effective_status,
            line_items,
        }
    }
}

#[derive(Serialize)]
pub struct InvoiceSummary {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub effective_status: InvoiceStatus,
}

impl InvoiceSummary {
    pub fn new(invoice: Invoice) -> Self {
        let effective_status = reconciler::effective_status(
            InvoiceStatus::from_string(&invoice.status),
            invoice.due_date,
            invoice.balance_due,
            chrono::Utc::now().date_naive(),
        );
        Self {
            invoice,
            effective_status,
        }
    }
}

#[derive(Serialize)]
pub struct InvoiceListResponse {
    pub invoices: Vec<InvoiceSummary>,
    pub next_page_token: Option<Uuid>,
}

impl InvoiceListResponse {
    pub fn new(invoices: Vec<Invoice>, next_page_token: Option<Uuid>) -> Self {
        let today = chrono::Utc::now().date_naive();
        let invoices = invoices
            .into_iter()
            .map(|invoice| {
                let effective_status = reconciler::effective_status(
                    InvoiceStatus::from_string(&invoice.status),
                    invoice.due_date,
                    invoice.balance_due,
                    today,
                );
                InvoiceSummary {
                    invoice,
                    effective_status,
                }
            })
            .collect();
        Self {
            invoices,
            next_page_token,
        }
    }
}

// -----------------------------------------------------------------------------
// Outgoing payments
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOutgoingPaymentRequest {
    pub payment_category: PaymentCategory,
    #[serde(default)]
    pub staff_id: Option<i64>,
    #[serde(default)]
    pub product_id: Option<Uuid>,
    #[serde(default)]
    pub payee_name: Option<String>,
    #[serde(default)]
    pub expense_category: Option<String>,
    pub amount: Decimal,
    pub payment_date: NaiveDate,
    #[validate(length(min = 1, max = 50))]
    pub payment_method: String,
    pub notes: Option<String>,
}

impl CreateOutgoingPaymentRequest {
    pub fn into_input(self, created_by: i64) -> CreateOutgoingPayment {
        CreateOutgoingPayment {
            payment_category: self.payment_category,
            payee: PayeeInput {
                staff_id: self.staff_id,
                product_id: self.product_id,
                payee_name: self.payee_name,
                expense_category: self.expense_category,
            },
            amount: self.amount,
            payment_date: self.payment_date,
            payment_method: self.payment_method,
            notes: self.notes,
            created_by,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdatePaymentStatusRequest {
    pub status: OutgoingPaymentStatus,
}

#[derive(Debug, Deserialize)]
pub struct ListOutgoingPaymentsQuery {
    pub status: Option<OutgoingPaymentStatus>,
    pub category: Option<PaymentCategory>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    #[serde(default = "default_page_size")]
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}

#[derive(Serialize)]
pub struct OutgoingPaymentListResponse {
    pub payments: Vec<OutgoingPayment>,
    pub next_page_token: Option<Uuid>,
}

// -----------------------------------------------------------------------------
// Totals preview
// -----------------------------------------------------------------------------

/// Pricing preview: runs the totals calculator without persisting anything.
#[derive(Debug, Deserialize, Validate)]
pub struct ComputeTotalsRequest {
    #[validate(length(min = 1))]
    pub line_items: Vec<LineItemRequest>,
    pub discount_type: Option<DiscountType>,
    pub discount_value: Option<Decimal>,
    #[serde(default)]
    pub tax_rate_percent: Decimal,
}

#[derive(Serialize)]
pub struct TotalsResponse {
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
}
