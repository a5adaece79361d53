//! Domain models for billing-engine.

mod client;
mod invoice;
mod line_item;
mod outgoing_payment;
mod product;
mod quotation;

pub use client::{Client, ClientStatus, CreateClient, ListClientsFilter, UpdateClient};
pub use invoice::{
    CreateInvoice, Invoice, InvoiceStatus, ListInvoicesFilter, UpdateInvoice,
};
pub use line_item::{InvoiceLineItem, LineItemInput, QuotationLineItem, ResolvedLineItem};
pub use outgoing_payment::{
    CreateOutgoingPayment, ListOutgoingPaymentsFilter, OutgoingPayment, OutgoingPaymentStatus,
    PayeeInput, PaymentCategory,
};
pub use product::{CreateProduct, ListProductsFilter, Product, UpdateProduct};
pub use quotation::{
    CreateQuotation, DiscountType, ListQuotationsFilter, Quotation, QuotationStatus,
    UpdateQuotation,
};
