//! Invoice Renderer Port - turns invoice data into document bytes.
//!
//! Backends (HTML, PDF services) are pluggable. The document pipeline
//! falls back to the built-in Markdown renderer whenever a backend is
//! missing or reports `RenderError::Unavailable`.

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::domain::billing::{BillingDetails, Invoice};

/// Output formats a renderer can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    Markdown,
    Html,
    Pdf,
}

impl DocumentFormat {
    /// MIME content type for this format.
    pub fn content_type(&self) -> &'static str {
        match self {
            DocumentFormat::Markdown => "text/markdown; charset=utf-8",
            DocumentFormat::Html => "text/html; charset=utf-8",
            DocumentFormat::Pdf => "application/pdf",
        }
    }

    /// File extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            DocumentFormat::Markdown => "md",
            DocumentFormat::Html => "html",
            DocumentFormat::Pdf => "pdf",
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// One printable invoice line with amounts already formatted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentLine {
    pub description: String,
    pub quantity: i64,
    pub unit_price: String,
    pub amount: String,
}

/// Structured, display-ready invoice data handed to renderers.
///
/// Amounts are formatted from minor units with the currency's exponent so
/// no renderer ever handles floating point money.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvoiceDocumentData {
    pub number: String,
    pub status: String,
    pub currency: String,
    pub issued_on: String,
    pub due_on: Option<String>,
    pub paid_on: Option<String>,
    pub billing: BillingDetails,
    pub lines: Vec<DocumentLine>,
    pub subtotal: String,
    pub tax: String,
    pub discount: String,
    pub total: String,
    pub amount_paid: String,
    pub amount_due: String,
}

impl InvoiceDocumentData {
    pub fn from_invoice(invoice: &Invoice) -> Self {
        let money = |amount: i64| invoice.currency.format_minor_units(amount);
        let date = |ts: &crate::domain::foundation::Timestamp| {
            ts.as_datetime().format("%Y-%m-%d").to_string()
        };
        let totals = &invoice.totals;

        Self {
            number: invoice.number.clone(),
            status: invoice.status.to_string(),
            currency: invoice.currency.as_str().to_ascii_uppercase(),
            issued_on: date(&invoice.issued_at),
            due_on: invoice.due_at.as_ref().map(date),
            paid_on: invoice.paid_at.as_ref().map(date),
            billing: invoice.billing.clone(),
            lines: invoice
                .line_items
                .iter()
                .map(|line| DocumentLine {
                    description: line.description.clone(),
                    quantity: line.quantity,
                    unit_price: money(line.unit_price),
                    amount: money(line.amount),
                })
                .collect(),
            subtotal: money(totals.subtotal),
            tax: money(totals.tax),
            discount: money(totals.discount),
            total: money(totals.total),
            amount_paid: money(totals.amount_paid),
            amount_due: money(totals.amount_due),
        }
    }
}

/// Bytes produced by a renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedDocument {
    pub format: DocumentFormat,
    pub bytes: Vec<u8>,
}

/// Errors from invoice rendering.
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    /// Backend not reachable or not configured; triggers the fallback.
    #[error("Renderer unavailable: {0}")]
    Unavailable(String),

    #[error("Rendering failed: {0}")]
    Failed(String),
}

/// Port for invoice rendering backends.
#[async_trait]
pub trait InvoiceRenderer: Send + Sync {
    async fn render(&self, data: &InvoiceDocumentData) -> Result<RenderedDocument, RenderError>;

    /// Backend name for logs.
    fn name(&self) -> &'static str;
}
