//! InvoicePipeline - derives invoices from payments and produces their documents.
//!
//! Document generation is deferred: the reconciler only records the invoice
//! and publishes `InvoiceIssued`. The document is produced by
//! [`DocumentGenerationHandler`](super::DocumentGenerationHandler) on the event
//! channel, and [`DocumentSweeper`](super::DocumentSweeper) catches anything a
//! lost job left behind.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::billing::{Invoice, Transaction};
use crate::domain::foundation::{DomainError, ErrorCode, InvoiceId, Timestamp};
use crate::ports::{
    CustomerRepository, InvoiceDocumentData, InvoiceDocumentStorage, InvoiceRenderer,
    InvoiceRepository, RenderError, RenderedDocument,
};

/// Result of a document generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentOutcome {
    /// A document was rendered and its path recorded.
    Generated { path: String },
    /// The invoice already had a document (possibly written by a racing job).
    AlreadyPresent { path: String },
}

impl DocumentOutcome {
    pub fn path(&self) -> &str {
        match self {
            DocumentOutcome::Generated { path } | DocumentOutcome::AlreadyPresent { path } => path,
        }
    }
}

pub struct InvoicePipeline {
    invoices: Arc<dyn InvoiceRepository>,
    customers: Arc<dyn CustomerRepository>,
    storage: Arc<dyn InvoiceDocumentStorage>,
    renderer: Option<Arc<dyn InvoiceRenderer>>,
    fallback: Arc<dyn InvoiceRenderer>,
}

impl InvoicePipeline {
    /// `fallback` is used when no renderer is configured or the configured
    /// one reports itself unavailable.
    pub fn new(
        invoices: Arc<dyn InvoiceRepository>,
        customers: Arc<dyn CustomerRepository>,
        storage: Arc<dyn InvoiceDocumentStorage>,
        fallback: Arc<dyn InvoiceRenderer>,
    ) -> Self {
        Self {
            invoices,
            customers,
            storage,
            renderer: None,
            fallback,
        }
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn InvoiceRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Derives the paid invoice for a succeeded transaction.
    ///
    /// Returns the existing invoice and `false` when the transaction already
    /// has one. Billing details are copied from the linked customer.
    pub async fn create_from_transaction(
        &self,
        transaction: &Transaction,
    ) -> Result<(Invoice, bool), DomainError> {
        if let Some(existing) = self.invoices.find_by_transaction(&transaction.id).await? {
            return Ok((existing, false));
        }

        let customer = match transaction.customer_id {
            Some(id) => self.customers.find_by_id(&id).await?,
            None => None,
        };

        let invoice =
            Invoice::derive_from_transaction(transaction, customer.as_ref(), Timestamp::now());
        let (stored, created) = self.invoices.create_for_transaction(&invoice).await?;
        if created {
            info!(
                invoice_id = %stored.id,
                number = %stored.number,
                transaction_id = %transaction.id,
                "Derived invoice from transaction"
            );
        }
        Ok((stored, created))
    }

    /// Renders and stores the document for `invoice_id` unless it has one.
    pub async fn generate_document(
        &self,
        invoice_id: &InvoiceId,
    ) -> Result<DocumentOutcome, DomainError> {
        let invoice = self
            .invoices
            .find_by_id(invoice_id)
            .await?
            .ok_or_else(|| DomainError::new(ErrorCode::InvoiceNotFound, invoice_id.to_string()))?;

        if let Some(path) = invoice.document_path.clone() {
            debug!(invoice_id = %invoice.id, "Invoice already has a document");
            return Ok(DocumentOutcome::AlreadyPresent { path });
        }

        let data = InvoiceDocumentData::from_invoice(&invoice);
        let rendered = self.render(&data).await?;
        let stored = self
            .storage
            .store(&invoice.id, &invoice.number, &rendered)
            .await
            .map_err(|e| DomainError::new(ErrorCode::InternalError, e.to_string()))?;

        if self
            .invoices
            .set_document(&invoice.id, &stored.path, Timestamp::now())
            .await?
        {
            info!(
                invoice_id = %invoice.id,
                path = %stored.path,
                checksum = %stored.checksum,
                size_bytes = stored.size_bytes,
                "Invoice document generated"
            );
            return Ok(DocumentOutcome::Generated { path: stored.path });
        }

        // Lost the race; report the path that won.
        let winner = self
            .invoices
            .find_by_id(&invoice.id)
            .await?
            .and_then(|i| i.document_path)
            .unwrap_or(stored.path);
        Ok(DocumentOutcome::AlreadyPresent { path: winner })
    }

    /// Generates documents for up to `limit` invoices that lack one.
    ///
    /// Failures are logged per invoice and do not stop the sweep.
    pub async fn generate_missing_documents(&self, limit: u32) -> Result<usize, DomainError> {
        let pending = self.invoices.find_without_document(limit).await?;
        let mut generated = 0;

        for invoice in pending {
            match self.generate_document(&invoice.id).await {
                Ok(DocumentOutcome::Generated { .. }) => generated += 1,
                Ok(DocumentOutcome::AlreadyPresent { .. }) => {}
                Err(e) => warn!(invoice_id = %invoice.id, error = %e, "Document generation failed"),
            }
        }

        Ok(generated)
    }

    async fn render(&self, data: &InvoiceDocumentData) -> Result<RenderedDocument, DomainError> {
        if let Some(renderer) = &self.renderer {
            match renderer.render(data).await {
                Ok(rendered) => return Ok(rendered),
                Err(RenderError::Unavailable(reason)) => {
                    warn!(
                        renderer = renderer.name(),
                        reason = %reason,
                        "Renderer unavailable, falling back to {}",
                        self.fallback.name()
                    );
                }
                Err(e) => return Err(DomainError::new(ErrorCode::RenderFailed, e.to_string())),
            }
        }

        self.fallback
            .render(data)
            .await
            .map_err(|e| DomainError::new(ErrorCode::RenderFailed, e.to_string()))
    }
}
