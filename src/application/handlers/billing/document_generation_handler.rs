//! DocumentGenerationHandler - renders invoice documents off the webhook path.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::InvoicePipeline;
use crate::domain::billing::InvoiceIssued;
use crate::domain::foundation::{DomainError, ErrorCode, EventEnvelope};
use crate::ports::EventHandler;

/// Consumes `InvoiceIssued` and generates the invoice document.
///
/// Errors are returned so the event channel retries the job; the document
/// sweeper covers jobs that are eventually dropped.
pub struct DocumentGenerationHandler {
    pipeline: Arc<InvoicePipeline>,
}

impl DocumentGenerationHandler {
    pub fn new(pipeline: Arc<InvoicePipeline>) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl EventHandler for DocumentGenerationHandler {
    async fn handle(&self, event: EventEnvelope) -> Result<(), DomainError> {
        let issued: InvoiceIssued = event.payload_as().map_err(|e| {
            DomainError::new(
                ErrorCode::InvalidFormat,
                format!("Invalid {} payload: {}", event.event_type, e),
            )
        })?;

        let outcome = self.pipeline.generate_document(&issued.invoice_id).await?;
        debug!(invoice_id = %issued.invoice_id, path = outcome.path(), "Document job finished");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "InvoiceDocumentGenerator"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::test_support::Ledger;
    use crate::domain::billing::{sample_new_transaction, PaymentStatus};
    use crate::domain::foundation::{Timestamp, TransactionId};
    use crate::ports::InvoiceRepository;

    #[tokio::test]
    async fn issued_invoice_gets_a_document() {
        let ledger = Ledger::new();
        let pipeline = ledger.pipeline();
        let tx = sample_new_transaction("pi_1", PaymentStatus::Succeeded)
            .into_transaction(TransactionId::new(), Timestamp::now());
        let (invoice, _) = pipeline.create_from_transaction(&tx).await.unwrap();
        let event = EventEnvelope::from_event(&InvoiceIssued::from_invoice(&invoice)).unwrap();

        DocumentGenerationHandler::new(pipeline).handle(event).await.unwrap();

        let stored = ledger.invoices.find_by_id(&invoice.id).await.unwrap().unwrap();
        assert!(stored.has_document());
    }

    #[tokio::test]
    async fn foreign_payload_is_rejected() {
        let ledger = Ledger::new();
        let event = EventEnvelope::new("invoice.issued.v1", "x", "Invoice", serde_json::json!({}));

        let err = DocumentGenerationHandler::new(ledger.pipeline())
            .handle(event)
            .await
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::InvalidFormat);
    }
}
