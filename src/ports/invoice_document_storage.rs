//! Invoice Document Storage Port - durable home for rendered invoices.

use async_trait::async_trait;
use thiserror::Error;

use super::RenderedDocument;
use crate::domain::foundation::InvoiceId;

/// Where a document ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredDocument {
    /// Storage-relative path recorded on the invoice.
    pub path: String,
    /// Hex-encoded SHA-256 of the bytes.
    pub checksum: String,
    pub size_bytes: u64,
}

/// Errors from document storage.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Port for storing rendered invoice documents.
///
/// Writes must be atomic: a crash never leaves a partial file at `path`.
/// Storing the same invoice twice overwrites the same path.
#[async_trait]
pub trait InvoiceDocumentStorage: Send + Sync {
    async fn store(
        &self,
        invoice_id: &InvoiceId,
        number: &str,
        document: &RenderedDocument,
    ) -> Result<StoredDocument, StorageError>;

    async fn read(&self, path: &str) -> Result<Vec<u8>, StorageError>;
}
