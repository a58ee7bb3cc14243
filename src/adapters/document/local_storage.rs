//! Local filesystem storage for rendered invoice documents.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::domain::foundation::InvoiceId;
use crate::ports::{InvoiceDocumentStorage, RenderedDocument, StorageError, StoredDocument};

/// Stores documents under a base directory.
///
/// # Layout
///
/// ```text
/// {base_path}/
/// └── invoices/
///     ├── INV-20260105-1A2B3C4D_{invoice_id}.md
///     └── in_1Nx..._{invoice_id}.html
/// ```
///
/// Writes go to `{file}.tmp`, are synced, then renamed into place, so a
/// reader never sees a partial document. The recorded path is relative to
/// the base directory.
#[derive(Debug, Clone)]
pub struct LocalInvoiceDocumentStorage {
    base_path: PathBuf,
}

impl LocalInvoiceDocumentStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn relative_path(invoice_id: &InvoiceId, number: &str, extension: &str) -> String {
        format!("invoices/{}_{}.{}", sanitize(number), invoice_id, extension)
    }

    /// Resolves a stored relative path, refusing anything that escapes the base.
    fn resolve(&self, relative: &str) -> Result<PathBuf, StorageError> {
        let path = Path::new(relative);
        let safe = path
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(StorageError::NotFound(relative.to_string()));
        }
        Ok(self.base_path.join(path))
    }

    fn compute_checksum(bytes: &[u8]) -> String {
        hex::encode(Sha256::digest(bytes))
    }
}

/// Keeps provider-supplied numbers filesystem-safe.
fn sanitize(number: &str) -> String {
    number
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[async_trait]
impl InvoiceDocumentStorage for LocalInvoiceDocumentStorage {
    async fn store(
        &self,
        invoice_id: &InvoiceId,
        number: &str,
        document: &RenderedDocument,
    ) -> Result<StoredDocument, StorageError> {
        let relative = Self::relative_path(invoice_id, number, document.format.extension());
        let final_path = self.resolve(&relative)?;
        let temp_path = final_path.with_extension(format!("{}.tmp", document.format.extension()));

        if let Some(dir) = final_path.parent() {
            fs::create_dir_all(dir).await?;
        }

        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(&document.bytes).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, &final_path).await?;

        Ok(StoredDocument {
            path: relative,
            checksum: Self::compute_checksum(&document.bytes),
            size_bytes: document.bytes.len() as u64,
        })
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let full = self.resolve(path)?;
        fs::read(&full).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StorageError::NotFound(path.to_string()),
            _ => StorageError::Io(e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::DocumentFormat;
    use tempfile::TempDir;

    fn create_storage() -> (LocalInvoiceDocumentStorage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalInvoiceDocumentStorage::new(temp_dir.path());
        (storage, temp_dir)
    }

    fn markdown(content: &str) -> RenderedDocument {
        RenderedDocument {
            format: DocumentFormat::Markdown,
            bytes: content.as_bytes().to_vec(),
        }
    }

    #[tokio::test]
    async fn store_writes_file_under_invoices_dir() {
        let (storage, temp) = create_storage();
        let id = InvoiceId::new();

        let stored = storage
            .store(&id, "INV-20260105-1A2B3C4D", &markdown("# Invoice"))
            .await
            .unwrap();

        assert!(stored.path.starts_with("invoices/INV-20260105-1A2B3C4D_"));
        assert!(stored.path.ends_with(".md"));
        assert!(temp.path().join(&stored.path).is_file());
        assert_eq!(stored.size_bytes, 9);
    }

    #[tokio::test]
    async fn store_leaves_no_temp_file() {
        let (storage, temp) = create_storage();

        storage
            .store(&InvoiceId::new(), "INV-1", &markdown("x"))
            .await
            .unwrap();

        let mut entries = std::fs::read_dir(temp.path().join("invoices")).unwrap();
        assert!(entries.all(|e| !e.unwrap().file_name().to_string_lossy().ends_with(".tmp")));
    }

    #[tokio::test]
    async fn checksum_is_sha256_hex() {
        let (storage, _temp) = create_storage();

        let stored = storage
            .store(&InvoiceId::new(), "INV-1", &markdown("hello"))
            .await
            .unwrap();

        assert_eq!(
            stored.checksum,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[tokio::test]
    async fn storing_twice_overwrites_same_path() {
        let (storage, _temp) = create_storage();
        let id = InvoiceId::new();

        let first = storage.store(&id, "INV-1", &markdown("one")).await.unwrap();
        let second = storage.store(&id, "INV-1", &markdown("two")).await.unwrap();

        assert_eq!(first.path, second.path);
        assert_eq!(storage.read(&second.path).await.unwrap(), b"two");
    }

    #[tokio::test]
    async fn provider_numbers_are_sanitized() {
        let (storage, _temp) = create_storage();

        let stored = storage
            .store(&InvoiceId::new(), "../../etc/passwd", &markdown("x"))
            .await
            .unwrap();

        assert!(stored.path.starts_with("invoices/______etc_passwd_"));
    }

    #[tokio::test]
    async fn read_missing_returns_not_found() {
        let (storage, _temp) = create_storage();

        let result = storage.read("invoices/nope.md").await;

        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn read_refuses_paths_outside_base() {
        let (storage, _temp) = create_storage();

        assert!(matches!(
            storage.read("../secret").await,
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            storage.read("/etc/passwd").await,
            Err(StorageError::NotFound(_))
        ));
    }
}
