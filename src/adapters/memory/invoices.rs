//! In-memory invoice store.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::billing::{Invoice, InvoiceStatus, Provider};
use crate::domain::foundation::{DomainError, ErrorCode, InvoiceId, Timestamp, TransactionId};
use crate::ports::{InvoiceRepository, Upserted};

#[derive(Default)]
pub struct InMemoryInvoiceRepository {
    rows: RwLock<HashMap<InvoiceId, Invoice>>,
}

impl InMemoryInvoiceRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn all(&self) -> Vec<Invoice> {
        self.rows.read().await.values().cloned().collect()
    }
}

fn transaction_taken(
    rows: &HashMap<InvoiceId, Invoice>,
    invoice: &Invoice,
) -> Result<(), DomainError> {
    let Some(tx) = invoice.transaction_id else {
        return Ok(());
    };
    match rows
        .values()
        .find(|other| other.id != invoice.id && other.transaction_id == Some(tx))
    {
        Some(_) => Err(DomainError::unique_violation("Invoice", format!("transaction {}", tx))),
        None => Ok(()),
    }
}

#[async_trait]
impl InvoiceRepository for InMemoryInvoiceRepository {
    async fn create_for_transaction(
        &self,
        invoice: &Invoice,
    ) -> Result<(Invoice, bool), DomainError> {
        let mut rows = self.rows.write().await;
        if let Some(existing) = rows
            .values()
            .find(|other| {
                invoice.transaction_id.is_some() && other.transaction_id == invoice.transaction_id
            })
        {
            return Ok((existing.clone(), false));
        }
        rows.insert(invoice.id, invoice.clone());
        Ok((invoice.clone(), true))
    }

    async fn upsert_provider_invoice(
        &self,
        invoice: &Invoice,
    ) -> Result<Upserted<Invoice, InvoiceStatus>, DomainError> {
        let external_id = invoice.external_id.as_deref().ok_or_else(|| {
            DomainError::new(ErrorCode::InvariantViolated, "provider invoice without external id")
        })?;

        let mut rows = self.rows.write().await;
        let existing_id = rows
            .values()
            .find(|other| {
                other.provider == invoice.provider
                    && other.external_id.as_deref() == Some(external_id)
            })
            .map(|other| other.id);

        match existing_id {
            Some(id) => {
                let mut candidate = rows.get(&id).cloned().ok_or_else(|| {
                    DomainError::new(ErrorCode::InvoiceNotFound, id.to_string())
                })?;
                let previous = candidate.status;
                candidate.absorb(invoice.clone(), Timestamp::now());
                transaction_taken(&rows, &candidate)?;
                rows.insert(id, candidate.clone());
                Ok(Upserted::updated(candidate, previous))
            }
            None => {
                transaction_taken(&rows, invoice)?;
                rows.insert(invoice.id, invoice.clone());
                Ok(Upserted::created(invoice.clone()))
            }
        }
    }

    async fn update(&self, invoice: &Invoice) -> Result<(), DomainError> {
        let mut rows = self.rows.write().await;
        if !rows.contains_key(&invoice.id) {
            return Err(DomainError::new(ErrorCode::InvoiceNotFound, invoice.id.to_string()));
        }
        transaction_taken(&rows, invoice)?;
        rows.insert(invoice.id, invoice.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &InvoiceId) -> Result<Option<Invoice>, DomainError> {
        Ok(self.rows.read().await.get(id).cloned())
    }

    async fn find_by_transaction(
        &self,
        id: &TransactionId,
    ) -> Result<Option<Invoice>, DomainError> {
        Ok(self
            .rows
            .read()
            .await
            .values()
            .find(|i| i.transaction_id.as_ref() == Some(id))
            .cloned())
    }

    async fn find_by_external_id(
        &self,
        provider: Provider,
        external_id: &str,
    ) -> Result<Option<Invoice>, DomainError> {
        Ok(self
            .rows
            .read()
            .await
            .values()
            .find(|i| i.provider == provider && i.external_id.as_deref() == Some(external_id))
            .cloned())
    }

    async fn set_document(
        &self,
        id: &InvoiceId,
        path: &str,
        generated_at: Timestamp,
    ) -> Result<bool, DomainError> {
        let mut rows = self.rows.write().await;
        match rows.get_mut(id) {
            Some(invoice) if invoice.document_path.is_none() => {
                invoice.document_path = Some(path.to_string());
                invoice.document_generated_at = Some(generated_at);
                invoice.updated_at = generated_at;
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(DomainError::new(ErrorCode::InvoiceNotFound, id.to_string())),
        }
    }

    async fn find_without_document(&self, limit: u32) -> Result<Vec<Invoice>, DomainError> {
        let mut pending: Vec<Invoice> = self
            .rows
            .read()
            .await
            .values()
            .filter(|i| !i.has_document())
            .cloned()
            .collect();
        pending.sort_by_key(|i| i.created_at);
        pending.truncate(limit as usize);
        Ok(pending)
    }
}
