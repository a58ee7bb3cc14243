//! PostgreSQL refund ledger.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::support::{parse_column, parse_currency, read_error, ts, write_error};
use crate::domain::billing::{NewRefund, Provider, Refund, RefundStatus};
use crate::domain::foundation::{DomainError, RefundId, Timestamp, TransactionId};
use crate::ports::{RefundRepository, Upserted};

const COLUMNS: &str = "id, transaction_id, transaction_ref, provider, external_id, amount, \
    currency, status, reason, failure_reason, created_at, updated_at";

pub struct PostgresRefundRepository {
    pool: PgPool,
}

impl PostgresRefundRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RefundRow {
    id: Uuid,
    transaction_id: Option<Uuid>,
    transaction_ref: Option<String>,
    provider: String,
    external_id: String,
    amount: i64,
    currency: String,
    status: String,
    reason: Option<String>,
    failure_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RefundRow> for Refund {
    type Error = DomainError;

    fn try_from(row: RefundRow) -> Result<Self, Self::Error> {
        Ok(Refund {
            id: RefundId::from_uuid(row.id),
            transaction_id: row.transaction_id.map(TransactionId::from_uuid),
            transaction_ref: row.transaction_ref,
            provider: parse_column("provider", &row.provider)?,
            external_id: row.external_id,
            amount: row.amount,
            currency: parse_currency(&row.currency)?,
            status: parse_column("refund_status", &row.status)?,
            reason: row.reason,
            failure_reason: row.failure_reason,
            created_at: ts(row.created_at),
            updated_at: ts(row.updated_at),
        })
    }
}

#[async_trait]
impl RefundRepository for PostgresRefundRepository {
    async fn upsert(
        &self,
        refund: &NewRefund,
    ) -> Result<Upserted<Refund, RefundStatus>, DomainError> {
        let mut db = self
            .pool
            .begin()
            .await
            .map_err(|e| DomainError::database(format!("Failed to begin: {}", e)))?;

        let row: Option<RefundRow> = sqlx::query_as(&format!(
            "SELECT {} FROM refunds WHERE provider = $1 AND external_id = $2 FOR UPDATE",
            COLUMNS
        ))
        .bind(refund.provider.as_str())
        .bind(&refund.external_id)
        .fetch_optional(&mut *db)
        .await
        .map_err(|e| read_error("refund", e))?;

        let now = Timestamp::now();
        let key = format!("{}:{}", refund.provider, refund.external_id);
        let outcome = match row.map(Refund::try_from).transpose()? {
            Some(mut existing) => {
                let previous = existing.status;
                existing.apply(refund.clone(), now);
                sqlx::query(
                    r#"
                    UPDATE refunds SET
                        transaction_id = $2,
                        transaction_ref = $3,
                        amount = $4,
                        currency = $5,
                        status = $6,
                        reason = $7,
                        failure_reason = $8,
                        updated_at = $9
                    WHERE id = $1
                    "#,
                )
                .bind(existing.id.as_uuid())
                .bind(existing.transaction_id.map(|id| *id.as_uuid()))
                .bind(&existing.transaction_ref)
                .bind(existing.amount)
                .bind(existing.currency.as_str())
                .bind(existing.status.as_str())
                .bind(&existing.reason)
                .bind(&existing.failure_reason)
                .bind(existing.updated_at.as_datetime())
                .execute(&mut *db)
                .await
                .map_err(|e| write_error("Refund", key.clone(), e))?;
                Upserted::updated(existing, previous)
            }
            None => {
                let created = refund.clone().into_refund(RefundId::new(), now);
                sqlx::query(&format!(
                    "INSERT INTO refunds ({}) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
                    COLUMNS
                ))
                .bind(created.id.as_uuid())
                .bind(created.transaction_id.map(|id| *id.as_uuid()))
                .bind(&created.transaction_ref)
                .bind(created.provider.as_str())
                .bind(&created.external_id)
                .bind(created.amount)
                .bind(created.currency.as_str())
                .bind(created.status.as_str())
                .bind(&created.reason)
                .bind(&created.failure_reason)
                .bind(created.created_at.as_datetime())
                .bind(created.updated_at.as_datetime())
                .execute(&mut *db)
                .await
                .map_err(|e| write_error("Refund", key.clone(), e))?;
                Upserted::created(created)
            }
        };

        db.commit()
            .await
            .map_err(|e| DomainError::database(format!("Failed to commit: {}", e)))?;
        Ok(outcome)
    }

    async fn find_by_external_id(
        &self,
        provider: Provider,
        external_id: &str,
    ) -> Result<Option<Refund>, DomainError> {
        let row: Option<RefundRow> = sqlx::query_as(&format!(
            "SELECT {} FROM refunds WHERE provider = $1 AND external_id = $2",
            COLUMNS
        ))
        .bind(provider.as_str())
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| read_error("refund", e))?;

        row.map(Refund::try_from).transpose()
    }

    async fn link_orphans(
        &self,
        provider: Provider,
        transaction_ref: &str,
        transaction_id: &TransactionId,
    ) -> Result<u64, DomainError> {
        let result = sqlx::query(
            "UPDATE refunds SET transaction_id = $3, updated_at = NOW() \
             WHERE provider = $1 AND transaction_ref = $2 AND transaction_id IS NULL",
        )
        .bind(provider.as_str())
        .bind(transaction_ref)
        .bind(transaction_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|e| write_error("Refund", transaction_ref.to_string(), e))?;

        Ok(result.rows_affected())
    }

    async fn sum_succeeded_for_transaction(&self, id: &TransactionId) -> Result<i64, DomainError> {
        let total: Option<i64> = sqlx::query_scalar(
            "SELECT SUM(amount)::BIGINT FROM refunds WHERE transaction_id = $1 AND status = $2",
        )
        .bind(id.as_uuid())
        .bind(RefundStatus::Succeeded.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| read_error("refund total", e))?;

        Ok(total.unwrap_or(0))
    }
}
