//! PostgreSQL transaction ledger.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::support::{parse_column, parse_currency, read_error, ts, write_error};
use crate::domain::billing::{NewTransaction, PaymentStatus, Provider, Transaction};
use crate::domain::foundation::{
    CustomerId, DomainError, SubscriptionId, Timestamp, TransactionId,
};
use crate::ports::{TransactionRepository, Upserted};

const COLUMNS: &str = "id, customer_id, subscription_id, provider, external_id, amount, \
    currency, status, payment_method, description, failure_reason, raw_response, \
    created_at, updated_at";

pub struct PostgresTransactionRepository {
    pool: PgPool,
}

impl PostgresTransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: Uuid,
    customer_id: Option<Uuid>,
    subscription_id: Option<Uuid>,
    provider: String,
    external_id: String,
    amount: i64,
    currency: String,
    status: String,
    payment_method: Option<String>,
    description: Option<String>,
    failure_reason: Option<String>,
    raw_response: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = DomainError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        Ok(Transaction {
            id: TransactionId::from_uuid(row.id),
            customer_id: row.customer_id.map(CustomerId::from_uuid),
            subscription_id: row.subscription_id.map(SubscriptionId::from_uuid),
            provider: parse_column("provider", &row.provider)?,
            external_id: row.external_id,
            amount: row.amount,
            currency: parse_currency(&row.currency)?,
            status: parse_column("payment_status", &row.status)?,
            payment_method: row.payment_method,
            description: row.description,
            failure_reason: row.failure_reason,
            raw_response: row.raw_response,
            created_at: ts(row.created_at),
            updated_at: ts(row.updated_at),
        })
    }
}

async fn lock_by_key(
    conn: &mut PgConnection,
    provider: Provider,
    external_id: &str,
) -> Result<Option<Transaction>, DomainError> {
    let row: Option<TransactionRow> = sqlx::query_as(&format!(
        "SELECT {} FROM transactions WHERE provider = $1 AND external_id = $2 FOR UPDATE",
        COLUMNS
    ))
    .bind(provider.as_str())
    .bind(external_id)
    .fetch_optional(conn)
    .await
    .map_err(|e| read_error("transaction", e))?;

    row.map(Transaction::try_from).transpose()
}

async fn insert(conn: &mut PgConnection, tx: &Transaction) -> Result<(), DomainError> {
    sqlx::query(&format!(
        "INSERT INTO transactions ({}) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
        COLUMNS
    ))
    .bind(tx.id.as_uuid())
    .bind(tx.customer_id.map(|id| *id.as_uuid()))
    .bind(tx.subscription_id.map(|id| *id.as_uuid()))
    .bind(tx.provider.as_str())
    .bind(&tx.external_id)
    .bind(tx.amount)
    .bind(tx.currency.as_str())
    .bind(tx.status.as_str())
    .bind(&tx.payment_method)
    .bind(&tx.description)
    .bind(&tx.failure_reason)
    .bind(&tx.raw_response)
    .bind(tx.created_at.as_datetime())
    .bind(tx.updated_at.as_datetime())
    .execute(conn)
    .await
    .map_err(|e| write_error("Transaction", format!("{}:{}", tx.provider, tx.external_id), e))?;

    Ok(())
}

async fn update(conn: &mut PgConnection, tx: &Transaction) -> Result<(), DomainError> {
    sqlx::query(
        r#"
        UPDATE transactions SET
            customer_id = $2,
            subscription_id = $3,
            amount = $4,
            currency = $5,
            status = $6,
            payment_method = $7,
            description = $8,
            failure_reason = $9,
            raw_response = $10,
            updated_at = $11
        WHERE id = $1
        "#,
    )
    .bind(tx.id.as_uuid())
    .bind(tx.customer_id.map(|id| *id.as_uuid()))
    .bind(tx.subscription_id.map(|id| *id.as_uuid()))
    .bind(tx.amount)
    .bind(tx.currency.as_str())
    .bind(tx.status.as_str())
    .bind(&tx.payment_method)
    .bind(&tx.description)
    .bind(&tx.failure_reason)
    .bind(&tx.raw_response)
    .bind(tx.updated_at.as_datetime())
    .execute(conn)
    .await
    .map_err(|e| write_error("Transaction", tx.id.to_string(), e))?;

    Ok(())
}

#[async_trait]
impl TransactionRepository for PostgresTransactionRepository {
    async fn upsert(
        &self,
        new_tx: &NewTransaction,
    ) -> Result<Upserted<Transaction, PaymentStatus>, DomainError> {
        let mut db = self
            .pool
            .begin()
            .await
            .map_err(|e| DomainError::database(format!("Failed to begin: {}", e)))?;

        let now = Timestamp::now();
        let outcome = match lock_by_key(&mut *db, new_tx.provider, &new_tx.external_id).await? {
            Some(mut existing) => {
                let previous = existing.status;
                existing.apply(new_tx.clone(), now);
                update(&mut *db, &existing).await?;
                Upserted::updated(existing, previous)
            }
            None => {
                let created = new_tx.clone().into_transaction(TransactionId::new(), now);
                insert(&mut *db, &created).await?;
                Upserted::created(created)
            }
        };

        db.commit()
            .await
            .map_err(|e| DomainError::database(format!("Failed to commit: {}", e)))?;
        Ok(outcome)
    }

    async fn find_by_id(&self, id: &TransactionId) -> Result<Option<Transaction>, DomainError> {
        let row: Option<TransactionRow> =
            sqlx::query_as(&format!("SELECT {} FROM transactions WHERE id = $1", COLUMNS))
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| read_error("transaction", e))?;

        row.map(Transaction::try_from).transpose()
    }

    async fn find_by_external_id(
        &self,
        provider: Provider,
        external_id: &str,
    ) -> Result<Option<Transaction>, DomainError> {
        let row: Option<TransactionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM transactions WHERE provider = $1 AND external_id = $2",
            COLUMNS
        ))
        .bind(provider.as_str())
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| read_error("transaction", e))?;

        row.map(Transaction::try_from).transpose()
    }

    async fn mark_refunded(&self, id: &TransactionId) -> Result<bool, DomainError> {
        let result = sqlx::query(
            "UPDATE transactions SET status = $2, updated_at = NOW() \
             WHERE id = $1 AND status <> $2",
        )
        .bind(id.as_uuid())
        .bind(PaymentStatus::Refunded.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| write_error("Transaction", id.to_string(), e))?;

        Ok(result.rows_affected() == 1)
    }

    async fn link_subscription(
        &self,
        id: &TransactionId,
        subscription_id: &SubscriptionId,
    ) -> Result<bool, DomainError> {
        let result = sqlx::query(
            "UPDATE transactions SET subscription_id = $2, updated_at = NOW() \
             WHERE id = $1 AND subscription_id IS NULL",
        )
        .bind(id.as_uuid())
        .bind(subscription_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|e| write_error("Transaction", id.to_string(), e))?;

        Ok(result.rows_affected() == 1)
    }
}
