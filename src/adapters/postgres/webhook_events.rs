//! PostgreSQL webhook event log.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::support::{parse_column, read_error, ts};
use crate::domain::billing::Provider;
use crate::domain::foundation::{DomainError, ErrorCode, Timestamp};
use crate::ports::{SaveResult, WebhookEventRecord, WebhookEventRepository, WebhookResult};

pub struct PostgresWebhookEventRepository {
    pool: PgPool,
}

impl PostgresWebhookEventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct WebhookEventRow {
    provider: String,
    event_id: String,
    event_type: String,
    result: String,
    note: Option<String>,
    processed_at: DateTime<Utc>,
}

fn parse_result(value: &str) -> Result<WebhookResult, DomainError> {
    match value {
        "success" => Ok(WebhookResult::Success),
        "ignored" => Ok(WebhookResult::Ignored),
        other => Err(DomainError::new(
            ErrorCode::DatabaseError,
            format!("Invalid webhook result value: {}", other),
        )),
    }
}

impl TryFrom<WebhookEventRow> for WebhookEventRecord {
    type Error = DomainError;

    fn try_from(row: WebhookEventRow) -> Result<Self, Self::Error> {
        Ok(WebhookEventRecord {
            provider: parse_column("provider", &row.provider)?,
            event_id: row.event_id,
            event_type: row.event_type,
            result: parse_result(&row.result)?,
            note: row.note,
            processed_at: ts(row.processed_at),
        })
    }
}

#[async_trait]
impl WebhookEventRepository for PostgresWebhookEventRepository {
    async fn find(
        &self,
        provider: Provider,
        event_id: &str,
    ) -> Result<Option<WebhookEventRecord>, DomainError> {
        let row: Option<WebhookEventRow> = sqlx::query_as(
            "SELECT provider, event_id, event_type, result, note, processed_at \
             FROM webhook_events WHERE provider = $1 AND event_id = $2",
        )
        .bind(provider.as_str())
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| read_error("webhook event", e))?;

        row.map(WebhookEventRecord::try_from).transpose()
    }

    async fn save(&self, record: WebhookEventRecord) -> Result<SaveResult, DomainError> {
        let result = sqlx::query(
            r#"
            INSERT INTO webhook_events (provider, event_id, event_type, result, note, processed_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (provider, event_id) DO NOTHING
            "#,
        )
        .bind(record.provider.as_str())
        .bind(&record.event_id)
        .bind(&record.event_type)
        .bind(record.result.as_str())
        .bind(&record.note)
        .bind(record.processed_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to save webhook event: {}", e)))?;

        if result.rows_affected() == 0 {
            Ok(SaveResult::AlreadyExists)
        } else {
            Ok(SaveResult::Inserted)
        }
    }

    async fn delete_before(&self, timestamp: Timestamp) -> Result<u64, DomainError> {
        let result = sqlx::query("DELETE FROM webhook_events WHERE processed_at < $1")
            .bind(timestamp.as_datetime())
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::database(format!("Failed to prune webhook events: {}", e)))?;

        Ok(result.rows_affected())
    }
}
