//! PostgreSQL processed-event marks for idempotent event handlers.

use async_trait::async_trait;
use sqlx::PgPool;

use super::support::{read_error, write_error};
use crate::domain::foundation::{DomainError, EventId, Timestamp};
use crate::ports::ProcessedEventStore;

pub struct PostgresProcessedEventStore {
    pool: PgPool,
}

impl PostgresProcessedEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProcessedEventStore for PostgresProcessedEventStore {
    async fn contains(&self, event_id: &EventId, handler_name: &str) -> Result<bool, DomainError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM processed_events \
             WHERE event_id = $1 AND handler_name = $2)",
        )
        .bind(event_id.as_str())
        .bind(handler_name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| read_error("processed event", e))?;

        Ok(exists)
    }

    async fn mark_processed(
        &self,
        event_id: &EventId,
        handler_name: &str,
    ) -> Result<(), DomainError> {
        sqlx::query(
            "INSERT INTO processed_events (event_id, handler_name) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(event_id.as_str())
        .bind(handler_name)
        .execute(&self.pool)
        .await
        .map_err(|e| write_error("ProcessedEvent", event_id.as_str(), e))?;

        Ok(())
    }

    async fn delete_before(&self, timestamp: Timestamp) -> Result<u64, DomainError> {
        let result = sqlx::query("DELETE FROM processed_events WHERE processed_at < $1")
            .bind(timestamp.as_datetime())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                DomainError::database(format!("Failed to prune processed events: {}", e))
            })?;

        Ok(result.rows_affected())
    }
}
