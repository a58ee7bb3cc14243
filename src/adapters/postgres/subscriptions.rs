//! PostgreSQL subscription store.
//!
//! The stale-snapshot guard runs under `SELECT ... FOR UPDATE`, so two
//! concurrent snapshots for the same subscription are applied in turn.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::support::{opt_dt, opt_ts, parse_column, parse_currency, read_error, ts, write_error};
use crate::domain::billing::{Provider, Subscription, SubscriptionSnapshot};
use crate::domain::foundation::{CustomerId, DomainError, SubscriptionId, Timestamp};
use crate::ports::{SnapshotApplied, SubscriptionRepository, Upserted};

const COLUMNS: &str = "id, customer_id, provider, external_id, plan_id, status, amount, \
    currency, billing_interval, interval_count, quantity, current_period_start, \
    current_period_end, trial_start, trial_end, canceled_at, ended_at, \
    cancel_at_period_end, raw_response, last_event_at, created_at, updated_at";

pub struct PostgresSubscriptionRepository {
    pool: PgPool,
}

impl PostgresSubscriptionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SubscriptionRow {
    id: Uuid,
    customer_id: Option<Uuid>,
    provider: String,
    external_id: String,
    plan_id: Option<String>,
    status: String,
    amount: Option<i64>,
    currency: Option<String>,
    billing_interval: Option<String>,
    interval_count: Option<i32>,
    quantity: i32,
    current_period_start: Option<DateTime<Utc>>,
    current_period_end: Option<DateTime<Utc>>,
    trial_start: Option<DateTime<Utc>>,
    trial_end: Option<DateTime<Utc>>,
    canceled_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    cancel_at_period_end: bool,
    raw_response: serde_json::Value,
    last_event_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SubscriptionRow> for Subscription {
    type Error = DomainError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        Ok(Subscription {
            id: SubscriptionId::from_uuid(row.id),
            customer_id: row.customer_id.map(CustomerId::from_uuid),
            provider: parse_column("provider", &row.provider)?,
            external_id: row.external_id,
            plan_id: row.plan_id,
            status: parse_column("subscription_status", &row.status)?,
            amount: row.amount,
            currency: row.currency.as_deref().map(parse_currency).transpose()?,
            interval: row
                .billing_interval
                .as_deref()
                .map(|v| parse_column("billing_interval", v))
                .transpose()?,
            interval_count: row.interval_count,
            quantity: row.quantity,
            current_period_start: opt_ts(row.current_period_start),
            current_period_end: opt_ts(row.current_period_end),
            trial_start: opt_ts(row.trial_start),
            trial_end: opt_ts(row.trial_end),
            canceled_at: opt_ts(row.canceled_at),
            ended_at: opt_ts(row.ended_at),
            cancel_at_period_end: row.cancel_at_period_end,
            raw_response: row.raw_response,
            last_event_at: ts(row.last_event_at),
            created_at: ts(row.created_at),
            updated_at: ts(row.updated_at),
        })
    }
}

/// Writes every column; `insert` decides between INSERT and UPDATE.
async fn write(
    conn: &mut PgConnection,
    sub: &Subscription,
    insert: bool,
) -> Result<(), DomainError> {
    let sql = if insert {
        format!(
            "INSERT INTO subscriptions ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, \
             $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22)",
            COLUMNS
        )
    } else {
        r#"
        UPDATE subscriptions SET
            customer_id = $2, provider = $3, external_id = $4, plan_id = $5, status = $6,
            amount = $7, currency = $8, billing_interval = $9, interval_count = $10,
            quantity = $11, current_period_start = $12, current_period_end = $13,
            trial_start = $14, trial_end = $15, canceled_at = $16, ended_at = $17,
            cancel_at_period_end = $18, raw_response = $19, last_event_at = $20,
            created_at = $21, updated_at = $22
        WHERE id = $1
        "#
        .to_string()
    };

    sqlx::query(&sql)
        .bind(sub.id.as_uuid())
        .bind(sub.customer_id.map(|id| *id.as_uuid()))
        .bind(sub.provider.as_str())
        .bind(&sub.external_id)
        .bind(&sub.plan_id)
        .bind(sub.status.as_str())
        .bind(sub.amount)
        .bind(sub.currency.as_ref().map(|c| c.as_str().to_string()))
        .bind(sub.interval.map(|i| i.as_str()))
        .bind(sub.interval_count)
        .bind(sub.quantity)
        .bind(opt_dt(&sub.current_period_start))
        .bind(opt_dt(&sub.current_period_end))
        .bind(opt_dt(&sub.trial_start))
        .bind(opt_dt(&sub.trial_end))
        .bind(opt_dt(&sub.canceled_at))
        .bind(opt_dt(&sub.ended_at))
        .bind(sub.cancel_at_period_end)
        .bind(&sub.raw_response)
        .bind(sub.last_event_at.as_datetime())
        .bind(sub.created_at.as_datetime())
        .bind(sub.updated_at.as_datetime())
        .execute(conn)
        .await
        .map_err(|e| {
            write_error("Subscription", format!("{}:{}", sub.provider, sub.external_id), e)
        })?;

    Ok(())
}

#[async_trait]
impl SubscriptionRepository for PostgresSubscriptionRepository {
    async fn upsert_snapshot(
        &self,
        snapshot: &SubscriptionSnapshot,
    ) -> Result<SnapshotApplied, DomainError> {
        let mut db = self
            .pool
            .begin()
            .await
            .map_err(|e| DomainError::database(format!("Failed to begin: {}", e)))?;

        let row: Option<SubscriptionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM subscriptions WHERE provider = $1 AND external_id = $2 FOR UPDATE",
            COLUMNS
        ))
        .bind(snapshot.provider.as_str())
        .bind(&snapshot.external_id)
        .fetch_optional(&mut *db)
        .await
        .map_err(|e| read_error("subscription", e))?;

        let now = Timestamp::now();
        let applied = match row.map(Subscription::try_from).transpose()? {
            Some(existing) if !existing.accepts(snapshot) => SnapshotApplied::Stale(existing),
            Some(mut existing) => {
                let previous = existing.status;
                existing.replace_with(snapshot.clone(), now);
                write(&mut *db, &existing, false).await?;
                SnapshotApplied::Applied(Upserted::updated(existing, previous))
            }
            None => {
                let created = snapshot.clone().into_subscription(SubscriptionId::new(), now);
                write(&mut *db, &created, true).await?;
                SnapshotApplied::Applied(Upserted::created(created))
            }
        };

        db.commit()
            .await
            .map_err(|e| DomainError::database(format!("Failed to commit: {}", e)))?;
        Ok(applied)
    }

    async fn find_by_id(&self, id: &SubscriptionId) -> Result<Option<Subscription>, DomainError> {
        let row: Option<SubscriptionRow> =
            sqlx::query_as(&format!("SELECT {} FROM subscriptions WHERE id = $1", COLUMNS))
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| read_error("subscription", e))?;

        row.map(Subscription::try_from).transpose()
    }

    async fn find_by_external_id(
        &self,
        provider: Provider,
        external_id: &str,
    ) -> Result<Option<Subscription>, DomainError> {
        let row: Option<SubscriptionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM subscriptions WHERE provider = $1 AND external_id = $2",
            COLUMNS
        ))
        .bind(provider.as_str())
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| read_error("subscription", e))?;

        row.map(Subscription::try_from).transpose()
    }
}
