//! PostgreSQL order store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::support::{opt_dt, opt_ts, parse_column, read_error, ts, write_error};
use crate::domain::foundation::{DomainError, OrderId};
use crate::domain::order::Order;
use crate::ports::OrderRepository;

pub struct PostgresOrderRepository {
    pool: PgPool,
}

impl PostgresOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    status: String,
    completed_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = DomainError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(Order {
            id: OrderId::from_uuid(row.id),
            status: parse_column("order_status", &row.status)?,
            completed_at: opt_ts(row.completed_at),
            cancelled_at: opt_ts(row.cancelled_at),
            created_at: ts(row.created_at),
            updated_at: ts(row.updated_at),
        })
    }
}

#[async_trait]
impl OrderRepository for PostgresOrderRepository {
    async fn save(&self, order: &Order) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, status, completed_at, cancelled_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                status = EXCLUDED.status,
                completed_at = EXCLUDED.completed_at,
                cancelled_at = EXCLUDED.cancelled_at,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.status.as_str())
        .bind(opt_dt(&order.completed_at))
        .bind(opt_dt(&order.cancelled_at))
        .bind(order.created_at.as_datetime())
        .bind(order.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| write_error("Order", order.id.to_string(), e))?;

        Ok(())
    }

    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, DomainError> {
        let row: Option<OrderRow> = sqlx::query_as(
            "SELECT id, status, completed_at, cancelled_at, created_at, updated_at \
             FROM orders WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| read_error("order", e))?;

        row.map(Order::try_from).transpose()
    }
}
