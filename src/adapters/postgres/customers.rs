//! PostgreSQL payment customers.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::support::{decode_json, encode_json, parse_column, read_error, write_error};
use crate::domain::billing::{PaymentCustomer, Provider};
use crate::domain::foundation::{CustomerId, DomainError, ErrorCode, UserId};
use crate::ports::CustomerRepository;

const COLUMNS: &str = "id, user_id, provider, external_id, email, name, address";

pub struct PostgresCustomerRepository {
    pool: PgPool,
}

impl PostgresCustomerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CustomerRow {
    id: Uuid,
    user_id: String,
    provider: String,
    external_id: String,
    email: Option<String>,
    name: Option<String>,
    address: Option<serde_json::Value>,
}

impl TryFrom<CustomerRow> for PaymentCustomer {
    type Error = DomainError;

    fn try_from(row: CustomerRow) -> Result<Self, Self::Error> {
        Ok(PaymentCustomer {
            id: CustomerId::from_uuid(row.id),
            user_id: UserId::new(row.user_id).map_err(|e| {
                DomainError::new(ErrorCode::DatabaseError, format!("Invalid user_id: {}", e))
            })?,
            provider: parse_column("provider", &row.provider)?,
            external_id: row.external_id,
            email: row.email,
            name: row.name,
            address: row.address.map(|v| decode_json("address", v)).transpose()?,
        })
    }
}

#[async_trait]
impl CustomerRepository for PostgresCustomerRepository {
    async fn save(&self, customer: &PaymentCustomer) -> Result<(), DomainError> {
        let address = customer
            .address
            .as_ref()
            .map(|a| encode_json("address", a))
            .transpose()?;

        sqlx::query(
            r#"
            INSERT INTO payment_customers (id, user_id, provider, external_id, email, name, address)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET
                user_id = EXCLUDED.user_id,
                external_id = EXCLUDED.external_id,
                email = EXCLUDED.email,
                name = EXCLUDED.name,
                address = EXCLUDED.address
            "#,
        )
        .bind(customer.id.as_uuid())
        .bind(customer.user_id.as_str())
        .bind(customer.provider.as_str())
        .bind(&customer.external_id)
        .bind(&customer.email)
        .bind(&customer.name)
        .bind(address)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            write_error(
                "PaymentCustomer",
                format!("{}:{}", customer.provider, customer.external_id),
                e,
            )
        })?;

        Ok(())
    }

    async fn find_by_id(&self, id: &CustomerId) -> Result<Option<PaymentCustomer>, DomainError> {
        let row: Option<CustomerRow> =
            sqlx::query_as(&format!("SELECT {} FROM payment_customers WHERE id = $1", COLUMNS))
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| read_error("customer", e))?;

        row.map(PaymentCustomer::try_from).transpose()
    }

    async fn find_by_external_id(
        &self,
        provider: Provider,
        external_id: &str,
    ) -> Result<Option<PaymentCustomer>, DomainError> {
        let row: Option<CustomerRow> = sqlx::query_as(&format!(
            "SELECT {} FROM payment_customers WHERE provider = $1 AND external_id = $2",
            COLUMNS
        ))
        .bind(provider.as_str())
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| read_error("customer", e))?;

        row.map(PaymentCustomer::try_from).transpose()
    }
}
