//! PostgreSQL invoice store.
//!
//! Line items and billing details are stored as JSONB snapshots. The
//! totals columns carry CHECK constraints mirroring `InvoiceTotals::check`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::support::{
    decode_json, encode_json, opt_dt, opt_ts, parse_column, parse_currency, read_error, ts,
    write_error,
};
use crate::domain::billing::{Invoice, InvoiceStatus, InvoiceTotals, Provider};
use crate::domain::foundation::{
    CustomerId, DomainError, ErrorCode, InvoiceId, SubscriptionId, Timestamp, TransactionId,
};
use crate::ports::{InvoiceRepository, Upserted};

const COLUMNS: &str = "id, customer_id, subscription_id, transaction_id, number, provider, \
    external_id, status, subtotal, tax, discount, total, amount_paid, amount_due, currency, \
    billing, line_items, issued_at, due_at, paid_at, period_start, period_end, document_path, \
    document_generated_at, created_at, updated_at";

pub struct PostgresInvoiceRepository {
    pool: PgPool,
}

impl PostgresInvoiceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct InvoiceRow {
    id: Uuid,
    customer_id: Option<Uuid>,
    subscription_id: Option<Uuid>,
    transaction_id: Option<Uuid>,
    number: String,
    provider: String,
    external_id: Option<String>,
    status: String,
    subtotal: i64,
    tax: i64,
    discount: i64,
    total: i64,
    amount_paid: i64,
    amount_due: i64,
    currency: String,
    billing: serde_json::Value,
    line_items: serde_json::Value,
    issued_at: DateTime<Utc>,
    due_at: Option<DateTime<Utc>>,
    paid_at: Option<DateTime<Utc>>,
    period_start: Option<DateTime<Utc>>,
    period_end: Option<DateTime<Utc>>,
    document_path: Option<String>,
    document_generated_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<InvoiceRow> for Invoice {
    type Error = DomainError;

    fn try_from(row: InvoiceRow) -> Result<Self, Self::Error> {
        Ok(Invoice {
            id: InvoiceId::from_uuid(row.id),
            customer_id: row.customer_id.map(CustomerId::from_uuid),
            subscription_id: row.subscription_id.map(SubscriptionId::from_uuid),
            transaction_id: row.transaction_id.map(TransactionId::from_uuid),
            number: row.number,
            provider: parse_column("provider", &row.provider)?,
            external_id: row.external_id,
            status: parse_column("invoice_status", &row.status)?,
            totals: InvoiceTotals {
                subtotal: row.subtotal,
                tax: row.tax,
                discount: row.discount,
                total: row.total,
                amount_paid: row.amount_paid,
                amount_due: row.amount_due,
            },
            currency: parse_currency(&row.currency)?,
            billing: decode_json("billing", row.billing)?,
            line_items: decode_json("line_items", row.line_items)?,
            issued_at: ts(row.issued_at),
            due_at: opt_ts(row.due_at),
            paid_at: opt_ts(row.paid_at),
            period_start: opt_ts(row.period_start),
            period_end: opt_ts(row.period_end),
            document_path: row.document_path,
            document_generated_at: opt_ts(row.document_generated_at),
            created_at: ts(row.created_at),
            updated_at: ts(row.updated_at),
        })
    }
}

/// Binds every column in `COLUMNS` order onto `sql` and executes it.
async fn write(conn: &mut PgConnection, sql: &str, invoice: &Invoice) -> Result<u64, DomainError> {
    let totals = &invoice.totals;
    let result = sqlx::query(sql)
        .bind(invoice.id.as_uuid())
        .bind(invoice.customer_id.map(|id| *id.as_uuid()))
        .bind(invoice.subscription_id.map(|id| *id.as_uuid()))
        .bind(invoice.transaction_id.map(|id| *id.as_uuid()))
        .bind(&invoice.number)
        .bind(invoice.provider.as_str())
        .bind(&invoice.external_id)
        .bind(invoice.status.as_str())
        .bind(totals.subtotal)
        .bind(totals.tax)
        .bind(totals.discount)
        .bind(totals.total)
        .bind(totals.amount_paid)
        .bind(totals.amount_due)
        .bind(invoice.currency.as_str())
        .bind(encode_json("billing", &invoice.billing)?)
        .bind(encode_json("line_items", &invoice.line_items)?)
        .bind(invoice.issued_at.as_datetime())
        .bind(opt_dt(&invoice.due_at))
        .bind(opt_dt(&invoice.paid_at))
        .bind(opt_dt(&invoice.period_start))
        .bind(opt_dt(&invoice.period_end))
        .bind(&invoice.document_path)
        .bind(opt_dt(&invoice.document_generated_at))
        .bind(invoice.created_at.as_datetime())
        .bind(invoice.updated_at.as_datetime())
        .execute(conn)
        .await
        .map_err(|e| write_error("Invoice", invoice.number.clone(), e))?;

    Ok(result.rows_affected())
}

fn insert_sql(suffix: &str) -> String {
    format!(
        "INSERT INTO invoices ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, \
         $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26) {}",
        COLUMNS, suffix
    )
}

const UPDATE_SQL: &str = r#"
    UPDATE invoices SET
        customer_id = $2, subscription_id = $3, transaction_id = $4, number = $5,
        provider = $6, external_id = $7, status = $8, subtotal = $9, tax = $10,
        discount = $11, total = $12, amount_paid = $13, amount_due = $14, currency = $15,
        billing = $16, line_items = $17, issued_at = $18, due_at = $19, paid_at = $20,
        period_start = $21, period_end = $22, document_path = $23,
        document_generated_at = $24, created_at = $25, updated_at = $26
    WHERE id = $1
"#;

async fn fetch_optional(
    pool: &PgPool,
    query: sqlx::query::QueryAs<'_, sqlx::Postgres, InvoiceRow, sqlx::postgres::PgArguments>,
) -> Result<Option<Invoice>, DomainError> {
    let row = query
        .fetch_optional(pool)
        .await
        .map_err(|e| read_error("invoice", e))?;

    row.map(Invoice::try_from).transpose()
}

#[async_trait]
impl InvoiceRepository for PostgresInvoiceRepository {
    async fn create_for_transaction(
        &self,
        invoice: &Invoice,
    ) -> Result<(Invoice, bool), DomainError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| DomainError::database(format!("Failed to acquire connection: {}", e)))?;

        let inserted = write(
            &mut *conn,
            &insert_sql("ON CONFLICT (transaction_id) DO NOTHING"),
            invoice,
        )
        .await?;
        if inserted == 1 {
            return Ok((invoice.clone(), true));
        }

        let tx_id = invoice.transaction_id.ok_or_else(|| {
            DomainError::new(ErrorCode::InvariantViolated, "derived invoice without transaction")
        })?;
        let existing = self
            .find_by_transaction(&tx_id)
            .await?
            .ok_or_else(|| DomainError::new(ErrorCode::StorageConflict, tx_id.to_string()))?;
        Ok((existing, false))
    }

    async fn upsert_provider_invoice(
        &self,
        invoice: &Invoice,
    ) -> Result<Upserted<Invoice, InvoiceStatus>, DomainError> {
        let external_id = invoice.external_id.as_deref().ok_or_else(|| {
            DomainError::new(ErrorCode::InvariantViolated, "provider invoice without external id")
        })?;

        let mut db = self
            .pool
            .begin()
            .await
            .map_err(|e| DomainError::database(format!("Failed to begin: {}", e)))?;

        let row: Option<InvoiceRow> = sqlx::query_as(&format!(
            "SELECT {} FROM invoices WHERE provider = $1 AND external_id = $2 FOR UPDATE",
            COLUMNS
        ))
        .bind(invoice.provider.as_str())
        .bind(external_id)
        .fetch_optional(&mut *db)
        .await
        .map_err(|e| read_error("invoice", e))?;

        let outcome = match row.map(Invoice::try_from).transpose()? {
            Some(mut existing) => {
                let previous = existing.status;
                existing.absorb(invoice.clone(), Timestamp::now());
                write(&mut *db, UPDATE_SQL, &existing).await?;
                Upserted::updated(existing, previous)
            }
            None => {
                write(&mut *db, &insert_sql(""), invoice).await?;
                Upserted::created(invoice.clone())
            }
        };

        db.commit()
            .await
            .map_err(|e| DomainError::database(format!("Failed to commit: {}", e)))?;
        Ok(outcome)
    }

    async fn update(&self, invoice: &Invoice) -> Result<(), DomainError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| DomainError::database(format!("Failed to acquire connection: {}", e)))?;

        if write(&mut *conn, UPDATE_SQL, invoice).await? == 0 {
            return Err(DomainError::new(ErrorCode::InvoiceNotFound, invoice.id.to_string()));
        }
        Ok(())
    }

    async fn find_by_id(&self, id: &InvoiceId) -> Result<Option<Invoice>, DomainError> {
        let sql = format!("SELECT {} FROM invoices WHERE id = $1", COLUMNS);
        fetch_optional(&self.pool, sqlx::query_as(&sql).bind(id.as_uuid())).await
    }

    async fn find_by_transaction(
        &self,
        id: &TransactionId,
    ) -> Result<Option<Invoice>, DomainError> {
        let sql = format!("SELECT {} FROM invoices WHERE transaction_id = $1", COLUMNS);
        fetch_optional(&self.pool, sqlx::query_as(&sql).bind(id.as_uuid())).await
    }

    async fn find_by_external_id(
        &self,
        provider: Provider,
        external_id: &str,
    ) -> Result<Option<Invoice>, DomainError> {
        let sql = format!(
            "SELECT {} FROM invoices WHERE provider = $1 AND external_id = $2",
            COLUMNS
        );
        let query = sqlx::query_as(&sql).bind(provider.as_str()).bind(external_id);
        fetch_optional(&self.pool, query).await
    }

    async fn set_document(
        &self,
        id: &InvoiceId,
        path: &str,
        generated_at: Timestamp,
    ) -> Result<bool, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE invoices SET
                document_path = $2,
                document_generated_at = $3,
                updated_at = $3
            WHERE id = $1 AND document_path IS NULL
            "#,
        )
        .bind(id.as_uuid())
        .bind(path)
        .bind(generated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| write_error("Invoice", id.to_string(), e))?;

        if result.rows_affected() == 1 {
            return Ok(true);
        }
        match self.find_by_id(id).await? {
            Some(_) => Ok(false),
            None => Err(DomainError::new(ErrorCode::InvoiceNotFound, id.to_string())),
        }
    }

    async fn find_without_document(&self, limit: u32) -> Result<Vec<Invoice>, DomainError> {
        let rows: Vec<InvoiceRow> = sqlx::query_as(&format!(
            "SELECT {} FROM invoices WHERE document_path IS NULL ORDER BY created_at LIMIT $1",
            COLUMNS
        ))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| read_error("invoices", e))?;

        rows.into_iter().map(Invoice::try_from).collect()
    }
}
