//! PostgreSQL adapters - Database implementations for repository ports.
//!
//! Provider-sourced rows are unique on `(provider, external_id)`. Upserts
//! lock the existing row with `SELECT ... FOR UPDATE`, apply the domain
//! merge rules, and write back inside one transaction. A racing insert
//! surfaces as `ErrorCode::UniqueViolation`, which the reconciler retries.

mod customers;
mod invoices;
mod orders;
mod processed_events;
mod refunds;
mod subscriptions;
mod support;
mod transactions;
mod webhook_events;

pub use customers::PostgresCustomerRepository;
pub use invoices::PostgresInvoiceRepository;
pub use orders::PostgresOrderRepository;
pub use processed_events::PostgresProcessedEventStore;
pub use refunds::PostgresRefundRepository;
pub use subscriptions::PostgresSubscriptionRepository;
pub use transactions::PostgresTransactionRepository;
pub use webhook_events::PostgresWebhookEventRepository;

use secrecy::ExposeSecret;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::config::DatabaseConfig;

/// Connects the pool and, when configured, applies pending migrations.
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout())
        .idle_timeout(config.idle_timeout())
        .max_lifetime(config.max_lifetime())
        .connect(config.url.expose_secret())
        .await?;

    if config.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("Migrations applied");
    }

    info!(max_connections = config.max_connections, "Connected to database");
    Ok(pool)
}
