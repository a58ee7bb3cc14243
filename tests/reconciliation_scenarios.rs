//! End-to-end reconciliation scenarios over in-memory stores.
//!
//! Each test wires the full service graph the server uses, delivers
//! provider envelopes through `ProcessWebhookHandler`, and checks the
//! resulting ledger state.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use tempfile::TempDir;
use tokio::sync::watch;

use ledger_reconciler::adapters::document::{
    LocalInvoiceDocumentStorage, MarkdownInvoiceRenderer,
};
use ledger_reconciler::adapters::{ChannelEventBus, ChannelEventBusConfig, LedgerStores};
use ledger_reconciler::application::handlers::{
    InvoicePipeline, PayPalEventHandler, ProcessWebhookCommand, ProcessWebhookHandler,
    Reconciler, StripeEventHandler, TransitionOrderCommand, TransitionOrderError,
};
use ledger_reconciler::config::{
    AppConfig, DocumentsConfig, NotificationsConfig, ServerConfig, WebhooksConfig,
};
use ledger_reconciler::domain::billing::{
    InvoiceIssued, PaymentCustomer, PaymentStatus, PaymentSucceeded, Provider, RefundStatus,
    SubscriptionStatus,
};
use ledger_reconciler::domain::foundation::{DomainError, EventEnvelope, Timestamp, UserId};
use ledger_reconciler::domain::order::{Order, OrderStatus};
use ledger_reconciler::domain::webhook::{ReconcileOutcome, WebhookEnvelope};
use ledger_reconciler::ports::{
    CustomerRepository, EventHandler, EventSubscriber, InvoiceRepository, OrderRepository,
    RefundRepository, SubscriptionRepository, TransactionRepository,
};
use ledger_reconciler::state::AppServices;

// =============================================================================
// Test Infrastructure
// =============================================================================

struct Harness {
    stores: LedgerStores,
    services: AppServices,
    _documents: TempDir,
}

impl Harness {
    fn new() -> Self {
        let documents = TempDir::new().unwrap();
        let config = AppConfig {
            server: ServerConfig::default(),
            database: None,
            documents: DocumentsConfig {
                storage_path: documents.path().to_path_buf(),
                ..Default::default()
            },
            notifications: NotificationsConfig::default(),
            email: None,
            webhooks: WebhooksConfig::default(),
        };
        let stores = LedgerStores::in_memory();
        let services = AppServices::build(&stores, &config);
        Self {
            stores,
            services,
            _documents: documents,
        }
    }

    async fn deliver(&self, envelope: WebhookEnvelope) -> ReconcileOutcome {
        self.services
            .processor
            .handle(ProcessWebhookCommand { envelope })
            .await
            .unwrap()
    }
}

fn stripe(event_id: &str, event_type: &str, created: i64, object: JsonValue) -> WebhookEnvelope {
    WebhookEnvelope::new(
        "stripe",
        event_type,
        json!({
            "id": event_id,
            "type": event_type,
            "created": created,
            "livemode": false,
            "data": { "object": object }
        }),
    )
}

fn succeeded_intent() -> JsonValue {
    payment_intent("pi_1")
}

fn payment_intent(id: &str) -> JsonValue {
    json!({
        "id": id,
        "amount": 5000,
        "currency": "usd",
        "status": "succeeded",
        "customer": "cus_1",
        "description": "Pro plan"
    })
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn redelivered_payment_yields_one_transaction_and_one_invoice() {
    let harness = Harness::new();
    let envelope = stripe("evt_1", "payment_intent.succeeded", 1_700_000_000, succeeded_intent());

    assert_eq!(harness.deliver(envelope.clone()).await, ReconcileOutcome::Processed);
    assert_eq!(harness.deliver(envelope).await, ReconcileOutcome::Duplicate);

    let tx = harness
        .stores
        .transactions
        .find_by_external_id(Provider::Stripe, "pi_1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(tx.status, PaymentStatus::Succeeded);
    assert!(harness.stores.invoices.find_by_transaction(&tx.id).await.unwrap().is_some());
}

#[tokio::test]
async fn same_payment_under_new_event_id_keeps_one_invoice() {
    let harness = Harness::new();

    for event_id in ["evt_1", "evt_2"] {
        let envelope =
            stripe(event_id, "payment_intent.succeeded", 1_700_000_000, succeeded_intent());
        assert_eq!(harness.deliver(envelope).await, ReconcileOutcome::Processed);
    }

    let tx = harness
        .stores
        .transactions
        .find_by_external_id(Provider::Stripe, "pi_1")
        .await
        .unwrap()
        .unwrap();
    let invoice = harness.stores.invoices.find_by_transaction(&tx.id).await.unwrap().unwrap();
    assert_eq!(invoice.totals.total, 5000);
    assert_eq!(invoice.totals.amount_due, 0);
}

#[tokio::test]
async fn full_charge_refund_creates_refunds_and_marks_transaction() {
    let harness = Harness::new();
    harness
        .deliver(stripe("evt_1", "payment_intent.succeeded", 1_700_000_000, succeeded_intent()))
        .await;

    let charge = json!({
        "id": "ch_1",
        "amount": 5000,
        "amount_refunded": 5000,
        "currency": "usd",
        "payment_intent": "pi_1",
        "refunded": true,
        "refunds": { "data": [
            { "id": "re_1", "amount": 2000, "status": "succeeded" },
            { "id": "re_2", "amount": 3000, "status": "succeeded" }
        ]}
    });
    let outcome = harness
        .deliver(stripe("evt_2", "charge.refunded", 1_700_000_100, charge))
        .await;
    assert_eq!(outcome, ReconcileOutcome::Processed);

    let tx = harness
        .stores
        .transactions
        .find_by_external_id(Provider::Stripe, "pi_1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(tx.status, PaymentStatus::Refunded);

    for (id, amount) in [("re_1", 2000), ("re_2", 3000)] {
        let refund = harness
            .stores
            .refunds
            .find_by_external_id(Provider::Stripe, id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(refund.amount, amount);
        assert_eq!(refund.status, RefundStatus::Succeeded);
        assert_eq!(refund.transaction_id, Some(tx.id));
    }
    assert_eq!(
        harness.stores.refunds.sum_succeeded_for_transaction(&tx.id).await.unwrap(),
        5000
    );
}

#[tokio::test]
async fn unmapped_subscription_status_is_stored_incomplete() {
    let harness = Harness::new();
    let subscription = json!({
        "id": "sub_1",
        "customer": "cus_1",
        "status": "weird_state",
        "items": { "data": [{
            "quantity": 1,
            "price": {
                "id": "price_basic",
                "unit_amount": 900,
                "currency": "usd",
                "recurring": { "interval": "month", "interval_count": 1 }
            }
        }]}
    });

    let outcome = harness
        .deliver(stripe("evt_1", "customer.subscription.updated", 1_700_000_000, subscription))
        .await;
    assert_eq!(outcome, ReconcileOutcome::Processed);

    let stored = harness
        .stores
        .subscriptions
        .find_by_external_id(Provider::Stripe, "sub_1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, SubscriptionStatus::Incomplete);
}

#[tokio::test]
async fn completed_order_cannot_return_to_pending() {
    let harness = Harness::new();
    let mut order = Order::new(Timestamp::now());
    for status in [
        OrderStatus::Confirmed,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Completed,
    ] {
        order.transition_to(status, Timestamp::now()).unwrap();
    }
    harness.stores.orders.save(&order).await.unwrap();

    let err = harness
        .services
        .orders
        .handle(TransitionOrderCommand {
            order_id: order.id,
            target: OrderStatus::Pending,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, TransitionOrderError::InvalidTransition(_)));

    let stored = harness.stores.orders.find_by_id(&order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Completed);
    assert_eq!(stored.completed_at, order.completed_at);
}

// =============================================================================
// Deferred work
// =============================================================================

#[tokio::test]
async fn dispatcher_renders_the_invoice_document() {
    let harness = Harness::new();
    harness
        .stores
        .customers
        .save(
            &PaymentCustomer::new(UserId::new("user-1").unwrap(), Provider::Stripe, "cus_1")
                .with_contact("Ada Lovelace", "ada@example.com"),
        )
        .await
        .unwrap();

    harness
        .deliver(stripe("evt_1", "payment_intent.succeeded", 1_700_000_000, succeeded_intent()))
        .await;

    let Harness {
        stores,
        services,
        _documents,
    } = harness;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let dispatcher = tokio::spawn(services.dispatcher.run(shutdown_rx));

    let tx = stores
        .transactions
        .find_by_external_id(Provider::Stripe, "pi_1")
        .await
        .unwrap()
        .unwrap();

    let mut document_path = None;
    for _ in 0..50 {
        let invoice = stores.invoices.find_by_transaction(&tx.id).await.unwrap().unwrap();
        if invoice.document_path.is_some() {
            document_path = invoice.document_path;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    shutdown_tx.send(true).unwrap();
    dispatcher.await.unwrap();

    let document_path = document_path.expect("document was never generated");
    assert!(document_path.starts_with("invoices/"));
    let bytes = std::fs::read(_documents.path().join(&document_path)).unwrap();
    assert!(String::from_utf8(bytes).unwrap().contains("Ada Lovelace"));
}

/// Consumer whose every attempt hangs.
struct StuckConsumer;

#[async_trait]
impl EventHandler for StuckConsumer {
    async fn handle(&self, _event: EventEnvelope) -> Result<(), DomainError> {
        std::future::pending::<()>().await;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "StuckConsumer"
    }
}

#[tokio::test]
async fn stuck_consumer_never_fails_a_webhook() {
    let documents = TempDir::new().unwrap();
    let stores = LedgerStores::in_memory();
    let (bus, dispatcher) = ChannelEventBus::new(ChannelEventBusConfig {
        capacity: 2,
        max_in_flight: 1,
        ..Default::default()
    });
    let bus = Arc::new(bus);
    bus.subscribe_all(
        &[PaymentSucceeded::TYPE, InvoiceIssued::TYPE],
        Arc::new(StuckConsumer),
    );
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = tokio::spawn(dispatcher.run(shutdown_rx));

    let pipeline = Arc::new(InvoicePipeline::new(
        stores.invoices.clone(),
        stores.customers.clone(),
        Arc::new(LocalInvoiceDocumentStorage::new(documents.path())),
        Arc::new(MarkdownInvoiceRenderer::new()),
    ));
    let reconciler = Arc::new(Reconciler::new(
        stores.transactions.clone(),
        stores.subscriptions.clone(),
        stores.refunds.clone(),
        stores.invoices.clone(),
        stores.customers.clone(),
        pipeline,
        bus,
    ));
    let processor = ProcessWebhookHandler::new(
        stores.webhook_events.clone(),
        StripeEventHandler::new(reconciler.clone()),
        PayPalEventHandler::new(reconciler),
        Duration::from_millis(500),
    );

    for i in 0..6 {
        let envelope = stripe(
            &format!("evt_{i}"),
            "payment_intent.succeeded",
            1_700_000_000 + i,
            payment_intent(&format!("pi_{i}")),
        );
        let outcome = processor.handle(ProcessWebhookCommand { envelope }).await;
        assert_eq!(outcome.unwrap(), ReconcileOutcome::Processed, "delivery {i}");
    }
    worker.abort();

    for i in 0..6 {
        let tx = stores
            .transactions
            .find_by_external_id(Provider::Stripe, &format!("pi_{i}"))
            .await
            .unwrap();
        assert!(tx.is_some());
    }
}
