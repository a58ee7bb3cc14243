//! Reconciler - applies provider-neutral facts to the ledger.
//!
//! Every step is an idempotent upsert keyed on `(provider, external_id)`, so a
//! replayed webhook converges on the same rows. Domain events are published
//! when a record first enters a status; their ids are derived from the fact,
//! which lets consumers drop the duplicates a replay or a race produces.

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::InvoicePipeline;
use crate::domain::billing::{
    ChargeRefundFact, Invoice, InvoiceFact, InvoiceIssued, InvoiceTotals, NewRefund,
    NewTransaction, PaymentCustomer, PaymentFact, PaymentFailed, PaymentStatus, PaymentSucceeded,
    Provider, RefundCoverage, RefundProcessed, RefundStatus, SubscriptionCanceled,
    SubscriptionChange, SubscriptionCreated, SubscriptionFact, SubscriptionSnapshot,
    SubscriptionStatus, Transaction,
};
use crate::domain::foundation::{
    DomainError, DomainEvent, EventEnvelope, InvoiceId, SubscriptionId, Timestamp,
};
use crate::domain::webhook::{ReconcileError, ReconcileOutcome};
use crate::ports::{
    CustomerRepository, EventPublisher, InvoiceRepository, RefundRepository, SnapshotApplied,
    SubscriptionRepository, TransactionRepository,
};

/// Runs `op`, retrying it once when storage reports a uniqueness violation.
///
/// Two deliveries racing on the same key make one insert lose; the retry
/// then takes the update path. A second violation is fatal.
async fn with_conflict_retry<T, F, Fut>(
    what: &'static str,
    mut op: F,
) -> Result<T, ReconcileError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DomainError>>,
{
    match op().await {
        Err(e) if e.is_unique_violation() => {
            debug!(entity = what, error = %e, "Unique violation, retrying as update");
            op().await.map_err(|e| {
                if e.is_unique_violation() {
                    ReconcileError::StorageConflict(what.to_string())
                } else {
                    e.into()
                }
            })
        }
        other => other.map_err(ReconcileError::from),
    }
}

pub struct Reconciler {
    transactions: Arc<dyn TransactionRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    refunds: Arc<dyn RefundRepository>,
    invoices: Arc<dyn InvoiceRepository>,
    customers: Arc<dyn CustomerRepository>,
    pipeline: Arc<InvoicePipeline>,
    event_publisher: Arc<dyn EventPublisher>,
}

impl Reconciler {
    pub fn new(
        transactions: Arc<dyn TransactionRepository>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        refunds: Arc<dyn RefundRepository>,
        invoices: Arc<dyn InvoiceRepository>,
        customers: Arc<dyn CustomerRepository>,
        pipeline: Arc<InvoicePipeline>,
        event_publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            transactions,
            subscriptions,
            refunds,
            invoices,
            customers,
            pipeline,
            event_publisher,
        }
    }

    /// Records a payment and, once it has succeeded, its invoice.
    ///
    /// Invoice derivation is keyed on "succeeded and no invoice yet" rather
    /// than on `was_created`, so a replay completes a derivation an earlier
    /// attempt did not finish. Payments that settle a provider invoice only
    /// link to it; the provider invoice event owns that invoice.
    pub async fn record_payment(
        &self,
        fact: PaymentFact,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let customer = self
            .resolve_customer(fact.provider, fact.customer_ref.as_deref())
            .await?;
        let subscription_id = self
            .resolve_subscription(fact.provider, fact.subscription_ref.as_deref())
            .await?;
        let occurred_at = fact.occurred_at;
        let provider_invoice_ref = fact.provider_invoice_ref;

        let new = NewTransaction {
            provider: fact.provider,
            external_id: fact.external_id,
            customer_id: customer.map(|c| c.id),
            subscription_id,
            amount: fact.amount,
            currency: fact.currency,
            status: fact.status,
            payment_method: fact.payment_method,
            description: fact.description,
            failure_reason: fact.failure_reason,
            raw_response: fact.raw,
        };

        let upserted = with_conflict_retry("transaction", || self.transactions.upsert(&new)).await?;
        let tx = &upserted.record;
        info!(
            transaction_id = %tx.id,
            provider = %tx.provider,
            external_id = %tx.external_id,
            status = %tx.status,
            was_created = upserted.was_created,
            "Transaction reconciled"
        );

        if upserted.entered(PaymentStatus::Succeeded, tx.status) {
            self.publish(&PaymentSucceeded::from_transaction(tx, occurred_at)).await;
        }
        if upserted.entered(PaymentStatus::Failed, tx.status) {
            self.publish(&PaymentFailed::from_transaction(tx, occurred_at)).await;
        }
        self.link_early_refunds(tx).await?;

        if tx.is_succeeded() {
            match provider_invoice_ref {
                Some(invoice_ref) => self.link_provider_invoice(tx, &invoice_ref).await?,
                None => {
                    let (invoice, created) = self.pipeline.create_from_transaction(tx).await?;
                    if created {
                        self.publish(&InvoiceIssued::from_invoice(&invoice)).await;
                    }
                }
            }
        }

        Ok(ReconcileOutcome::Processed)
    }

    /// Records every refund in the notification and settles the parent.
    ///
    /// The parent becomes `refunded` only when the provider reports the
    /// payment as fully refunded. A refund whose parent is unknown is kept
    /// with no linkage.
    pub async fn record_charge_refund(
        &self,
        fact: ChargeRefundFact,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let parent = match fact.transaction_ref.as_deref() {
            Some(reference) => {
                self.transactions
                    .find_by_external_id(fact.provider, reference)
                    .await?
            }
            None => None,
        };
        if parent.is_none() {
            debug!(
                provider = %fact.provider,
                transaction_ref = ?fact.transaction_ref,
                "Refund parent not on record, storing without linkage"
            );
        }

        let mut newly_succeeded = Vec::new();
        for refund in fact.refunds {
            let new = NewRefund {
                provider: fact.provider,
                external_id: refund.external_id,
                transaction_id: parent.as_ref().map(|tx| tx.id),
                transaction_ref: fact.transaction_ref.clone(),
                amount: refund.amount,
                currency: refund.currency,
                status: refund.status,
                reason: refund.reason,
                failure_reason: refund.failure_reason,
            };

            let upserted = with_conflict_retry("refund", || self.refunds.upsert(&new)).await?;
            debug!(
                refund_id = %upserted.record.id,
                external_id = %upserted.record.external_id,
                status = %upserted.record.status,
                was_created = upserted.was_created,
                "Refund reconciled"
            );
            if upserted.entered(RefundStatus::Succeeded, upserted.record.status) {
                newly_succeeded.push(upserted.record);
            }
        }

        let mut over_refunded = false;
        if let Some(tx) = &parent {
            let refunded = self.refunds.sum_succeeded_for_transaction(&tx.id).await?;
            if refunded > tx.amount {
                warn!(
                    transaction_id = %tx.id,
                    amount = tx.amount,
                    refunded,
                    "Succeeded refunds exceed the transaction amount"
                );
                over_refunded = true;
            }

            let fully_refunded = match fact.coverage {
                RefundCoverage::Full => true,
                RefundCoverage::Partial => false,
                RefundCoverage::ReportedTotal(total) => total >= tx.amount,
                RefundCoverage::Derive => refunded >= tx.amount,
            };
            if fully_refunded && self.transactions.mark_refunded(&tx.id).await? {
                info!(transaction_id = %tx.id, "Transaction fully refunded");
            }
        }

        let customer_id = parent.as_ref().and_then(|tx| tx.customer_id);
        for refund in &newly_succeeded {
            let event =
                RefundProcessed::from_refund(refund, customer_id, over_refunded, fact.occurred_at);
            self.publish(&event).await;
        }

        Ok(ReconcileOutcome::Processed)
    }

    /// Replaces the stored subscription with the provider snapshot.
    ///
    /// A snapshot older than the stored one is reported as `Stale` and
    /// leaves no trace.
    pub async fn record_subscription(
        &self,
        fact: SubscriptionFact,
        change: SubscriptionChange,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let customer = self
            .resolve_customer(fact.provider, fact.customer_ref.as_deref())
            .await?;
        let canceled = change == SubscriptionChange::Canceled;

        let snapshot = SubscriptionSnapshot {
            provider: fact.provider,
            external_id: fact.external_id,
            customer_id: customer.map(|c| c.id),
            plan_id: fact.plan_id,
            status: if canceled { SubscriptionStatus::Canceled } else { fact.status },
            amount: fact.amount,
            currency: fact.currency,
            interval: fact.interval,
            interval_count: fact.interval_count,
            quantity: fact.quantity,
            current_period_start: fact.current_period_start,
            current_period_end: fact.current_period_end,
            trial_start: fact.trial_start,
            trial_end: fact.trial_end,
            canceled_at: fact.canceled_at.or(canceled.then_some(fact.occurred_at)),
            ended_at: fact.ended_at,
            cancel_at_period_end: fact.cancel_at_period_end,
            raw_response: fact.raw,
            event_at: fact.occurred_at,
        };

        let applied = with_conflict_retry("subscription", || {
            self.subscriptions.upsert_snapshot(&snapshot)
        })
        .await?;

        match applied {
            SnapshotApplied::Stale(current) => {
                info!(
                    subscription_id = %current.id,
                    external_id = %current.external_id,
                    stored_event_at = %current.last_event_at,
                    incoming_event_at = %snapshot.event_at,
                    "Ignoring stale subscription snapshot"
                );
                Ok(ReconcileOutcome::Stale)
            }
            SnapshotApplied::Applied(upserted) => {
                let sub = &upserted.record;
                info!(
                    subscription_id = %sub.id,
                    external_id = %sub.external_id,
                    status = %sub.status,
                    was_created = upserted.was_created,
                    "Subscription reconciled"
                );
                if upserted.was_created {
                    self.publish(&SubscriptionCreated::from_subscription(sub)).await;
                }
                if upserted.entered(SubscriptionStatus::Canceled, sub.status) {
                    self.publish(&SubscriptionCanceled::from_subscription(sub)).await;
                }
                Ok(ReconcileOutcome::Processed)
            }
        }
    }

    /// Records a provider-issued invoice.
    ///
    /// An invoice already derived locally for the same payment is adopted
    /// instead of duplicated. A payment recorded without its subscription
    /// picks the subscription up from the invoice.
    pub async fn record_provider_invoice(
        &self,
        fact: InvoiceFact,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let customer = self
            .resolve_customer(fact.provider, fact.customer_ref.as_deref())
            .await?;
        let subscription_id = self
            .resolve_subscription(fact.provider, fact.subscription_ref.as_deref())
            .await?;
        let transaction = match fact.transaction_ref.as_deref() {
            Some(reference) => {
                self.transactions
                    .find_by_external_id(fact.provider, reference)
                    .await?
            }
            None => None,
        };
        if let (Some(tx), Some(subscription_id)) = (&transaction, subscription_id) {
            self.link_subscription(tx, subscription_id).await?;
        }
        let transaction_id = transaction.map(|tx| tx.id);

        let totals = InvoiceTotals::from_provider(
            fact.subtotal,
            fact.tax,
            fact.discount,
            fact.total,
            fact.amount_paid,
        )?;
        let billing = match &customer {
            Some(c) if fact.billing.is_empty() => c.billing_details(),
            _ => fact.billing,
        };

        let now = Timestamp::now();
        let id = InvoiceId::new();
        let incoming = Invoice {
            id,
            customer_id: customer.map(|c| c.id),
            subscription_id,
            transaction_id,
            number: fact
                .number
                .unwrap_or_else(|| Invoice::generate_number(id, fact.issued_at)),
            provider: fact.provider,
            external_id: Some(fact.external_id),
            status: fact.status,
            totals,
            currency: fact.currency,
            billing,
            line_items: fact.line_items,
            issued_at: fact.issued_at,
            due_at: fact.due_at,
            paid_at: fact.paid_at,
            period_start: fact.period_start,
            period_end: fact.period_end,
            document_path: None,
            document_generated_at: None,
            created_at: now,
            updated_at: now,
        };

        if let Some(tx_id) = transaction_id {
            if let Some(mut derived) = self.invoices.find_by_transaction(&tx_id).await? {
                if derived.external_id.is_none() {
                    derived.absorb(incoming, now);
                    self.invoices.update(&derived).await?;
                    info!(
                        invoice_id = %derived.id,
                        external_id = ?derived.external_id,
                        "Adopted derived invoice for provider invoice"
                    );
                    return Ok(ReconcileOutcome::Processed);
                }
            }
        }

        let upserted = with_conflict_retry("invoice", || {
            self.invoices.upsert_provider_invoice(&incoming)
        })
        .await?;
        info!(
            invoice_id = %upserted.record.id,
            number = %upserted.record.number,
            status = %upserted.record.status,
            was_created = upserted.was_created,
            "Provider invoice reconciled"
        );
        if upserted.was_created {
            self.publish(&InvoiceIssued::from_invoice(&upserted.record)).await;
        }

        Ok(ReconcileOutcome::Processed)
    }

    async fn link_provider_invoice(
        &self,
        tx: &Transaction,
        invoice_ref: &str,
    ) -> Result<(), ReconcileError> {
        let found = self
            .invoices
            .find_by_external_id(tx.provider, invoice_ref)
            .await?;
        let Some(mut invoice) = found else {
            debug!(invoice_ref, "Provider invoice not on record yet");
            return Ok(());
        };
        if let Some(subscription_id) = invoice.subscription_id {
            self.link_subscription(tx, subscription_id).await?;
        }
        if invoice.transaction_id.is_none() {
            invoice.transaction_id = Some(tx.id);
            invoice.updated_at = Timestamp::now();
            self.invoices.update(&invoice).await?;
        }
        Ok(())
    }

    async fn link_subscription(
        &self,
        tx: &Transaction,
        subscription_id: SubscriptionId,
    ) -> Result<(), ReconcileError> {
        if tx.subscription_id.is_none()
            && self
                .transactions
                .link_subscription(&tx.id, &subscription_id)
                .await?
        {
            debug!(
                transaction_id = %tx.id,
                %subscription_id,
                "Linked transaction to subscription"
            );
        }
        Ok(())
    }

    /// Links refunds recorded before this payment and settles the payment
    /// once they cover it.
    async fn link_early_refunds(&self, tx: &Transaction) -> Result<(), ReconcileError> {
        let linked = self
            .refunds
            .link_orphans(tx.provider, &tx.external_id, &tx.id)
            .await?;
        if linked == 0 {
            return Ok(());
        }

        let refunded = self.refunds.sum_succeeded_for_transaction(&tx.id).await?;
        info!(
            transaction_id = %tx.id,
            linked,
            refunded,
            "Linked refunds recorded before their payment"
        );
        if tx.is_succeeded()
            && refunded >= tx.amount
            && self.transactions.mark_refunded(&tx.id).await?
        {
            info!(transaction_id = %tx.id, "Transaction fully refunded");
        }
        Ok(())
    }

    async fn resolve_customer(
        &self,
        provider: Provider,
        reference: Option<&str>,
    ) -> Result<Option<PaymentCustomer>, ReconcileError> {
        let Some(reference) = reference else {
            return Ok(None);
        };
        let customer = self.customers.find_by_external_id(provider, reference).await?;
        if customer.is_none() {
            debug!(
                %provider,
                customer_ref = reference,
                "No local customer for provider reference"
            );
        }
        Ok(customer)
    }

    async fn resolve_subscription(
        &self,
        provider: Provider,
        reference: Option<&str>,
    ) -> Result<Option<SubscriptionId>, ReconcileError> {
        let Some(reference) = reference else {
            return Ok(None);
        };
        Ok(self
            .subscriptions
            .find_by_external_id(provider, reference)
            .await?
            .map(|s| s.id))
    }

    /// Publishes `event`; failures are logged and never fail reconciliation.
    async fn publish<E: DomainEvent + Serialize>(&self, event: &E) {
        let envelope = match EventEnvelope::from_event(event) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(
                    event_type = event.event_type(),
                    error = %e,
                    "Failed to build event envelope"
                );
                return;
            }
        };
        if let Err(e) = self.event_publisher.publish(envelope).await {
            warn!(
                event_type = event.event_type(),
                event_id = %event.event_id(),
                error = %e,
                "Failed to publish domain event"
            );
        }
    }
}
