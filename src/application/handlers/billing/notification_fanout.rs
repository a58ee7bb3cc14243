//! NotificationFanout - turns ledger events into user notifications.
//!
//! Runs as its own consumer on the event channel. Nothing here can fail a
//! reconciliation: by the time an event arrives the ledger write is done.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::domain::billing::{
    PaymentFailed, PaymentSucceeded, RefundProcessed, SubscriptionCanceled, SubscriptionCreated,
};
use crate::domain::foundation::{CustomerId, Currency, DomainError, ErrorCode, EventEnvelope};
use crate::ports::{
    CustomerRepository, EventHandler, NotificationError, NotificationSink, NotificationTemplate,
};

/// Event types the fan-out subscribes to.
pub const NOTIFIED_EVENT_TYPES: [&str; 5] = [
    PaymentSucceeded::TYPE,
    PaymentFailed::TYPE,
    SubscriptionCreated::TYPE,
    SubscriptionCanceled::TYPE,
    RefundProcessed::TYPE,
];

/// Fields every notified event carries.
#[derive(Debug, Deserialize)]
struct NotifiedEvent {
    customer_id: Option<CustomerId>,
    amount: Option<i64>,
    currency: Option<String>,
}

pub struct NotificationFanout {
    customers: Arc<dyn CustomerRepository>,
    sink: Arc<dyn NotificationSink>,
}

impl NotificationFanout {
    pub fn new(customers: Arc<dyn CustomerRepository>, sink: Arc<dyn NotificationSink>) -> Self {
        Self { customers, sink }
    }

    fn template_for(event_type: &str) -> Option<NotificationTemplate> {
        match event_type {
            PaymentSucceeded::TYPE => Some(NotificationTemplate::PaymentSucceeded),
            PaymentFailed::TYPE => Some(NotificationTemplate::PaymentFailed),
            SubscriptionCreated::TYPE => Some(NotificationTemplate::SubscriptionCreated),
            SubscriptionCanceled::TYPE => Some(NotificationTemplate::SubscriptionCanceled),
            RefundProcessed::TYPE => Some(NotificationTemplate::RefundProcessed),
            _ => None,
        }
    }

    /// Display amount such as `"12.50 USD"` when the event carries money.
    fn amount_display(event: &NotifiedEvent) -> Option<String> {
        let amount = event.amount?;
        let currency = Currency::new(event.currency.as_deref()?).ok()?;
        Some(format!(
            "{} {}",
            currency.format_minor_units(amount),
            currency.as_str().to_uppercase()
        ))
    }
}

#[async_trait]
impl EventHandler for NotificationFanout {
    async fn handle(&self, event: EventEnvelope) -> Result<(), DomainError> {
        let Some(template) = Self::template_for(&event.event_type) else {
            debug!(event_type = %event.event_type, "No notification for event type");
            return Ok(());
        };

        let notified: NotifiedEvent = event.payload_as().map_err(|e| {
            DomainError::new(
                ErrorCode::InvalidFormat,
                format!("Invalid {} payload: {}", event.event_type, e),
            )
        })?;

        let Some(customer_id) = notified.customer_id else {
            info!(
                event_id = %event.event_id,
                %template,
                "Event has no customer linkage, skipping notification"
            );
            return Ok(());
        };
        let Some(customer) = self.customers.find_by_id(&customer_id).await? else {
            warn!(
                event_id = %event.event_id,
                %customer_id,
                "Linked customer not found, skipping notification"
            );
            return Ok(());
        };

        let context = json!({
            "email": customer.email,
            "name": customer.name,
            "amount_display": Self::amount_display(&notified),
            "event": event.payload,
        });

        match self.sink.send(&customer.user_id, template, context).await {
            Ok(()) => {
                info!(user_id = %customer.user_id, %template, "Notification sent");
                Ok(())
            }
            Err(NotificationError::UnknownRecipient(user)) => {
                warn!(user_id = %user, %template, "No address for user, notification dropped");
                Ok(())
            }
            Err(e) => Err(DomainError::new(ErrorCode::DeliveryFailed, e.to_string())),
        }
    }

    fn name(&self) -> &'static str {
        "NotificationFanout"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryCustomerRepository;
    use crate::domain::billing::{sample_new_transaction, PaymentCustomer, PaymentStatus, Provider};
    use crate::domain::foundation::{Timestamp, TransactionId, UserId};
    use crate::ports::recipient_email;
    use serde_json::Value as JsonValue;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<(UserId, NotificationTemplate, JsonValue)>>,
        fail_with: Option<u16>,
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn send(
            &self,
            user_id: &UserId,
            template: NotificationTemplate,
            context: JsonValue,
        ) -> Result<(), NotificationError> {
            if let Some(status) = self.fail_with {
                return Err(NotificationError::Rejected {
                    status,
                    message: "rejected".to_string(),
                });
            }
            self.sent.lock().unwrap().push((user_id.clone(), template, context));
            Ok(())
        }
    }

    async fn linked_customer(repo: &InMemoryCustomerRepository) -> PaymentCustomer {
        let customer = PaymentCustomer::new(
            UserId::new("user-1").unwrap(),
            Provider::Stripe,
            "cus_1",
        )
        .with_contact("Ada", "ada@example.com");
        repo.save(&customer).await.unwrap();
        customer
    }

    fn succeeded_event(customer: Option<CustomerId>) -> EventEnvelope {
        let mut tx = sample_new_transaction("pi_1", PaymentStatus::Succeeded)
            .into_transaction(TransactionId::new(), Timestamp::now());
        tx.customer_id = customer;
        let event = PaymentSucceeded::from_transaction(&tx, Timestamp::now());
        EventEnvelope::from_event(&event).unwrap()
    }

    #[tokio::test]
    async fn payment_success_notifies_linked_user() {
        let customers = Arc::new(InMemoryCustomerRepository::new());
        let customer = linked_customer(&customers).await;
        let sink = Arc::new(RecordingSink::default());
        let fanout = NotificationFanout::new(customers, sink.clone());

        fanout.handle(succeeded_event(Some(customer.id))).await.unwrap();

        let sent = sink.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, customer.user_id);
        assert_eq!(sent[0].1, NotificationTemplate::PaymentSucceeded);
        assert_eq!(recipient_email(&sent[0].2), Some("ada@example.com"));
        assert_eq!(sent[0].2["amount_display"], "20.00 USD");
    }

    #[tokio::test]
    async fn missing_linkage_is_skipped() {
        let sink = Arc::new(RecordingSink::default());
        let customers = Arc::new(InMemoryCustomerRepository::new());
        let fanout = NotificationFanout::new(customers, sink.clone());

        fanout.handle(succeeded_event(None)).await.unwrap();
        fanout.handle(succeeded_event(Some(CustomerId::new()))).await.unwrap();

        assert!(sink.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejected_delivery_is_reported_for_retry() {
        let customers = Arc::new(InMemoryCustomerRepository::new());
        let customer = linked_customer(&customers).await;
        let sink = Arc::new(RecordingSink {
            fail_with: Some(503),
            ..Default::default()
        });
        let fanout = NotificationFanout::new(customers, sink);

        let err = fanout.handle(succeeded_event(Some(customer.id))).await.unwrap_err();

        assert_eq!(err.code, ErrorCode::DeliveryFailed);
    }
}
