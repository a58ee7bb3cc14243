//! Stripe webhook event types.
//!
//! Only the fields the reconciler reads are captured; everything else in
//! Stripe's schema is ignored. Amounts are integer minor units and
//! timestamps are Unix seconds.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;

use super::errors::ReconcileError;
use crate::domain::billing::{
    translate, Address, BillingDetails, BillingInterval, ChargeRefundFact, InvoiceFact,
    InvoiceStatus, LineItem, PaymentFact, PaymentStatus, Provider, RefundCoverage, RefundFact,
    RefundStatus, SubscriptionFact, SubscriptionStatus,
};
use crate::domain::foundation::{Currency, Timestamp};

/// Stripe webhook event.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeEvent {
    /// Event id (evt_xxx).
    pub id: String,

    #[serde(rename = "type")]
    pub event_type: String,

    /// Unix seconds.
    pub created: i64,

    pub data: StripeEventData,

    #[serde(default)]
    pub livemode: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeEventData {
    pub object: JsonValue,
}

/// Closed set of Stripe events the reconciler acts on.
#[derive(Debug, Clone)]
pub enum StripeEventKind {
    PaymentIntentSucceeded(StripePaymentIntent),
    PaymentIntentFailed(StripePaymentIntent),
    ChargeRefunded(StripeCharge),
    SubscriptionCreated(StripeSubscription),
    SubscriptionUpdated(StripeSubscription),
    SubscriptionDeleted(StripeSubscription),
    InvoicePaid(StripeInvoice),
    InvoicePaymentFailed(StripeInvoice),
    Unrecognized(String),
}

impl StripeEvent {
    /// Parses the provider payload.
    pub fn parse(payload: &JsonValue) -> Result<Self, ReconcileError> {
        Ok(StripeEvent::deserialize(payload)?)
    }

    pub fn occurred_at(&self) -> Result<Timestamp, ReconcileError> {
        Ok(Timestamp::from_unix_secs(self.created)?)
    }

    /// Classifies the event by `event_type` and decodes its object.
    ///
    /// The envelope's event type wins over the payload's `type` field.
    pub fn kind(&self, event_type: &str) -> Result<StripeEventKind, ReconcileError> {
        use StripeEventKind::*;
        let kind = match event_type {
            "payment_intent.succeeded" => PaymentIntentSucceeded(self.object()?),
            "payment_intent.payment_failed" | "payment_intent.canceled" => {
                PaymentIntentFailed(self.object()?)
            }
            "charge.refunded" => ChargeRefunded(self.object()?),
            "customer.subscription.created" => SubscriptionCreated(self.object()?),
            "customer.subscription.updated"
            | "customer.subscription.paused"
            | "customer.subscription.resumed" => SubscriptionUpdated(self.object()?),
            "customer.subscription.deleted" => SubscriptionDeleted(self.object()?),
            "invoice.paid" | "invoice.payment_succeeded" => InvoicePaid(self.object()?),
            "invoice.payment_failed" => InvoicePaymentFailed(self.object()?),
            other => Unrecognized(other.to_string()),
        };
        Ok(kind)
    }

    fn object<T: serde::de::DeserializeOwned>(&self) -> Result<T, ReconcileError> {
        serde_json::from_value(self.data.object.clone()).map_err(|e| {
            ReconcileError::MalformedPayload(format!("data.object: {}", e))
        })
    }
}

/// A reference that Stripe may send as an id or as an expanded object.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Expandable {
    Id(String),
    Object { id: String },
}

impl Expandable {
    pub fn id(&self) -> &str {
        match self {
            Expandable::Id(id) => id,
            Expandable::Object { id } => id,
        }
    }
}

fn expanded_id(value: &Option<Expandable>) -> Option<String> {
    value.as_ref().map(|v| v.id().to_string())
}

fn optional_timestamp(secs: Option<i64>) -> Result<Option<Timestamp>, ReconcileError> {
    secs.map(Timestamp::from_unix_secs)
        .transpose()
        .map_err(ReconcileError::from)
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripePaymentError {
    pub code: Option<String>,
    pub message: Option<String>,
}

/// `payment_intent` object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripePaymentIntent {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub status: String,
    pub customer: Option<Expandable>,
    /// Set when the intent pays a Stripe invoice.
    pub invoice: Option<Expandable>,
    pub description: Option<String>,
    #[serde(default)]
    pub payment_method_types: Vec<String>,
    pub last_payment_error: Option<StripePaymentError>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl StripePaymentIntent {
    pub fn into_fact(
        self,
        occurred_at: Timestamp,
        raw: JsonValue,
    ) -> Result<PaymentFact, ReconcileError> {
        let failure_reason = self
            .last_payment_error
            .as_ref()
            .and_then(|e| e.message.clone().or_else(|| e.code.clone()));

        Ok(PaymentFact {
            provider: Provider::Stripe,
            customer_ref: expanded_id(&self.customer),
            subscription_ref: self.metadata.get("subscription_id").cloned(),
            provider_invoice_ref: expanded_id(&self.invoice),
            amount: self.amount,
            currency: Currency::new(&self.currency)?,
            status: translate::<PaymentStatus>(Provider::Stripe, &self.status),
            payment_method: self.payment_method_types.into_iter().next(),
            description: self.description,
            failure_reason,
            occurred_at,
            raw,
            external_id: self.id,
        })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeList<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

/// `refund` object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeRefund {
    pub id: String,
    pub amount: i64,
    pub currency: Option<String>,
    pub status: Option<String>,
    pub reason: Option<String>,
    pub failure_reason: Option<String>,
}

/// `charge` object as sent with `charge.refunded`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeCharge {
    pub id: String,
    pub amount: i64,
    #[serde(default)]
    pub amount_refunded: i64,
    pub currency: String,
    pub payment_intent: Option<Expandable>,
    /// True once the whole charge has been refunded.
    #[serde(default)]
    pub refunded: bool,
    pub refunds: Option<StripeList<StripeRefund>>,
}

impl StripeCharge {
    /// The transaction is keyed by payment intent; bare charges use the charge id.
    pub fn into_fact(self, occurred_at: Timestamp) -> Result<ChargeRefundFact, ReconcileError> {
        let charge_currency = Currency::new(&self.currency)?;
        let refunds = self
            .refunds
            .map(|list| list.data)
            .unwrap_or_default()
            .into_iter()
            .map(|refund| {
                let currency = match refund.currency.as_deref() {
                    Some(code) => Currency::new(code)?,
                    None => charge_currency.clone(),
                };
                Ok(RefundFact {
                    status: translate::<RefundStatus>(
                        Provider::Stripe,
                        refund.status.as_deref().unwrap_or_default(),
                    ),
                    external_id: refund.id,
                    amount: refund.amount,
                    currency,
                    reason: refund.reason,
                    failure_reason: refund.failure_reason,
                })
            })
            .collect::<Result<Vec<_>, ReconcileError>>()?;

        Ok(ChargeRefundFact {
            provider: Provider::Stripe,
            transaction_ref: Some(expanded_id(&self.payment_intent).unwrap_or(self.id)),
            refunds,
            coverage: if self.refunded {
                RefundCoverage::Full
            } else {
                RefundCoverage::Partial
            },
            occurred_at,
        })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeRecurring {
    pub interval: String,
    pub interval_count: Option<i32>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripePrice {
    pub id: String,
    pub unit_amount: Option<i64>,
    pub currency: Option<String>,
    pub recurring: Option<StripeRecurring>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeSubscriptionItem {
    pub price: Option<StripePrice>,
    pub quantity: Option<i32>,
    pub current_period_start: Option<i64>,
    pub current_period_end: Option<i64>,
}

/// `subscription` object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeSubscription {
    pub id: String,
    pub customer: Option<Expandable>,
    pub status: String,
    pub currency: Option<String>,
    pub items: Option<StripeList<StripeSubscriptionItem>>,
    pub current_period_start: Option<i64>,
    pub current_period_end: Option<i64>,
    pub trial_start: Option<i64>,
    pub trial_end: Option<i64>,
    pub canceled_at: Option<i64>,
    pub ended_at: Option<i64>,
    #[serde(default)]
    pub cancel_at_period_end: bool,
}

impl StripeSubscription {
    pub fn into_fact(
        self,
        occurred_at: Timestamp,
        raw: JsonValue,
    ) -> Result<SubscriptionFact, ReconcileError> {
        let item = self
            .items
            .as_ref()
            .and_then(|items| items.data.first())
            .cloned();
        let price = item.as_ref().and_then(|i| i.price.clone());
        let recurring = price.as_ref().and_then(|p| p.recurring.clone());

        let currency = self
            .currency
            .as_deref()
            .or_else(|| price.as_ref().and_then(|p| p.currency.as_deref()))
            .map(Currency::new)
            .transpose()?;
        let interval = recurring
            .as_ref()
            .map(|r| r.interval.parse::<BillingInterval>())
            .transpose()?;

        // Newer API versions report billing periods per item.
        let period_start = self
            .current_period_start
            .or_else(|| item.as_ref().and_then(|i| i.current_period_start));
        let period_end = self
            .current_period_end
            .or_else(|| item.as_ref().and_then(|i| i.current_period_end));

        Ok(SubscriptionFact {
            provider: Provider::Stripe,
            customer_ref: expanded_id(&self.customer),
            plan_id: price.as_ref().map(|p| p.id.clone()),
            status: translate::<SubscriptionStatus>(Provider::Stripe, &self.status),
            amount: price.as_ref().and_then(|p| p.unit_amount),
            currency,
            interval,
            interval_count: recurring.and_then(|r| r.interval_count),
            quantity: item.and_then(|i| i.quantity).unwrap_or(1),
            current_period_start: optional_timestamp(period_start)?,
            current_period_end: optional_timestamp(period_end)?,
            trial_start: optional_timestamp(self.trial_start)?,
            trial_end: optional_timestamp(self.trial_end)?,
            canceled_at: optional_timestamp(self.canceled_at)?,
            ended_at: optional_timestamp(self.ended_at)?,
            cancel_at_period_end: self.cancel_at_period_end,
            occurred_at,
            raw,
            external_id: self.id,
        })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeAddress {
    pub line1: Option<String>,
    pub line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeInvoiceLine {
    pub description: Option<String>,
    pub quantity: Option<i64>,
    pub amount: i64,
    pub price: Option<StripePrice>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeDiscountAmount {
    pub amount: i64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StripeStatusTransitions {
    pub paid_at: Option<i64>,
}

/// `invoice` object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeInvoice {
    pub id: String,
    pub number: Option<String>,
    pub customer: Option<Expandable>,
    pub subscription: Option<Expandable>,
    pub payment_intent: Option<Expandable>,
    pub status: Option<String>,
    pub currency: String,
    pub subtotal: i64,
    pub tax: Option<i64>,
    pub total: i64,
    #[serde(default)]
    pub amount_paid: i64,
    pub total_discount_amounts: Option<Vec<StripeDiscountAmount>>,
    pub lines: Option<StripeList<StripeInvoiceLine>>,
    pub created: i64,
    pub due_date: Option<i64>,
    #[serde(default)]
    pub status_transitions: StripeStatusTransitions,
    pub period_start: Option<i64>,
    pub period_end: Option<i64>,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_address: Option<StripeAddress>,
}

impl StripeInvoice {
    pub fn into_fact(self, occurred_at: Timestamp) -> Result<InvoiceFact, ReconcileError> {
        let line_items = self
            .lines
            .map(|lines| lines.data)
            .unwrap_or_default()
            .into_iter()
            .map(|line| {
                let quantity = line.quantity.unwrap_or(1);
                let unit_price = line
                    .price
                    .as_ref()
                    .and_then(|p| p.unit_amount)
                    .unwrap_or(if quantity != 0 { line.amount / quantity } else { line.amount });
                LineItem {
                    description: line.description.unwrap_or_default(),
                    quantity,
                    unit_price,
                    amount: line.amount,
                }
            })
            .collect();

        let billing = BillingDetails {
            name: self.customer_name,
            email: self.customer_email,
            address: self.customer_address.map(|a| Address {
                line1: a.line1,
                line2: a.line2,
                city: a.city,
                state: a.state,
                postal_code: a.postal_code,
                country: a.country,
            }),
        };

        Ok(InvoiceFact {
            provider: Provider::Stripe,
            number: self.number,
            customer_ref: expanded_id(&self.customer),
            subscription_ref: expanded_id(&self.subscription),
            transaction_ref: expanded_id(&self.payment_intent),
            status: translate::<InvoiceStatus>(
                Provider::Stripe,
                self.status.as_deref().unwrap_or_default(),
            ),
            subtotal: self.subtotal,
            tax: self.tax.unwrap_or(0),
            discount: self
                .total_discount_amounts
                .map(|amounts| amounts.iter().map(|d| d.amount).sum()),
            total: self.total,
            amount_paid: self.amount_paid,
            currency: Currency::new(&self.currency)?,
            billing,
            line_items,
            issued_at: Timestamp::from_unix_secs(self.created)?,
            due_at: optional_timestamp(self.due_date)?,
            paid_at: optional_timestamp(self.status_transitions.paid_at)?,
            period_start: optional_timestamp(self.period_start)?,
            period_end: optional_timestamp(self.period_end)?,
            occurred_at,
            external_id: self.id,
        })
    }
}

/// Builder for Stripe event payloads in tests.
#[cfg(test)]
pub(crate) fn stripe_payload(event_type: &str, created: i64, object: JsonValue) -> JsonValue {
    serde_json::json!({
        "id": format!("evt_{}_{}", event_type.replace('.', "_"), created),
        "type": event_type,
        "created": created,
        "livemode": false,
        "data": { "object": object }
    })
}
