//! PayPal webhook event types.
//!
//! PayPal reports money as decimal strings with an uppercase currency code
//! and timestamps as RFC 3339. Both are normalized here so the reconciler
//! only sees minor units and `Timestamp`s.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::errors::ReconcileError;
use crate::domain::billing::{
    translate, BillingInterval, ChargeRefundFact, PaymentFact, PaymentStatus, Provider,
    RefundCoverage, RefundFact, RefundStatus, SubscriptionFact, SubscriptionStatus,
};
use crate::domain::foundation::{Currency, Timestamp};

/// PayPal webhook event.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PayPalEvent {
    /// Event id (WH-xxx).
    pub id: String,
    pub event_type: Option<String>,
    pub create_time: String,
    pub resource: JsonValue,
}

/// Closed set of PayPal events the reconciler acts on.
#[derive(Debug, Clone)]
pub enum PayPalEventKind {
    CaptureCompleted(PayPalCapture),
    CaptureDenied(PayPalCapture),
    CapturePending(PayPalCapture),
    CaptureRefunded(PayPalRefund),
    SaleCompleted(PayPalSale),
    SaleRefunded(PayPalSaleRefund),
    SubscriptionCreated(PayPalSubscription),
    SubscriptionUpdated(PayPalSubscription),
    SubscriptionCancelled(PayPalSubscription),
    Unrecognized(String),
}

impl PayPalEvent {
    pub fn parse(payload: &JsonValue) -> Result<Self, ReconcileError> {
        Ok(PayPalEvent::deserialize(payload)?)
    }

    pub fn occurred_at(&self) -> Result<Timestamp, ReconcileError> {
        Ok(Timestamp::parse_rfc3339(&self.create_time)?)
    }

    /// Classifies the event by `event_type` and decodes its resource.
    pub fn kind(&self, event_type: &str) -> Result<PayPalEventKind, ReconcileError> {
        use PayPalEventKind::*;
        let kind = match event_type {
            "PAYMENT.CAPTURE.COMPLETED" => CaptureCompleted(self.resource()?),
            "PAYMENT.CAPTURE.DENIED" | "PAYMENT.CAPTURE.DECLINED" => {
                CaptureDenied(self.resource()?)
            }
            "PAYMENT.CAPTURE.PENDING" => CapturePending(self.resource()?),
            "PAYMENT.CAPTURE.REFUNDED" => CaptureRefunded(self.resource()?),
            "PAYMENT.SALE.COMPLETED" => SaleCompleted(self.resource()?),
            "PAYMENT.SALE.REFUNDED" => SaleRefunded(self.resource()?),
            "BILLING.SUBSCRIPTION.CREATED" => SubscriptionCreated(self.resource()?),
            "BILLING.SUBSCRIPTION.ACTIVATED"
            | "BILLING.SUBSCRIPTION.UPDATED"
            | "BILLING.SUBSCRIPTION.SUSPENDED"
            | "BILLING.SUBSCRIPTION.RE-ACTIVATED"
            | "BILLING.SUBSCRIPTION.EXPIRED" => SubscriptionUpdated(self.resource()?),
            "BILLING.SUBSCRIPTION.CANCELLED" => SubscriptionCancelled(self.resource()?),
            other => Unrecognized(other.to_string()),
        };
        Ok(kind)
    }

    fn resource<T: serde::de::DeserializeOwned>(&self) -> Result<T, ReconcileError> {
        serde_json::from_value(self.resource.clone())
            .map_err(|e| ReconcileError::MalformedPayload(format!("resource: {}", e)))
    }
}

/// Money in the v2 APIs: `{"currency_code": "USD", "value": "10.00"}`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PayPalMoney {
    pub currency_code: String,
    pub value: String,
}

impl PayPalMoney {
    pub fn to_minor(&self) -> Result<(i64, Currency), ReconcileError> {
        let currency = Currency::new(&self.currency_code)?;
        let amount = currency.to_minor_units(&self.value)?;
        Ok((amount, currency))
    }
}

/// Money in the v1 sale APIs: `{"total": "10.00", "currency": "USD"}`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PayPalSaleAmount {
    pub total: String,
    pub currency: String,
}

impl PayPalSaleAmount {
    pub fn to_minor(&self) -> Result<(i64, Currency), ReconcileError> {
        let currency = Currency::new(&self.currency)?;
        let amount = currency.to_minor_units(&self.total)?;
        Ok((amount, currency))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PayPalLink {
    pub href: String,
    pub rel: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PayPalPayer {
    pub payer_id: Option<String>,
    pub email_address: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PayPalStatusDetails {
    pub reason: Option<String>,
}

/// `capture` resource.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PayPalCapture {
    pub id: String,
    pub status: String,
    pub amount: PayPalMoney,
    pub status_details: Option<PayPalStatusDetails>,
    pub custom_id: Option<String>,
    pub invoice_id: Option<String>,
    pub payer: Option<PayPalPayer>,
}

impl PayPalCapture {
    /// Builds the payment fact; `forced` overrides the translated status
    /// when the event type itself states the outcome.
    pub fn into_fact(
        self,
        forced: Option<PaymentStatus>,
        occurred_at: Timestamp,
        raw: JsonValue,
    ) -> Result<PaymentFact, ReconcileError> {
        let (amount, currency) = self.amount.to_minor()?;
        let status = forced.unwrap_or_else(|| translate(Provider::PayPal, &self.status));

        Ok(PaymentFact {
            provider: Provider::PayPal,
            customer_ref: self.payer.and_then(|p| p.payer_id),
            subscription_ref: None,
            provider_invoice_ref: None,
            amount,
            currency,
            status,
            payment_method: Some("paypal".to_string()),
            description: self.custom_id,
            failure_reason: self.status_details.and_then(|d| d.reason),
            occurred_at,
            raw,
            external_id: self.id,
        })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PayPalRefundBreakdown {
    pub total_refunded_amount: Option<PayPalMoney>,
}

/// `refund` resource sent with `PAYMENT.CAPTURE.REFUNDED`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PayPalRefund {
    pub id: String,
    pub status: String,
    pub amount: PayPalMoney,
    pub note_to_payer: Option<String>,
    pub status_details: Option<PayPalStatusDetails>,
    pub seller_payable_breakdown: Option<PayPalRefundBreakdown>,
    #[serde(default)]
    pub links: Vec<PayPalLink>,
}

impl PayPalRefund {
    /// Capture id from the `up` link (`.../captures/{id}`).
    pub fn capture_id(&self) -> Option<String> {
        self.links
            .iter()
            .find(|link| link.rel == "up")
            .and_then(|link| link.href.trim_end_matches('/').rsplit('/').next())
            .filter(|id| !id.is_empty())
            .map(str::to_string)
    }

    pub fn into_fact(self, occurred_at: Timestamp) -> Result<ChargeRefundFact, ReconcileError> {
        let transaction_ref = self.capture_id();
        let (amount, currency) = self.amount.to_minor()?;
        let coverage = match self
            .seller_payable_breakdown
            .and_then(|b| b.total_refunded_amount)
        {
            Some(total) => RefundCoverage::ReportedTotal(total.to_minor()?.0),
            None => RefundCoverage::Derive,
        };

        Ok(ChargeRefundFact {
            provider: Provider::PayPal,
            transaction_ref,
            refunds: vec![RefundFact {
                status: translate::<RefundStatus>(Provider::PayPal, &self.status),
                external_id: self.id,
                amount,
                currency,
                reason: self.note_to_payer,
                failure_reason: self.status_details.and_then(|d| d.reason),
            }],
            coverage,
            occurred_at,
        })
    }
}

/// v1 `sale` resource, sent for subscription payments.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PayPalSale {
    pub id: String,
    pub state: String,
    pub amount: PayPalSaleAmount,
    pub billing_agreement_id: Option<String>,
    pub custom: Option<String>,
}

impl PayPalSale {
    pub fn into_fact(
        self,
        occurred_at: Timestamp,
        raw: JsonValue,
    ) -> Result<PaymentFact, ReconcileError> {
        let (amount, currency) = self.amount.to_minor()?;

        Ok(PaymentFact {
            provider: Provider::PayPal,
            customer_ref: None,
            subscription_ref: self.billing_agreement_id,
            provider_invoice_ref: None,
            amount,
            currency,
            status: translate(Provider::PayPal, &self.state),
            payment_method: Some("paypal".to_string()),
            description: self.custom,
            failure_reason: None,
            occurred_at,
            raw,
            external_id: self.id,
        })
    }
}

/// v1 sale `refund` resource.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PayPalSaleRefund {
    pub id: String,
    pub state: String,
    pub amount: PayPalSaleAmount,
    pub sale_id: Option<String>,
    pub reason: Option<String>,
}

impl PayPalSaleRefund {
    pub fn into_fact(self, occurred_at: Timestamp) -> Result<ChargeRefundFact, ReconcileError> {
        let (amount, currency) = self.amount.to_minor()?;

        Ok(ChargeRefundFact {
            provider: Provider::PayPal,
            transaction_ref: self.sale_id,
            refunds: vec![RefundFact {
                status: translate::<RefundStatus>(Provider::PayPal, &self.state),
                external_id: self.id,
                amount,
                currency,
                reason: self.reason,
                failure_reason: None,
            }],
            coverage: RefundCoverage::Derive,
            occurred_at,
        })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PayPalLastPayment {
    pub amount: Option<PayPalMoney>,
    pub time: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PayPalBillingInfo {
    pub last_payment: Option<PayPalLastPayment>,
    pub next_billing_time: Option<String>,
}

/// `subscription` resource.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PayPalSubscription {
    pub id: String,
    pub status: String,
    pub plan_id: Option<String>,
    /// PayPal sends quantity as a string.
    pub quantity: Option<String>,
    pub subscriber: Option<PayPalPayer>,
    pub billing_info: Option<PayPalBillingInfo>,
    pub start_time: Option<String>,
    pub status_update_time: Option<String>,
}

fn optional_rfc3339(value: Option<&str>) -> Result<Option<Timestamp>, ReconcileError> {
    value
        .map(Timestamp::parse_rfc3339)
        .transpose()
        .map_err(ReconcileError::from)
}

impl PayPalSubscription {
    /// PayPal plans carry the interval, not the subscription; it stays unset.
    pub fn into_fact(
        self,
        occurred_at: Timestamp,
        raw: JsonValue,
    ) -> Result<SubscriptionFact, ReconcileError> {
        let status = translate::<SubscriptionStatus>(Provider::PayPal, &self.status);
        let quantity = match self.quantity.as_deref() {
            Some(q) => q.trim().parse::<i32>().map_err(|_| {
                ReconcileError::MalformedPayload(format!("quantity '{}' is not an integer", q))
            })?,
            None => 1,
        };

        let billing = self.billing_info.as_ref();
        let last_payment = billing.and_then(|b| b.last_payment.as_ref());
        let (amount, currency) = match last_payment.and_then(|p| p.amount.as_ref()) {
            Some(money) => {
                let (amount, currency) = money.to_minor()?;
                (Some(amount), Some(currency))
            }
            None => (None, None),
        };

        let status_changed_at = optional_rfc3339(self.status_update_time.as_deref())?;
        let (canceled_at, ended_at) = match status {
            SubscriptionStatus::Canceled => (status_changed_at, None),
            SubscriptionStatus::Expired => (None, status_changed_at),
            _ => (None, None),
        };

        Ok(SubscriptionFact {
            provider: Provider::PayPal,
            customer_ref: self.subscriber.and_then(|s| s.payer_id),
            plan_id: self.plan_id,
            status,
            amount,
            currency,
            interval: None::<BillingInterval>,
            interval_count: None,
            quantity,
            current_period_start: optional_rfc3339(
                last_payment
                    .and_then(|p| p.time.as_deref())
                    .or(self.start_time.as_deref()),
            )?,
            current_period_end: optional_rfc3339(
                billing.and_then(|b| b.next_billing_time.as_deref()),
            )?,
            trial_start: None,
            trial_end: None,
            canceled_at,
            ended_at,
            cancel_at_period_end: false,
            occurred_at,
            raw,
            external_id: self.id,
        })
    }
}

#[cfg(test)]
pub(crate) fn paypal_payload(
    event_type: &str,
    create_time: &str,
    resource: JsonValue,
) -> JsonValue {
    serde_json::json!({
        "id": format!("WH-{}-{}", event_type, create_time),
        "event_type": event_type,
        "create_time": create_time,
        "resource_type": "capture",
        "resource": resource
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const AT: &str = "2024-03-01T10:00:00Z";

    fn parse(event_type: &str, resource: JsonValue) -> PayPalEventKind {
        let payload = paypal_payload(event_type, AT, resource);
        PayPalEvent::parse(&payload).unwrap().kind(event_type).unwrap()
    }

    fn capture(value: &str, currency: &str, status: &str) -> JsonValue {
        json!({
            "id": "CAP-1",
            "status": status,
            "amount": { "currency_code": currency, "value": value }
        })
    }

    #[test]
    fn decimal_amount_rounds_half_away_from_zero() {
        let kind = parse("PAYMENT.CAPTURE.COMPLETED", capture("10.005", "USD", "COMPLETED"));
        let PayPalEventKind::CaptureCompleted(c) = kind else {
            panic!("wrong kind");
        };
        let fact = c.into_fact(None, Timestamp::now(), json!({})).unwrap();

        assert_eq!(fact.amount, 1001);
        assert_eq!(fact.currency.as_str(), "usd");
        assert_eq!(fact.status, PaymentStatus::Succeeded);
    }

    #[test]
    fn zero_decimal_currency_keeps_whole_units() {
        let kind = parse("PAYMENT.CAPTURE.COMPLETED", capture("100", "JPY", "COMPLETED"));
        let PayPalEventKind::CaptureCompleted(c) = kind else {
            panic!("wrong kind");
        };
        let fact = c.into_fact(None, Timestamp::now(), json!({})).unwrap();

        assert_eq!(fact.amount, 100);
    }

    #[test]
    fn denied_capture_can_be_forced_to_failed() {
        let mut resource = capture("5.00", "EUR", "DECLINED");
        resource["status_details"] = json!({ "reason": "BUYER_COMPLAINT" });

        let PayPalEventKind::CaptureDenied(c) = parse("PAYMENT.CAPTURE.DENIED", resource) else {
            panic!("wrong kind");
        };
        let fact = c.into_fact(Some(PaymentStatus::Failed), Timestamp::now(), json!({})).unwrap();

        assert_eq!(fact.status, PaymentStatus::Failed);
        assert_eq!(fact.failure_reason.as_deref(), Some("BUYER_COMPLAINT"));
    }

    #[test]
    fn refund_finds_capture_through_up_link() {
        let resource = json!({
            "id": "REF-1",
            "status": "COMPLETED",
            "amount": { "currency_code": "USD", "value": "4.00" },
            "seller_payable_breakdown": {
                "total_refunded_amount": { "currency_code": "USD", "value": "10.00" }
            },
            "links": [
                { "rel": "self", "href": "https://api.paypal.com/v2/payments/refunds/REF-1" },
                { "rel": "up", "href": "https://api.paypal.com/v2/payments/captures/CAP-1" }
            ]
        });

        let PayPalEventKind::CaptureRefunded(r) = parse("PAYMENT.CAPTURE.REFUNDED", resource) else {
            panic!("wrong kind");
        };
        let fact = r.into_fact(Timestamp::now()).unwrap();

        assert_eq!(fact.transaction_ref.as_deref(), Some("CAP-1"));
        assert_eq!(fact.coverage, RefundCoverage::ReportedTotal(1000));
        assert_eq!(fact.refunds[0].amount, 400);
        assert_eq!(fact.refunds[0].status, RefundStatus::Succeeded);
    }

    #[test]
    fn refund_without_links_has_no_parent() {
        let resource = json!({
            "id": "REF-2",
            "status": "PENDING",
            "amount": { "currency_code": "USD", "value": "1.00" }
        });

        let PayPalEventKind::CaptureRefunded(r) = parse("PAYMENT.CAPTURE.REFUNDED", resource) else {
            panic!("wrong kind");
        };
        let fact = r.into_fact(Timestamp::now()).unwrap();

        assert!(fact.transaction_ref.is_none());
        assert_eq!(fact.coverage, RefundCoverage::Derive);
    }

    #[test]
    fn sale_links_to_billing_agreement() {
        let resource = json!({
            "id": "SALE-1",
            "state": "completed",
            "amount": { "total": "19.99", "currency": "USD" },
            "billing_agreement_id": "I-SUB1"
        });

        let PayPalEventKind::SaleCompleted(sale) = parse("PAYMENT.SALE.COMPLETED", resource) else {
            panic!("wrong kind");
        };
        let fact = sale.into_fact(Timestamp::now(), json!({})).unwrap();

        assert_eq!(fact.amount, 1999);
        assert_eq!(fact.subscription_ref.as_deref(), Some("I-SUB1"));
        assert_eq!(fact.status, PaymentStatus::Succeeded);
    }

    #[test]
    fn cancelled_subscription_records_cancel_time() {
        let resource = json!({
            "id": "I-SUB1",
            "status": "CANCELLED",
            "plan_id": "P-1",
            "quantity": "2",
            "subscriber": { "payer_id": "PAYER1" },
            "status_update_time": "2024-03-01T09:59:00Z",
            "billing_info": {
                "last_payment": {
                    "amount": { "currency_code": "USD", "value": "9.99" },
                    "time": "2024-02-01T00:00:00Z"
                },
                "next_billing_time": "2024-04-01T00:00:00Z"
            }
        });

        let kind = parse("BILLING.SUBSCRIPTION.CANCELLED", resource);
        let PayPalEventKind::SubscriptionCancelled(sub) = kind else {
            panic!("wrong kind");
        };
        let fact = sub.into_fact(Timestamp::now(), json!({})).unwrap();

        assert_eq!(fact.status, SubscriptionStatus::Canceled);
        assert_eq!(fact.quantity, 2);
        assert_eq!(fact.amount, Some(999));
        assert_eq!(fact.customer_ref.as_deref(), Some("PAYER1"));
        assert!(fact.canceled_at.is_some());
        assert!(fact.ended_at.is_none());
    }

    #[test]
    fn non_numeric_quantity_is_malformed() {
        let resource = json!({ "id": "I-SUB2", "status": "ACTIVE", "quantity": "many" });

        let kind = parse("BILLING.SUBSCRIPTION.ACTIVATED", resource);
        let PayPalEventKind::SubscriptionUpdated(sub) = kind else {
            panic!("wrong kind");
        };
        assert!(matches!(
            sub.into_fact(Timestamp::now(), json!({})),
            Err(ReconcileError::MalformedPayload(_))
        ));
    }

    #[test]
    fn unrecognized_event_type_passes_through() {
        assert!(matches!(
            parse("CHECKOUT.ORDER.APPROVED", json!({ "id": "O-1" })),
            PayPalEventKind::Unrecognized(t) if t == "CHECKOUT.ORDER.APPROVED"
        ));
    }

    #[test]
    fn bad_create_time_is_malformed() {
        let payload = paypal_payload("PAYMENT.CAPTURE.COMPLETED", "yesterday", json!({}));
        let event = PayPalEvent::parse(&payload).unwrap();

        assert!(matches!(event.occurred_at(), Err(ReconcileError::MalformedPayload(_))));
    }
}
