//! Subscription - latest known snapshot of a recurring billing agreement.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;

use super::provider::Provider;
use super::status::SubscriptionStatus;
use crate::domain::foundation::{Currency, CustomerId, SubscriptionId, Timestamp, ValidationError};

/// Billing period unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingInterval {
    Day,
    Week,
    Month,
    Year,
}

impl BillingInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingInterval::Day => "day",
            BillingInterval::Week => "week",
            BillingInterval::Month => "month",
            BillingInterval::Year => "year",
        }
    }
}

impl fmt::Display for BillingInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for BillingInterval {
    type Err = ValidationError;

    /// Accepts both `month` and `MONTH`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "day" => Ok(BillingInterval::Day),
            "week" => Ok(BillingInterval::Week),
            "month" => Ok(BillingInterval::Month),
            "year" => Ok(BillingInterval::Year),
            other => Err(ValidationError::invalid_format(
                "interval",
                format!("unknown interval '{}'", other),
            )),
        }
    }
}

/// Ledger row for a provider subscription.
///
/// There is no local transition table: every accepted snapshot replaces the
/// row. `last_event_at` orders snapshots so that a late, older notification
/// cannot overwrite a newer state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub customer_id: Option<CustomerId>,
    pub provider: Provider,
    pub external_id: String,
    pub plan_id: Option<String>,
    pub status: SubscriptionStatus,
    pub amount: Option<i64>,
    pub currency: Option<Currency>,
    pub interval: Option<BillingInterval>,
    pub interval_count: Option<i32>,
    pub quantity: i32,
    pub current_period_start: Option<Timestamp>,
    pub current_period_end: Option<Timestamp>,
    pub trial_start: Option<Timestamp>,
    pub trial_end: Option<Timestamp>,
    pub canceled_at: Option<Timestamp>,
    pub ended_at: Option<Timestamp>,
    pub cancel_at_period_end: bool,
    pub raw_response: JsonValue,
    pub last_event_at: Timestamp,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Full provider snapshot of a subscription at `event_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionSnapshot {
    pub provider: Provider,
    pub external_id: String,
    pub customer_id: Option<CustomerId>,
    pub plan_id: Option<String>,
    pub status: SubscriptionStatus,
    pub amount: Option<i64>,
    pub currency: Option<Currency>,
    pub interval: Option<BillingInterval>,
    pub interval_count: Option<i32>,
    pub quantity: i32,
    pub current_period_start: Option<Timestamp>,
    pub current_period_end: Option<Timestamp>,
    pub trial_start: Option<Timestamp>,
    pub trial_end: Option<Timestamp>,
    pub canceled_at: Option<Timestamp>,
    pub ended_at: Option<Timestamp>,
    pub cancel_at_period_end: bool,
    pub raw_response: JsonValue,
    pub event_at: Timestamp,
}

impl SubscriptionSnapshot {
    pub fn into_subscription(self, id: SubscriptionId, now: Timestamp) -> Subscription {
        Subscription {
            id,
            customer_id: self.customer_id,
            provider: self.provider,
            external_id: self.external_id,
            plan_id: self.plan_id,
            status: self.status,
            amount: self.amount,
            currency: self.currency,
            interval: self.interval,
            interval_count: self.interval_count,
            quantity: self.quantity,
            current_period_start: self.current_period_start,
            current_period_end: self.current_period_end,
            trial_start: self.trial_start,
            trial_end: self.trial_end,
            canceled_at: self.canceled_at,
            ended_at: self.ended_at,
            cancel_at_period_end: self.cancel_at_period_end,
            raw_response: self.raw_response,
            last_event_at: self.event_at,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Subscription {
    /// True when `snapshot` is not older than the state already stored.
    ///
    /// Equal timestamps are accepted so replays converge.
    pub fn accepts(&self, snapshot: &SubscriptionSnapshot) -> bool {
        !snapshot.event_at.is_before(&self.last_event_at)
    }

    /// Replaces the stored state with `snapshot`, keeping identity.
    pub fn replace_with(&mut self, snapshot: SubscriptionSnapshot, now: Timestamp) {
        let customer_id = snapshot.customer_id.or(self.customer_id);
        let replaced = snapshot.into_subscription(self.id, self.created_at);
        *self = Subscription {
            customer_id,
            updated_at: now,
            ..replaced
        };
    }
}

#[cfg(test)]
pub(crate) fn sample_snapshot(
    external_id: &str,
    status: SubscriptionStatus,
    event_at: Timestamp,
) -> SubscriptionSnapshot {
    SubscriptionSnapshot {
        provider: Provider::Stripe,
        external_id: external_id.to_string(),
        customer_id: None,
        plan_id: Some("price_basic".to_string()),
        status,
        amount: Some(1500),
        currency: Some(Currency::new("usd").unwrap()),
        interval: Some(BillingInterval::Month),
        interval_count: Some(1),
        quantity: 1,
        current_period_start: None,
        current_period_end: None,
        trial_start: None,
        trial_end: None,
        canceled_at: None,
        ended_at: None,
        cancel_at_period_end: false,
        raw_response: serde_json::json!({ "id": external_id }),
        event_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_parses_provider_casing() {
        assert_eq!("MONTH".parse::<BillingInterval>().unwrap(), BillingInterval::Month);
        assert_eq!("year".parse::<BillingInterval>().unwrap(), BillingInterval::Year);
        assert!("fortnight".parse::<BillingInterval>().is_err());
    }

    #[test]
    fn older_snapshot_is_not_accepted() {
        let t1 = Timestamp::from_unix_secs(1_000).unwrap();
        let t0 = Timestamp::from_unix_secs(900).unwrap();
        let sub = sample_snapshot("sub_1", SubscriptionStatus::Active, t1)
            .into_subscription(SubscriptionId::new(), t1);

        assert!(!sub.accepts(&sample_snapshot("sub_1", SubscriptionStatus::Incomplete, t0)));
        assert!(sub.accepts(&sample_snapshot("sub_1", SubscriptionStatus::Active, t1)));
    }

    #[test]
    fn replace_with_keeps_identity_and_creation_time() {
        let t0 = Timestamp::from_unix_secs(1_000).unwrap();
        let t1 = t0.plus_secs(60);
        let customer = CustomerId::new();
        let mut first = sample_snapshot("sub_1", SubscriptionStatus::Trialing, t0);
        first.customer_id = Some(customer);
        let mut sub = first.into_subscription(SubscriptionId::new(), t0);
        let id = sub.id;

        sub.replace_with(sample_snapshot("sub_1", SubscriptionStatus::Active, t1), t1);

        assert_eq!(sub.id, id);
        assert_eq!(sub.created_at, t0);
        assert_eq!(sub.updated_at, t1);
        assert_eq!(sub.last_event_at, t1);
        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert_eq!(sub.customer_id, Some(customer));
    }
}
