//! Unified ledger statuses shared by every provider.
//!
//! These are the only status vocabularies persisted locally. Provider
//! strings are mapped onto them by the [`translator`](super::translator).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::ValidationError;

macro_rules! unified_status {
    (
        $(#[$meta:meta])*
        $name:ident, field = $field:literal {
            $($variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Stored representation.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            /// Strict parse of the stored representation.
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(ValidationError::invalid_format(
                        $field,
                        format!("unknown value '{}'", other),
                    )),
                }
            }
        }
    };
}

unified_status!(
    /// Status of a payment transaction.
    PaymentStatus, field = "payment_status" {
        Pending => "pending",
        Succeeded => "succeeded",
        Failed => "failed",
        Refunded => "refunded",
    }
);

unified_status!(
    /// Status of a recurring subscription.
    SubscriptionStatus, field = "subscription_status" {
        Incomplete => "incomplete",
        IncompleteExpired => "incomplete_expired",
        Trialing => "trialing",
        Active => "active",
        PastDue => "past_due",
        Canceled => "canceled",
        Unpaid => "unpaid",
        Paused => "paused",
        Expired => "expired",
    }
);

unified_status!(
    /// Status of a refund.
    RefundStatus, field = "refund_status" {
        Pending => "pending",
        Succeeded => "succeeded",
        Failed => "failed",
        Canceled => "canceled",
    }
);

unified_status!(
    /// Status of an invoice.
    InvoiceStatus, field = "invoice_status" {
        Draft => "draft",
        Open => "open",
        Paid => "paid",
        Void => "void",
    }
);

impl PaymentStatus {
    /// Status to store when `incoming` arrives for a row currently at `self`.
    ///
    /// A refunded transaction stays refunded when an earlier
    /// succeeded/pending notification is replayed.
    pub fn reconcile(self, incoming: PaymentStatus) -> PaymentStatus {
        match (self, incoming) {
            (PaymentStatus::Refunded, PaymentStatus::Succeeded | PaymentStatus::Pending) => {
                PaymentStatus::Refunded
            }
            (_, incoming) => incoming,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_representation_parses_back() {
        for status in SubscriptionStatus::ALL {
            assert_eq!(status.as_str().parse::<SubscriptionStatus>().unwrap(), *status);
        }
    }

    #[test]
    fn strict_parse_rejects_provider_vocabulary() {
        assert!("COMPLETED".parse::<PaymentStatus>().is_err());
    }

    #[test]
    fn subscription_has_nine_states() {
        assert_eq!(SubscriptionStatus::ALL.len(), 9);
    }

    #[test]
    fn refunded_is_not_downgraded_by_replay() {
        assert_eq!(
            PaymentStatus::Refunded.reconcile(PaymentStatus::Succeeded),
            PaymentStatus::Refunded
        );
        assert_eq!(
            PaymentStatus::Refunded.reconcile(PaymentStatus::Pending),
            PaymentStatus::Refunded
        );
    }

    #[test]
    fn other_transitions_take_incoming_status() {
        assert_eq!(
            PaymentStatus::Pending.reconcile(PaymentStatus::Succeeded),
            PaymentStatus::Succeeded
        );
        assert_eq!(
            PaymentStatus::Succeeded.reconcile(PaymentStatus::Refunded),
            PaymentStatus::Refunded
        );
        assert_eq!(
            PaymentStatus::Succeeded.reconcile(PaymentStatus::Failed),
            PaymentStatus::Failed
        );
    }

    #[test]
    fn serde_uses_snake_case() {
        assert_eq!(
            serde_json::to_string(&SubscriptionStatus::PastDue).unwrap(),
            "\"past_due\""
        );
    }
}
