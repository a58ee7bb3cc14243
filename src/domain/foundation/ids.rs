//! Strongly-typed identifier value objects.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::ValidationError;

/// Declares a UUID-backed identifier with the usual constructors.
macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an identifier from an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the inner UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

uuid_id!(
    /// Local identifier of a payment transaction.
    TransactionId
);
uuid_id!(
    /// Local identifier of a recurring subscription.
    SubscriptionId
);
uuid_id!(
    /// Local identifier of a refund.
    RefundId
);
uuid_id!(
    /// Local identifier of an invoice.
    InvoiceId
);
uuid_id!(
    /// Local identifier of a provider customer record.
    CustomerId
);
uuid_id!(
    /// Local identifier of an order.
    OrderId
);

/// Application user identifier (issued by the identity provider).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Creates a new UserId, returning error if empty.
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ValidationError::empty_field("user_id"));
        }
        Ok(Self(id))
    }

    /// Returns the inner string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_id_generates_unique_values() {
        assert_ne!(TransactionId::new(), TransactionId::new());
    }

    #[test]
    fn invoice_id_parses_from_valid_string() {
        let uuid = Uuid::new_v4();
        let id: InvoiceId = uuid.to_string().parse().unwrap();
        assert_eq!(id.as_uuid(), &uuid);
    }

    #[test]
    fn refund_id_rejects_garbage() {
        assert!("not-a-uuid".parse::<RefundId>().is_err());
    }

    #[test]
    fn customer_id_serializes_transparently() {
        let uuid = Uuid::new_v4();
        let json = serde_json::to_string(&CustomerId::from_uuid(uuid)).unwrap();
        assert_eq!(json, format!("\"{}\"", uuid));
    }

    #[test]
    fn user_id_rejects_blank_string() {
        assert!(UserId::new("").is_err());
        assert!(UserId::new("   ").is_err());
    }

    #[test]
    fn user_id_displays_inner_value() {
        let id = UserId::new("user-42").unwrap();
        assert_eq!(id.to_string(), "user-42");
    }
}
