//! Event infrastructure for domain event publishing and handling.
//!
//! - `EventId` - Identifier used by consumers for deduplication
//! - `EventMetadata` - Correlation context carried with an event
//! - `EventEnvelope` - Transport wrapper for domain events
//! - `DomainEvent` - Trait that all domain events implement
//! - `domain_event!` - Macro to simplify DomainEvent implementations

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use uuid::Uuid;

use super::{DomainError, ErrorCode, Timestamp};

/// Trait that all domain events must implement.
///
/// Event types carry a version suffix (e.g. `payment.succeeded.v1`) that
/// must match `schema_version`.
pub trait DomainEvent: Send + Sync {
    /// Returns the event type string used for routing.
    fn event_type(&self) -> &'static str;

    /// Returns the schema version number.
    fn schema_version(&self) -> u32;

    /// Returns the ID of the aggregate that emitted this event.
    fn aggregate_id(&self) -> String;

    /// Returns the type of aggregate (e.g., "Transaction", "Subscription").
    fn aggregate_type(&self) -> &'static str;

    /// Returns when the underlying fact occurred.
    fn occurred_at(&self) -> Timestamp;

    /// Returns the identifier of this event instance.
    fn event_id(&self) -> EventId;
}

/// Implements `DomainEvent` for a struct from its fields.
///
/// ```ignore
/// domain_event!(
///     PaymentSucceeded,
///     event_type = "payment.succeeded.v1",
///     schema_version = 1,
///     aggregate_id = transaction_id,
///     aggregate_type = "Transaction",
///     occurred_at = occurred_at,
///     event_id = event_id
/// );
/// ```
#[macro_export]
macro_rules! domain_event {
    (
        $event_name:ident,
        event_type = $event_type:expr,
        schema_version = $schema_version:expr,
        aggregate_id = $agg_id_field:ident,
        aggregate_type = $agg_type:expr,
        occurred_at = $occurred_field:ident,
        event_id = $event_id_field:ident
    ) => {
        impl $crate::domain::foundation::DomainEvent for $event_name {
            fn event_type(&self) -> &'static str {
                $event_type
            }

            fn schema_version(&self) -> u32 {
                $schema_version
            }

            fn aggregate_id(&self) -> String {
                self.$agg_id_field.to_string()
            }

            fn aggregate_type(&self) -> &'static str {
                $agg_type
            }

            fn occurred_at(&self) -> $crate::domain::foundation::Timestamp {
                self.$occurred_field
            }

            fn event_id(&self) -> $crate::domain::foundation::EventId {
                self.$event_id_field.clone()
            }
        }
    };
}

pub use crate::domain_event;

/// Identifier for events (used for deduplication).
///
/// Ledger facts use deterministic ids so that a replayed webhook, or two
/// racing deliveries of the same webhook, publish the same id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    /// Creates a new random EventId using UUID v4.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Creates an EventId from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Deterministic id for a fact: `<kind>:<provider>:<external id>`.
    pub fn for_fact(kind: &str, provider: impl fmt::Display, external_id: &str) -> Self {
        Self(format!("{}:{}:{}", kind, provider, external_id))
    }

    /// Returns the inner string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Correlation context that flows with an event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Links events produced while handling one inbound webhook.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,

    /// ID of the provider event that caused this event.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub causation_id: Option<String>,
}

/// Transport envelope for domain events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event_id: EventId,
    pub event_type: String,
    pub schema_version: u32,
    pub aggregate_id: String,
    pub aggregate_type: String,
    pub occurred_at: Timestamp,
    pub payload: JsonValue,
    pub metadata: EventMetadata,
}

impl EventEnvelope {
    /// Creates a new EventEnvelope with a random id.
    ///
    /// Schema version is taken from the `.vN` suffix of `event_type`, default 1.
    pub fn new(
        event_type: impl Into<String>,
        aggregate_id: impl Into<String>,
        aggregate_type: impl Into<String>,
        payload: JsonValue,
    ) -> Self {
        let event_type = event_type.into();
        let schema_version = Self::extract_version(&event_type);

        Self {
            event_id: EventId::new(),
            event_type,
            schema_version,
            aggregate_id: aggregate_id.into(),
            aggregate_type: aggregate_type.into(),
            occurred_at: Timestamp::now(),
            payload,
            metadata: EventMetadata::default(),
        }
    }

    pub(crate) fn extract_version(event_type: &str) -> u32 {
        event_type
            .rsplit_once(".v")
            .and_then(|(_, version_str)| version_str.parse::<u32>().ok())
            .unwrap_or(1)
    }

    /// Creates an envelope from a domain event, serializing it as the payload.
    pub fn from_event<T>(event: &T) -> Result<Self, DomainError>
    where
        T: DomainEvent + Serialize,
    {
        let payload = serde_json::to_value(event).map_err(|e| {
            DomainError::new(
                ErrorCode::InternalError,
                format!("Failed to serialize {}: {}", event.event_type(), e),
            )
        })?;

        Ok(Self {
            event_id: event.event_id(),
            event_type: event.event_type().to_string(),
            schema_version: event.schema_version(),
            aggregate_id: event.aggregate_id(),
            aggregate_type: event.aggregate_type().to_string(),
            occurred_at: event.occurred_at(),
            payload,
            metadata: EventMetadata::default(),
        })
    }

    /// Add correlation ID for request tracing.
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.metadata.correlation_id = Some(id.into());
        self
    }

    /// Add causation ID (provider event that caused this one).
    pub fn with_causation_id(mut self, id: impl Into<String>) -> Self {
        self.metadata.causation_id = Some(id.into());
        self
    }

    /// Deserialize payload to a specific event type.
    pub fn payload_as<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}
