//! Non-error outcomes of reconciling a webhook.

use serde::Serialize;
use std::fmt;

/// What happened to an acknowledged webhook.
///
/// Every variant answers the provider with 200.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// Ledger state was written or confirmed.
    Processed,
    /// The provider event id was already handled.
    Duplicate,
    /// Unrecognized event type or provider.
    Ignored,
    /// Snapshot older than the stored state; nothing written.
    Stale,
}

impl ReconcileOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcileOutcome::Processed => "processed",
            ReconcileOutcome::Duplicate => "duplicate",
            ReconcileOutcome::Ignored => "ignored",
            ReconcileOutcome::Stale => "stale",
        }
    }
}

impl fmt::Display for ReconcileOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
