//! Result shape shared by the idempotent upsert repositories.

/// Outcome of a `(provider, external_id)` keyed upsert.
///
/// `previous_status` is `None` exactly when `was_created` is true. Handlers
/// compare it with the stored status to detect first-time transitions.
#[derive(Debug, Clone, PartialEq)]
pub struct Upserted<T, S> {
    pub record: T,
    pub was_created: bool,
    pub previous_status: Option<S>,
}

impl<T, S: PartialEq + Copy> Upserted<T, S> {
    pub fn created(record: T) -> Self {
        Self {
            record,
            was_created: true,
            previous_status: None,
        }
    }

    pub fn updated(record: T, previous_status: S) -> Self {
        Self {
            record,
            was_created: false,
            previous_status: Some(previous_status),
        }
    }

    /// True when the row now has `status` and did not have it before.
    pub fn entered(&self, status: S, current: S) -> bool {
        current == status && self.previous_status != Some(status)
    }
}
