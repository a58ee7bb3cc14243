//! State machine trait for status enums with a strict transition table.

use thiserror::Error;

use super::{DomainError, ErrorCode};

/// Rejected transition between two states.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Cannot transition from {from} to {to}")]
pub struct InvalidStateTransition {
    pub from: String,
    pub to: String,
}

impl From<InvalidStateTransition> for DomainError {
    fn from(err: InvalidStateTransition) -> Self {
        DomainError::new(ErrorCode::InvalidStateTransition, err.to_string())
            .with_detail("from", err.from)
            .with_detail("to", err.to)
    }
}

/// Trait for status enums that represent state machines.
///
/// Implementors define the allowed `(from, to)` pairs; validated
/// transitions and terminal detection come for free.
///
/// ```ignore
/// let next = OrderStatus::Pending.transition_to(OrderStatus::Confirmed)?;
/// ```
pub trait StateMachine: Sized + Copy + PartialEq + std::fmt::Display {
    /// Returns true if transition from self to target is allowed.
    fn can_transition_to(&self, target: &Self) -> bool;

    /// Returns all valid target states from current state.
    fn valid_transitions(&self) -> Vec<Self>;

    /// Performs transition with validation, returning error if invalid.
    fn transition_to(&self, target: Self) -> Result<Self, InvalidStateTransition> {
        if self.can_transition_to(&target) {
            Ok(target)
        } else {
            Err(InvalidStateTransition {
                from: self.to_string(),
                to: target.to_string(),
            })
        }
    }

    /// Checks if current state is terminal (no valid outgoing transitions).
    fn is_terminal(&self) -> bool {
        self.valid_transitions().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Light {
        Green,
        Yellow,
        Red,
        Off,
    }

    impl fmt::Display for Light {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{:?}", self)
        }
    }

    impl StateMachine for Light {
        fn can_transition_to(&self, target: &Self) -> bool {
            self.valid_transitions().contains(target)
        }

        fn valid_transitions(&self) -> Vec<Self> {
            use Light::*;
            match self {
                Green => vec![Yellow, Off],
                Yellow => vec![Red, Off],
                Red => vec![Green, Off],
                Off => vec![],
            }
        }
    }

    #[test]
    fn transition_to_succeeds_for_valid_transition() {
        assert_eq!(Light::Green.transition_to(Light::Yellow), Ok(Light::Yellow));
    }

    #[test]
    fn transition_to_reports_both_states_on_rejection() {
        let err = Light::Green.transition_to(Light::Red).unwrap_err();
        assert_eq!(err.from, "Green");
        assert_eq!(err.to, "Red");
    }

    #[test]
    fn rejected_transition_maps_to_domain_error_code() {
        let err: DomainError = Light::Off.transition_to(Light::Green).unwrap_err().into();
        assert_eq!(err.code, ErrorCode::InvalidStateTransition);
    }

    #[test]
    fn is_terminal_only_for_states_without_exits() {
        assert!(Light::Off.is_terminal());
        assert!(!Light::Red.is_terminal());
    }
}
