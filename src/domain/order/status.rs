//! Order status state machine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{StateMachine, ValidationError};

/// Lifecycle status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Created, awaiting payment.
    Pending,

    /// Paid. Revisited on every renewal; only the entitlement window moves.
    Paid,

    /// Canceled. Reconciliation applies nothing further.
    Canceled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Canceled => "canceled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "paid" => Ok(OrderStatus::Paid),
            "canceled" => Ok(OrderStatus::Canceled),
            other => Err(ValidationError::invalid_format(
                "status",
                format!("unknown order status '{}'", other),
            )),
        }
    }
}

impl StateMachine for OrderStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use OrderStatus::*;
        matches!(
            (self, target),
            (Pending, Paid) | (Pending, Canceled) | (Paid, Paid) | (Paid, Canceled)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use OrderStatus::*;
        match self {
            Pending => vec![Paid, Canceled],
            Paid => vec![Paid, Canceled],
            Canceled => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_can_be_paid_or_canceled() {
        assert_eq!(OrderStatus::Pending.transition_to(OrderStatus::Paid), Ok(OrderStatus::Paid));
        assert_eq!(
            OrderStatus::Pending.transition_to(OrderStatus::Canceled),
            Ok(OrderStatus::Canceled)
        );
    }

    #[test]
    fn paid_is_revisited_on_renewal() {
        assert!(OrderStatus::Paid.can_transition_to(&OrderStatus::Paid));
    }

    #[test]
    fn paid_cannot_go_back_to_pending() {
        assert!(OrderStatus::Paid.transition_to(OrderStatus::Pending).is_err());
    }

    #[test]
    fn canceled_is_terminal() {
        assert!(OrderStatus::Canceled.is_terminal());
        assert!(!OrderStatus::Canceled.can_transition_to(&OrderStatus::Paid));
        assert!(!OrderStatus::Pending.is_terminal());
        assert!(!OrderStatus::Paid.is_terminal());
    }

    #[test]
    fn parses_stored_strings() {
        assert_eq!("paid".parse::<OrderStatus>().unwrap(), OrderStatus::Paid);
        assert_eq!("canceled".parse::<OrderStatus>().unwrap(), OrderStatus::Canceled);
        assert!("cancelled".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn can_transition_to_is_consistent_with_valid_transitions() {
        for status in [OrderStatus::Pending, OrderStatus::Paid, OrderStatus::Canceled] {
            for target in status.valid_transitions() {
                assert!(status.can_transition_to(&target));
            }
        }
    }
}
