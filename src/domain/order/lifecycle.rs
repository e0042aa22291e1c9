use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

use super::aggregate::Order;
use super::errors::OrderError;

// ============================================================================
// Order Lifecycle - pending → shipped → completed
// ============================================================================
//
// Transitions are pure: they take the current order and return the next
// one. Persisting the result (Store::update) is the caller's job, and the
// read → apply → write sequence is not isolated from other writers.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTransition {
    Ship,
    Complete,
}

impl StatusTransition {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusTransition::Ship => "shipped",
            StatusTransition::Complete => "completed",
        }
    }
}

impl fmt::Display for StatusTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatusTransition {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "shipped" => Ok(StatusTransition::Ship),
            "completed" => Ok(StatusTransition::Complete),
            other => Err(OrderError::UnknownStatus(other.to_string())),
        }
    }
}

impl Order {
    /// Apply `transition` at time `at`, returning the updated order.
    ///
    /// `self` is left as it was whether or not the transition is accepted.
    pub fn apply_transition(
        &self,
        transition: StatusTransition,
        at: DateTime<Utc>,
    ) -> Result<Order, OrderError> {
        let mut next = self.clone();

        match transition {
            StatusTransition::Ship => {
                if self.shipped_at.is_some() {
                    return Err(OrderError::AlreadyShipped);
                }
                next.shipped_at = Some(at);
            }
            StatusTransition::Complete => {
                if self.shipped_at.is_none() {
                    return Err(OrderError::NotShipped);
                }
                if self.completed_at.is_some() {
                    return Err(OrderError::AlreadyCompleted);
                }
                next.completed_at = Some(at);
            }
        }

        next.updated_at = Some(at);
        Ok(next)
    }
}
