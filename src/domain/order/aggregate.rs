use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::MalformedRecord;
use super::value_objects::{CustomerId, LineItem, OrderStatus};

// ============================================================================
// Order Aggregate
// ============================================================================
//
// The persisted document. Its canonical encoding is JSON: field-tagged,
// readable with redis-cli, and identical for storage and API exchange.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    // Identity
    pub order_id: u64,

    pub customer_id: CustomerId,
    pub line_items: Vec<LineItem>,

    // Audit Trail
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,

    // Lifecycle markers, each set at most once
    #[serde(default)]
    pub shipped_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Order {
    /// A pending order created at `created_at`.
    pub fn new(
        order_id: u64,
        customer_id: CustomerId,
        line_items: Vec<LineItem>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            order_id,
            customer_id,
            line_items,
            created_at,
            updated_at: None,
            shipped_at: None,
            completed_at: None,
        }
    }

    pub fn status(&self) -> OrderStatus {
        match (self.shipped_at, self.completed_at) {
            (_, Some(_)) => OrderStatus::Completed,
            (Some(_), None) => OrderStatus::Shipped,
            (None, None) => OrderStatus::Pending,
        }
    }

    /// Sum of quantity × unit price across all line items.
    pub fn total(&self) -> u64 {
        self.line_items
            .iter()
            .map(|item| u64::from(item.quantity).saturating_mul(item.price))
            .fold(0u64, u64::saturating_add)
    }

    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, MalformedRecord> {
        let order: Order = serde_json::from_slice(bytes)?;
        order.check_invariants()?;
        Ok(order)
    }

    fn check_invariants(&self) -> Result<(), MalformedRecord> {
        if self.completed_at.is_some() && self.shipped_at.is_none() {
            return Err(MalformedRecord::Invariant {
                order_id: self.order_id,
                reason: "completed_at is set but shipped_at is not",
            });
        }
        Ok(())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
