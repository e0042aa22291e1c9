// ============================================================================
// Order Business Rule Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderError {
    #[error("Order is already shipped")]
    AlreadyShipped,

    #[error("Order must be shipped before it can be completed")]
    NotShipped,

    #[error("Order is already completed")]
    AlreadyCompleted,

    #[error("Unknown order status: {0}")]
    UnknownStatus(String),
}

// ============================================================================
// Record Decoding Errors
// ============================================================================

/// Stored bytes that do not form a valid order.
///
/// Kept separate from any "not found" condition: a present-but-unreadable
/// record points at index corruption or an encoding mismatch.
#[derive(Debug, thiserror::Error)]
pub enum MalformedRecord {
    #[error("invalid order payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("order {order_id} violates invariant: {reason}")]
    Invariant { order_id: u64, reason: &'static str },
}
