use crate::domain::order::MalformedRecord;
use crate::utils::IsTransient;

// ============================================================================
// Storage Errors
// ============================================================================

/// Failure reported by a key-value backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// The backend could not be reached or dropped the connection.
    #[error("Backend connection error: {0}")]
    Connection(String),

    /// The backend understood the request and refused it.
    #[error("Backend command error: {0}")]
    Command(String),

    /// A transaction was discarded before or during commit.
    #[error("Transaction discarded: {0}")]
    Aborted(String),
}

impl BackendError {
    pub fn is_connection(&self) -> bool {
        matches!(self, BackendError::Connection(_))
    }
}

/// Errors returned by [`OrderStore`](super::OrderStore) operations.
///
/// The store never retries; callers branch on the variant to pick a
/// response or decide to retry (see [`IsTransient`]).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Order {order_id} not found")]
    NotFound { order_id: u64 },

    #[error("Order {order_id} already exists")]
    AlreadyExists { order_id: u64 },

    #[error("Malformed record at {key}: {source}")]
    MalformedRecord {
        key: String,
        #[source]
        source: MalformedRecord,
    },

    /// The order could not be serialized; nothing was written.
    #[error("Order {order_id} could not be encoded: {source}")]
    Encoding {
        order_id: u64,
        #[source]
        source: serde_json::Error,
    },

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(#[source] BackendError),

    /// The batch was discarded as a unit; nothing it contained was applied.
    #[error("Transaction aborted: {0}")]
    TransactionAborted(#[source] BackendError),
}

impl StoreError {
    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::NotFound { .. } => "not_found",
            StoreError::AlreadyExists { .. } => "already_exists",
            StoreError::MalformedRecord { .. } => "malformed_record",
            StoreError::Encoding { .. } => "encoding",
            StoreError::BackendUnavailable(_) => "backend_unavailable",
            StoreError::TransactionAborted(_) => "transaction_aborted",
        }
    }

    pub(crate) fn malformed(key: &str, source: MalformedRecord) -> Self {
        StoreError::MalformedRecord {
            key: key.to_string(),
            source,
        }
    }

    pub(crate) fn encoding(order_id: u64, source: serde_json::Error) -> Self {
        StoreError::Encoding { order_id, source }
    }

    /// Map an error from a batch commit.
    pub(crate) fn from_transaction(err: BackendError) -> Self {
        match err {
            BackendError::Connection(_) => StoreError::BackendUnavailable(err),
            BackendError::Command(_) | BackendError::Aborted(_) => StoreError::TransactionAborted(err),
        }
    }
}

impl From<BackendError> for StoreError {
    fn from(err: BackendError) -> Self {
        StoreError::BackendUnavailable(err)
    }
}

impl IsTransient for StoreError {
    fn is_transient(&self) -> bool {
        match self {
            StoreError::BackendUnavailable(err) => err.is_connection(),
            StoreError::TransactionAborted(_) => true,
            StoreError::NotFound { .. }
            | StoreError::AlreadyExists { .. }
            | StoreError::MalformedRecord { .. }
            | StoreError::Encoding { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds_are_distinct() {
        let errors = vec![
            StoreError::NotFound { order_id: 1 },
            StoreError::AlreadyExists { order_id: 1 },
            StoreError::malformed(
                "order:1",
                MalformedRecord::Invariant { order_id: 1, reason: "test" },
            ),
            StoreError::encoding(1, serde::ser::Error::custom("unsupported")),
            StoreError::BackendUnavailable(BackendError::Connection("refused".into())),
            StoreError::TransactionAborted(BackendError::Aborted("EXECABORT".into())),
        ];

        let mut kinds: Vec<_> = errors.iter().map(StoreError::kind).collect();
        kinds.sort();
        kinds.dedup();
        assert_eq!(kinds.len(), errors.len());
    }

    #[test]
    fn test_transient_classification() {
        assert!(StoreError::BackendUnavailable(BackendError::Connection("reset".into())).is_transient());
        assert!(!StoreError::BackendUnavailable(BackendError::Command("WRONGTYPE".into())).is_transient());
        assert!(StoreError::TransactionAborted(BackendError::Aborted("discarded".into())).is_transient());
        assert!(!StoreError::NotFound { order_id: 3 }.is_transient());
        assert!(!StoreError::AlreadyExists { order_id: 3 }.is_transient());
        assert!(!StoreError::encoding(3, serde::ser::Error::custom("unsupported")).is_transient());
    }

    #[test]
    fn test_transaction_error_mapping() {
        let err = StoreError::from_transaction(BackendError::Connection("broken pipe".into()));
        assert!(matches!(err, StoreError::BackendUnavailable(_)));

        let err = StoreError::from_transaction(BackendError::Command("EXECABORT".into()));
        assert!(matches!(err, StoreError::TransactionAborted(_)));
    }

    #[test]
    fn test_display_names_the_order() {
        let err = StoreError::NotFound { order_id: 77 };
        assert_eq!(err.to_string(), "Order 77 not found");

        let err = StoreError::encoding(78, serde::ser::Error::custom("unsupported"));
        assert_eq!(err.kind(), "encoding");
        assert!(err.to_string().starts_with("Order 78 could not be encoded"));
    }
}
