// ============================================================================
// Keyspace - record and index key derivation
// ============================================================================
//
// Every key the store touches comes from here. Insert, lookup, delete and
// index membership must agree on the record key for an id, otherwise the
// index and the records drift apart without any error.
//
// ============================================================================

pub const DEFAULT_KEY_PREFIX: &str = "order";
pub const DEFAULT_INDEX_KEY: &str = "orders";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyspace {
    prefix: String,
    index: String,
}

impl Keyspace {
    pub fn new(prefix: impl Into<String>, index: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            index: index.into(),
        }
    }

    /// `{prefix}:{order_id}` with the id in canonical decimal.
    pub fn record_key(&self, order_id: u64) -> String {
        format!("{}:{}", self.prefix, order_id)
    }

    /// Set holding the record key of every live order.
    pub fn index_key(&self) -> &str {
        &self.index
    }

    /// Glob matching every record key in this keyspace.
    pub fn record_pattern(&self) -> String {
        format!("{}:*", self.prefix)
    }

    /// Inverse of [`record_key`](Self::record_key).
    pub fn parse_record_key(&self, key: &str) -> Option<u64> {
        let id = key.strip_prefix(self.prefix.as_str())?.strip_prefix(':')?;
        // reject "+1", "01" and friends so parsing stays the exact inverse
        if id.is_empty() || (id.len() > 1 && id.starts_with('0')) || !id.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        id.parse().ok()
    }
}

impl Default for Keyspace {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_PREFIX, DEFAULT_INDEX_KEY)
    }
}
