use async_trait::async_trait;

use super::error::BackendError;

// ============================================================================
// Key-Value Backend Interface
// ============================================================================
//
// The small command set the order store needs from its backend. Values are
// raw bytes; decoding and validation belong to the caller.
//
// ============================================================================

/// One page of a set scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
    pub members: Vec<String>,
    /// Continuation cursor; 0 means the scan is complete.
    pub cursor: u64,
}

/// A single operation queued in a [`Batch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    SetIfAbsent { key: String, value: Vec<u8> },
    SetIfPresent { key: String, value: Vec<u8> },
    Delete { key: String },
    SetAdd { set: String, member: String },
    SetRemove { set: String, member: String },
}

impl BatchOp {
    pub fn kind(&self) -> OpKind {
        match self {
            BatchOp::SetIfAbsent { .. } => OpKind::SetIfAbsent,
            BatchOp::SetIfPresent { .. } => OpKind::SetIfPresent,
            BatchOp::Delete { .. } => OpKind::Delete,
            BatchOp::SetAdd { .. } => OpKind::SetAdd,
            BatchOp::SetRemove { .. } => OpKind::SetRemove,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    SetIfAbsent,
    SetIfPresent,
    Delete,
    SetAdd,
    SetRemove,
}

/// Operations committed or discarded as a unit.
///
/// A guarded batch runs its later operations only when the first one
/// applied; otherwise they are skipped and reported as not applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    ops: Vec<BatchOp>,
    guarded: bool,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_if_absent(mut self, key: impl Into<String>, value: Vec<u8>) -> Self {
        self.ops.push(BatchOp::SetIfAbsent { key: key.into(), value });
        self
    }

    pub fn set_if_present(mut self, key: impl Into<String>, value: Vec<u8>) -> Self {
        self.ops.push(BatchOp::SetIfPresent { key: key.into(), value });
        self
    }

    pub fn delete(mut self, key: impl Into<String>) -> Self {
        self.ops.push(BatchOp::Delete { key: key.into() });
        self
    }

    pub fn set_add(mut self, set: impl Into<String>, member: impl Into<String>) -> Self {
        self.ops.push(BatchOp::SetAdd { set: set.into(), member: member.into() });
        self
    }

    pub fn set_remove(mut self, set: impl Into<String>, member: impl Into<String>) -> Self {
        self.ops.push(BatchOp::SetRemove { set: set.into(), member: member.into() });
        self
    }

    /// Make every operation after the first depend on the first applying.
    pub fn guarded(mut self) -> Self {
        self.guarded = true;
        self
    }

    pub fn is_guarded(&self) -> bool {
        self.guarded
    }

    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Trait implemented by every key-value backend the store can run on.
///
/// Every boolean result reports whether the operation changed anything:
/// a conditional set that was skipped, a delete of a missing key, or a set
/// add of an existing member all return `false`.
#[async_trait]
pub trait KeyValueBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BackendError>;

    /// Write `value` only if `key` does not exist.
    async fn set_if_absent(&self, key: &str, value: Vec<u8>) -> Result<bool, BackendError>;

    /// Overwrite `key` only if it already exists.
    async fn set_if_present(&self, key: &str, value: Vec<u8>) -> Result<bool, BackendError>;

    async fn delete(&self, key: &str) -> Result<bool, BackendError>;

    async fn set_add(&self, set: &str, member: &str) -> Result<bool, BackendError>;

    async fn set_remove(&self, set: &str, member: &str) -> Result<bool, BackendError>;

    /// Scan members of `set` matching the glob `pattern`, resuming at `cursor`.
    ///
    /// `count` is a hint; a page may hold more or fewer members.
    async fn set_scan(
        &self,
        set: &str,
        cursor: u64,
        pattern: &str,
        count: u64,
    ) -> Result<ScanPage, BackendError>;

    /// Fetch several keys at once. At least one key is required.
    async fn multi_get(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>, BackendError>;

    /// Commit `batch` atomically, returning one flag per queued operation.
    /// Operations skipped by a guarded batch report `false`.
    async fn transaction(&self, batch: Batch) -> Result<Vec<bool>, BackendError>;

    async fn ping(&self) -> Result<(), BackendError>;
}
