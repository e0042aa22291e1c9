use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeSet, HashMap};
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

use super::backend::{Batch, BatchOp, KeyValueBackend, OpKind, ScanPage};
use super::error::BackendError;

// ============================================================================
// In-Memory Backend
// ============================================================================
//
// Same command semantics as the Redis backend, kept in process. Used by the
// unit tests and for local development without a server. Faults can be
// injected to exercise the store's failure paths:
// - fail a transaction when it reaches a given operation kind
// - report every call as a connection failure
// - delay every call
//
// ============================================================================

#[derive(Debug, Clone, Default)]
struct MemoryState {
    values: HashMap<String, Vec<u8>>,
    sets: HashMap<String, ScanSet>,
}

/// Set members ordered by a hash slot, so a scan cursor names a slot
/// rather than a position and survives members coming and going.
#[derive(Debug, Clone, Default)]
struct ScanSet {
    entries: BTreeSet<(u64, String)>,
}

impl ScanSet {
    fn insert(&mut self, member: String) -> bool {
        self.entries.insert((slot(&member), member))
    }

    fn remove(&mut self, member: &str) -> bool {
        self.entries.remove(&(slot(member), member.to_string()))
    }

    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn members(&self) -> BTreeSet<String> {
        self.entries.iter().map(|(_, member)| member.clone()).collect()
    }
}

fn slot(member: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    member.hash(&mut hasher);
    hasher.finish()
}

#[derive(Debug, Clone, Default)]
struct Faults {
    fail_transaction_on: Option<OpKind>,
    unavailable: bool,
    latency: Option<Duration>,
}

#[derive(Clone, Default)]
pub struct MemoryBackend {
    state: Arc<RwLock<MemoryState>>,
    faults: Arc<Mutex<Faults>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later transaction containing an operation of `kind`
    /// fail at that operation and be discarded.
    pub async fn fail_transactions_on(&self, kind: OpKind) {
        self.faults.lock().await.fail_transaction_on = Some(kind);
    }

    pub async fn set_unavailable(&self, unavailable: bool) {
        self.faults.lock().await.unavailable = unavailable;
    }

    /// Delay every call by `latency` before it touches any state.
    pub async fn set_latency(&self, latency: Option<Duration>) {
        self.faults.lock().await.latency = latency;
    }

    pub async fn clear_faults(&self) {
        *self.faults.lock().await = Faults::default();
    }

    /// Store bytes under `key` without going through any order encoding.
    pub async fn put_raw(&self, key: &str, value: impl Into<Vec<u8>>) {
        self.state.write().await.values.insert(key.to_string(), value.into());
    }

    pub async fn contains_key(&self, key: &str) -> bool {
        self.state.read().await.values.contains_key(key)
    }

    pub async fn members(&self, set: &str) -> BTreeSet<String> {
        self.state
            .read()
            .await
            .sets
            .get(set)
            .map(ScanSet::members)
            .unwrap_or_default()
    }

    async fn before_call(&self) -> Result<Faults, BackendError> {
        let faults = self.faults.lock().await.clone();
        if faults.unavailable {
            return Err(BackendError::Connection("connection refused".to_string()));
        }
        if let Some(latency) = faults.latency {
            tokio::time::sleep(latency).await;
        }
        Ok(faults)
    }

    async fn apply_single(&self, op: BatchOp) -> Result<bool, BackendError> {
        self.before_call().await?;
        let mut state = self.state.write().await;
        Ok(apply(&mut state, op))
    }
}

fn apply(state: &mut MemoryState, op: BatchOp) -> bool {
    match op {
        BatchOp::SetIfAbsent { key, value } => {
            if state.values.contains_key(&key) {
                return false;
            }
            state.values.insert(key, value);
            true
        }
        BatchOp::SetIfPresent { key, value } => match state.values.get_mut(&key) {
            Some(existing) => {
                *existing = value;
                true
            }
            None => false,
        },
        BatchOp::Delete { key } => state.values.remove(&key).is_some(),
        BatchOp::SetAdd { set, member } => state.sets.entry(set).or_default().insert(member),
        BatchOp::SetRemove { set, member } => {
            let Some(members) = state.sets.get_mut(&set) else {
                return false;
            };
            let removed = members.remove(&member);
            if members.is_empty() {
                state.sets.remove(&set);
            }
            removed
        }
    }
}

/// Glob match supporting `*` and `?`, the subset used for key patterns.
fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let (mut p, mut t) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star = Some((p, t));
            p += 1;
        } else if let Some((star_p, star_t)) = star {
            p = star_p + 1;
            t = star_t + 1;
            star = Some((star_p, star_t + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|c| *c == '*')
}

#[async_trait]
impl KeyValueBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BackendError> {
        self.before_call().await?;
        Ok(self.state.read().await.values.get(key).cloned())
    }

    async fn set_if_absent(&self, key: &str, value: Vec<u8>) -> Result<bool, BackendError> {
        self.apply_single(BatchOp::SetIfAbsent { key: key.to_string(), value }).await
    }

    async fn set_if_present(&self, key: &str, value: Vec<u8>) -> Result<bool, BackendError> {
        self.apply_single(BatchOp::SetIfPresent { key: key.to_string(), value }).await
    }

    async fn delete(&self, key: &str) -> Result<bool, BackendError> {
        self.apply_single(BatchOp::Delete { key: key.to_string() }).await
    }

    async fn set_add(&self, set: &str, member: &str) -> Result<bool, BackendError> {
        self.apply_single(BatchOp::SetAdd { set: set.to_string(), member: member.to_string() })
            .await
    }

    async fn set_remove(&self, set: &str, member: &str) -> Result<bool, BackendError> {
        self.apply_single(BatchOp::SetRemove { set: set.to_string(), member: member.to_string() })
            .await
    }

    async fn set_scan(
        &self,
        set: &str,
        cursor: u64,
        pattern: &str,
        count: u64,
    ) -> Result<ScanPage, BackendError> {
        self.before_call().await?;
        if count == 0 {
            return Err(BackendError::Command("COUNT must be positive".to_string()));
        }

        let state = self.state.read().await;
        let Some(members) = state.sets.get(set) else {
            return Ok(ScanPage::default());
        };

        // The cursor is the first slot not yet visited. COUNT bounds the
        // members examined, MATCH filters them afterwards. A slot is never
        // split across pages, so every returned cursor is nonzero.
        let step = usize::try_from(count).unwrap_or(usize::MAX);
        let mut page = Vec::new();
        let mut examined = 0;
        let mut last_slot = None;
        let mut next = 0;

        for (slot, member) in members.entries.range((cursor, String::new())..) {
            if examined >= step && last_slot != Some(*slot) {
                next = *slot;
                break;
            }
            examined += 1;
            last_slot = Some(*slot);
            if glob_match(pattern, member) {
                page.push(member.clone());
            }
        }

        Ok(ScanPage { members: page, cursor: next })
    }

    async fn multi_get(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>, BackendError> {
        self.before_call().await?;
        if keys.is_empty() {
            return Err(BackendError::Command(
                "wrong number of arguments for 'mget' command".to_string(),
            ));
        }

        let state = self.state.read().await;
        Ok(keys.iter().map(|key| state.values.get(key).cloned()).collect())
    }

    async fn transaction(&self, batch: Batch) -> Result<Vec<bool>, BackendError> {
        let faults = self.before_call().await?;

        let mut state = self.state.write().await;
        // Stage on a copy so a failing operation leaves nothing behind.
        let mut staged = state.clone();
        let mut applied = Vec::with_capacity(batch.len());

        for (i, op) in batch.ops().iter().enumerate() {
            if batch.is_guarded() && i > 0 && applied.first() != Some(&true) {
                applied.push(false);
                continue;
            }
            if faults.fail_transaction_on == Some(op.kind()) {
                tracing::debug!(op = ?op.kind(), "Injected transaction failure, discarding batch");
                return Err(BackendError::Aborted(format!("injected failure at {:?}", op.kind())));
            }
            applied.push(apply(&mut staged, op.clone()));
        }

        *state = staged;
        Ok(applied)
    }

    async fn ping(&self) -> Result<(), BackendError> {
        self.before_call().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_basic_operations() {
        let backend = MemoryBackend::new();

        assert!(backend.set_if_absent("k", b"v1".to_vec()).await.unwrap());
        assert!(!backend.set_if_absent("k", b"v2".to_vec()).await.unwrap());
        assert_eq!(backend.get("k").await.unwrap(), Some(b"v1".to_vec()));

        assert!(backend.set_if_present("k", b"v3".to_vec()).await.unwrap());
        assert!(!backend.set_if_present("missing", b"v".to_vec()).await.unwrap());
        assert_eq!(backend.get("k").await.unwrap(), Some(b"v3".to_vec()));
        assert_eq!(backend.get("missing").await.unwrap(), None);

        assert!(backend.delete("k").await.unwrap());
        assert!(!backend.delete("k").await.unwrap());
        assert!(!backend.contains_key("k").await);
    }

    #[tokio::test]
    async fn test_set_operations() {
        let backend = MemoryBackend::new();

        assert!(backend.set_add("s", "a").await.unwrap());
        assert!(!backend.set_add("s", "a").await.unwrap());
        assert!(backend.set_add("s", "b").await.unwrap());
        assert_eq!(backend.members("s").await.len(), 2);

        assert!(backend.set_remove("s", "a").await.unwrap());
        assert!(!backend.set_remove("s", "a").await.unwrap());
        assert!(!backend.set_remove("nope", "a").await.unwrap());
    }

    #[tokio::test]
    async fn test_scan_visits_every_member_once() {
        let backend = MemoryBackend::new();
        for i in 0..7 {
            backend.set_add("s", &format!("m{i}")).await.unwrap();
        }

        let mut seen = Vec::new();
        let mut cursor = 0;
        loop {
            let page = backend.set_scan("s", cursor, "*", 3).await.unwrap();
            assert!(page.members.len() <= 3);
            seen.extend(page.members);
            cursor = page.cursor;
            if cursor == 0 {
                break;
            }
        }

        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 7);
    }

    #[tokio::test]
    async fn test_scan_survives_removals_between_pages() {
        let backend = MemoryBackend::new();
        for i in 0..10 {
            backend.set_add("s", &format!("m{i}")).await.unwrap();
        }

        let first = backend.set_scan("s", 0, "*", 3).await.unwrap();
        assert_ne!(first.cursor, 0);

        // Drop everything already returned, then finish the scan.
        for member in &first.members {
            backend.set_remove("s", member).await.unwrap();
        }

        let mut seen: BTreeSet<String> = first.members.iter().cloned().collect();
        let mut cursor = first.cursor;
        while cursor != 0 {
            let page = backend.set_scan("s", cursor, "*", 3).await.unwrap();
            seen.extend(page.members);
            cursor = page.cursor;
        }

        assert_eq!(seen.len(), 10);
    }

    #[tokio::test]
    async fn test_guarded_transaction_skips_after_first_miss() {
        let backend = MemoryBackend::new();
        backend.set_add("s", "k").await.unwrap();

        let batch = Batch::new().delete("k").set_remove("s", "k").guarded();
        let applied = backend.transaction(batch).await.unwrap();

        assert_eq!(applied, vec![false, false]);
        assert!(backend.members("s").await.contains("k"));

        backend.put_raw("k", "v").await;
        let batch = Batch::new().delete("k").set_remove("s", "k").guarded();
        assert_eq!(backend.transaction(batch).await.unwrap(), vec![true, true]);
        assert!(backend.members("s").await.is_empty());
    }

    #[tokio::test]
    async fn test_scan_filters_by_pattern() {
        let backend = MemoryBackend::new();
        backend.set_add("s", "order:1").await.unwrap();
        backend.set_add("s", "junk").await.unwrap();

        let page = backend.set_scan("s", 0, "order:*", 10).await.unwrap();
        assert_eq!(page.members, vec!["order:1".to_string()]);
        assert_eq!(page.cursor, 0);
    }

    #[tokio::test]
    async fn test_scan_missing_set_is_empty() {
        let backend = MemoryBackend::new();
        let page = backend.set_scan("none", 0, "*", 10).await.unwrap();
        assert_eq!(page, ScanPage::default());
    }

    #[tokio::test]
    async fn test_multi_get_requires_keys() {
        let backend = MemoryBackend::new();
        backend.put_raw("a", "1").await;

        let values = backend.multi_get(&["a".to_string(), "b".to_string()]).await.unwrap();
        assert_eq!(values, vec![Some(b"1".to_vec()), None]);

        let result = backend.multi_get(&[]).await;
        assert!(matches!(result, Err(BackendError::Command(_))));
    }

    #[tokio::test]
    async fn test_transaction_commits_all() {
        let backend = MemoryBackend::new();
        let batch = Batch::new().set_if_absent("k", b"v".to_vec()).set_add("s", "k");

        let applied = backend.transaction(batch).await.unwrap();
        assert_eq!(applied, vec![true, true]);
        assert!(backend.contains_key("k").await);
        assert!(backend.members("s").await.contains("k"));
    }

    #[tokio::test]
    async fn test_failed_transaction_applies_nothing() {
        let backend = MemoryBackend::new();
        backend.fail_transactions_on(OpKind::SetAdd).await;

        let batch = Batch::new().set_if_absent("k", b"v".to_vec()).set_add("s", "k");
        let result = backend.transaction(batch).await;

        assert!(matches!(result, Err(BackendError::Aborted(_))));
        assert!(!backend.contains_key("k").await);
        assert!(backend.members("s").await.is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_backend() {
        let backend = MemoryBackend::new();
        backend.set_unavailable(true).await;
        assert!(matches!(backend.ping().await, Err(BackendError::Connection(_))));

        backend.clear_faults().await;
        assert!(backend.ping().await.is_ok());
    }

    #[test]
    fn test_glob_match() {
        assert!(glob_match("*", ""));
        assert!(glob_match("*", "anything"));
        assert!(glob_match("order:*", "order:12"));
        assert!(!glob_match("order:*", "orders"));
        assert!(glob_match("o?der:*", "order:1"));
        assert!(glob_match("*:1", "order:1"));
        assert!(!glob_match("*:1", "order:12"));
    }
}
