use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use crate::domain::order::Order;
use crate::health::{ComponentHealth, HealthStatus};
use crate::metrics::StoreMetrics;

use super::backend::{Batch, KeyValueBackend};
use super::error::StoreError;
use super::keyspace::Keyspace;

// ============================================================================
// Order Store - orders as JSON documents in a key-value backend
// ============================================================================
//
// Layout:
// - one record per order at `{prefix}:{order_id}`
// - one set at the index key holding every live record key
//
// Responsibilities:
// 1. Keep records and index in step (insert/delete commit both or neither)
// 2. Map backend replies onto the StoreError taxonomy
// 3. Page through the index with the backend's scan cursor
//
// Not provided: version checks on update. Two callers that read, modify
// and update the same order race and the later write wins.
//
// ============================================================================

pub const DEFAULT_PAGE_SIZE: u64 = 50;

/// Requested page of [`OrderStore::find_all`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FindAllPage {
    /// Upper bound hint on index entries read for this page.
    pub size: u64,
    /// Scan cursor; 0 starts from the beginning.
    pub offset: u64,
}

impl FindAllPage {
    pub fn first(size: u64) -> Self {
        Self { size, offset: 0 }
    }

    pub fn next(size: u64, cursor: u64) -> Self {
        Self { size, offset: cursor }
    }
}

impl Default for FindAllPage {
    fn default() -> Self {
        Self::first(DEFAULT_PAGE_SIZE)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindResult {
    pub orders: Vec<Order>,
    /// Cursor for the next page; 0 once the index is exhausted.
    pub cursor: u64,
}

impl FindResult {
    pub fn is_last(&self) -> bool {
        self.cursor == 0
    }
}

pub struct OrderStore<B: KeyValueBackend> {
    backend: B,
    keyspace: Keyspace,
    metrics: Option<Arc<StoreMetrics>>,
}

impl<B: KeyValueBackend> OrderStore<B> {
    pub fn new(backend: B, keyspace: Keyspace) -> Self {
        Self {
            backend,
            keyspace,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<StoreMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn keyspace(&self) -> &Keyspace {
        &self.keyspace
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Give the backend handle back, releasing the store.
    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Persist a new order and add it to the index in one transaction.
    ///
    /// Fails with [`StoreError::AlreadyExists`] if a record for the id is
    /// already present; that record is left untouched.
    pub async fn insert(&self, order: &Order) -> Result<(), StoreError> {
        self.observe("insert", self.insert_record(order)).await
    }

    pub async fn find_by_id(&self, order_id: u64) -> Result<Order, StoreError> {
        self.observe("find_by_id", self.load_record(order_id)).await
    }

    /// Overwrite an existing order. Fails with [`StoreError::NotFound`] if it
    /// was never inserted or has been deleted.
    pub async fn update(&self, order: &Order) -> Result<(), StoreError> {
        self.observe("update", self.overwrite_record(order)).await
    }

    /// Remove the record and its index entry in one transaction.
    pub async fn delete_by_id(&self, order_id: u64) -> Result<(), StoreError> {
        self.observe("delete_by_id", self.remove_record(order_id)).await
    }

    /// Read one page of orders by scanning the index from `page.offset`.
    ///
    /// A page is returned whole or not at all: one undecodable record fails
    /// the call with [`StoreError::MalformedRecord`].
    ///
    /// The one exception is an index entry whose record is gone when the
    /// page is fetched. A delete committed between the SSCAN and the MGET
    /// produces exactly that, so the entry is dropped from the page with a
    /// warning instead of failing it. Such a page can hold fewer orders than
    /// the scan returned keys; an entry left behind by index drift shows up
    /// the same way, logged under "Index entry without record".
    pub async fn find_all(&self, page: FindAllPage) -> Result<FindResult, StoreError> {
        self.observe("find_all", self.scan_page(page)).await
    }

    pub async fn check_health(&self) -> ComponentHealth {
        match self.backend.ping().await {
            Ok(()) => ComponentHealth::new("order_store", HealthStatus::Healthy),
            Err(e) => {
                tracing::warn!(error = %e, "Order store backend health check failed");
                ComponentHealth::new("order_store", HealthStatus::Unhealthy(e.to_string()))
            }
        }
    }

    async fn insert_record(&self, order: &Order) -> Result<(), StoreError> {
        let key = self.keyspace.record_key(order.order_id);
        let value = order.encode().map_err(|e| StoreError::encoding(order.order_id, e))?;

        // The index entry is added only together with a new record.
        let batch = Batch::new()
            .set_if_absent(&key, value)
            .set_add(self.keyspace.index_key(), &key)
            .guarded();

        let applied = self
            .backend
            .transaction(batch)
            .await
            .map_err(StoreError::from_transaction)?;

        if !applied.first().copied().unwrap_or(false) {
            tracing::warn!(order_id = order.order_id, key = %key, "Insert rejected, record exists");
            return Err(StoreError::AlreadyExists { order_id: order.order_id });
        }

        tracing::info!(
            order_id = order.order_id,
            key = %key,
            line_items = order.line_items.len(),
            "Inserted order"
        );
        Ok(())
    }

    async fn load_record(&self, order_id: u64) -> Result<Order, StoreError> {
        let key = self.keyspace.record_key(order_id);

        let Some(bytes) = self.backend.get(&key).await? else {
            tracing::debug!(order_id, key = %key, "Order not found");
            return Err(StoreError::NotFound { order_id });
        };

        let order = Order::decode(&bytes).map_err(|e| StoreError::malformed(&key, e))?;
        tracing::debug!(order_id, key = %key, "Loaded order");
        Ok(order)
    }

    async fn overwrite_record(&self, order: &Order) -> Result<(), StoreError> {
        let key = self.keyspace.record_key(order.order_id);
        let value = order.encode().map_err(|e| StoreError::encoding(order.order_id, e))?;

        if !self.backend.set_if_present(&key, value).await? {
            tracing::warn!(order_id = order.order_id, key = %key, "Update rejected, record missing");
            return Err(StoreError::NotFound { order_id: order.order_id });
        }

        tracing::info!(
            order_id = order.order_id,
            key = %key,
            status = ?order.status(),
            "Updated order"
        );
        Ok(())
    }

    async fn remove_record(&self, order_id: u64) -> Result<(), StoreError> {
        let key = self.keyspace.record_key(order_id);

        // SREM runs only if DEL removed the record; a missing record leaves
        // the index as it is.
        let batch = Batch::new()
            .delete(&key)
            .set_remove(self.keyspace.index_key(), &key)
            .guarded();

        let applied = self
            .backend
            .transaction(batch)
            .await
            .map_err(StoreError::from_transaction)?;

        if !applied.first().copied().unwrap_or(false) {
            tracing::debug!(order_id, key = %key, "Delete found no record");
            return Err(StoreError::NotFound { order_id });
        }

        tracing::info!(order_id, key = %key, "Deleted order");
        Ok(())
    }

    async fn scan_page(&self, page: FindAllPage) -> Result<FindResult, StoreError> {
        let count = page.size.max(1);
        let scan = self
            .backend
            .set_scan(
                self.keyspace.index_key(),
                page.offset,
                &self.keyspace.record_pattern(),
                count,
            )
            .await?;

        tracing::debug!(
            offset = page.offset,
            count,
            keys = scan.members.len(),
            next_cursor = scan.cursor,
            "Scanned order index"
        );

        // MGET with no keys is an error on the backend
        if scan.members.is_empty() {
            return Ok(FindResult { orders: Vec::new(), cursor: scan.cursor });
        }

        let values = self.backend.multi_get(&scan.members).await?;

        let mut orders = Vec::with_capacity(values.len());
        for (key, value) in scan.members.iter().zip(values) {
            let Some(bytes) = value else {
                tracing::warn!(key = %key, "Index entry without record, skipping");
                continue;
            };
            let order = Order::decode(&bytes).map_err(|e| StoreError::malformed(key, e))?;
            orders.push(order);
        }

        Ok(FindResult { orders, cursor: scan.cursor })
    }

    async fn observe<T, F>(&self, operation: &'static str, operation_future: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        let started = Instant::now();
        let result = operation_future.await;

        if let Some(metrics) = &self.metrics {
            let outcome = match &result {
                Ok(_) => "ok",
                Err(e) => e.kind(),
            };
            metrics.record_operation(operation, outcome, started.elapsed().as_secs_f64());
        }

        result
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
