use std::sync::Arc;
use chrono::Utc;
use uuid::Uuid;

use crate::storage::{FindAllPage, FindResult, KeyValueBackend, OrderStore, StoreError, DEFAULT_PAGE_SIZE};

use super::aggregate::Order;
use super::errors::OrderError;
use super::lifecycle::StatusTransition;
use super::value_objects::{CustomerId, LineItem};

// ============================================================================
// Order Command Handler
// ============================================================================
//
// Orchestrates: request → (find → apply transition) → store
//
// This is the surface a transport layer maps its routes onto. It adds no
// locking: update_status is a plain read-modify-write and concurrent
// callers on the same order race, last write wins.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// The lifecycle rules refused the request; nothing was written.
    #[error(transparent)]
    Rejected(#[from] OrderError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct OrderCommandHandler<B: KeyValueBackend> {
    store: Arc<OrderStore<B>>,
    page_size: u64,
}

impl<B: KeyValueBackend> OrderCommandHandler<B> {
    pub fn new(store: Arc<OrderStore<B>>) -> Self {
        Self {
            store,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn store(&self) -> &Arc<OrderStore<B>> {
        &self.store
    }

    /// Create a pending order under a freshly drawn random id.
    ///
    /// Ids are not checked for collisions; a clash surfaces as
    /// [`StoreError::AlreadyExists`].
    pub async fn create_order(
        &self,
        customer_id: CustomerId,
        line_items: Vec<LineItem>,
    ) -> Result<Order, CommandError> {
        let order = Order::new(random_order_id(), customer_id, line_items, Utc::now());

        tracing::info!(
            order_id = order.order_id,
            customer_id = %order.customer_id,
            item_count = order.line_items.len(),
            "Creating new order"
        );

        self.store.insert(&order).await?;
        Ok(order)
    }

    pub async fn get_order(&self, order_id: u64) -> Result<Order, CommandError> {
        Ok(self.store.find_by_id(order_id).await?)
    }

    /// One page of orders starting at `cursor` (0 for the first page).
    pub async fn list_orders(&self, cursor: u64) -> Result<FindResult, CommandError> {
        Ok(self
            .store
            .find_all(FindAllPage::next(self.page_size, cursor))
            .await?)
    }

    pub async fn update_status(
        &self,
        order_id: u64,
        transition: StatusTransition,
    ) -> Result<Order, CommandError> {
        let current = self.store.find_by_id(order_id).await?;

        let next = current.apply_transition(transition, Utc::now()).map_err(|e| {
            tracing::warn!(order_id, transition = %transition, error = %e, "Status change rejected");
            e
        })?;

        self.store.update(&next).await?;

        tracing::info!(order_id, status = ?next.status(), "Order status changed");
        Ok(next)
    }

    pub async fn delete_order(&self, order_id: u64) -> Result<(), CommandError> {
        Ok(self.store.delete_by_id(order_id).await?)
    }
}

fn random_order_id() -> u64 {
    Uuid::new_v4().as_u64_pair().0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Keyspace, MemoryBackend};

    fn handler() -> OrderCommandHandler<MemoryBackend> {
        let store = OrderStore::new(MemoryBackend::new(), Keyspace::default());
        OrderCommandHandler::new(Arc::new(store))
    }

    #[tokio::test]
    async fn test_create_order_is_pending_and_persisted() {
        let handler = handler();
        let order = handler
            .create_order(CustomerId::new("c1"), vec![LineItem::new("x", 2, 500)])
            .await
            .unwrap();

        assert!(order.shipped_at.is_none());
        assert!(order.updated_at.is_none());

        let stored = handler.get_order(order.order_id).await.unwrap();
        assert_eq!(stored, order);
    }

    #[tokio::test]
    async fn test_update_status_walks_the_lifecycle() {
        let handler = handler();
        let order = handler
            .create_order(CustomerId::new("c1"), vec![LineItem::new("x", 2, 500)])
            .await
            .unwrap();

        let shipped = handler.update_status(order.order_id, StatusTransition::Ship).await.unwrap();
        assert!(shipped.shipped_at.is_some());

        let completed = handler
            .update_status(order.order_id, StatusTransition::Complete)
            .await
            .unwrap();
        assert!(completed.completed_at.is_some());
        assert_eq!(handler.get_order(order.order_id).await.unwrap(), completed);
    }

    #[tokio::test]
    async fn test_rejected_transition_leaves_record_unchanged() {
        let handler = handler();
        let order = handler
            .create_order(CustomerId::new("c1"), vec![])
            .await
            .unwrap();

        let result = handler.update_status(order.order_id, StatusTransition::Complete).await;

        assert!(matches!(result, Err(CommandError::Rejected(OrderError::NotShipped))));
        assert_eq!(handler.get_order(order.order_id).await.unwrap(), order);
    }

    #[tokio::test]
    async fn test_update_status_of_missing_order() {
        let handler = handler();
        let result = handler.update_status(12, StatusTransition::Ship).await;

        assert!(matches!(
            result,
            Err(CommandError::Store(StoreError::NotFound { order_id: 12 }))
        ));
    }

    #[tokio::test]
    async fn test_list_and_delete() {
        let handler = handler().with_page_size(2);
        let mut ids = Vec::new();
        for _ in 0..3 {
            let order = handler.create_order(CustomerId::new("c1"), vec![]).await.unwrap();
            ids.push(order.order_id);
        }

        handler.delete_order(ids[0]).await.unwrap();

        let mut listed = Vec::new();
        let mut cursor = 0;
        loop {
            let page = handler.list_orders(cursor).await.unwrap();
            listed.extend(page.orders.iter().map(|o| o.order_id));
            if page.is_last() {
                break;
            }
            cursor = page.cursor;
        }

        listed.sort();
        let mut expected = ids[1..].to_vec();
        expected.sort();
        assert_eq!(listed, expected);

        assert!(matches!(
            handler.delete_order(ids[0]).await,
            Err(CommandError::Store(StoreError::NotFound { .. }))
        ));
    }
}
