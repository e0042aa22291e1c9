use std::sync::Arc;
use futures_util::future::try_join_all;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use order_store::metrics::StoreMetrics;
use order_store::storage::RedisBackend;
use order_store::utils::{retry_on_transient, RetryConfig};
use order_store::{
    CustomerId, KeyValueBackend, LineItem, OrderCommandHandler, StatusTransition, StoreConfig,
    StoreError,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Default to INFO level, can be overridden with RUST_LOG env var
    // Example: RUST_LOG=debug cargo run
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,order_store=debug")),
        )
        .init();

    tracing::info!("🚀 Starting order store demo");

    let config = StoreConfig::from_env()?;

    // === 1. Connect to Redis ===
    tracing::info!("Connecting to Redis...");
    let backend = retry_on_transient(RetryConfig::startup(), |attempt| {
        let url = config.redis_url.clone();
        async move {
            tracing::debug!(attempt, "Opening Redis connection");
            RedisBackend::connect(&url).await.map_err(StoreError::from)
        }
    })
    .await
    .into_result()?;

    // === 2. Build the store ===
    let metrics = Arc::new(StoreMetrics::new()?);
    let store = Arc::new(
        order_store::OrderStore::new(backend, config.keyspace()).with_metrics(metrics.clone()),
    );

    let health = store.check_health().await;
    if !health.status.is_healthy() {
        anyhow::bail!("Order store unhealthy: {:?}", health.status);
    }

    let handler = OrderCommandHandler::new(store.clone()).with_page_size(config.default_page_size);

    // === 3. Demonstrate the order lifecycle ===
    tokio::select! {
        result = run_demo(&handler) => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("Interrupted, shutting down"),
    }

    let recorded: u64 = metrics
        .registry()
        .gather()
        .iter()
        .filter(|family| family.name() == "order_store_operations_total")
        .flat_map(|family| family.metric.iter())
        .filter_map(|metric| metric.counter.value)
        .map(|value| value as u64)
        .sum();
    tracing::info!(operations = recorded, "📊 Store operations recorded");

    // Dropping the last handle closes the Redis connection
    drop(handler);
    drop(store);

    tracing::info!("🎉 Demo complete!");
    Ok(())
}

async fn run_demo<B: KeyValueBackend>(handler: &OrderCommandHandler<B>) -> anyhow::Result<()> {
    let customer_id = CustomerId::from(uuid::Uuid::new_v4());

    // Create a few orders concurrently
    let orders = try_join_all((1..=3u32).map(|n| {
        handler.create_order(
            customer_id.clone(),
            vec![
                LineItem::new(uuid::Uuid::new_v4().to_string(), n, 500),
                LineItem::new(uuid::Uuid::new_v4().to_string(), 1, 1_250),
            ],
        )
    }))
    .await?;

    for order in &orders {
        tracing::info!(order_id = order.order_id, total = order.total(), "✅ Order created");
    }

    let mut cursor = 0;
    let mut listed = 0;
    loop {
        let page = handler.list_orders(cursor).await?;
        listed += page.orders.len();
        if page.is_last() {
            break;
        }
        cursor = page.cursor;
    }
    tracing::info!(listed, "Listed orders");

    let first = &orders[0];
    let shipped = handler.update_status(first.order_id, StatusTransition::Ship).await?;
    tracing::info!(order_id = shipped.order_id, status = ?shipped.status(), "✅ Order shipped");

    let completed = handler
        .update_status(first.order_id, StatusTransition::Complete)
        .await?;
    tracing::info!(order_id = completed.order_id, status = ?completed.status(), "✅ Order completed");

    // Completing twice is refused by the lifecycle rules
    if let Err(e) = handler.update_status(first.order_id, StatusTransition::Complete).await {
        tracing::info!(error = %e, "Second completion rejected as expected");
    }

    for order in &orders {
        handler.delete_order(order.order_id).await?;
    }
    tracing::info!(count = orders.len(), "✅ Orders deleted");

    Ok(())
}
