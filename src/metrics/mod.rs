use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};

// ============================================================================
// Metrics Module - Prometheus metrics for the order store
// ============================================================================
//
// - operation counts by outcome ("ok" or the StoreError kind)
// - operation latency
//
// The registry is exposed so an embedding service can serve it.
// ============================================================================

pub struct StoreMetrics {
    registry: Registry,

    pub operations_total: IntCounterVec,
    pub operation_duration: HistogramVec,
}

impl StoreMetrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let operations_total = IntCounterVec::new(
            Opts::new("order_store_operations_total", "Total order store operations"),
            &["operation", "outcome"],
        )?;
        registry.register(Box::new(operations_total.clone()))?;

        let operation_duration = HistogramVec::new(
            HistogramOpts::new(
                "order_store_operation_duration_seconds",
                "Order store operation duration",
            )
            .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
            &["operation"],
        )?;
        registry.register(Box::new(operation_duration.clone()))?;

        Ok(Self {
            registry,
            operations_total,
            operation_duration,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_operation(&self, operation: &str, outcome: &str, duration_secs: f64) {
        self.operations_total.with_label_values(&[operation, outcome]).inc();
        self.operation_duration.with_label_values(&[operation]).observe(duration_secs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_operation() {
        let metrics = StoreMetrics::new().unwrap();
        metrics.record_operation("insert", "ok", 0.002);
        metrics.record_operation("insert", "already_exists", 0.001);
        metrics.record_operation("insert", "ok", 0.003);

        let gathered = metrics.registry().gather();
        let ops = gathered.iter().find(|m| m.name() == "order_store_operations_total").unwrap();
        assert_eq!(ops.metric.len(), 2); // ok + already_exists

        let total: f64 = ops.metric.iter().filter_map(|m| m.counter.value).sum();
        assert_eq!(total, 3.0);
    }

    #[test]
    fn test_duration_histogram_registered() {
        let metrics = StoreMetrics::new().unwrap();
        metrics.record_operation("find_by_id", "ok", 0.01);

        let gathered = metrics.registry().gather();
        assert!(gathered
            .iter()
            .any(|m| m.name() == "order_store_operation_duration_seconds"));
    }
}
