use std::collections::BTreeMap;
use std::sync::Arc;
use super::DpuMetrics;

#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub dpu_name: String,
    pub windows_processed: u64,
    pub process_errors: u64,
    pub suspended_drops: u64,
    pub skipped_events: u64,
    pub elements_dropped: u64,
    pub avg_latency_us: u64,
    pub ready_windows: usize,
    pub ring_capacity: usize,
}

/// Aggregates the metrics of every DPU in a pipeline, keyed by DPU name
#[derive(Clone, Default)]
pub struct MetricsCollector {
    metrics: BTreeMap<String, Arc<DpuMetrics>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, metrics: Arc<DpuMetrics>) {
        self.metrics.insert(metrics.dpu_name().to_string(), metrics);
    }

    pub fn snapshot(&self) -> BTreeMap<String, MetricsSnapshot> {
        self.metrics
            .iter()
            .map(|(name, metrics)| {
                (
                    name.clone(),
                    MetricsSnapshot {
                        dpu_name: metrics.dpu_name().to_string(),
                        windows_processed: metrics.windows_processed(),
                        process_errors: metrics.process_errors(),
                        suspended_drops: metrics.suspended_drops(),
                        skipped_events: metrics.skipped_events(),
                        elements_dropped: metrics.elements_dropped(),
                        avg_latency_us: metrics.avg_latency_us(),
                        ready_windows: metrics.ready_windows(),
                        ring_capacity: metrics.ring_capacity(),
                    },
                )
            })
            .collect()
    }

    pub fn get_dpu_metrics(&self, dpu_name: &str) -> Option<Arc<DpuMetrics>> {
        self.metrics.get(dpu_name).cloned()
    }
}
