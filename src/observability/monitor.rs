use super::MetricsCollector;

pub struct PipelineMonitor {
    collector: MetricsCollector,
}

impl PipelineMonitor {
    pub fn new(collector: MetricsCollector) -> Self {
        Self { collector }
    }

    pub fn generate_report(&self) -> String {
        let snapshot = self.collector.snapshot();

        if snapshot.is_empty() {
            return "No DPUs registered".to_string();
        }

        let mut report = String::from("=== DPU Metrics ===\n");

        for (name, metrics) in snapshot.iter() {
            report.push_str(&format!(
                "\n[{}]\n  Windows: {} processed\n  Errors: {}\n  Dropped: {} suspended, {} skipped, {} elements\n  Ring: {}/{} windows ready{}\n  Avg Latency: {}μs\n",
                name,
                metrics.windows_processed,
                if metrics.process_errors > 0 {
                    format!("{} error{}", metrics.process_errors, if metrics.process_errors == 1 { "" } else { "s" })
                } else {
                    "0 errors".to_string()
                },
                metrics.suspended_drops,
                metrics.skipped_events,
                metrics.elements_dropped,
                metrics.ready_windows,
                metrics.ring_capacity,
                if metrics.ring_capacity > 0 && metrics.ready_windows == metrics.ring_capacity {
                    " (full)"
                } else {
                    ""
                },
                metrics.avg_latency_us
            ));
        }

        report
    }

    pub fn collector(&self) -> &MetricsCollector {
        &self.collector
    }
}
