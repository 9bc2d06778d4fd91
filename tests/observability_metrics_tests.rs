use eloom_dpu::observability::{DpuMetrics, MetricsCollector, PipelineMonitor};
use std::sync::Arc;

#[test]
fn test_metrics_creation() {
    let metrics = DpuMetrics::new("test_dpu");
    assert_eq!(metrics.dpu_name(), "test_dpu");
    assert_eq!(metrics.windows_processed(), 0);
    assert_eq!(metrics.process_errors(), 0);
    assert_eq!(metrics.avg_latency_us(), 0);
}

#[test]
fn test_metrics_counters() {
    let metrics = Arc::new(DpuMetrics::new("test_dpu"));

    metrics.record_window_processed();
    metrics.record_window_processed();
    metrics.record_process_error();
    metrics.record_suspended_drop();
    metrics.record_skipped_event();
    metrics.record_elements_dropped(5);
    metrics.record_elements_dropped(2);

    assert_eq!(metrics.windows_processed(), 2);
    assert_eq!(metrics.process_errors(), 1);
    assert_eq!(metrics.suspended_drops(), 1);
    assert_eq!(metrics.skipped_events(), 1);
    assert_eq!(metrics.elements_dropped(), 7);
}

#[tokio::test]
async fn test_metrics_latency_tracking() {
    let metrics = DpuMetrics::new("test_dpu");

    let start = metrics.start_processing();
    tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;
    metrics.finish_processing(start);

    assert!(metrics.avg_latency_us() >= 10_000);
}

#[test]
fn test_collector_snapshot() {
    let mut collector = MetricsCollector::new();
    let first = Arc::new(DpuMetrics::new("first"));
    let second = Arc::new(DpuMetrics::new("second"));
    collector.register(first.clone());
    collector.register(second.clone());

    first.record_window_processed();
    second.record_process_error();

    let snapshot = collector.snapshot();
    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot["first"].windows_processed, 1);
    assert_eq!(snapshot["second"].process_errors, 1);
    assert!(collector.get_dpu_metrics("first").is_some());
    assert!(collector.get_dpu_metrics("third").is_none());
}

#[test]
fn test_monitor_report() {
    let monitor = PipelineMonitor::new(MetricsCollector::new());
    assert_eq!(monitor.generate_report(), "No DPUs registered");

    let mut collector = MetricsCollector::new();
    let metrics = Arc::new(DpuMetrics::new("scale"));
    metrics.record_window_processed();
    metrics.record_process_error();
    collector.register(metrics);

    let report = PipelineMonitor::new(collector).generate_report();
    assert!(report.starts_with("=== DPU Metrics ==="));
    assert!(report.contains("[scale]"));
    assert!(report.contains("1 processed"));
    assert!(report.contains("1 error"));
    assert!(report.contains("Ring: 0/0 windows ready"));
}

#[test]
fn test_monitor_reports_ring_level() {
    let mut collector = MetricsCollector::new();
    let metrics = Arc::new(DpuMetrics::new("rms"));
    collector.register(metrics.clone());

    metrics.record_ring_level(1, 4);
    assert_eq!(collector.snapshot()["rms"].ready_windows, 1);
    let report = PipelineMonitor::new(collector.clone()).generate_report();
    assert!(report.contains("Ring: 1/4 windows ready\n"));

    metrics.record_ring_level(4, 4);
    let report = PipelineMonitor::new(collector).generate_report();
    assert!(report.contains("Ring: 4/4 windows ready (full)"));
}
