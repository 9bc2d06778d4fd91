pub mod metrics;
pub mod collector;
pub mod monitor;

pub use metrics::DpuMetrics;
pub use collector::{MetricsCollector, MetricsSnapshot};
pub use monitor::PipelineMonitor;
