use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

/// Atomic counters for one DPU, safe to bump from any producer context
pub struct DpuMetrics {
    dpu_name: String,
    windows_processed: AtomicU64,
    process_errors: AtomicU64,
    suspended_drops: AtomicU64,
    skipped_events: AtomicU64,
    elements_dropped: AtomicU64,
    total_latency_us: AtomicU64,
    latency_samples: AtomicU64,
    ready_windows: AtomicUsize,
    ring_capacity: AtomicUsize,
}

impl DpuMetrics {
    pub fn new(dpu_name: impl Into<String>) -> Self {
        Self {
            dpu_name: dpu_name.into(),
            windows_processed: AtomicU64::new(0),
            process_errors: AtomicU64::new(0),
            suspended_drops: AtomicU64::new(0),
            skipped_events: AtomicU64::new(0),
            elements_dropped: AtomicU64::new(0),
            total_latency_us: AtomicU64::new(0),
            latency_samples: AtomicU64::new(0),
            ready_windows: AtomicUsize::new(0),
            ring_capacity: AtomicUsize::new(0),
        }
    }

    pub fn dpu_name(&self) -> &str {
        &self.dpu_name
    }

    pub fn windows_processed(&self) -> u64 {
        self.windows_processed.load(Ordering::Relaxed)
    }

    pub fn process_errors(&self) -> u64 {
        self.process_errors.load(Ordering::Relaxed)
    }

    /// Events ignored because the DPU was suspended
    pub fn suspended_drops(&self) -> u64 {
        self.suspended_drops.load(Ordering::Relaxed)
    }

    /// Events dropped because no window was free under skip-data
    pub fn skipped_events(&self) -> u64 {
        self.skipped_events.load(Ordering::Relaxed)
    }

    /// Fragment elements discarded on window overflow
    pub fn elements_dropped(&self) -> u64 {
        self.elements_dropped.load(Ordering::Relaxed)
    }

    /// Windows READY and waiting for processing, as of the last ring transition
    pub fn ready_windows(&self) -> usize {
        self.ready_windows.load(Ordering::Relaxed)
    }

    pub fn ring_capacity(&self) -> usize {
        self.ring_capacity.load(Ordering::Relaxed)
    }

    pub fn record_ring_level(&self, ready: usize, capacity: usize) {
        self.ready_windows.store(ready, Ordering::Relaxed);
        self.ring_capacity.store(capacity, Ordering::Relaxed);
    }

    pub fn record_window_processed(&self) {
        self.windows_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_process_error(&self) {
        self.process_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_suspended_drop(&self) {
        self.suspended_drops.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped_event(&self) {
        self.skipped_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_elements_dropped(&self, elements: usize) {
        self.elements_dropped.fetch_add(elements as u64, Ordering::Relaxed);
    }

    pub fn start_processing(&self) -> Instant {
        Instant::now()
    }

    pub fn finish_processing(&self, start: Instant) {
        let latency_us = start.elapsed().as_micros() as u64;
        self.total_latency_us.fetch_add(latency_us, Ordering::Relaxed);
        self.latency_samples.fetch_add(1, Ordering::Relaxed);
    }

    pub fn avg_latency_us(&self) -> u64 {
        let samples = self.latency_samples.load(Ordering::Relaxed);
        if samples == 0 {
            return 0;
        }
        self.total_latency_us.load(Ordering::Relaxed) / samples
    }
}
