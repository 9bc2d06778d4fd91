use std::sync::{Arc, Mutex};

use super::{DataEvent, SourceId, WindowFormat};
use crate::error::{DpuError, Result};

/// Default number of listeners an [`EventSource`] accepts
pub const DEFAULT_MAX_LISTENERS: usize = 8;

/// Receiver of data-ready notifications
pub trait EventListener: Send + Sync {
    /// Called synchronously on the producer's thread. Must not block.
    fn on_new_data_ready(&self, event: &DataEvent<'_>) -> Result<()>;
}

/// Capability of anything that produces windows: a stable id plus an event source to subscribe to
pub trait DataSource: Send + Sync {
    fn id(&self) -> SourceId;

    /// Layout of the fragments this source emits
    fn format(&self) -> WindowFormat;

    fn event_source(&self) -> &EventSource;
}

/// Bounded fan-out publisher
pub struct EventSource {
    listeners: Mutex<Vec<Arc<dyn EventListener>>>,
    capacity: usize,
}

impl EventSource {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_LISTENERS)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            listeners: Mutex::new(Vec::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn add_listener(&self, listener: Arc<dyn EventListener>) -> Result<()> {
        let mut listeners = self.lock();
        if listeners.iter().any(|l| same_listener(l, &listener)) {
            return Err(DpuError::AlreadyAttached);
        }
        if listeners.len() >= self.capacity {
            return Err(DpuError::ListenerCapacity(self.capacity));
        }
        listeners.push(listener);
        Ok(())
    }

    /// Returns false if the listener was not registered
    pub fn remove_listener(&self, listener: &Arc<dyn EventListener>) -> bool {
        let mut listeners = self.lock();
        let before = listeners.len();
        listeners.retain(|l| !same_listener(l, listener));
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.lock().len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Deliver `event` to every listener in registration order.
    ///
    /// Every listener is called even if an earlier one fails; the first error is returned.
    pub fn send_event(&self, event: &DataEvent<'_>) -> Result<()> {
        // Snapshot so listeners may (un)subscribe from inside their callback
        let listeners: Vec<Arc<dyn EventListener>> = self.lock().clone();

        let mut first_error = None;
        for listener in listeners {
            if let Err(e) = listener.on_new_data_ready(event) {
                log::warn!("listener failed on event from {}: {}", event.source_id, e);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Arc<dyn EventListener>>> {
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for EventSource {
    fn default() -> Self {
        Self::new()
    }
}

fn same_listener(a: &Arc<dyn EventListener>, b: &Arc<dyn EventListener>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

/// Listener backed by a closure
pub struct FnListener<F> {
    callback: F,
}

impl<F> FnListener<F>
where
    F: Fn(&DataEvent<'_>) -> Result<()> + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> EventListener for FnListener<F>
where
    F: Fn(&DataEvent<'_>) -> Result<()> + Send + Sync,
{
    fn on_new_data_ready(&self, event: &DataEvent<'_>) -> Result<()> {
        (self.callback)(event)
    }
}
