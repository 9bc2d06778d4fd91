use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use std::f64::consts::PI;
use std::sync::{Arc, Mutex, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::core::{i16_bytes, DataEvent, DataSource, ElementType, EventSource, SourceId, WindowFormat, WindowView};
use crate::error::Result;

/// Emits 16-bit sine fragments, either on demand or from a background thread
pub struct SineSource {
    id: SourceId,
    format: WindowFormat,
    frequency: f64,
    sample_rate: f64,
    amplitude: f64,
    phase: Mutex<f64>,
    events: EventSource,
    worker: Mutex<Option<(Sender<()>, JoinHandle<()>)>>,
}

impl SineSource {
    pub fn new(id: SourceId, frequency: f64, sample_rate: f64, fragment_len: usize) -> Self {
        Self {
            id,
            format: WindowFormat::vector(ElementType::I16, fragment_len),
            frequency,
            sample_rate,
            amplitude: f64::from(i16::MAX) * 0.5,
            phase: Mutex::new(0.0),
            events: EventSource::new(),
            worker: Mutex::new(None),
        }
    }

    /// Peak value as a fraction of i16 full scale
    pub fn with_amplitude(mut self, fraction: f64) -> Self {
        self.amplitude = f64::from(i16::MAX) * fraction.clamp(0.0, 1.0);
        self
    }

    /// Generate and publish one fragment, continuing the phase of the previous one
    pub fn emit(&self) -> Result<()> {
        let samples = {
            let mut phase = self.phase.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            let increment = 2.0 * PI * self.frequency / self.sample_rate;
            let samples: Vec<i16> = (0..self.format.elements())
                .map(|i| ((*phase + i as f64 * increment).sin() * self.amplitude).round() as i16)
                .collect();
            *phase = (*phase + samples.len() as f64 * increment) % (2.0 * PI);
            samples
        };

        let data = i16_bytes(&samples);
        self.events
            .send_event(&DataEvent::new(self.id, WindowView::new(&self.format, &data)))
    }

    /// Emit a fragment every `interval` on a dedicated thread until `stop`
    pub fn start(self: &Arc<Self>, interval: Duration) {
        let mut worker = self.worker.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if worker.is_some() {
            return;
        }

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let source: Weak<Self> = Arc::downgrade(self);
        let handle = thread::spawn(move || loop {
            match stop_rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => {}
                _ => break,
            }
            let Some(source) = source.upgrade() else {
                break;
            };
            if let Err(e) = source.emit() {
                log::warn!("sine source {} emit failed: {}", source.id, e);
            }
        });

        log::debug!("sine source {} started ({:?} interval)", self.id, interval);
        *worker = Some((stop_tx, handle));
    }

    pub fn stop(&self) {
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some((stop_tx, handle)) = worker {
            let _ = stop_tx.send(());
            if handle.join().is_err() {
                log::warn!("sine source {} worker panicked", self.id);
            }
            log::debug!("sine source {} stopped", self.id);
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_some()
    }
}

impl DataSource for SineSource {
    fn id(&self) -> SourceId {
        self.id
    }

    fn format(&self) -> WindowFormat {
        self.format.clone()
    }

    fn event_source(&self) -> &EventSource {
        &self.events
    }
}

impl Drop for SineSource {
    fn drop(&mut self) {
        let worker = self
            .worker
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some((stop_tx, _handle)) = worker {
            let _ = stop_tx.send(());
        }
    }
}
