use std::sync::atomic::{AtomicU32, Ordering};

use crate::core::{f32_bytes, i16_bytes, DataEvent, DataSource, EventSource, SourceId, WindowFormat, WindowView};
use crate::error::Result;

/// Source that emits whatever fragments the caller pushes, on the caller's thread
pub struct ManualSource {
    id: SourceId,
    format: WindowFormat,
    tag: AtomicU32,
    events: EventSource,
}

impl ManualSource {
    pub fn new(id: SourceId, format: WindowFormat) -> Self {
        Self {
            id,
            format,
            tag: AtomicU32::new(0),
            events: EventSource::new(),
        }
    }

    pub fn set_tag(&self, tag: u32) {
        self.tag.store(tag, Ordering::Relaxed);
    }

    /// Publish one fragment. Its length may differ from the nominal format.
    pub fn push(&self, data: &[u8]) -> Result<()> {
        let event = DataEvent::new(self.id, WindowView::new(&self.format, data))
            .with_tag(self.tag.load(Ordering::Relaxed));
        self.events.send_event(&event)
    }

    pub fn push_i16(&self, samples: &[i16]) -> Result<()> {
        self.push(&i16_bytes(samples))
    }

    pub fn push_f32(&self, samples: &[f32]) -> Result<()> {
        self.push(&f32_bytes(samples))
    }
}

impl DataSource for ManualSource {
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
