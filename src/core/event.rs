use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use super::WindowView;

/// Stable numeric identifier of a data source (sensor or DPU)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceId(pub u16);

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Data-ready notification passed synchronously to listeners.
///
/// The payload is borrowed for the duration of the callback only.
#[derive(Debug, Clone, Copy)]
pub struct DataEvent<'a> {
    /// Identifier of the producer
    pub source_id: SourceId,

    /// Timestamp in microseconds since epoch
    pub timestamp: u64,

    /// Payload and its layout
    pub window: WindowView<'a>,

    /// Application-defined tag of the producing pipeline
    pub tag: u32,
}

impl<'a> DataEvent<'a> {
    pub fn new(source_id: SourceId, window: WindowView<'a>) -> Self {
        Self {
            source_id,
            timestamp: now_micros(),
            window,
            tag: 0,
        }
    }

    pub fn with_tag(mut self, tag: u32) -> Self {
        self.tag = tag;
        self
    }
}

/// Current wall-clock time in microseconds
pub fn now_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}
