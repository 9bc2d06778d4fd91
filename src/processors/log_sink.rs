use std::sync::atomic::{AtomicU64, Ordering};

use crate::core::{DataEvent, ElementType, EventListener};
use crate::error::Result;

/// Listener that logs a one-line summary of every window it receives
pub struct LogListener {
    label: String,
    received: AtomicU64,
}

impl LogListener {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            received: AtomicU64::new(0),
        }
    }

    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }
}

impl EventListener for LogListener {
    fn on_new_data_ready(&self, event: &DataEvent<'_>) -> Result<()> {
        let count = self.received.fetch_add(1, Ordering::Relaxed) + 1;

        let stats = match event.window.format.element {
            ElementType::F32 => summarize(event.window.to_f32().into_iter()),
            ElementType::I16 => summarize(event.window.to_i16().into_iter().map(f32::from)),
            other => format!("{} bytes of {:?}", event.window.data.len(), other),
        };
        log::info!(
            "[{}] window #{} from {} @ {}μs tag={}: {}",
            self.label,
            count,
            event.source_id,
            event.timestamp,
            event.tag,
            stats
        );
        Ok(())
    }
}

fn summarize(samples: impl Iterator<Item = f32>) -> String {
    let (mut len, mut sum, mut squares) = (0usize, 0.0f32, 0.0f32);
    for x in samples {
        len += 1;
        sum += x;
        squares += x * x;
    }
    if len == 0 {
        return "empty".to_string();
    }
    let mean = sum / len as f32;
    let rms = (squares / len as f32).sqrt();
    format!("len={}, mean={:.4}, rms={:.4}", len, mean, rms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{f32_bytes, SourceId, WindowFormat, WindowView};

    #[test]
    fn test_counts_windows() {
        let listener = LogListener::new("test");
        let format = WindowFormat::vector(ElementType::F32, 2);
        let data = f32_bytes(&[1.0, -1.0]);

        listener
            .on_new_data_ready(&DataEvent::new(SourceId(1), WindowView::new(&format, &data)))
            .unwrap();
        listener
            .on_new_data_ready(&DataEvent::new(SourceId(1), WindowView::new(&format, &data)))
            .unwrap();

        assert_eq!(listener.received(), 2);
    }

    #[test]
    fn test_summary() {
        assert_eq!(summarize([3.0f32, -3.0].into_iter()), "len=2, mean=0.0000, rms=3.0000");
        assert_eq!(summarize(std::iter::empty()), "empty");
    }
}
