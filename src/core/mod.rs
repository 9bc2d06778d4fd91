pub mod event;
pub mod format;
pub mod listener;
pub mod process;

pub use event::{DataEvent, SourceId, now_micros};
pub use format::{ElementType, WindowFormat, WindowView, WindowViewMut, f32_bytes, i16_bytes};
pub use listener::{DataSource, EventListener, EventSource, FnListener, DEFAULT_MAX_LISTENERS};
pub use process::Process;
