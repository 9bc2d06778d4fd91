pub mod buffers;
pub mod builders;
pub mod core;
pub mod engine;
pub mod error;
pub mod observability;
pub mod processors;
pub mod resilience;
pub mod sources;

pub use engine::{Dpu, DpuConfig, Pipeline, ProcessingTask};
pub use error::{DpuError, Result};
