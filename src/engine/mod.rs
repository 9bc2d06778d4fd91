pub mod binding;
pub mod dpu;
pub mod pipeline;
pub mod state;
pub mod task;

pub use binding::{ChainBinding, SourceBinding};
pub use dpu::{Dpu, DpuConfig};
pub use pipeline::Pipeline;
pub use state::DpuState;
pub use task::{ProcessingTask, TaskCommand};
