use thiserror::Error;

use crate::core::{ElementType, SourceId};

/// Structured error codes reported by the windowing and chaining layer
#[derive(Error, Debug)]
pub enum DpuError {
    #[error("no free window in the ring buffer")]
    NoFreeItem,

    #[error("no ready window in the ring buffer")]
    NoReadyItem,

    #[error("a window is already being filled")]
    ItemAlreadyFilling,

    #[error("window handle {0} is not in the expected state")]
    InvalidItem(usize),

    #[error("unable to reserve {0} bytes")]
    OutOfMemory(usize),

    #[error("already attached")]
    AlreadyAttached,

    #[error("DPU is the target of a chain and cannot take data sources")]
    ChainTarget,

    #[error("DPU has data sources attached and cannot be a chain target")]
    HasDataSources,

    #[error("chain would form a cycle")]
    ChainCycle,

    #[error("no binding for source {0}")]
    UnknownSource(SourceId),

    #[error("DPU is not the target of a chain")]
    NotChained,

    #[error("listener capacity {0} reached")]
    ListenerCapacity(usize),

    #[error("input buffer not set")]
    NoInputBuffer,

    #[error("output buffer not set")]
    NoOutputBuffer,

    #[error("invalid buffer size {size}: expected a multiple of {item_size}")]
    InvalidBufferSize { size: usize, item_size: usize },

    #[error("incompatible element types: {input:?} into {target:?}")]
    IncompatibleFormat { input: ElementType, target: ElementType },

    #[error("window buffer overrun on DPU {0}")]
    Overrun(SourceId),

    #[error("process failed: {0}")]
    Process(String),

    #[error("processing task stopped")]
    TaskStopped,
}

impl DpuError {
    /// Overrun under no-data-loss is the only condition the host must treat as unrecoverable.
    pub fn is_fatal(&self) -> bool {
        matches!(self, DpuError::Overrun(_))
    }
}

pub type Result<T> = std::result::Result<T, DpuError>;
