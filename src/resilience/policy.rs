use serde::{Deserialize, Serialize};

/// What a processing task does when a deferred `process_and_dispatch` fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailurePolicy {
    /// Log the error and keep processing
    Ignore,

    /// Suspend the DPU so no new input is accepted; queued windows still drain
    Suspend,

    /// Stop the task; later commands fail with `TaskStopped`
    Stop,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        FailurePolicy::Ignore
    }
}
