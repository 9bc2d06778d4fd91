use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::builders::{DataBuilder, OverflowPolicy};
use crate::core::{DataSource, SourceId};
use crate::error::{DpuError, Result};
use crate::resilience::FailurePolicy;
use super::Dpu;

type Reply<T> = oneshot::Sender<Result<T>>;

/// Commands serialized through a processing task
pub enum TaskCommand {
    AttachToDataSource {
        source: Arc<dyn DataSource>,
        builder: Box<dyn DataBuilder>,
        policy: OverflowPolicy,
        reply: Reply<()>,
    },
    DetachFromDataSource {
        source_id: SourceId,
        reply: Reply<Option<Box<dyn DataBuilder>>>,
    },
    AttachToDpu {
        next: Arc<Dpu>,
        builder: Box<dyn DataBuilder>,
        policy: OverflowPolicy,
        reply: Reply<()>,
    },
    DetachFromDpu {
        reply: Reply<Option<Box<dyn DataBuilder>>>,
    },
    SetInDataBuffer {
        size: usize,
        reply: Reply<()>,
    },
    SetOutDataBuffer {
        size: usize,
        reply: Reply<()>,
    },
    Suspend {
        reply: Reply<()>,
    },
    Resume {
        reply: Reply<()>,
    },
    Reset {
        reply: Reply<()>,
    },
    /// A window became READY; posted from the producer's context
    NewDataReady,
    Shutdown {
        reply: Reply<()>,
    },
}

/// Runs a DPU's deferred processing and every configuration change on one tokio task.
///
/// Window completion only posts `NewDataReady`, so producers never run `Process`
/// themselves.
pub struct ProcessingTask {
    dpu: Arc<Dpu>,
    tx: mpsc::Sender<TaskCommand>,
    handle: Option<JoinHandle<()>>,
}

impl ProcessingTask {
    /// Spawn the task on the current tokio runtime
    pub fn spawn(dpu: Arc<Dpu>, queue_capacity: usize, failure_policy: FailurePolicy) -> Self {
        let (tx, rx) = mpsc::channel(queue_capacity);

        let notify_tx = tx.clone();
        dpu.register_notify_callback(move |dpu: &Dpu| {
            // A dropped notification is harmless: READY windows are drained after every command
            if let Err(mpsc::error::TrySendError::Closed(_)) = notify_tx.try_send(TaskCommand::NewDataReady) {
                log::warn!("DPU {} notification after task stopped", dpu.name());
            }
        });

        let handle = tokio::spawn(run(dpu.clone(), rx, failure_policy));

        Self {
            dpu,
            tx,
            handle: Some(handle),
        }
    }

    pub fn dpu(&self) -> &Arc<Dpu> {
        &self.dpu
    }

    /// Post a data-ready notification without waiting. Usable from non-async contexts.
    pub fn notify_new_data_ready(&self) -> bool {
        self.tx.try_send(TaskCommand::NewDataReady).is_ok()
    }

    pub async fn attach_to_data_source(
        &self,
        source: Arc<dyn DataSource>,
        builder: Box<dyn DataBuilder>,
        policy: OverflowPolicy,
    ) -> Result<()> {
        self.request(|reply| TaskCommand::AttachToDataSource {
            source,
            builder,
            policy,
            reply,
        })
        .await
    }

    pub async fn detach_from_data_source(&self, source_id: SourceId) -> Result<Option<Box<dyn DataBuilder>>> {
        self.request(|reply| TaskCommand::DetachFromDataSource { source_id, reply })
            .await
    }

    pub async fn attach_to_dpu(
        &self,
        next: Arc<Dpu>,
        builder: Box<dyn DataBuilder>,
        policy: OverflowPolicy,
    ) -> Result<()> {
        self.request(|reply| TaskCommand::AttachToDpu {
            next,
            builder,
            policy,
            reply,
        })
        .await
    }

    pub async fn detach_from_dpu(&self) -> Result<Option<Box<dyn DataBuilder>>> {
        self.request(|reply| TaskCommand::DetachFromDpu { reply }).await
    }

    pub async fn set_in_data_buffer(&self, size: usize) -> Result<()> {
        self.request(|reply| TaskCommand::SetInDataBuffer { size, reply })
            .await
    }

    pub async fn set_out_data_buffer(&self, size: usize) -> Result<()> {
        self.request(|reply| TaskCommand::SetOutDataBuffer { size, reply })
            .await
    }

    pub async fn suspend(&self) -> Result<()> {
        self.request(|reply| TaskCommand::Suspend { reply }).await
    }

    pub async fn resume(&self) -> Result<()> {
        self.request(|reply| TaskCommand::Resume { reply }).await
    }

    pub async fn reset(&self) -> Result<()> {
        self.request(|reply| TaskCommand::Reset { reply }).await
    }

    /// Stop the task and hand processing back to the producer's thread
    pub async fn shutdown(mut self) -> Result<()> {
        let result = self.request(|reply| TaskCommand::Shutdown { reply }).await;
        if let Some(handle) = self.handle.take() {
            handle.await.map_err(|_| DpuError::TaskStopped)?;
        }
        self.dpu.clear_notify_callback();
        match result {
            Err(DpuError::TaskStopped) => Ok(()),
            other => other,
        }
    }

    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> TaskCommand) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| DpuError::TaskStopped)?;
        rx.await.map_err(|_| DpuError::TaskStopped)?
    }
}

// Dropping without `shutdown()` only signals the task; it cannot await it.
impl Drop for ProcessingTask {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.dpu.clear_notify_callback();
            let (reply, _) = oneshot::channel();
            let _ = self.tx.try_send(TaskCommand::Shutdown { reply });
        }
    }
}

async fn run(dpu: Arc<Dpu>, mut rx: mpsc::Receiver<TaskCommand>, failure_policy: FailurePolicy) {
    log::debug!("processing task for DPU {} started", dpu.name());

    while let Some(command) = rx.recv().await {
        match command {
            TaskCommand::AttachToDataSource {
                source,
                builder,
                policy,
                reply,
            } => {
                let _ = reply.send(dpu.attach_to_data_source(source, builder, policy));
            }
            TaskCommand::DetachFromDataSource { source_id, reply } => {
                let _ = reply.send(dpu.detach_from_data_source(source_id));
            }
            TaskCommand::AttachToDpu {
                next,
                builder,
                policy,
                reply,
            } => {
                let _ = reply.send(dpu.attach_to_dpu(next, builder, policy));
            }
            TaskCommand::DetachFromDpu { reply } => {
                let _ = reply.send(dpu.detach_from_dpu());
            }
            TaskCommand::SetInDataBuffer { size, reply } => {
                let _ = reply.send(dpu.set_in_data_buffer(size));
            }
            TaskCommand::SetOutDataBuffer { size, reply } => {
                let _ = reply.send(dpu.set_out_data_buffer(size));
            }
            TaskCommand::Suspend { reply } => {
                dpu.suspend();
                let _ = reply.send(Ok(()));
            }
            TaskCommand::Resume { reply } => {
                dpu.resume();
                let _ = reply.send(Ok(()));
            }
            TaskCommand::Reset { reply } => {
                dpu.reset();
                let _ = reply.send(Ok(()));
            }
            TaskCommand::NewDataReady => {}
            TaskCommand::Shutdown { reply } => {
                dpu.clear_notify_callback();
                let _ = reply.send(Ok(()));
                break;
            }
        }

        if !drain_ready_windows(&dpu, failure_policy) {
            dpu.clear_notify_callback();
            break;
        }
    }

    log::debug!("processing task for DPU {} stopped", dpu.name());
}

/// Process every window that is READY now. Returns false if the task must stop.
fn drain_ready_windows(dpu: &Dpu, failure_policy: FailurePolicy) -> bool {
    let Some(ring) = dpu.ring() else {
        return true;
    };

    // Bounded so a window that cannot be consumed does not spin the task
    for _ in 0..ring.capacity() {
        if !dpu.has_ready_window() {
            break;
        }
        if let Err(e) = dpu.process_and_dispatch() {
            log::warn!("DPU {} process failed: {}", dpu.name(), e);
            match failure_policy {
                FailurePolicy::Ignore => {}
                FailurePolicy::Suspend => dpu.suspend(),
                FailurePolicy::Stop => return false,
            }
        }
    }
    true
}
