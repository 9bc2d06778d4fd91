use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use crate::buffers::{ItemHandle, RingBuffer};
use crate::builders::{BuildStatus, BuildTarget, DataBuilder, OverflowPolicy};
use crate::core::{
    now_micros, DataEvent, DataSource, EventListener, EventSource, Process, SourceId, WindowFormat,
    WindowView, WindowViewMut,
};
use crate::error::{DpuError, Result};
use crate::observability::DpuMetrics;
use super::binding::{ChainBinding, SourceBinding};
use super::DpuState;

type NotifyCallback = Arc<dyn Fn(&Dpu) + Send + Sync>;
type FatalHandler = Arc<dyn Fn(&Dpu, &DpuError) + Send + Sync>;

fn default_windows() -> usize {
    2
}

/// Static description of a DPU
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DpuConfig {
    pub id: SourceId,
    pub name: String,
    pub input: WindowFormat,
    pub output: WindowFormat,

    /// Input ring capacity in windows
    #[serde(default = "default_windows")]
    pub windows: usize,
}

/// Producer-side state: bindings and the window being filled
struct InputStage {
    bindings: Vec<SourceBinding>,
    chained_as_next: bool,
    filling: Option<ItemHandle>,
}

/// Consumer-side state: the transform, its output payload and the downstream link
struct OutputStage {
    processor: Box<dyn Process>,
    buffer: Option<Box<[u8]>>,
    chain: Option<ChainBinding>,
}

/// Which builder an incoming fragment goes through
enum Lane<'a> {
    Source(usize),
    Chain(&'a mut dyn DataBuilder),
}

/// Digital Processing Unit: windows its input, runs `Process` on each complete
/// window and dispatches the result to listeners and to at most one next DPU.
///
/// Lock order is input stage, then output stage, then the next DPU's input
/// stage. The ring buffer's own critical section is always innermost.
pub struct Dpu {
    id: SourceId,
    name: String,
    in_format: WindowFormat,
    out_format: WindowFormat,
    suspended: AtomicBool,
    tag: AtomicU32,
    ring: RwLock<Option<Arc<RingBuffer>>>,
    input: Mutex<InputStage>,
    output: Mutex<OutputStage>,
    events: EventSource,
    notify: RwLock<Option<NotifyCallback>>,
    fatal: RwLock<FatalHandler>,
    metrics: Arc<DpuMetrics>,
}

impl Dpu {
    /// Create a DPU with no buffers, sources or chain
    pub fn new(config: &DpuConfig, processor: Box<dyn Process>) -> Arc<Self> {
        let fatal: FatalHandler = Arc::new(|dpu: &Dpu, err: &DpuError| {
            log::error!("DPU {} ({}): {}", dpu.name(), dpu.id(), err);
        });

        Arc::new(Self {
            id: config.id,
            name: config.name.clone(),
            in_format: config.input.clone(),
            out_format: config.output.clone(),
            suspended: AtomicBool::new(false),
            tag: AtomicU32::new(0),
            ring: RwLock::new(None),
            input: Mutex::new(InputStage {
                bindings: Vec::new(),
                chained_as_next: false,
                filling: None,
            }),
            output: Mutex::new(OutputStage {
                processor,
                buffer: None,
                chain: None,
            }),
            events: EventSource::new(),
            notify: RwLock::new(None),
            fatal: RwLock::new(fatal),
            metrics: Arc::new(DpuMetrics::new(config.name.clone())),
        })
    }

    /// Create a DPU and size its input ring and output buffer from `config`
    pub fn with_buffers(config: &DpuConfig, processor: Box<dyn Process>) -> Result<Arc<Self>> {
        let dpu = Self::new(config, processor);
        dpu.set_in_data_buffer(config.input.byte_len() * config.windows)?;
        dpu.set_out_data_buffer(config.output.byte_len())?;
        Ok(dpu)
    }

    pub fn id(&self) -> SourceId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn in_format(&self) -> &WindowFormat {
        &self.in_format
    }

    pub fn out_format(&self) -> &WindowFormat {
        &self.out_format
    }

    pub fn metrics(&self) -> Arc<DpuMetrics> {
        self.metrics.clone()
    }

    pub fn events(&self) -> &EventSource {
        &self.events
    }

    /// Input ring, if one is set
    pub fn ring(&self) -> Option<Arc<RingBuffer>> {
        self.ring
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn set_tag(&self, tag: u32) {
        self.tag.store(tag, Ordering::Relaxed);
    }

    pub fn tag(&self) -> u32 {
        self.tag.load(Ordering::Relaxed)
    }

    pub fn state(&self) -> DpuState {
        if self.suspended.load(Ordering::Acquire) {
            DpuState::Suspended
        } else {
            DpuState::Active
        }
    }

    pub fn is_suspended(&self) -> bool {
        self.state() == DpuState::Suspended
    }

    /// Stop accepting input. A window already being filled stays claimed.
    pub fn suspend(&self) {
        self.suspended.store(true, Ordering::Release);
        log::debug!("DPU {} suspended", self.name);
    }

    pub fn resume(&self) {
        self.suspended.store(false, Ordering::Release);
        log::debug!("DPU {} resumed", self.name);
    }

    /// Discard every in-flight window and rewind all builders, including the chain builder
    pub fn reset(&self) {
        let mut input = self.lock_input();
        let mut output = self.lock_output();

        if let Some(ring) = self.ring() {
            ring.init();
            self.record_ring_level(&ring);
        }
        input.filling = None;
        start_generation(&mut input.bindings, None);
        if let Some(chain) = output.chain.as_mut() {
            chain.builder.reset();
        }
        log::debug!("DPU {} reset", self.name);
    }

    /// Size the input ring in bytes. Zero releases it.
    pub fn set_in_data_buffer(&self, size: usize) -> Result<()> {
        let mut input = self.lock_input();
        let _output = self.lock_output();

        let ring = if size == 0 {
            None
        } else {
            let item_size = self.in_format.byte_len();
            if item_size == 0 || size % item_size != 0 {
                return Err(DpuError::InvalidBufferSize { size, item_size });
            }
            Some(Arc::new(RingBuffer::allocate(size / item_size, item_size)?))
        };

        log::debug!(
            "DPU {} input ring: {} windows",
            self.name,
            ring.as_ref().map(|r| r.capacity()).unwrap_or(0)
        );
        match ring.as_ref() {
            Some(ring) => self.record_ring_level(ring),
            None => self.metrics.record_ring_level(0, 0),
        }
        *self.ring.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = ring;
        input.filling = None;
        start_generation(&mut input.bindings, None);
        Ok(())
    }

    /// Size the output payload in bytes. Zero releases it.
    pub fn set_out_data_buffer(&self, size: usize) -> Result<()> {
        let mut output = self.lock_output();

        if size == 0 {
            output.buffer = None;
            return Ok(());
        }

        let needed = self.out_format.byte_len();
        if size < needed {
            return Err(DpuError::InvalidBufferSize { size, item_size: needed });
        }

        let mut buffer = Vec::new();
        buffer
            .try_reserve_exact(size)
            .map_err(|_| DpuError::OutOfMemory(size))?;
        buffer.resize(size, 0u8);
        output.buffer = Some(buffer.into_boxed_slice());
        Ok(())
    }

    /// Defer processing: on window completion `callback` runs instead of
    /// `process_and_dispatch`, which then becomes the caller's job.
    ///
    /// The callback runs with the input stage locked and must not reconfigure the DPU.
    pub fn register_notify_callback<F>(&self, callback: F)
    where
        F: Fn(&Dpu) + Send + Sync + 'static,
    {
        let callback: NotifyCallback = Arc::new(callback);
        *self.notify.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(callback);
    }

    /// Go back to processing inline on the producer's thread
    pub fn clear_notify_callback(&self) {
        *self.notify.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
    }

    /// Replace the handler invoked on a no-data-loss overrun
    pub fn set_fatal_handler<F>(&self, handler: F)
    where
        F: Fn(&Dpu, &DpuError) + Send + Sync + 'static,
    {
        let handler: FatalHandler = Arc::new(handler);
        *self.fatal.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = handler;
    }

    /// Subscribe to `source` and build its fragments into this DPU's windows
    pub fn attach_to_data_source(
        self: &Arc<Self>,
        source: Arc<dyn DataSource>,
        builder: Box<dyn DataBuilder>,
        policy: OverflowPolicy,
    ) -> Result<()> {
        let mut input = self.lock_input();
        if input.chained_as_next {
            return Err(DpuError::ChainTarget);
        }
        if input.bindings.iter().any(|b| b.source_id == source.id()) {
            return Err(DpuError::AlreadyAttached);
        }
        builder.check_formats(&source.format(), &self.in_format)?;

        let listener: Arc<dyn EventListener> = self.clone();
        source.event_source().add_listener(listener)?;

        let mut binding = SourceBinding::new(&source, builder, policy);
        binding.builder.reset();
        input.bindings.push(binding);

        log::debug!(
            "DPU {} attached to source {} ({} bound)",
            self.name,
            source.id(),
            input.bindings.len()
        );
        Ok(())
    }

    /// Unsubscribe from a source. Returns its builder, or `None` if nothing was bound.
    pub fn detach_from_data_source(self: &Arc<Self>, source_id: SourceId) -> Result<Option<Box<dyn DataBuilder>>> {
        let mut input = self.lock_input();
        let Some(position) = input.bindings.iter().position(|b| b.source_id == source_id) else {
            return Ok(None);
        };

        let binding = input.bindings.remove(position);
        if let Some(source) = binding.source.upgrade() {
            let listener: Arc<dyn EventListener> = self.clone();
            source.event_source().remove_listener(&listener);
        }
        log::debug!("DPU {} detached from source {}", self.name, source_id);

        // The detached source may have been the last one the current window waited on
        let waiting_on_none = !input.bindings.is_empty() && input.bindings.iter().all(|b| b.done);
        if waiting_on_none {
            if let (Some(ring), Some(item)) = (self.ring(), input.filling.take()) {
                let mut process_error = None;
                self.complete_window(&ring, item, &mut process_error)?;
                self.claim_next(&ring, &mut input, None)?;
                if let Some(e) = process_error {
                    return Err(e);
                }
            }
        }

        Ok(Some(binding.builder))
    }

    /// Number of bound upstream sources
    pub fn source_count(&self) -> usize {
        self.lock_input().bindings.len()
    }

    /// Fill index of the builder bound to `source_id`
    pub fn builder_fill_index(&self, source_id: SourceId) -> Option<usize> {
        self.lock_input()
            .bindings
            .iter()
            .find(|b| b.source_id == source_id)
            .map(|b| b.fill_index())
    }

    pub fn is_chained_as_next(&self) -> bool {
        self.lock_input().chained_as_next
    }

    /// Feed this DPU's output into `next` through `builder`
    pub fn attach_to_dpu(
        self: &Arc<Self>,
        next: Arc<Dpu>,
        mut builder: Box<dyn DataBuilder>,
        policy: OverflowPolicy,
    ) -> Result<()> {
        let mut output = self.lock_output();
        if output.chain.is_some() {
            return Err(DpuError::AlreadyAttached);
        }
        if next.reaches(self) {
            return Err(DpuError::ChainCycle);
        }
        builder.check_formats(&self.out_format, &next.in_format)?;

        {
            let mut next_input = next.lock_input();
            if next_input.chained_as_next {
                return Err(DpuError::AlreadyAttached);
            }
            if !next_input.bindings.is_empty() {
                return Err(DpuError::HasDataSources);
            }
            next_input.chained_as_next = true;
        }

        builder.reset();
        log::debug!("DPU {} chained to {}", self.name, next.name);
        output.chain = Some(ChainBinding { next, builder, policy });
        Ok(())
    }

    /// Drop the downstream link. Returns its builder, or `None` if not chained.
    pub fn detach_from_dpu(&self) -> Result<Option<Box<dyn DataBuilder>>> {
        let mut output = self.lock_output();
        let Some(chain) = output.chain.take() else {
            return Ok(None);
        };

        chain.next.lock_input().chained_as_next = false;
        log::debug!("DPU {} unchained from {}", self.name, chain.next.name);
        Ok(Some(chain.builder))
    }

    /// Downstream DPU, if any
    pub fn next_dpu(&self) -> Option<Arc<Dpu>> {
        self.lock_output().chain.as_ref().map(|c| c.next.clone())
    }

    /// True if a READY window is waiting for `process_and_dispatch`
    pub fn has_ready_window(&self) -> bool {
        self.ring()
            .map(|r| r.get_ready_item_from_tail().is_some())
            .unwrap_or(false)
    }

    /// Run `Process` on the oldest READY window and dispatch the result
    pub fn process_and_dispatch(&self) -> Result<()> {
        let ring = self.ring().ok_or(DpuError::NoInputBuffer)?;
        let mut output = self.lock_output();
        let item = ring.get_ready_item_from_tail().ok_or(DpuError::NoReadyItem)?;

        let OutputStage { processor, buffer, chain } = &mut *output;
        let out_len = self.out_format.byte_len();

        // The window is consumed whatever the outcome, or it would block the ring
        let start = self.metrics.start_processing();
        let processed = match buffer.as_deref_mut() {
            Some(buffer) => {
                let data = ring.get_item_data(item);
                let input = WindowView::new(&self.in_format, &data);
                let mut out = WindowViewMut::new(&self.out_format, &mut buffer[..out_len]);
                match processor.process(&input, &mut out) {
                    Ok(()) => Ok(&buffer[..out_len]),
                    Err(e) => Err(e),
                }
            }
            None => Err(DpuError::NoOutputBuffer),
        };
        ring.release_item(item)?;
        self.record_ring_level(&ring);

        let payload = match processed {
            Ok(payload) => payload,
            Err(e) => {
                self.metrics.record_process_error();
                log::debug!("DPU {} {} failed on window {}: {}", self.name, processor.name(), item.index(), e);
                return Err(e);
            }
        };
        self.metrics.finish_processing(start);
        self.metrics.record_window_processed();

        let event = DataEvent {
            source_id: self.id,
            timestamp: now_micros(),
            window: WindowView::new(&self.out_format, payload),
            tag: self.tag(),
        };
        log::trace!("DPU {} ({}) dispatching window at {}", self.name, processor.name(), event.timestamp);
        self.dispatch_events(&event, chain.as_mut())
    }

    /// Listeners first, then the next DPU
    fn dispatch_events(&self, event: &DataEvent<'_>, chain: Option<&mut ChainBinding>) -> Result<()> {
        let listeners = self.events.send_event(event);
        let chained = match chain {
            Some(chain) => chain
                .next
                .on_chain_data(event, chain.builder.as_mut(), chain.policy),
            None => Ok(()),
        };
        listeners.and(chained)
    }

    fn on_chain_data(&self, event: &DataEvent<'_>, builder: &mut dyn DataBuilder, policy: OverflowPolicy) -> Result<()> {
        if self.is_suspended() {
            self.metrics.record_suspended_drop();
            return Ok(());
        }

        let mut input = self.lock_input();
        if !input.chained_as_next {
            return Err(DpuError::NotChained);
        }
        self.build(&mut input, event, Lane::Chain(builder), policy)
    }

    /// Claim, build, complete: the windowing step shared by sources and chains
    fn build(&self, input: &mut InputStage, event: &DataEvent<'_>, mut lane: Lane<'_>, policy: OverflowPolicy) -> Result<()> {
        let ring = self.ring().ok_or(DpuError::NoInputBuffer)?;

        let item = match input.filling {
            Some(item) => item,
            None => match claim_window(&ring) {
                Ok(item) => {
                    input.filling = Some(item);
                    start_generation(&mut input.bindings, lane.chain_builder());
                    item
                }
                Err(DpuError::NoFreeItem) => return self.overrun(policy),
                Err(e) => return Err(e),
            },
        };

        let mut process_error = None;
        let mut chain_done = false;
        let status = {
            let InputStage { bindings, filling, .. } = &mut *input;
            let (builder, done, peers): (&mut dyn DataBuilder, &mut bool, [&mut [SourceBinding]; 2]) = match &mut lane {
                Lane::Source(index) => {
                    let (before, rest) = bindings.split_at_mut(*index);
                    let (current, after) = rest
                        .split_first_mut()
                        .ok_or(DpuError::UnknownSource(event.source_id))?;
                    (current.builder.as_mut(), &mut current.done, [before, after])
                }
                Lane::Chain(builder) => (&mut **builder, &mut chain_done, [Default::default(), Default::default()]),
            };

            let mut target = WindowTarget {
                dpu: self,
                ring: &ring,
                filling,
                slot: Some(ring.get_item_data(item)),
                done,
                peers,
                process_error: &mut process_error,
            };
            builder.on_new_in_data(&mut target, &event.window, policy)?
        };

        if status == BuildStatus::DataReady {
            let complete = match &lane {
                Lane::Source(index) => {
                    input.bindings[*index].done = true;
                    input.bindings.iter().all(|b| b.done)
                }
                Lane::Chain(_) => true,
            };

            if complete {
                if let Some(item) = input.filling.take() {
                    self.complete_window(&ring, item, &mut process_error)?;
                    self.claim_next(&ring, input, lane.chain_builder())?;
                }
            }
        }

        match process_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Eagerly claim the next window after a completion. A full ring is left
    /// for the next event to deal with under its own policy.
    fn claim_next(&self, ring: &RingBuffer, input: &mut InputStage, chain: Option<&mut dyn DataBuilder>) -> Result<()> {
        match claim_window(ring) {
            Ok(next) => {
                input.filling = Some(next);
                start_generation(&mut input.bindings, chain);
                Ok(())
            }
            Err(DpuError::NoFreeItem) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Mark `item` READY and either notify the scheduler or process it right here
    fn complete_window(&self, ring: &RingBuffer, item: ItemHandle, process_error: &mut Option<DpuError>) -> Result<()> {
        ring.set_item_ready(item)?;
        self.record_ring_level(ring);
        log::trace!("DPU {} window {} ready", self.name, item.index());

        let notify = self
            .notify
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        match notify {
            Some(callback) => callback(self),
            None => {
                if let Err(e) = self.process_and_dispatch() {
                    log::debug!("DPU {} inline process failed: {}", self.name, e);
                    process_error.get_or_insert(e);
                }
            }
        }
        Ok(())
    }

    fn record_ring_level(&self, ring: &RingBuffer) {
        self.metrics.record_ring_level(ring.ready_count(), ring.capacity());
    }

    /// No free window for new data
    fn overrun(&self, policy: OverflowPolicy) -> Result<()> {
        match policy {
            OverflowPolicy::SkipData => {
                self.metrics.record_skipped_event();
                log::trace!("DPU {} ring full, event skipped", self.name);
                Ok(())
            }
            OverflowPolicy::NoDataLoss => {
                let err = DpuError::Overrun(self.id);
                let handler = self
                    .fatal
                    .read()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .clone();
                handler(self, &err);
                Err(err)
            }
        }
    }

    /// True if `target` is this DPU or any DPU downstream of it
    fn reaches(&self, target: &Dpu) -> bool {
        if std::ptr::eq(self, target) {
            return true;
        }
        match self.next_dpu() {
            Some(next) => next.reaches(target),
            None => false,
        }
    }

    fn lock_input(&self) -> MutexGuard<'_, InputStage> {
        self.input
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_output(&self) -> MutexGuard<'_, OutputStage> {
        self.output
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Lane<'_> {
    fn chain_builder(&mut self) -> Option<&mut dyn DataBuilder> {
        match self {
            Lane::Source(_) => None,
            Lane::Chain(builder) => Some(&mut **builder),
        }
    }
}

/// Claim the head slot for a new window. The payload is zeroed so positions a
/// detached source never wrote do not carry an older window's values.
fn claim_window(ring: &RingBuffer) -> Result<ItemHandle> {
    let item = ring.get_free_item_from_head()?;
    ring.get_item_data(item).fill(0);
    Ok(item)
}

/// Begin a window generation: every builder restarts and owes a contribution
fn start_generation(bindings: &mut [SourceBinding], chain: Option<&mut dyn DataBuilder>) {
    for binding in bindings.iter_mut() {
        binding.builder.reset();
        binding.done = false;
    }
    if let Some(builder) = chain {
        builder.reset();
    }
}

impl EventListener for Dpu {
    fn on_new_data_ready(&self, event: &DataEvent<'_>) -> Result<()> {
        if self.is_suspended() {
            self.metrics.record_suspended_drop();
            return Ok(());
        }

        let mut input = self.lock_input();
        let index = input
            .bindings
            .iter()
            .position(|b| b.source_id == event.source_id)
            .ok_or(DpuError::UnknownSource(event.source_id))?;
        let policy = input.bindings[index].policy;
        self.build(&mut input, event, Lane::Source(index), policy)
    }
}

impl DataSource for Dpu {
    fn id(&self) -> SourceId {
        self.id
    }

    fn format(&self) -> WindowFormat {
        self.out_format.clone()
    }

    fn event_source(&self) -> &EventSource {
        &self.events
    }
}

/// The FILLING window as seen by a builder, with the allocator that completes it
struct WindowTarget<'a> {
    dpu: &'a Dpu,
    ring: &'a RingBuffer,
    filling: &'a mut Option<ItemHandle>,
    slot: Option<MutexGuard<'a, Box<[u8]>>>,
    done: &'a mut bool,
    peers: [&'a mut [SourceBinding]; 2],
    process_error: &'a mut Option<DpuError>,
}

impl BuildTarget for WindowTarget<'_> {
    fn format(&self) -> &WindowFormat {
        &self.dpu.in_format
    }

    fn window(&mut self) -> &mut [u8] {
        match self.slot.as_mut() {
            Some(slot) => &mut slot[..],
            None => &mut [],
        }
    }

    fn allocate_next(&mut self) -> Result<bool> {
        // Release the payload before it is handed to the consumer
        self.slot = None;
        *self.done = true;

        // Peers still owe data to this window and only one window may be FILLING
        if self.peers.iter().any(|peers| peers.iter().any(|b| !b.done)) {
            return Ok(false);
        }

        let Some(item) = self.filling.take() else {
            return Ok(false);
        };
        self.dpu.complete_window(self.ring, item, self.process_error)?;

        let next = match claim_window(self.ring) {
            Ok(next) => next,
            Err(DpuError::NoFreeItem) => {
                self.dpu.overrun(OverflowPolicy::NoDataLoss)?;
                return Ok(false);
            }
            Err(e) => return Err(e),
        };

        // The finishing builder keeps going on the new window; only its peers restart
        *self.filling = Some(next);
        *self.done = false;
        for peers in self.peers.iter_mut() {
            for peer in peers.iter_mut() {
                peer.builder.reset();
                peer.done = false;
            }
        }
        self.slot = Some(self.ring.get_item_data(next));
        Ok(true)
    }

    fn dropped(&mut self, elements: usize) {
        self.dpu.metrics.record_elements_dropped(elements);
    }
}
