use std::sync::{Arc, Weak};

use crate::builders::{DataBuilder, OverflowPolicy};
use crate::core::{DataSource, SourceId};
use super::Dpu;

/// A DPU's attachment to one upstream data source
pub struct SourceBinding {
    pub(crate) source_id: SourceId,
    pub(crate) source: Weak<dyn DataSource>,
    pub(crate) builder: Box<dyn DataBuilder>,
    pub(crate) policy: OverflowPolicy,
    /// Finished its share of the current window
    pub(crate) done: bool,
}

impl SourceBinding {
    pub(crate) fn new(
        source: &Arc<dyn DataSource>,
        builder: Box<dyn DataBuilder>,
        policy: OverflowPolicy,
    ) -> Self {
        Self {
            source_id: source.id(),
            source: Arc::downgrade(source),
            builder,
            policy,
            done: false,
        }
    }

    pub fn source_id(&self) -> SourceId {
        self.source_id
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    pub fn fill_index(&self) -> usize {
        self.builder.fill_index()
    }
}

/// The single downstream DPU fed with this DPU's output
pub struct ChainBinding {
    pub(crate) next: Arc<Dpu>,
    pub(crate) builder: Box<dyn DataBuilder>,
    pub(crate) policy: OverflowPolicy,
}

impl ChainBinding {
    pub fn next(&self) -> &Arc<Dpu> {
        &self.next
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }
}
