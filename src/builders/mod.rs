//! Data builders: strategies that reshape variable-sized input fragments into
//! fixed-size windows.
//!
//! Every builder shares the same fill algorithm ([`fill_windows`]); concrete
//! strategies only differ in how one run of elements is copied into the window
//! and in which element types they accept.

pub mod column;
pub mod convert;
pub mod copy;

use serde::{Deserialize, Serialize};

use crate::core::{WindowFormat, WindowView};
use crate::error::Result;

pub use column::ColumnBuilder;
pub use convert::I16ToF32Builder;
pub use copy::CopyBuilder;

/// What to do with fragment data left over once the current window is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverflowPolicy {
    /// Ask for another window and keep filling
    NoDataLoss,
    /// Drop the remainder
    SkipData,
}

impl Default for OverflowPolicy {
    fn default() -> Self {
        OverflowPolicy::NoDataLoss
    }
}

/// Outcome of feeding one fragment to a builder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStatus {
    /// The window the builder ended on is complete
    DataReady,
    /// The fragment ran out before the window filled
    DataNotReady,
}

/// Window being built, plus the allocator used when it fills with data left over
pub trait BuildTarget {
    fn format(&self) -> &WindowFormat;

    /// Payload of the current window
    fn window(&mut self) -> &mut [u8];

    /// The current window is full and more data is pending.
    ///
    /// Returns `Ok(true)` once a fresh window is in place, `Ok(false)` if none
    /// can be provided and the remainder must be dropped.
    fn allocate_next(&mut self) -> Result<bool>;

    /// Report elements that were discarded
    fn dropped(&mut self, _elements: usize) {}
}

/// Strategy that incrementally fills windows from fragments
pub trait DataBuilder: Send {
    fn name(&self) -> &str;

    /// Start a new window at index zero
    fn reset(&mut self);

    /// Element index the next fragment is written to
    fn fill_index(&self) -> usize;

    /// Validate that fragments of `input` can be built into windows of `target`
    fn check_formats(&self, input: &WindowFormat, target: &WindowFormat) -> Result<()>;

    fn on_new_in_data(
        &mut self,
        target: &mut dyn BuildTarget,
        fragment: &WindowView<'_>,
        policy: OverflowPolicy,
    ) -> Result<BuildStatus>;
}

/// Shared fill loop.
///
/// `capacity` is the number of elements this builder writes per window and
/// `copy(window, dst, src, count)` moves `count` elements from fragment index
/// `src` to window index `dst`.
pub(crate) fn fill_windows<F>(
    index: &mut usize,
    capacity: usize,
    target: &mut dyn BuildTarget,
    total: usize,
    policy: OverflowPolicy,
    mut copy: F,
) -> Result<BuildStatus>
where
    F: FnMut(&mut [u8], usize, usize, usize),
{
    let mut consumed = 0;
    loop {
        let count = capacity.saturating_sub(*index).min(total - consumed);
        if count > 0 {
            copy(target.window(), *index, consumed, count);
            *index += count;
            consumed += count;
        }

        if *index < capacity {
            return Ok(BuildStatus::DataNotReady);
        }
        if consumed == total {
            return Ok(BuildStatus::DataReady);
        }

        match policy {
            OverflowPolicy::SkipData => {
                target.dropped(total - consumed);
                return Ok(BuildStatus::DataReady);
            }
            OverflowPolicy::NoDataLoss => {
                if !target.allocate_next()? {
                    target.dropped(total - consumed);
                    return Ok(BuildStatus::DataReady);
                }
                *index = 0;
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Collects every window a builder produces
    pub struct VecTarget {
        pub format: WindowFormat,
        pub windows: Vec<Vec<u8>>,
        pub allocations: usize,
        pub dropped: usize,
        pub refuse: bool,
    }

    impl VecTarget {
        pub fn new(format: WindowFormat) -> Self {
            let first = vec![0u8; format.byte_len()];
            Self {
                format,
                windows: vec![first],
                allocations: 0,
                dropped: 0,
                refuse: false,
            }
        }
    }

    impl BuildTarget for VecTarget {
        fn format(&self) -> &WindowFormat {
            &self.format
        }

        fn window(&mut self) -> &mut [u8] {
            self.windows.last_mut().map(|w| w.as_mut_slice()).unwrap_or(&mut [])
        }

        fn allocate_next(&mut self) -> Result<bool> {
            if self.refuse {
                return Ok(false);
            }
            self.allocations += 1;
            self.windows.push(vec![0u8; self.format.byte_len()]);
            Ok(true)
        }

        fn dropped(&mut self, elements: usize) {
            self.dropped += elements;
        }
    }
}
