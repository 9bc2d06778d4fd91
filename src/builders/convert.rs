use super::{fill_windows, BuildStatus, BuildTarget, DataBuilder, OverflowPolicy};
use crate::core::{ElementType, WindowFormat, WindowView};
use crate::error::{DpuError, Result};

/// Widens 16-bit integer samples into f32 windows, multiplying by `scale`
#[derive(Debug)]
pub struct I16ToF32Builder {
    index: usize,
    scale: f32,
}

impl I16ToF32Builder {
    pub fn new() -> Self {
        Self::with_scale(1.0)
    }

    /// Normalize full-scale PCM to [-1.0, 1.0)
    pub fn normalized() -> Self {
        Self::with_scale(1.0 / 32768.0)
    }

    pub fn with_scale(scale: f32) -> Self {
        Self { index: 0, scale }
    }
}

impl Default for I16ToF32Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl DataBuilder for I16ToF32Builder {
    fn name(&self) -> &str {
        "I16ToF32"
    }

    fn reset(&mut self) {
        self.index = 0;
    }

    fn fill_index(&self) -> usize {
        self.index
    }

    fn check_formats(&self, input: &WindowFormat, target: &WindowFormat) -> Result<()> {
        if input.element != ElementType::I16 || target.element != ElementType::F32 {
            return Err(DpuError::IncompatibleFormat {
                input: input.element,
                target: target.element,
            });
        }
        Ok(())
    }

    fn on_new_in_data(
        &mut self,
        target: &mut dyn BuildTarget,
        fragment: &WindowView<'_>,
        policy: OverflowPolicy,
    ) -> Result<BuildStatus> {
        assert!(
            fragment.format.element == ElementType::I16 && target.format().element == ElementType::F32,
            "I16ToF32Builder fed {:?} into a {:?} window",
            fragment.format.element,
            target.format().element
        );

        let capacity = target.format().elements();
        let scale = self.scale;
        let src = fragment.data;

        fill_windows(&mut self.index, capacity, target, fragment.elements(), policy, |window, dst, from, count| {
            for k in 0..count {
                let s = (from + k) * 2;
                let sample = i16::from_ne_bytes([src[s], src[s + 1]]);
                let d = (dst + k) * 4;
                window[d..d + 4].copy_from_slice(&(f32::from(sample) * scale).to_ne_bytes());
            }
        })
    }
}
