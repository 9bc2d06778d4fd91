use crate::core::{ElementType, Process, WindowView, WindowViewMut};
use crate::error::{DpuError, Result};

/// Scales every f32 sample by a constant factor
#[derive(Debug)]
pub struct Gain {
    gain: f32,
}

impl Default for Gain {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl Gain {
    pub fn new(gain: f32) -> Self {
        Self { gain }
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }
}

impl Process for Gain {
    fn name(&self) -> &str {
        "Gain"
    }

    fn process(&mut self, input: &WindowView<'_>, output: &mut WindowViewMut<'_>) -> Result<()> {
        if input.format.element != ElementType::F32 || output.format.element != ElementType::F32 {
            return Err(DpuError::Process(format!(
                "Gain expects f32 windows, got {:?} -> {:?}",
                input.format.element, output.format.element
            )));
        }

        let capacity = output.data.len() / 4;
        for (i, sample) in input.to_f32().into_iter().take(capacity).enumerate() {
            output.write_f32(i, sample * self.gain);
        }
        Ok(())
    }
}
