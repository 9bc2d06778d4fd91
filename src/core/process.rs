use super::{WindowView, WindowViewMut};
use crate::error::Result;

/// Transform applied by a DPU to each completed input window
pub trait Process: Send {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Consume one complete input window and fill the output payload
    fn process(&mut self, input: &WindowView<'_>, output: &mut WindowViewMut<'_>) -> Result<()>;
}
