use super::{fill_windows, BuildStatus, BuildTarget, DataBuilder, OverflowPolicy};
use crate::core::{WindowFormat, WindowView};
use crate::error::{DpuError, Result};

/// Identity builder: copies elements byte for byte. Element types must match.
#[derive(Debug, Default)]
pub struct CopyBuilder {
    index: usize,
}

impl CopyBuilder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DataBuilder for CopyBuilder {
    fn name(&self) -> &str {
        "Copy"
    }

    fn reset(&mut self) {
        self.index = 0;
    }

    fn fill_index(&self) -> usize {
        self.index
    }

    fn check_formats(&self, input: &WindowFormat, target: &WindowFormat) -> Result<()> {
        if input.element != target.element {
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
        let element = target.format().element;
        assert_eq!(
            fragment.format.element, element,
            "CopyBuilder fed {:?} into a {:?} window",
            fragment.format.element, element
        );

        let size = element.size();
        let capacity = target.format().elements();
        let src = fragment.data;

        fill_windows(&mut self.index, capacity, target, fragment.elements(), policy, |window, dst, from, count| {
            window[dst * size..(dst + count) * size]
                .copy_from_slice(&src[from * size..(from + count) * size]);
        })
    }
}
