use super::{fill_windows, BuildStatus, BuildTarget, DataBuilder, OverflowPolicy};
use crate::core::{WindowFormat, WindowView};
use crate::error::{DpuError, Result};

/// Writes a mono stream into one column of a row-major `[rows, columns]` window.
///
/// Used for fan-in: each bound source gets its own column and the window is
/// complete once every column is full.
#[derive(Debug)]
pub struct ColumnBuilder {
    index: usize,
    column: usize,
    columns: usize,
}

impl ColumnBuilder {
    pub fn new(column: usize, columns: usize) -> Self {
        assert!(column < columns, "column {} out of range (0..{})", column, columns);
        Self {
            index: 0,
            column,
            columns,
        }
    }

    pub fn column(&self) -> usize {
        self.column
    }
}

impl DataBuilder for ColumnBuilder {
    fn name(&self) -> &str {
        "Column"
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
        if target.shape.len() < 2 || target.columns() != self.columns {
            return Err(DpuError::InvalidBufferSize {
                size: target.columns(),
                item_size: self.columns,
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
            "ColumnBuilder fed {:?} into a {:?} window",
            fragment.format.element, element
        );

        let size = element.size();
        let rows = target.format().elements() / self.columns;
        let (column, columns) = (self.column, self.columns);
        let src = fragment.data;

        fill_windows(&mut self.index, rows, target, fragment.elements(), policy, |window, dst, from, count| {
            for k in 0..count {
                let d = ((dst + k) * columns + column) * size;
                let s = (from + k) * size;
                window[d..d + size].copy_from_slice(&src[s..s + size]);
            }
        })
    }
}
