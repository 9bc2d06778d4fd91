use crate::core::{ElementType, Process, WindowView, WindowViewMut};
use crate::error::{DpuError, Result};

/// Reduces a row-major `[rows, columns]` f32 window to one RMS value per column
#[derive(Debug, Default)]
pub struct ColumnRms;

impl ColumnRms {
    pub fn new() -> Self {
        Self
    }
}

impl Process for ColumnRms {
    fn name(&self) -> &str {
        "ColumnRms"
    }

    fn process(&mut self, input: &WindowView<'_>, output: &mut WindowViewMut<'_>) -> Result<()> {
        if input.format.element != ElementType::F32 || output.format.element != ElementType::F32 {
            return Err(DpuError::Process("ColumnRms expects f32 windows".to_string()));
        }

        let columns = input.format.columns();
        if output.format.elements() < columns {
            return Err(DpuError::Process(format!(
                "ColumnRms output holds {} values, needs {}",
                output.format.elements(),
                columns
            )));
        }

        let samples = input.to_f32();
        let rows = samples.len() / columns;
        for column in 0..columns {
            let sum: f32 = samples
                .iter()
                .skip(column)
                .step_by(columns)
                .map(|x| x * x)
                .sum();
            let rms = if rows > 0 { (sum / rows as f32).sqrt() } else { 0.0 };
            output.write_f32(column, rms);
        }
        Ok(())
    }
}
