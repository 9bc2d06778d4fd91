use crate::core::{Process, WindowView, WindowViewMut};
use crate::error::Result;

/// Copies the input window to the output payload unchanged
#[derive(Debug, Default)]
pub struct Passthrough;

impl Passthrough {
    pub fn new() -> Self {
        Self
    }
}

impl Process for Passthrough {
    fn name(&self) -> &str {
        "Passthrough"
    }

    fn process(&mut self, input: &WindowView<'_>, output: &mut WindowViewMut<'_>) -> Result<()> {
        let len = input.data.len().min(output.data.len());
        output.data[..len].copy_from_slice(&input.data[..len]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{i16_bytes, ElementType, WindowFormat};

    #[test]
    fn test_copies_bytes() {
        let format = WindowFormat::vector(ElementType::I16, 3);
        let input = i16_bytes(&[7, -8, 9]);
        let mut out = vec![0u8; format.byte_len()];

        Passthrough::new()
            .process(&WindowView::new(&format, &input), &mut WindowViewMut::new(&format, &mut out))
            .unwrap();

        assert_eq!(out, input);
    }
}
