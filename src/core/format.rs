use serde::{Deserialize, Serialize};

/// Element type of a window payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementType {
    U8,
    I16,
    I32,
    F32,
}

impl ElementType {
    /// Size in bytes of one element
    pub fn size(&self) -> usize {
        match self {
            ElementType::U8 => 1,
            ElementType::I16 => 2,
            ElementType::I32 => 4,
            ElementType::F32 => 4,
        }
    }
}

impl Default for ElementType {
    fn default() -> Self {
        ElementType::F32
    }
}

/// Describes the shape of a window: element type plus dimensions (row-major)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowFormat {
    pub element: ElementType,
    pub shape: Vec<usize>,
}

impl WindowFormat {
    pub fn new(element: ElementType, shape: impl Into<Vec<usize>>) -> Self {
        Self {
            element,
            shape: shape.into(),
        }
    }

    /// One-dimensional format of `len` elements
    pub fn vector(element: ElementType, len: usize) -> Self {
        Self::new(element, vec![len])
    }

    /// Total element count
    pub fn elements(&self) -> usize {
        self.shape.iter().product()
    }

    /// Serialized payload size in bytes
    pub fn byte_len(&self) -> usize {
        self.elements() * self.element.size()
    }

    /// Number of columns of the innermost dimension (1 for scalars)
    pub fn columns(&self) -> usize {
        self.shape.last().copied().unwrap_or(1)
    }
}

/// Read-only view of a payload laid out according to a [`WindowFormat`]
#[derive(Debug, Clone, Copy)]
pub struct WindowView<'a> {
    pub format: &'a WindowFormat,
    pub data: &'a [u8],
}

impl<'a> WindowView<'a> {
    pub fn new(format: &'a WindowFormat, data: &'a [u8]) -> Self {
        Self { format, data }
    }

    /// Number of whole elements carried by the payload
    pub fn elements(&self) -> usize {
        self.data.len() / self.format.element.size()
    }

    /// Decode the payload as f32 samples. Empty if the element type differs.
    pub fn to_f32(&self) -> Vec<f32> {
        if self.format.element != ElementType::F32 {
            return Vec::new();
        }
        self.data
            .chunks_exact(4)
            .map(|b| f32::from_ne_bytes([b[0], b[1], b[2], b[3]]))
            .collect()
    }

    /// Decode the payload as i16 samples. Empty if the element type differs.
    pub fn to_i16(&self) -> Vec<i16> {
        if self.format.element != ElementType::I16 {
            return Vec::new();
        }
        self.data
            .chunks_exact(2)
            .map(|b| i16::from_ne_bytes([b[0], b[1]]))
            .collect()
    }
}

/// Mutable view used by `Process` to write its output
#[derive(Debug)]
pub struct WindowViewMut<'a> {
    pub format: &'a WindowFormat,
    pub data: &'a mut [u8],
}

impl<'a> WindowViewMut<'a> {
    pub fn new(format: &'a WindowFormat, data: &'a mut [u8]) -> Self {
        Self { format, data }
    }

    pub fn write_f32(&mut self, index: usize, value: f32) {
        let offset = index * 4;
        self.data[offset..offset + 4].copy_from_slice(&value.to_ne_bytes());
    }
}

/// Encode f32 samples into a native-endian byte payload
pub fn f32_bytes(samples: &[f32]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_ne_bytes()).collect()
}

/// Encode i16 samples into a native-endian byte payload
pub fn i16_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_ne_bytes()).collect()
}
