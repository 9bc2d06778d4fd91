use serde::{Deserialize, Serialize};

/// Whether a DPU accepts new input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DpuState {
    Active,
    /// Incoming events are dropped without error
    Suspended,
}

impl DpuState {
    /// Get human-readable state name
    pub fn name(&self) -> &str {
        match self {
            Self::Active => "Active",
            Self::Suspended => "Suspended",
        }
    }
}

impl Default for DpuState {
    fn default() -> Self {
        Self::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_active() {
        assert_eq!(DpuState::default(), DpuState::Active);
        assert_eq!(DpuState::Suspended.name(), "Suspended");
    }
}
