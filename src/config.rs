//! Timeline configuration

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Result, TimelineError};

/// Default number of entries a timeline retains.
pub const DEFAULT_CAPACITY: usize = 1000;

/// Slots per buffer are tracked in a `u64` presence mask.
pub const MAX_SLOTS_PER_BUFFER: usize = 64;

/// Shape of one fixed-stride element: `max_element_num` slots of
/// `element_size` bytes each.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SlotLayout {
    /// Bytes per slot.
    pub element_size: usize,

    /// Number of slots in one buffer.
    pub max_element_num: usize,
}

impl SlotLayout {
    pub fn new(element_size: usize, max_element_num: usize) -> Self {
        Self {
            element_size,
            max_element_num,
        }
    }

    /// Layout holding `max_element_num` slots of `n` `f32` values.
    pub fn f32s(n: usize, max_element_num: usize) -> Self {
        Self::new(n * std::mem::size_of::<f32>(), max_element_num)
    }

    /// Byte size of one whole buffer.
    pub fn stride(&self) -> usize {
        self.element_size * self.max_element_num
    }

    pub fn validate(&self) -> Result<()> {
        if self.element_size == 0 {
            return Err(TimelineError::InvalidArgument("element_size must be > 0".into()));
        }
        if self.max_element_num == 0 || self.max_element_num > MAX_SLOTS_PER_BUFFER {
            return Err(TimelineError::InvalidArgument(format!(
                "max_element_num must be in 1..={MAX_SLOTS_PER_BUFFER}, got {}",
                self.max_element_num
            )));
        }
        Ok(())
    }
}

/// Kind of element a timeline accepts, fixed at construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ElementKind {
    /// Independently heap-managed payloads of any size (frames, blobs).
    #[default]
    Variable,
    /// Pool-backed buffers sharing one slot layout.
    FixedStride(SlotLayout),
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementKind::Variable => write!(f, "variable-size"),
            ElementKind::FixedStride(layout) => write!(
                f,
                "fixed-stride({}x{} bytes)",
                layout.max_element_num, layout.element_size
            ),
        }
    }
}

/// Configuration for a timeline.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TimelineConfig {
    /// Maximum number of entries retained before the oldest is evicted.
    pub capacity: usize,

    /// Element kind accepted by `push`.
    pub kind: ElementKind,
}

impl TimelineConfig {
    /// Variable-size timeline with the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            kind: ElementKind::Variable,
        }
    }

    /// Fixed-stride timeline with the default capacity.
    pub fn fixed_stride(layout: SlotLayout) -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            kind: ElementKind::FixedStride(layout),
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Byte stride of one element, `None` for variable-size timelines.
    pub fn element_stride(&self) -> Option<usize> {
        match self.kind {
            ElementKind::Variable => None,
            ElementKind::FixedStride(layout) => Some(layout.stride()),
        }
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(TimelineError::InvalidArgument("capacity must be > 0".into()));
        }
        if let ElementKind::FixedStride(layout) = &self.kind {
            layout.validate()?;
        }
        Ok(())
    }
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TimelineConfig::default();
        assert_eq!(config.capacity, 1000);
        assert_eq!(config.kind, ElementKind::Variable);
        assert_eq!(config.element_stride(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = TimelineConfig::new(0);
        assert!(matches!(config.validate(), Err(TimelineError::InvalidArgument(_))));
    }

    #[test]
    fn test_layout_validation() {
        assert!(SlotLayout::new(0, 3).validate().is_err());
        assert!(SlotLayout::new(16, 0).validate().is_err());
        assert!(SlotLayout::new(16, 65).validate().is_err());
        assert!(SlotLayout::new(16, 64).validate().is_ok());
    }

    #[test]
    fn test_stride() {
        let config = TimelineConfig::fixed_stride(SlotLayout::f32s(16, 4)).with_capacity(10);
        assert_eq!(config.element_stride(), Some(256));
        assert_eq!(config.capacity, 10);
    }
}
