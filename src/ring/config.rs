//! Ring configuration

use std::time::Duration;

/// One kibibyte
pub const KBYTE: usize = 1024;
/// One mebibyte
pub const MBYTE: usize = 1024 * KBYTE;
/// One gibibyte
pub const GBYTE: usize = 1024 * MBYTE;

/// Default number of slots (one second at 30 fps)
pub const DEFAULT_SLOT_COUNT: usize = 30;
/// Default per-slot capacity
pub const DEFAULT_SLOT_SIZE: usize = MBYTE;
/// Hard ceiling on the number of slots
pub const MAX_SLOT_COUNT: usize = 1024;
/// Hard ceiling on the per-slot capacity
pub const MAX_SLOT_SIZE: usize = GBYTE;
/// Default multipart boundary
pub const DEFAULT_BOUNDARY: &str = "myboundary";

/// Configuration for a single stream ring
#[derive(Debug, Clone)]
pub struct RingConfig {
    /// Number of slots in the ring
    pub slot_count: usize,

    /// Byte capacity of each slot
    pub slot_size: usize,

    /// Upper bound accepted by `resize`
    pub max_slots: usize,

    /// Upper bound for `slot_size`
    pub max_slot_size: usize,

    /// How long readers sleep when the ring has no new data
    pub poll_interval: Duration,

    /// Free-form description of the stream
    pub description: String,

    /// Multipart boundary used by the parser and players
    pub boundary: String,
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            slot_count: DEFAULT_SLOT_COUNT,
            slot_size: DEFAULT_SLOT_SIZE,
            max_slots: MAX_SLOT_COUNT,
            max_slot_size: MAX_SLOT_SIZE,
            poll_interval: Duration::from_millis(10),
            description: "New empty ring".to_string(),
            boundary: DEFAULT_BOUNDARY.to_string(),
        }
    }
}

impl RingConfig {
    /// Create a config with the given geometry
    pub fn with_size(slot_count: usize, slot_size: usize) -> Self {
        Self {
            slot_count,
            slot_size,
            ..Default::default()
        }
    }

    /// Set the number of slots
    pub fn slot_count(mut self, count: usize) -> Self {
        self.slot_count = count;
        self
    }

    /// Set the per-slot capacity
    pub fn slot_size(mut self, size: usize) -> Self {
        self.slot_size = size;
        self
    }

    /// Set the slot count ceiling, capped at `MAX_SLOT_COUNT`
    pub fn max_slots(mut self, max: usize) -> Self {
        self.max_slots = max.min(MAX_SLOT_COUNT);
        self
    }

    /// Set the reader poll interval
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the description
    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    /// Set the multipart boundary
    pub fn boundary(mut self, boundary: impl Into<String>) -> Self {
        self.boundary = boundary.into();
        self
    }
}
