//! Ring error types
//!
//! Error types for stream slot and stream ring operations.

use super::status::RingStatus;

/// Error type for ring operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RingError {
    /// A writer session is already active on the ring
    AlreadyInUse,
    /// The requested transition is not allowed from the current status
    InvalidStatus(RingStatus),
    /// No new data has been published yet (not fatal, poll again later)
    Empty,
    /// The writer's session was reset; the handle it was given is stale
    SessionEnded,
    /// The requested position has been overwritten by the writer
    Evicted {
        /// Requested position
        pos: u64,
        /// Write position at the time of the request
        write_pos: u64,
    },
    /// The requested position has not been written (yet)
    NotFound {
        /// Requested position
        pos: u64,
        /// Write position at the time of the request
        write_pos: u64,
    },
    /// Slot count or slot size outside the allowed range, or resize while in use
    InvalidSize {
        /// Requested size
        requested: usize,
        /// Configured ceiling
        max: usize,
    },
    /// Declared frame length exceeds the slot capacity
    Truncated {
        /// Declared length
        length: usize,
        /// Slot capacity
        capacity: usize,
    },
    /// Fewer bytes were available than the declared length
    ShortRead {
        /// Declared length
        expected: usize,
        /// Bytes actually available
        actual: usize,
    },
}

impl RingError {
    /// Check if this is the non-fatal "no new data" condition
    pub fn is_empty(&self) -> bool {
        matches!(self, RingError::Empty)
    }

    /// Check if the reader lost data and needs to skip ahead
    pub fn is_evicted(&self) -> bool {
        matches!(self, RingError::Evicted { .. })
    }
}

impl std::fmt::Display for RingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RingError::AlreadyInUse => write!(f, "Ring already in use"),
            RingError::InvalidStatus(status) => write!(f, "Invalid ring status: {}", status),
            RingError::Empty => write!(f, "Ring empty"),
            RingError::SessionEnded => write!(f, "Writer session ended by a reset"),
            RingError::Evicted { pos, write_pos } => {
                write!(f, "Slot {} evicted (write position {})", pos, write_pos)
            }
            RingError::NotFound { pos, write_pos } => {
                write!(f, "Slot {} not written (write position {})", pos, write_pos)
            }
            RingError::InvalidSize { requested, max } => {
                write!(
                    f,
                    "Invalid size {}, use 1..={} on a ring that is not in use",
                    requested, max
                )
            }
            RingError::Truncated { length, capacity } => {
                write!(f, "Frame of {} bytes exceeds slot capacity {}", length, capacity)
            }
            RingError::ShortRead { expected, actual } => {
                write!(f, "Short read: expected {} bytes, got {}", expected, actual)
            }
        }
    }
}

impl std::error::Error for RingError {}
