//! Statistics for rings and their readers

use std::time::{Duration, Instant};

use crate::ring::RingStatus;

/// Point-in-time view of a stream ring
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingStats {
    /// Session status
    pub status: RingStatus,
    /// Next position the writer will publish
    pub write_pos: u64,
    /// Shared read cursor
    pub read_pos: u64,
    /// Number of slots
    pub slot_count: usize,
    /// Byte capacity of each slot
    pub slot_size: usize,
    /// Number of published positions still inside the window
    pub resident: usize,
}

impl RingStats {
    /// Total bytes pre-allocated for slot content
    pub fn allocated_bytes(&self) -> usize {
        self.slot_count * self.slot_size
    }
}

/// Per-reader statistics
#[derive(Debug, Clone)]
pub struct ReaderStats {
    /// When the reader was created
    pub started_at: Instant,
    /// Frames delivered to the reader
    pub frames_read: u64,
    /// Bytes delivered to the reader
    pub bytes_read: u64,
    /// Positions lost to eviction or never written
    pub positions_skipped: u64,
    /// Times the cursor was thrown back to the writer after a reset
    pub resyncs: u64,
}

impl ReaderStats {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            frames_read: 0,
            bytes_read: 0,
            positions_skipped: 0,
            resyncs: 0,
        }
    }

    /// Time since the reader was created
    pub fn duration(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Delivered frames per second
    pub fn framerate(&self) -> f64 {
        let secs = self.duration().as_secs_f64();
        if secs > 0.0 {
            self.frames_read as f64 / secs
        } else {
            0.0
        }
    }
}

impl Default for ReaderStats {
    fn default() -> Self {
        Self::new()
    }
}
