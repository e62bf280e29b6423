//! Owned frame snapshots handed to players
//!
//! A [`Frame`] wraps the copy a reader took out of a ring slot. The data is
//! held in `Bytes`, so forwarding the same frame to several sockets only bumps
//! a reference count.

use std::time::Duration;

use bytes::Bytes;

use crate::ring::StreamSlot;

/// A frame copied out of the ring
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Ring position the frame was published at
    pub position: u64,
    /// MIME type
    pub content_type: String,
    /// Capture time since the Unix epoch
    pub timestamp: Duration,
    /// Frame data (zero-copy via reference counting)
    pub data: Bytes,
}

impl Frame {
    /// Create a frame
    pub fn new(
        position: u64,
        content_type: impl Into<String>,
        timestamp: Duration,
        data: Bytes,
    ) -> Self {
        Self {
            position,
            content_type: content_type.into(),
            timestamp,
            data,
        }
    }

    /// Take over the valid content of an owned slot without copying it
    pub fn from_slot(position: u64, slot: StreamSlot) -> Self {
        Self {
            position,
            content_type: slot.content_type().to_string(),
            timestamp: slot.timestamp(),
            data: Bytes::from(slot.into_content()),
        }
    }

    /// Size of the frame data in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the frame carries no data
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
