//! Stream slot: storage for a single frame
//!
//! A slot owns a buffer pre-allocated to a fixed capacity. Only the first
//! `length` bytes are valid. While a frame is being written the length is
//! zero, and it is set to the final value only once the whole frame is in
//! place, so a reader never sees a partially written frame.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::error::RingError;

/// Current time as a duration since the Unix epoch
pub fn timestamp_now() -> Duration {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
}

/// Parse a timestamp given as decimal seconds since the Unix epoch
///
/// Returns `None` for empty, negative, non-numeric or out-of-range input.
pub fn parse_timestamp(value: &str) -> Option<Duration> {
    let secs: f64 = value.trim().parse().ok()?;
    Duration::try_from_secs_f64(secs).ok()
}

/// A single frame slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSlot {
    /// Pre-allocated buffer; valid for the first `length` bytes
    content: Vec<u8>,
    /// Number of valid bytes
    length: usize,
    /// MIME type of the content
    content_type: String,
    /// Capture time since the Unix epoch
    timestamp: Duration,
    /// Ring position this slot currently holds
    position: Option<u64>,
}

impl StreamSlot {
    /// Create an empty slot with the given byte capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            content: vec![0u8; capacity],
            length: 0,
            content_type: String::new(),
            timestamp: Duration::ZERO,
            position: None,
        }
    }

    /// Create a slot populated with the first `length` bytes of `data`
    ///
    /// The timestamp is set to the current time.
    pub fn with_data(
        capacity: usize,
        content_type: impl Into<String>,
        length: usize,
        data: &[u8],
    ) -> Result<Self, RingError> {
        if length > capacity {
            return Err(RingError::Truncated { length, capacity });
        }
        if data.len() < length {
            return Err(RingError::ShortRead {
                expected: length,
                actual: data.len(),
            });
        }

        let mut slot = Self::new(capacity);
        slot.content[..length].copy_from_slice(&data[..length]);
        slot.length = length;
        slot.content_type = content_type.into();
        slot.timestamp = timestamp_now();
        Ok(slot)
    }

    /// Deep copy of another slot's valid content, type and timestamp
    ///
    /// The copy is sized to the valid content and never shares the source buffer.
    pub fn copy_from(other: &StreamSlot) -> Self {
        Self {
            content: other.content().to_vec(),
            length: other.length,
            content_type: other.content_type.clone(),
            timestamp: other.timestamp,
            position: other.position,
        }
    }

    /// Valid content
    pub fn content(&self) -> &[u8] {
        &self.content[..self.length]
    }

    /// Number of valid bytes
    pub fn len(&self) -> usize {
        self.length
    }

    /// Check if the slot holds no frame
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Allocated byte capacity
    pub fn capacity(&self) -> usize {
        self.content.len()
    }

    /// MIME type
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Capture time since the Unix epoch
    pub fn timestamp(&self) -> Duration {
        self.timestamp
    }

    /// Ring position held by this slot, if any
    pub fn position(&self) -> Option<u64> {
        self.position
    }

    /// Whole buffer for in-place filling
    ///
    /// Callers should zero the length first (see [`StreamSlot::clear_length`])
    /// and call [`StreamSlot::set_length`] once the frame is complete.
    pub fn buffer_mut(&mut self) -> &mut [u8] {
        &mut self.content
    }

    /// Mark the content invalid while a write is in progress
    pub fn clear_length(&mut self) {
        self.length = 0;
    }

    /// Finalize the number of valid bytes
    pub fn set_length(&mut self, length: usize) -> Result<(), RingError> {
        if length > self.capacity() {
            return Err(RingError::Truncated {
                length,
                capacity: self.capacity(),
            });
        }
        self.length = length;
        Ok(())
    }

    /// Set the MIME type
    pub fn set_content_type(&mut self, content_type: impl Into<String>) {
        self.content_type = content_type.into();
    }

    /// Set the capture time
    pub fn set_timestamp(&mut self, timestamp: Duration) {
        self.timestamp = timestamp;
    }

    /// Copy another slot's frame into this slot's buffer
    ///
    /// The length is zero until the copy completes.
    pub fn fill_from(&mut self, other: &StreamSlot) -> Result<(), RingError> {
        if other.length > self.capacity() {
            return Err(RingError::Truncated {
                length: other.length,
                capacity: self.capacity(),
            });
        }
        self.length = 0;
        self.content[..other.length].copy_from_slice(other.content());
        self.content_type.clone_from(&other.content_type);
        self.timestamp = other.timestamp;
        self.length = other.length;
        Ok(())
    }

    /// Consume the slot, keeping only the valid content
    pub fn into_content(mut self) -> Vec<u8> {
        self.content.truncate(self.length);
        self.content
    }

    /// Reset to the empty state, keeping the allocation
    pub fn clear(&mut self) {
        self.length = 0;
        self.content_type.clear();
        self.timestamp = Duration::ZERO;
        self.position = None;
    }

    pub(crate) fn begin_write(&mut self, pos: u64) {
        self.length = 0;
        self.position = Some(pos);
    }

    /// Media type without parameters (`image/jpeg; q=1` -> `image/jpeg`)
    fn media_type(&self) -> &str {
        self.content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
    }

    /// Case-insensitive match against the full media type
    pub fn is_type(&self, ctype: &str) -> bool {
        self.media_type().eq_ignore_ascii_case(ctype)
    }

    /// Case-insensitive match against the part before `/`
    pub fn is_major_type(&self, major: &str) -> bool {
        let mt = self.media_type();
        let head = mt.split_once('/').map_or(mt, |(head, _)| head);
        !head.is_empty() && head.eq_ignore_ascii_case(major)
    }

    /// Case-insensitive match against the part after `/`
    ///
    /// A type without `/` has no subtype and never matches.
    pub fn is_sub_type(&self, sub: &str) -> bool {
        match self.media_type().split_once('/') {
            Some((_, tail)) => !tail.is_empty() && tail.eq_ignore_ascii_case(sub),
            None => false,
        }
    }
}

impl std::fmt::Display for StreamSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Type: {}\tLength: {}/{}\tContent: ",
            self.content_type,
            self.length,
            self.capacity()
        )?;

        let content = self.content();
        match (content.first(), content.last()) {
            (Some(first), Some(last)) => {
                if self.is_major_type("text") {
                    write!(f, "{}", String::from_utf8_lossy(content))
                } else {
                    write!(f, "[{:02x}..{:02x}]", first, last)
                }
            }
            _ => Ok(()),
        }
    }
}
