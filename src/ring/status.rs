//! Ring session status
//!
//! The status is stored in an `AtomicU8` inside the ring so that two casters
//! racing to start a session are resolved by a single compare-and-set.

/// Lifecycle state of a stream ring
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RingStatus {
    /// No active writer session
    Idle = 0,
    /// A writer session is producing frames
    Using = 1,
    /// The writer session hit an unrecoverable fault; only reads are meaningful
    Error = 2,
}

impl RingStatus {
    pub(crate) fn as_u8(self) -> u8 {
        self as u8
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => RingStatus::Using,
            2 => RingStatus::Error,
            _ => RingStatus::Idle,
        }
    }

    /// Human readable name
    pub fn as_str(&self) -> &'static str {
        match self {
            RingStatus::Idle => "idle",
            RingStatus::Using => "using",
            RingStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for RingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
