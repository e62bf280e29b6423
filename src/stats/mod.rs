//! Ring and reader statistics

pub mod metrics;

pub use metrics::{ReaderStats, RingStats};
