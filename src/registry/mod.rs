//! Array of rings, one per logical stream
//!
//! # Architecture
//!
//! ```text
//!                      RingArray
//!        ┌────────────────────────────────────┐
//!        │ rings: Vec<Arc<StreamRing>>        │
//!        │   [0] cam-front   30 x 1024 KB     │
//!        │   [1] cam-back    10 x 4096 KB     │
//!        └──────────┬─────────────────┬───────┘
//!                   │                 │
//!                   ▼                 ▼
//!           [Caster] [Players]  [Caster] [Players]
//! ```
//!
//! Rings never share slots or cursors, so sessions on different indices do
//! not interact.

pub mod store;

pub use store::RingArray;
