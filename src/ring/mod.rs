//! Stream ring: one writer, many readers, no global lock
//!
//! A ring is a fixed number of pre-allocated slots addressed by a monotonically
//! increasing logical position. Position `p` lives in slot `p % N`, so the
//! ring always holds the last `N` published frames.
//!
//! # Architecture
//!
//! ```text
//!                        Arc<StreamRing>
//!              ┌──────────────────────────────────┐
//!              │ status: AtomicU8  (Idle/Using/Error)
//!              │ write_pos: AtomicU64             │
//!              │ slots: [RwLock<StreamSlot>; N]   │
//!              │   [0] [1] [2] ... [N-1]          │
//!              └───────────────┬──────────────────┘
//!                              │
//!         ┌────────────────────┼────────────────────┐
//!         │                    │                    │
//!         ▼                    ▼                    ▼
//!     [Caster]             [Player]             [Player]
//!   get_slot_in()     get_slot_next_by_pos   get_slot_next_by_pos
//!   publish()           (own cursor)           (own cursor)
//! ```
//!
//! # Non-blocking readers
//!
//! Readers never wait for the writer. They copy a frame out under the slot
//! lock and release it at once. A slot the writer currently holds is
//! reported as evicted, and a reader that has fallen behind is moved to the
//! oldest frame still resident.

pub mod config;
pub mod error;
pub mod slot;
pub mod status;
pub mod store;

pub use config::RingConfig;
pub use error::RingError;
pub use slot::StreamSlot;
pub use status::RingStatus;
pub use store::{SlotIn, StreamRing};
