//! Front-end roles attached to a ring
//!
//! - Caster: owns the write side for one session, fed by a multipart stream
//! - Player: follows the ring with its own cursor and forwards frames

pub mod caster;
pub mod player;

pub use caster::ingest_to_ring;
pub use player::{play_to_writer, RingReader};
