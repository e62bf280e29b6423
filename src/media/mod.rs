//! Media framing for ring producers and players
//!
//! This module provides:
//! - The multipart (MJPEG) part codec used by casters and players
//! - Owned frame snapshots for fan-out to network writers

pub mod frame;
pub mod multipart;

pub use frame::Frame;
pub use multipart::{
    boundary_from_content_type, multipart_content_type, read_part_header, read_part_into_slot,
    write_closing, write_frame_part, write_slot_part, PartHeader,
};
