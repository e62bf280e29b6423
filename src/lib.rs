//! mjpeg-ring: lock-light frame distribution for live MJPEG streams
//!
//! A [`StreamRing`] holds the last `N` frames of a stream. One caster writes
//! frames into it while any number of players read at their own pace. Slow
//! players lose old frames instead of slowing the caster down.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use mjpeg_ring::{ingest_to_ring, RingConfig, RingReader, StreamRing};
//!
//! # use tokio::{io::BufReader, net::TcpStream};
//! # async fn run(mut camera: BufReader<TcpStream>) -> mjpeg_ring::Result<()> {
//! let ring = Arc::new(StreamRing::with_config(RingConfig::default().description("front door"))?);
//!
//! let mut player = RingReader::new(ring.clone());
//! tokio::spawn(async move {
//!     while let Some(frame) = player.next_frame().await {
//!         println!("frame {} ({} bytes)", frame.position, frame.len());
//!     }
//! });
//!
//! ingest_to_ring(&mut camera, &ring).await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod media;
pub mod registry;
pub mod ring;
pub mod session;
pub mod stats;

pub use error::{Error, MultipartError, Result};
pub use media::Frame;
pub use registry::RingArray;
pub use ring::{RingConfig, RingError, RingStatus, SlotIn, StreamRing, StreamSlot};
pub use session::{ingest_to_ring, play_to_writer, RingReader};
pub use stats::{ReaderStats, RingStats};
