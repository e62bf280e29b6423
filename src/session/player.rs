//! Player role: follows a ring with a private cursor
//!
//! Every player keeps its own position, so any number of them can follow the
//! same ring without coordinating. A player that falls more than one ring
//! length behind silently skips to the oldest frame still resident; the
//! skipped positions are counted in its [`ReaderStats`].
//!
//! ```text
//!            write_pos
//!                |
//!   [7][8][9][10][ ]        ring of 5 slots, positions 6..=10 published
//!    ^
//!    player at 3 -> next frame returned is 6, 3 positions skipped
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWrite;

use crate::error::Result;
use crate::media::multipart::{write_closing, write_frame_part};
use crate::media::Frame;
use crate::ring::{RingError, StreamRing};
use crate::stats::ReaderStats;

/// Independent reader cursor over a shared ring
pub struct RingReader {
    ring: Arc<StreamRing>,
    pos: u64,
    poll_interval: Duration,
    stats: ReaderStats,
}

impl RingReader {
    /// Follow `ring` from the oldest resident frame
    pub fn new(ring: Arc<StreamRing>) -> Self {
        let poll_interval = ring.poll_interval();
        Self {
            ring,
            pos: 0,
            poll_interval,
            stats: ReaderStats::new(),
        }
    }

    /// Follow `ring` from the next frame to be published
    pub fn live(ring: Arc<StreamRing>) -> Self {
        let mut reader = Self::new(ring);
        reader.pos = reader.ring.get_pos_in();
        reader
    }

    /// Override the backoff used when no new frame is available
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Next position this reader will ask for
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Ring being followed
    pub fn ring(&self) -> &Arc<StreamRing> {
        &self.ring
    }

    /// Reader statistics
    pub fn stats(&self) -> &ReaderStats {
        &self.stats
    }

    /// Poll once without waiting
    ///
    /// Returns `Ok(None)` when there is nothing new, including right after a
    /// resynchronization.
    pub fn try_next(&mut self) -> std::result::Result<Option<Frame>, RingError> {
        let (frame, next) = match self.ring.get_slot_next_by_pos(self.pos) {
            Ok((slot, next)) => (Frame::from_slot(next - 1, slot), next),
            Err(RingError::Empty) => return Ok(None),
            Err(RingError::NotFound { pos, write_pos }) => {
                // Cursor is ahead of the writer: the ring was reset under us.
                tracing::debug!(
                    ring = %self.ring.description(),
                    pos = pos,
                    write_pos = write_pos,
                    "Reader resynchronized"
                );
                self.pos = 0;
                self.stats.resyncs += 1;
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        if frame.position > self.pos {
            let skipped = frame.position - self.pos;
            self.stats.positions_skipped += skipped;
            tracing::debug!(
                ring = %self.ring.description(),
                from = self.pos,
                to = frame.position,
                skipped = skipped,
                "Reader skipped positions"
            );
        }

        self.pos = next;
        self.stats.frames_read += 1;
        self.stats.bytes_read += frame.len() as u64;
        Ok(Some(frame))
    }

    /// Wait for the next frame
    ///
    /// Sleeps between polls while a caster session is active. Returns `None`
    /// once the reader is caught up and the ring has no active session.
    pub async fn next_frame(&mut self) -> Option<Frame> {
        loop {
            match self.try_next() {
                Ok(Some(frame)) => return Some(frame),
                Ok(None) => {
                    if !self.ring.is_using() {
                        return None;
                    }
                    tokio::time::sleep(self.poll_interval).await;
                }
                Err(e) => {
                    tracing::warn!(ring = %self.ring.description(), error = %e, "Reader failed");
                    return None;
                }
            }
        }
    }

    /// Sleep until a caster session is active on the ring
    pub async fn wait_for_session(&self) {
        while !self.ring.is_using() {
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

impl std::fmt::Debug for RingReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingReader")
            .field("ring", &self.ring.description())
            .field("pos", &self.pos)
            .field("poll_interval", &self.poll_interval)
            .field("stats", &self.stats)
            .finish()
    }
}

/// Forward frames from `reader` to `writer` as multipart parts
///
/// Runs until the ring's session ends or the writer fails, then writes the
/// closing delimiter. Returns the number of frames forwarded.
pub async fn play_to_writer<W>(
    reader: &mut RingReader,
    writer: &mut W,
    boundary: &str,
) -> Result<u64>
where
    W: AsyncWrite + Unpin,
{
    tracing::info!(
        ring = %reader.ring().description(),
        pos = reader.position(),
        "Player session started"
    );

    let mut frames = 0;
    while let Some(frame) = reader.next_frame().await {
        write_frame_part(writer, &frame, boundary).await?;
        frames += 1;
    }
    write_closing(writer, boundary).await?;

    tracing::info!(
        ring = %reader.ring().description(),
        frames = frames,
        skipped = reader.stats().positions_skipped,
        "Player session ended"
    );
    Ok(frames)
}
