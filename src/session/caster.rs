//! Caster role: feeds a multipart byte stream into a ring
//!
//! The caster owns the writer side of a ring for the duration of one
//! session. A part is published only after it has been read completely; a
//! read or framing error ends the session without publishing the failed part.
//!
//! Every write is tagged with the session token returned by the claim. Once
//! the ring is reset from outside, the caster stops at its next part and
//! leaves any later session on the same ring untouched.

use tokio::io::AsyncBufRead;

use crate::error::{Error, Result};
use crate::media::multipart::read_part_into_slot;
use crate::ring::{RingError, StreamRing, StreamSlot};

/// Run one writer session, reading parts from `reader` into `ring`
///
/// Claims the ring (fails with `AlreadyInUse` if another caster holds it),
/// publishes every part until the stream ends, and resets the ring on the way
/// out whether the session ended cleanly or not. A session superseded by an
/// outside reset fails with `SessionEnded` and resets nothing. Returns the
/// number of frames published.
pub async fn ingest_to_ring<R>(reader: &mut R, ring: &StreamRing) -> Result<u64>
where
    R: AsyncBufRead + Unpin,
{
    let session = ring.set_status_using()?;

    tracing::info!(
        ring = %ring.description(),
        session = session,
        slots = ring.len(),
        slot_size = ring.slot_size(),
        "Caster session started"
    );

    let result = ingest_loop(reader, ring, session).await;

    match &result {
        Ok(frames) => {
            tracing::info!(ring = %ring.description(), frames = frames, "Caster session ended");
        }
        Err(Error::Ring(RingError::SessionEnded)) => {
            tracing::info!(
                ring = %ring.description(),
                session = session,
                "Caster session superseded"
            );
        }
        Err(e) => {
            let _ = ring.fail_session(session);
            tracing::warn!(
                ring = %ring.description(),
                write_pos = ring.get_pos_in(),
                error = %e,
                "Caster session failed"
            );
        }
    }

    if !ring.reset_session(session) {
        tracing::debug!(ring = %ring.description(), session = session, "Ring already reset");
    }
    result
}

async fn ingest_loop<R>(reader: &mut R, ring: &StreamRing, session: u64) -> Result<u64>
where
    R: AsyncBufRead + Unpin,
{
    let boundary = ring.boundary().to_string();
    // Parts are read into a private slot so no ring lock is held across I/O.
    let mut scratch = StreamSlot::new(ring.slot_size());
    let mut frames = 0;

    loop {
        if !ring.is_session(session) {
            return Err(RingError::SessionEnded.into());
        }
        if !read_part_into_slot(reader, &mut scratch, &boundary).await? {
            break;
        }

        let pos = ring.put_slot_in_session(&scratch, session)?;
        tracing::trace!(pos = pos, length = scratch.len(), "Frame published");
        frames += 1;
    }

    Ok(frames)
}
