//! Stream ring implementation
//!
//! A fixed-capacity arena of slots indexed by `position % N`, one write cursor,
//! and a status word. There is no lock around the whole ring: every slot has
//! its own `RwLock`, and the cursors and status are atomics.
//!
//! The writer advances the cursor while it still holds the slot it filled.
//! Readers acquire-load the cursor, then only *try* to lock the slot they
//! want, and copy the frame out before releasing it. A reader therefore never
//! waits for the writer, and the writer never waits longer than one copy.
//! Each slot also records the position it holds, which lets a reader detect
//! that the slot was recycled between loading the cursor and taking the lock.
//!
//! # Sessions
//!
//! The status shares one atomic word with a session generation:
//!
//! ```text
//!   63                                  8 7        0
//!  ┌─────────────────────────────────────┬──────────┐
//!  │ generation                          │ status   │
//!  └─────────────────────────────────────┴──────────┘
//! ```
//!
//! `set_status_using` hands the caller the generation as a session token.
//! `reset` bumps it while holding every slot lock, so a write that started
//! before a reset can never publish into the ring after it, and a caster
//! holding an old token can tell that its session is gone.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockWriteGuard, TryLockError};
use std::time::Duration;

use crate::stats::RingStats;

use super::config::RingConfig;
use super::error::RingError;
use super::slot::StreamSlot;
use super::status::RingStatus;

const STATUS_BITS: u32 = 8;
const STATUS_MASK: u64 = (1 << STATUS_BITS) - 1;

fn pack(generation: u64, status: RingStatus) -> u64 {
    (generation << STATUS_BITS) | u64::from(status.as_u8())
}

fn unpack(state: u64) -> (u64, RingStatus) {
    (
        state >> STATUS_BITS,
        RingStatus::from_u8((state & STATUS_MASK) as u8),
    )
}

/// Exclusive handle to the slot at the write position
///
/// Obtained from [`StreamRing::get_slot_in`]. The slot stays invisible to
/// readers until it is published with [`SlotIn::publish`], or dropped and
/// published with [`StreamRing::set_pos_in_by_pos`].
pub struct SlotIn<'a> {
    ring: &'a StreamRing,
    guard: RwLockWriteGuard<'a, StreamSlot>,
    pos: u64,
}

impl SlotIn<'_> {
    /// Logical position being written
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Advance the write position past this slot and release it
    ///
    /// Returns the published position.
    pub fn publish(self) -> u64 {
        let SlotIn { ring, guard, pos } = self;
        // Still holding the slot: a reset needs this lock, so it either
        // finished before the handle was taken or runs after this store.
        ring.write_pos.fetch_max(pos + 1, Ordering::AcqRel);
        drop(guard);
        pos
    }
}

impl Deref for SlotIn<'_> {
    type Target = StreamSlot;

    fn deref(&self) -> &StreamSlot {
        &self.guard
    }
}

impl DerefMut for SlotIn<'_> {
    fn deref_mut(&mut self) -> &mut StreamSlot {
        &mut self.guard
    }
}

/// Circular buffer of frames shared by one writer and many readers
pub struct StreamRing {
    /// Slot arena, physical index = position % len
    slots: Box<[RwLock<StreamSlot>]>,

    /// Byte capacity of every slot
    slot_size: usize,

    /// Ceiling for `resize`
    max_slots: usize,

    /// Position of the next slot to publish
    write_pos: AtomicU64,

    /// Shared cursor used by `get_slot_out_next`
    read_pos: AtomicU64,

    /// Session generation and `RingStatus`, see `pack`
    state: AtomicU64,

    /// Backoff suggested to readers that find no new data
    poll_interval: Duration,

    description: String,
    boundary: String,
}

impl StreamRing {
    /// Create a ring of `slot_count` slots of `slot_size` bytes each
    pub fn new(slot_count: usize, slot_size: usize) -> Result<Self, RingError> {
        Self::with_config(RingConfig::with_size(slot_count, slot_size))
    }

    /// Create a ring from a configuration
    pub fn with_config(config: RingConfig) -> Result<Self, RingError> {
        if config.slot_count == 0 || config.slot_count > config.max_slots {
            return Err(RingError::InvalidSize {
                requested: config.slot_count,
                max: config.max_slots,
            });
        }
        if config.slot_size == 0 || config.slot_size > config.max_slot_size {
            return Err(RingError::InvalidSize {
                requested: config.slot_size,
                max: config.max_slot_size,
            });
        }

        Ok(Self {
            slots: Self::alloc_slots(config.slot_count, config.slot_size),
            slot_size: config.slot_size,
            max_slots: config.max_slots,
            write_pos: AtomicU64::new(0),
            read_pos: AtomicU64::new(0),
            state: AtomicU64::new(pack(0, RingStatus::Idle)),
            poll_interval: config.poll_interval,
            description: config.description,
            boundary: config.boundary,
        })
    }

    fn alloc_slots(count: usize, size: usize) -> Box<[RwLock<StreamSlot>]> {
        (0..count).map(|_| RwLock::new(StreamSlot::new(size))).collect()
    }

    fn index(&self, pos: u64) -> usize {
        (pos % self.slots.len() as u64) as usize
    }

    fn capacity(&self) -> u64 {
        self.slots.len() as u64
    }

    fn lock_for_write(&self, pos: u64) -> RwLockWriteGuard<'_, StreamSlot> {
        self.slots[self.index(pos)]
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// A ring always has at least one slot
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Byte capacity of each slot
    pub fn slot_size(&self) -> usize {
        self.slot_size
    }

    /// Ceiling accepted by `resize`
    pub fn max_slots(&self) -> usize {
        self.max_slots
    }

    /// How long readers should wait before polling again after `Empty`
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Description of the stream
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Set the description
    pub fn set_description(&mut self, desc: impl Into<String>) {
        self.description = desc.into();
    }

    /// Multipart boundary of the stream
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Set the multipart boundary
    pub fn set_boundary(&mut self, boundary: impl Into<String>) {
        self.boundary = boundary.into();
    }

    // ------------------------------------------------------------------
    // Session status
    // ------------------------------------------------------------------

    fn load_state(&self) -> (u64, RingStatus) {
        unpack(self.state.load(Ordering::Acquire))
    }

    fn generation(&self) -> u64 {
        self.load_state().0
    }

    /// Current status
    pub fn get_status(&self) -> RingStatus {
        self.load_state().1
    }

    /// Check if a writer session is active
    pub fn is_using(&self) -> bool {
        self.get_status() == RingStatus::Using
    }

    /// Check if the ring is idle
    pub fn is_idle(&self) -> bool {
        self.get_status() == RingStatus::Idle
    }

    /// Check if `session` is still the active writer session
    pub fn is_session(&self, session: u64) -> bool {
        self.load_state() == (session, RingStatus::Using)
    }

    /// Start a writer session (Idle -> Using)
    ///
    /// Exactly one of several concurrent callers succeeds. Returns the
    /// session token, which stays valid until the next reset.
    pub fn set_status_using(&self) -> Result<u64, RingError> {
        self.state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |state| {
                let (generation, status) = unpack(state);
                (status == RingStatus::Idle).then(|| pack(generation, RingStatus::Using))
            })
            .map(|prev| unpack(prev).0)
            .map_err(|state| match unpack(state).1 {
                RingStatus::Using => RingError::AlreadyInUse,
                other => RingError::InvalidStatus(other),
            })
    }

    /// Flag an unrecoverable fault in the current session (Using -> Error)
    pub fn set_status_error(&self) -> Result<(), RingError> {
        self.state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |state| {
                let (generation, status) = unpack(state);
                (status == RingStatus::Using).then(|| pack(generation, RingStatus::Error))
            })
            .map(|_| ())
            .map_err(|state| RingError::InvalidStatus(unpack(state).1))
    }

    /// Flag a fault in `session` only, leaving any later session alone
    pub fn fail_session(&self, session: u64) -> Result<(), RingError> {
        self.state
            .compare_exchange(
                pack(session, RingStatus::Using),
                pack(session, RingStatus::Error),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map(|_| ())
            .map_err(|state| match unpack(state) {
                (generation, _) if generation != session => RingError::SessionEnded,
                (_, status) => RingError::InvalidStatus(status),
            })
    }

    // ------------------------------------------------------------------
    // Sizing
    // ------------------------------------------------------------------

    /// Change the number of slots
    ///
    /// Rejected while a session is active, for zero, and above the ceiling.
    /// The most recently written slots are kept, up to the new count.
    pub fn resize(&mut self, slot_count: usize) -> Result<(), RingError> {
        if self.is_using() || slot_count == 0 || slot_count > self.max_slots {
            return Err(RingError::InvalidSize {
                requested: slot_count,
                max: self.max_slots,
            });
        }
        if slot_count == self.slots.len() {
            return Ok(());
        }

        let old_count = self.capacity();
        let new_count = slot_count as u64;
        let write_pos = *self.write_pos.get_mut();
        let keep = old_count.min(new_count).min(write_pos);

        let mut old = std::mem::take(&mut self.slots);
        let mut slots = Self::alloc_slots(slot_count, self.slot_size);

        for pos in (write_pos - keep)..write_pos {
            let from = old[(pos % old_count) as usize]
                .get_mut()
                .unwrap_or_else(PoisonError::into_inner);
            let to = slots[(pos % new_count) as usize]
                .get_mut()
                .unwrap_or_else(PoisonError::into_inner);
            std::mem::swap(from, to);
        }

        self.slots = slots;
        Ok(())
    }

    fn lock_all(&self) -> Vec<RwLockWriteGuard<'_, StreamSlot>> {
        self.slots
            .iter()
            .map(|cell| cell.write().unwrap_or_else(PoisonError::into_inner))
            .collect()
    }

    fn clear_locked(&self, guards: &mut [RwLockWriteGuard<'_, StreamSlot>]) {
        self.write_pos.store(0, Ordering::Release);
        self.read_pos.store(0, Ordering::Release);
        for slot in guards.iter_mut() {
            slot.clear();
        }
    }

    /// Clear every slot, rewind both cursors, end the session, return to Idle
    ///
    /// Waits for a write in progress to be published first. Must not be
    /// called while the caller itself holds a [`SlotIn`] on this ring.
    pub fn reset(&self) {
        let mut guards = self.lock_all();
        self.clear_locked(&mut guards);

        let _ = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |state| {
                Some(pack(unpack(state).0.wrapping_add(1), RingStatus::Idle))
            });
    }

    /// Reset the ring only if `session` is still the current session
    ///
    /// Returns `false`, touching nothing, when a reset already ended it.
    pub fn reset_session(&self, session: u64) -> bool {
        let mut guards = self.lock_all();

        // Resets are serialized by the slot locks, and no one can claim the
        // ring while this session is Using or Error.
        let (generation, status) = self.load_state();
        if generation != session || status == RingStatus::Idle {
            return false;
        }

        self.clear_locked(&mut guards);
        self.state.store(
            pack(generation.wrapping_add(1), RingStatus::Idle),
            Ordering::Release,
        );
        true
    }

    // ------------------------------------------------------------------
    // Write path (single producer)
    // ------------------------------------------------------------------

    /// Current write position
    pub fn get_pos_in(&self) -> u64 {
        self.write_pos.load(Ordering::Acquire)
    }

    /// Lock the slot at the write position for a write in `generation`
    ///
    /// `None` if a reset completed in the meantime.
    fn lock_slot_in(&self, generation: u64) -> Option<SlotIn<'_>> {
        let pos = self.write_pos.load(Ordering::Acquire);
        let mut guard = self.lock_for_write(pos);
        if self.generation() != generation {
            return None;
        }

        guard.begin_write(pos);
        Some(SlotIn {
            ring: self,
            guard,
            pos,
        })
    }

    /// Take the slot at the write position for in-place filling
    ///
    /// The slot is marked empty and tagged with the position until it is
    /// published.
    pub fn get_slot_in(&self) -> SlotIn<'_> {
        loop {
            let generation = self.generation();
            if let Some(slot_in) = self.lock_slot_in(generation) {
                return slot_in;
            }
        }
    }

    /// Take the write slot on behalf of `session`
    ///
    /// Fails with `SessionEnded` once the ring has been reset since the
    /// session started.
    pub fn get_slot_in_for(&self, session: u64) -> Result<SlotIn<'_>, RingError> {
        let (generation, status) = self.load_state();
        if generation != session || status == RingStatus::Idle {
            return Err(RingError::SessionEnded);
        }
        self.lock_slot_in(session).ok_or(RingError::SessionEnded)
    }

    /// Publish: advance the write position to `pos`
    ///
    /// Only moves forward, and only over a completed write: the slot for
    /// `pos - 1` must hold that position, so a write cut short by a reset is
    /// never published. Call it after the [`SlotIn`] has been dropped.
    /// Returns the resulting write position.
    pub fn set_pos_in_by_pos(&self, pos: u64) -> u64 {
        let Some(last) = pos.checked_sub(1) else {
            return self.get_pos_in();
        };

        let slot = self.slots[self.index(last)]
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.position() != Some(last) {
            return self.get_pos_in();
        }
        let prev = self.write_pos.fetch_max(pos, Ordering::AcqRel);
        prev.max(pos)
    }

    /// Copy `slot` into the next write slot and publish it
    ///
    /// Returns the position of the published slot.
    pub fn put_slot_in_next(&self, slot: &StreamSlot) -> Result<u64, RingError> {
        self.check_fits(slot)?;

        let mut slot_in = self.get_slot_in();
        slot_in.fill_from(slot)?;
        Ok(slot_in.publish())
    }

    /// Copy `slot` into the next write slot on behalf of `session`
    pub fn put_slot_in_session(&self, slot: &StreamSlot, session: u64) -> Result<u64, RingError> {
        self.check_fits(slot)?;

        let mut slot_in = self.get_slot_in_for(session)?;
        slot_in.fill_from(slot)?;
        Ok(slot_in.publish())
    }

    /// Write `slot` at an explicit position
    ///
    /// At or past the write position the slot is written and the write
    /// position moves to `pos + 1`; skipped positions read as not found.
    /// Behind the write position only still-resident slots can be
    /// backfilled, and the write position is left alone.
    pub fn put_slot_in_by_pos(&self, slot: &StreamSlot, pos: u64) -> Result<u64, RingError> {
        self.check_fits(slot)?;

        loop {
            let generation = self.generation();
            let write_pos = self.write_pos.load(Ordering::Acquire);
            if pos < write_pos && write_pos - pos > self.capacity() {
                return Err(RingError::Evicted { pos, write_pos });
            }

            let mut guard = self.lock_for_write(pos);
            if self.generation() != generation {
                continue;
            }

            guard.begin_write(pos);
            guard.fill_from(slot)?;
            if pos >= write_pos {
                self.write_pos.fetch_max(pos + 1, Ordering::AcqRel);
            }
            return Ok(pos);
        }
    }

    fn check_fits(&self, slot: &StreamSlot) -> Result<(), RingError> {
        if slot.len() > self.slot_size {
            return Err(RingError::Truncated {
                length: slot.len(),
                capacity: self.slot_size,
            });
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read path (many consumers)
    // ------------------------------------------------------------------

    /// Current position of the shared read cursor
    pub fn get_pos_out(&self) -> u64 {
        self.read_pos.load(Ordering::Acquire)
    }

    /// Move the shared read cursor
    pub fn set_pos_out_by_pos(&self, pos: u64) -> u64 {
        self.read_pos.store(pos, Ordering::Release);
        pos
    }

    /// Copy of the published slot at `pos`
    ///
    /// Fails with `NotFound` if `pos` has not been published and with
    /// `Evicted` if it has fallen out of the window. `Empty` means the writer
    /// is still releasing that very slot; poll again.
    pub fn get_slot_by_pos(&self, pos: u64) -> Result<StreamSlot, RingError> {
        let write_pos = self.write_pos.load(Ordering::Acquire);
        if pos >= write_pos {
            return Err(RingError::NotFound { pos, write_pos });
        }
        if write_pos - pos > self.capacity() {
            return Err(RingError::Evicted { pos, write_pos });
        }
        self.read_resident(pos, write_pos)
    }

    fn read_resident(&self, pos: u64, write_pos: u64) -> Result<StreamSlot, RingError> {
        let slot = match self.slots[self.index(pos)].try_read() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(err)) => err.into_inner(),
            Err(TryLockError::WouldBlock) => {
                // A writer a full lap ahead is overwriting `pos`; otherwise it
                // is still publishing `pos` itself or a reset is running.
                let write_pos = self.write_pos.load(Ordering::Acquire);
                if write_pos >= pos + self.capacity() {
                    return Err(RingError::Evicted { pos, write_pos });
                }
                return Err(RingError::Empty);
            }
        };

        match slot.position() {
            Some(held) if held == pos => Ok(StreamSlot::copy_from(&slot)),
            Some(held) if held > pos => Err(RingError::Evicted { pos, write_pos }),
            _ => Err(RingError::NotFound { pos, write_pos }),
        }
    }

    /// Copy of the slot at `pos`, or of the oldest resident slot if `pos`
    /// predates the window, together with the next position to poll
    ///
    /// Never blocks. Returns `Empty` when the caller is caught up and
    /// `NotFound` when `pos` is ahead of the writer (the ring was reset).
    pub fn get_slot_next_by_pos(&self, pos: u64) -> Result<(StreamSlot, u64), RingError> {
        let mut write_pos = self.write_pos.load(Ordering::Acquire);
        if pos == write_pos {
            return Err(RingError::Empty);
        }
        if pos > write_pos {
            return Err(RingError::NotFound { pos, write_pos });
        }

        let mut cur = pos.max(write_pos.saturating_sub(self.capacity()));
        while cur < write_pos {
            match self.read_resident(cur, write_pos) {
                Ok(slot) => return Ok((slot, cur + 1)),
                Err(RingError::Evicted { .. }) | Err(RingError::NotFound { .. }) => {
                    write_pos = self.write_pos.load(Ordering::Acquire);
                    cur = (cur + 1).max(write_pos.saturating_sub(self.capacity()));
                }
                Err(err) => return Err(err),
            }
        }
        Err(RingError::Empty)
    }

    /// Copy of the next slot for the shared read cursor, advancing it
    ///
    /// Consumers sharing this cursor split the frames between them.
    pub fn get_slot_out_next(&self) -> Result<StreamSlot, RingError> {
        loop {
            let out = self.read_pos.load(Ordering::Acquire);
            let (slot, next) = self.get_slot_next_by_pos(out)?;
            if self
                .read_pos
                .compare_exchange(out, next, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return Ok(slot);
            }
        }
    }

    /// Snapshot of the ring's counters
    pub fn stats(&self) -> RingStats {
        let write_pos = self.get_pos_in();
        RingStats {
            status: self.get_status(),
            write_pos,
            read_pos: self.get_pos_out(),
            slot_count: self.len(),
            slot_size: self.slot_size,
            resident: write_pos.min(self.capacity()) as usize,
        }
    }
}

impl std::fmt::Display for StreamRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[StreamRing]\tStatus: {}\tPos: {},{}\tSize: {} x {} KB\tDesc: {}",
            self.get_status(),
            self.get_pos_in(),
            self.get_pos_out(),
            self.len(),
            self.slot_size / 1024,
            self.description
        )
    }
}

impl std::fmt::Debug for StreamRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (session, status) = self.load_state();
        f.debug_struct("StreamRing")
            .field("status", &status)
            .field("session", &session)
            .field("write_pos", &self.get_pos_in())
            .field("read_pos", &self.get_pos_out())
            .field("slot_count", &self.len())
            .field("slot_size", &self.slot_size)
            .field("description", &self.description)
            .finish()
    }
}
