//! Multi-threaded ring behavior: one writer, several independent readers

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Barrier};
use std::thread;
use std::time::Duration;

use mjpeg_ring::{RingError, StreamRing, StreamSlot};

const SLOTS: usize = 8;
const FRAME_LEN: usize = 256;
const FRAMES: u64 = 1000;
const OCTET: &str = "application/octet-stream";

/// Position in the first 8 bytes, then a fill byte derived from it
fn frame_bytes(pos: u64) -> Vec<u8> {
    let mut data = pos.to_le_bytes().to_vec();
    data.resize(FRAME_LEN, (pos % 251) as u8);
    data
}

fn check_frame(pos: u64, data: &[u8]) {
    assert_eq!(data.len(), FRAME_LEN, "length of position {}", pos);
    assert_eq!(data[..8], pos.to_le_bytes(), "header of position {}", pos);
    let fill = (pos % 251) as u8;
    assert!(data[8..].iter().all(|&b| b == fill), "torn frame at position {}", pos);
}

fn writer(ring: &StreamRing) {
    for pos in 0..FRAMES {
        let data = frame_bytes(pos);
        if pos % 2 == 0 {
            let slot = StreamSlot::with_data(FRAME_LEN, OCTET, FRAME_LEN, &data).unwrap();
            assert_eq!(ring.put_slot_in_next(&slot).unwrap(), pos);
        } else {
            let mut slot = ring.get_slot_in();
            assert_eq!(slot.position(), pos);
            slot.buffer_mut()[..FRAME_LEN].copy_from_slice(&data);
            slot.set_content_type(OCTET);
            slot.set_length(FRAME_LEN).unwrap();
            assert_eq!(slot.publish(), pos);
        }
        if pos % 50 == 0 {
            thread::sleep(Duration::from_micros(200));
        }
    }
}

/// Follow the ring from position 0 and return every position observed
fn reader(ring: &StreamRing, done: &AtomicBool, stall_every: u64) -> Vec<u64> {
    let mut seen = Vec::new();
    let mut pos = 0;

    loop {
        match ring.get_slot_next_by_pos(pos) {
            Ok((slot, next)) => {
                let got = slot.position().unwrap();
                check_frame(got, slot.content());

                assert!(got >= pos, "went backwards: wanted {}, got {}", pos, got);
                if got > pos {
                    // Only positions that left the window may be skipped
                    assert!(
                        ring.get_pos_in() >= pos + SLOTS as u64,
                        "skipped resident position {} (write_pos {})",
                        pos,
                        ring.get_pos_in()
                    );
                }
                seen.push(got);
                pos = next;

                if stall_every > 0 && seen.len() as u64 % stall_every == 0 {
                    thread::sleep(Duration::from_millis(2));
                }
            }
            Err(RingError::Empty) => {
                if done.load(Ordering::Acquire) && pos == ring.get_pos_in() {
                    return seen;
                }
                thread::sleep(Duration::from_micros(50));
            }
            Err(e) => panic!("unexpected error at {}: {}", pos, e),
        }
    }
}

#[test]
fn test_readers_follow_writer_without_duplicates() {
    let ring = Arc::new(StreamRing::new(SLOTS, FRAME_LEN).unwrap());
    let done = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = [0, 0, 7]
        .into_iter()
        .map(|stall_every| {
            let ring = ring.clone();
            let done = done.clone();
            thread::spawn(move || reader(&ring, &done, stall_every))
        })
        .collect();

    writer(&ring);
    done.store(true, Ordering::Release);

    for handle in readers {
        let seen = handle.join().unwrap();
        assert!(!seen.is_empty());
        assert!(seen.windows(2).all(|w| w[0] < w[1]), "positions not strictly increasing");
        assert_eq!(*seen.last().unwrap(), FRAMES - 1);
    }
    assert_eq!(ring.get_pos_in(), FRAMES);
}

#[test]
fn test_shared_cursor_splits_frames() {
    let ring = Arc::new(StreamRing::new(FRAMES as usize, FRAME_LEN).unwrap());
    for pos in 0..FRAMES {
        let slot = StreamSlot::with_data(FRAME_LEN, OCTET, FRAME_LEN, &frame_bytes(pos)).unwrap();
        ring.put_slot_in_next(&slot).unwrap();
    }

    let consumers: Vec<_> = (0..4)
        .map(|_| {
            let ring = ring.clone();
            thread::spawn(move || {
                let mut taken = Vec::new();
                loop {
                    match ring.get_slot_out_next() {
                        Ok(slot) => {
                            let pos = slot.position().unwrap();
                            check_frame(pos, slot.content());
                            taken.push(pos);
                        }
                        Err(RingError::Empty) => return taken,
                        Err(e) => panic!("unexpected error: {}", e),
                    }
                }
            })
        })
        .collect();

    let mut all: Vec<u64> = consumers
        .into_iter()
        .flat_map(|handle| handle.join().unwrap())
        .collect();
    all.sort_unstable();

    assert_eq!(all, (0..FRAMES).collect::<Vec<_>>());
    assert_eq!(ring.get_pos_out(), FRAMES);
}

#[test]
fn test_only_one_session_wins() {
    let ring = Arc::new(StreamRing::new(SLOTS, FRAME_LEN).unwrap());
    let barrier = Arc::new(Barrier::new(8));

    let contenders: Vec<_> = (0..8)
        .map(|_| {
            let ring = ring.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                ring.set_status_using()
            })
        })
        .collect();

    let results: Vec<_> = contenders.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| *e == RingError::AlreadyInUse));
    assert!(ring.is_using());
}

#[test]
fn test_reset_while_reading() {
    let ring = Arc::new(StreamRing::new(SLOTS, FRAME_LEN).unwrap());
    let done = Arc::new(AtomicBool::new(false));

    let reader = {
        let ring = ring.clone();
        let done = done.clone();
        thread::spawn(move || {
            let mut pos = 0;
            let mut resyncs = 0;
            while !done.load(Ordering::Acquire) {
                match ring.get_slot_next_by_pos(pos) {
                    Ok((slot, next)) => {
                        check_frame(slot.position().unwrap(), slot.content());
                        pos = next;
                    }
                    Err(RingError::NotFound { .. }) => {
                        resyncs += 1;
                        pos = 0;
                    }
                    Err(RingError::Empty) => thread::yield_now(),
                    Err(e) => panic!("unexpected error: {}", e),
                }
            }
            resyncs
        })
    };

    for _ in 0..20 {
        for pos in 0..20 {
            let data = frame_bytes(pos);
            let slot = StreamSlot::with_data(FRAME_LEN, OCTET, FRAME_LEN, &data).unwrap();
            ring.put_slot_in_next(&slot).unwrap();
        }
        thread::sleep(Duration::from_millis(1));
        ring.reset();
    }
    done.store(true, Ordering::Release);

    reader.join().unwrap();
    assert_eq!(ring.get_pos_in(), 0);
    assert!(ring.is_idle());
}

#[test]
fn test_reset_during_writes_never_publishes_stale_slot() {
    let ring = Arc::new(StreamRing::new(SLOTS, FRAME_LEN).unwrap());
    let done = Arc::new(AtomicBool::new(false));

    let writer = {
        let ring = ring.clone();
        let done = done.clone();
        thread::spawn(move || {
            let mut published = 0;
            while !done.load(Ordering::Acquire) {
                let mut slot = ring.get_slot_in();
                let pos = slot.position();
                slot.buffer_mut()[..FRAME_LEN].copy_from_slice(&frame_bytes(pos));
                slot.set_content_type(OCTET);
                slot.set_length(FRAME_LEN).unwrap();
                slot.publish();
                published += 1;
            }
            published
        })
    };

    for _ in 0..200 {
        ring.reset();
        thread::yield_now();
    }
    done.store(true, Ordering::Release);
    let published = writer.join().unwrap();
    assert!(published > 0);

    // Whatever survived the last reset is a complete, consistent run
    let write_pos = ring.get_pos_in();
    let oldest = write_pos.saturating_sub(SLOTS as u64);
    for pos in oldest..write_pos {
        let slot = ring.get_slot_by_pos(pos).unwrap();
        assert_eq!(slot.position(), Some(pos));
        check_frame(pos, slot.content());
    }
}

#[test]
fn test_held_copy_does_not_stall_writer() {
    let ring = Arc::new(StreamRing::new(2, FRAME_LEN).unwrap());
    let first = StreamSlot::with_data(FRAME_LEN, OCTET, FRAME_LEN, &frame_bytes(0)).unwrap();
    ring.put_slot_in_next(&first).unwrap();

    let held = ring.get_slot_by_pos(0).unwrap();
    let (tx, rx) = mpsc::channel();

    let writer = {
        let ring = ring.clone();
        thread::spawn(move || {
            // Laps the 2-slot ring several times, reusing slot 0
            for pos in 1..10 {
                let slot =
                    StreamSlot::with_data(FRAME_LEN, OCTET, FRAME_LEN, &frame_bytes(pos)).unwrap();
                ring.put_slot_in_next(&slot).unwrap();
            }
            tx.send(ring.get_pos_in()).unwrap();
        })
    };

    let write_pos = rx
        .recv_timeout(Duration::from_secs(5))
        .expect("writer blocked by a reader's copy");
    writer.join().unwrap();

    assert_eq!(write_pos, 10);
    assert_eq!(held.position(), Some(0));
    check_frame(0, held.content());
    assert!(ring.get_slot_by_pos(0).unwrap_err().is_evicted());
}
