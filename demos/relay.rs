//! In-process MJPEG relay
//!
//! Run with: cargo run --example relay [FRAMES]
//!
//! A synthetic camera produces a multipart stream of numbered frames. The
//! caster ingests it into a small ring while three players follow it: two
//! fast ones and one that stalls on every frame and falls behind.
//!
//! Set `RUST_LOG=mjpeg_ring=debug` to see the slow player skip evicted frames.

use std::sync::Arc;
use std::time::Duration;

use mjpeg_ring::media::write_slot_part;
use mjpeg_ring::{ingest_to_ring, RingConfig, RingReader, StreamRing, StreamSlot};
use tokio::io::{AsyncWriteExt, BufReader};

const BOUNDARY: &str = "myboundary";

/// Write `count` text frames to `writer`, one every 5 ms
async fn camera<W>(mut writer: W, count: usize) -> mjpeg_ring::Result<()>
where
    W: tokio::io::AsyncWrite + Unpin,
{
    for i in 0..count {
        let body = format!("frame #{}", i);
        let slot = StreamSlot::with_data(body.len(), "text/plain", body.len(), body.as_bytes())?;
        write_slot_part(&mut writer, &slot, BOUNDARY).await?;
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    writer.shutdown().await?;
    Ok(())
}

async fn player(name: &'static str, mut reader: RingReader, delay: Duration) {
    reader.wait_for_session().await;

    while let Some(frame) = reader.next_frame().await {
        println!(
            "[{}] pos={} {}",
            name,
            frame.position,
            String::from_utf8_lossy(&frame.data)
        );
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    let stats = reader.stats();
    println!(
        "[{}] done: frames={} skipped={} resyncs={} fps={:.1}",
        name,
        stats.frames_read,
        stats.positions_skipped,
        stats.resyncs,
        stats.framerate()
    );
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("mjpeg_ring=info".parse()?)
                .add_directive("relay=info".parse()?),
        )
        .init();

    let frames = std::env::args()
        .nth(1)
        .map(|arg| arg.parse::<usize>())
        .transpose()?
        .unwrap_or(100);

    let config = RingConfig::with_size(8, 64 * 1024)
        .description("synthetic camera")
        .boundary(BOUNDARY)
        .poll_interval(Duration::from_millis(2));
    let ring = Arc::new(StreamRing::with_config(config)?);
    println!("{}", ring);

    let players = [
        tokio::spawn(player("fast-1", RingReader::new(ring.clone()), Duration::ZERO)),
        tokio::spawn(player("fast-2", RingReader::new(ring.clone()), Duration::ZERO)),
        tokio::spawn(player("slow", RingReader::new(ring.clone()), Duration::from_millis(40))),
    ];

    let (cam_side, caster_side) = tokio::io::duplex(64 * 1024);
    let mut input = BufReader::new(caster_side);
    let (camera_result, ingest_result) =
        tokio::join!(camera(cam_side, frames), ingest_to_ring(&mut input, &ring));
    camera_result?;
    println!("caster published {} frames", ingest_result?);

    for handle in players {
        handle.await?;
    }
    println!("{}", ring);
    Ok(())
}
