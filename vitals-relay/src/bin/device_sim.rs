//! Simulated bedside device
//!
//! Connects to the relay's producer endpoint and streams 12-byte frames with
//! plausible, slowly drifting vitals. Useful for exercising the relay and a
//! display client without hardware.

use anyhow::{Context, Result};
use clap::Parser;
use rand::Rng;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::info;

use vitals_core::encode_frame;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Relay producer endpoint
    #[arg(short, long, default_value = "127.0.0.1:8081")]
    relay: SocketAddr,

    /// Milliseconds between frames
    #[arg(long, default_value = "1000")]
    period_ms: u64,

    /// Frames to send before closing (0 = unlimited)
    #[arg(long, default_value = "0")]
    count: u64,

    /// Write each frame in two pieces to exercise partial reads
    #[arg(long)]
    split: bool,
}

/// Random walk kept inside a physiological band
struct Drift {
    value: f32,
    min: f32,
    max: f32,
    step: f32,
}

impl Drift {
    fn new(value: f32, min: f32, max: f32, step: f32) -> Self {
        Self { value, min, max, step }
    }

    fn next(&mut self, rng: &mut impl Rng) -> f32 {
        self.value = (self.value + rng.gen_range(-self.step..=self.step)).clamp(self.min, self.max);
        self.value
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let args = Args::parse();

    let mut stream = TcpStream::connect(args.relay)
        .await
        .with_context(|| format!("Failed to connect to relay at {}", args.relay))?;
    info!("Connected to relay at {}", args.relay);

    let mut temperature = Drift::new(36.6, 35.5, 39.5, 0.05);
    let mut systolic = Drift::new(118.0, 95.0, 160.0, 1.5);
    let mut heart_rate = Drift::new(72.0, 50.0, 130.0, 2.0);

    let mut ticker = tokio::time::interval(Duration::from_millis(args.period_ms.max(1)));
    let mut sent = 0u64;

    while args.count == 0 || sent < args.count {
        ticker.tick().await;

        let (t, s, h) = {
            let mut rng = rand::thread_rng();
            (
                temperature.next(&mut rng),
                systolic.next(&mut rng),
                heart_rate.next(&mut rng),
            )
        };
        let frame = encode_frame(t, s, h);

        if args.split {
            stream.write_all(&frame[..5]).await?;
            stream.flush().await?;
            tokio::time::sleep(Duration::from_millis(10)).await;
            stream.write_all(&frame[5..]).await?;
        } else {
            stream.write_all(&frame).await?;
        }

        sent += 1;
        info!(
            "Frame {}: temperature {:.2}, systolic {:.1}, heart rate {:.1}",
            sent, t, s, h
        );
    }

    stream.shutdown().await?;
    info!("Sent {} frames, closing", sent);
    Ok(())
}
