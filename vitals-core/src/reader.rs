//! Fixed-size frame reader over a producer connection

use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{FrameError, Result};
use crate::frame::{Frame, FRAME_LEN};

/// Default wait for each poll of the connection
pub const DEFAULT_FRAME_TIMEOUT: Duration = Duration::from_secs(10);

/// Accumulates bytes from a connection into whole frames.
///
/// Every poll is bounded by `timeout`. Partial deliveries are concatenated
/// until a full frame is available; a frame is never returned short.
pub struct FrameReader<R> {
    inner: R,
    timeout: Duration,
    frames_read: u64,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(inner: R, timeout: Duration) -> Self {
        Self {
            inner,
            timeout,
            frames_read: 0,
        }
    }

    /// Read exactly one frame.
    ///
    /// Fails with [`FrameError::Timeout`] when a poll waits longer than the
    /// configured timeout and with [`FrameError::Disconnected`] when the peer
    /// closes, even mid-frame.
    pub async fn read_frame(&mut self) -> Result<Frame> {
        let mut frame = [0u8; FRAME_LEN];
        let mut filled = 0;

        while filled < FRAME_LEN {
            let n = tokio::time::timeout(self.timeout, self.inner.read(&mut frame[filled..]))
                .await
                .map_err(|_| FrameError::Timeout(self.timeout))??;

            if n == 0 {
                return Err(FrameError::Disconnected { received: filled });
            }

            filled += n;
            if filled < FRAME_LEN {
                tracing::trace!("Partial frame: {}/{} bytes", filled, FRAME_LEN);
            }
        }

        self.frames_read += 1;
        Ok(frame)
    }

    /// Number of complete frames returned so far
    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }
}
