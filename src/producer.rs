use std::time::Duration;

use crate::channel::FrameChannel;
use crate::error::{Error, Result};
use crate::wait::{CancelToken, Wait};

/// The writing side of a [`FrameChannel`].
pub struct Producer {
    chan: FrameChannel,
}

impl Producer {
    /// Creates the segment and takes the producer role. The handle is the
    /// creator and unlinks the name on drop.
    pub fn create(name: &str, capacity: usize) -> Result<Self> {
        Ok(Producer {
            chan: FrameChannel::create(name, capacity)?,
        })
    }

    /// Takes the producer role on a segment someone else created.
    pub fn attach(name: &str) -> Result<Self> {
        Ok(Producer {
            chan: FrameChannel::attach(name)?,
        })
    }

    pub fn capacity(&self) -> usize {
        self.chan.capacity()
    }

    pub fn write_frame(
        &mut self,
        bytes: &[u8],
        width: u32,
        height: u32,
        channels: u32,
    ) -> Result<()> {
        self.chan.write_frame(bytes, width, height, channels)
    }

    pub fn signal_ready(&mut self) -> Result<()> {
        self.chan.signal_ready()
    }

    pub fn wait_for_done(&mut self, wait: Wait) -> Result<bool> {
        self.chan.wait_for_done(wait)
    }

    pub fn wait_for_done_cancellable(
        &mut self,
        interval: Duration,
        token: &CancelToken,
    ) -> Result<bool> {
        self.chan.wait_for_done_cancellable(interval, token)
    }

    /// One full producer half-cycle: write, signal readiness, and wait for
    /// the consumer to finish. A bounded wait that expires is reported as
    /// [`Error::Timeout`]; the frame stays pending, so the caller may drop
    /// it by writing the next one or keep waiting.
    pub fn send(
        &mut self,
        bytes: &[u8],
        width: u32,
        height: u32,
        channels: u32,
        wait: Wait,
    ) -> Result<()> {
        self.chan.write_frame(bytes, width, height, channels)?;
        self.chan.signal_ready()?;
        match wait {
            Wait::Forever => {
                self.chan.wait_for_done(Wait::Forever)?;
            }
            Wait::For(timeout) => {
                if !self.chan.wait_for_done(wait)? {
                    return Err(Error::Timeout(timeout));
                }
            }
        }
        Ok(())
    }
}
