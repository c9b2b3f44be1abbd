use std::time::Duration;

use crate::channel::{Frame, FrameChannel};
use crate::error::{Error, Result};
use crate::wait::{CancelToken, Wait};

/// The reading side of a [`FrameChannel`].
pub struct Consumer {
    chan: FrameChannel,
}

impl Consumer {
    /// Takes the consumer role on a segment the producer created.
    pub fn attach(name: &str) -> Result<Self> {
        Ok(Consumer {
            chan: FrameChannel::attach(name)?,
        })
    }

    /// Creates the segment and takes the consumer role, for setups where
    /// the consumer starts first.
    pub fn create(name: &str, capacity: usize) -> Result<Self> {
        Ok(Consumer {
            chan: FrameChannel::create(name, capacity)?,
        })
    }

    pub fn capacity(&self) -> usize {
        self.chan.capacity()
    }

    pub fn wait_for_ready(&mut self, wait: Wait) -> Result<bool> {
        self.chan.wait_for_ready(wait)
    }

    pub fn wait_for_ready_cancellable(
        &mut self,
        interval: Duration,
        token: &CancelToken,
    ) -> Result<bool> {
        self.chan.wait_for_ready_cancellable(interval, token)
    }

    pub fn read_frame(&mut self) -> Result<Frame> {
        self.chan.read_frame()
    }

    pub fn signal_done(&mut self) -> Result<()> {
        self.chan.signal_done()
    }

    /// One full consumer half-cycle: wait for a frame, copy it out, and
    /// release the producer. A bounded wait that expires is reported as
    /// [`Error::Timeout`].
    pub fn recv(&mut self, wait: Wait) -> Result<Frame> {
        match wait {
            Wait::Forever => {
                self.chan.wait_for_ready(Wait::Forever)?;
            }
            Wait::For(timeout) => {
                if !self.chan.wait_for_ready(wait)? {
                    return Err(Error::Timeout(timeout));
                }
            }
        }
        let frame = self.chan.read_frame()?;
        self.chan.signal_done()?;
        Ok(frame)
    }

    /// Like [`recv`](Self::recv), but loops bounded waits of `interval`
    /// and checks `token` between each. `Ok(None)` means the token was
    /// cancelled before a frame arrived.
    pub fn recv_cancellable(
        &mut self,
        interval: Duration,
        token: &CancelToken,
    ) -> Result<Option<Frame>> {
        if !self.chan.wait_for_ready_cancellable(interval, token)? {
            return Ok(None);
        }
        let frame = self.chan.read_frame()?;
        self.chan.signal_done()?;
        Ok(Some(frame))
    }
}
