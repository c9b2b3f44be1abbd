use std::ptr;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::header::{FrameHeader, HandshakeState};
use crate::shm::Shm;
use crate::sync::Deadline;
use crate::wait::{CancelToken, Wait};

/// An owned copy of one frame taken out of the arena.
///
/// Collaborators interpret `data` as packed rows of a fixed channel depth
/// (3-channel, 8-bit in practice); `channels` is recorded verbatim but not
/// enforced here.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub channels: u32,
    pub data: Vec<u8>,
}

impl Frame {
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A single-frame hand-off channel over one named segment.
///
/// The segment holds a [`FrameHeader`] followed by a byte arena whose
/// capacity is fixed at creation. At most one frame is in flight: the
/// producer writes and signals `ready`, the consumer copies out and signals
/// `done`. Every operation takes the header mutex; waits re-check their
/// flag in a loop to ride out spurious wakeups.
pub struct FrameChannel {
    shm: Shm,
    capacity: usize,
}

impl FrameChannel {
    /// Creates the segment and initializes the header in place. Exactly one
    /// process per name does this; everyone else [`attach`](Self::attach)es.
    pub fn create(name: &str, capacity: usize) -> Result<Self> {
        let shm = Shm::create(name, size_of::<FrameHeader>() + capacity)?;
        unsafe { FrameHeader::init_in_place(shm.as_ptr() as *mut FrameHeader)? };
        Ok(FrameChannel { shm, capacity })
    }

    /// Attaches to a segment whose creator has already initialized the
    /// header. The arena capacity is discovered from the mapped size.
    pub fn attach(name: &str) -> Result<Self> {
        let shm = Shm::open(name)?;
        if shm.len() < size_of::<FrameHeader>() {
            return Err(Error::SegmentTooSmall {
                min: size_of::<FrameHeader>(),
                got: shm.len(),
            });
        }
        let capacity = shm.len() - size_of::<FrameHeader>();
        Ok(FrameChannel { shm, capacity })
    }

    /// Arena capacity in bytes, fixed for the segment's lifetime.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_creator(&self) -> bool {
        self.shm.is_creator()
    }

    fn header(&mut self) -> &mut FrameHeader {
        // Valid by the attach precondition: the creator initialized the
        // header before any other process could map the name.
        unsafe { &mut *(self.shm.as_ptr() as *mut FrameHeader) }
    }

    fn arena(&mut self) -> *mut u8 {
        unsafe { self.shm.as_ptr().add(size_of::<FrameHeader>()) }
    }

    /// Copies a frame into the arena and records its metadata under the
    /// lock. Flags are untouched; pair with [`signal_ready`](Self::signal_ready).
    ///
    /// An oversized payload fails before the lock is even taken, leaving
    /// the header exactly as it was.
    pub fn write_frame(
        &mut self,
        bytes: &[u8],
        width: u32,
        height: u32,
        channels: u32,
    ) -> Result<()> {
        if bytes.len() > self.capacity {
            return Err(Error::PayloadTooLarge {
                capacity: self.capacity,
                got: bytes.len(),
            });
        }
        let arena = self.arena();
        let hdr = self.header();
        hdr.mutex.lock()?;
        unsafe { ptr::copy_nonoverlapping(bytes.as_ptr(), arena, bytes.len()) };
        hdr.width = width as u64;
        hdr.height = height as u64;
        hdr.channels = channels as u64;
        hdr.payload_size = bytes.len() as u64;
        hdr.mutex.unlock()?;
        Ok(())
    }

    /// Copies the current frame out into a caller-owned buffer. Never hands
    /// out a reference into the arena: the producer may overwrite it the
    /// moment `done` is signaled. An empty frame means nothing has been
    /// written yet.
    pub fn read_frame(&mut self) -> Result<Frame> {
        let arena = self.arena();
        let capacity = self.capacity;
        let hdr = self.header();
        hdr.mutex.lock()?;
        let len = (hdr.payload_size as usize).min(capacity);
        let mut data = vec![0u8; len];
        unsafe { ptr::copy_nonoverlapping(arena, data.as_mut_ptr(), len) };
        let frame = Frame {
            width: hdr.width as u32,
            height: hdr.height as u32,
            channels: hdr.channels as u32,
            data,
        };
        hdr.mutex.unlock()?;
        Ok(frame)
    }

    /// Flips the handshake to pending and wakes ready-waiters. Idempotent:
    /// a second call before consumption leaves the state pending.
    pub fn signal_ready(&mut self) -> Result<()> {
        let hdr = self.header();
        hdr.mutex.lock()?;
        hdr.ready = true;
        hdr.done = false;
        hdr.mutex.unlock()?;
        // One logical waiter is expected, but broadcast is safe.
        hdr.cond_ready.broadcast()?;
        Ok(())
    }

    /// Flips the handshake back to idle and wakes done-waiters.
    pub fn signal_done(&mut self) -> Result<()> {
        let hdr = self.header();
        hdr.mutex.lock()?;
        hdr.ready = false;
        hdr.done = true;
        hdr.mutex.unlock()?;
        hdr.cond_done.broadcast()?;
        Ok(())
    }

    /// Reads the flag pair under the lock and decodes it, surfacing
    /// combinations the protocol can never produce as [`Error::InvalidState`].
    pub fn state(&mut self) -> Result<HandshakeState> {
        let hdr = self.header();
        hdr.mutex.lock()?;
        let (ready, done) = (hdr.ready, hdr.done);
        hdr.mutex.unlock()?;
        HandshakeState::from_flags(ready, done)
    }

    /// Blocks until a frame is available. `Ok(false)` means a bounded wait
    /// expired with nothing to consume; state is left untouched.
    pub fn wait_for_ready(&mut self, wait: Wait) -> Result<bool> {
        self.wait_flag(true, wait)
    }

    /// Blocks until the consumer has finished with the last frame.
    pub fn wait_for_done(&mut self, wait: Wait) -> Result<bool> {
        self.wait_flag(false, wait)
    }

    /// Loops bounded waits of `interval`, checking `token` between each.
    /// `Ok(false)` means the token was cancelled before a frame arrived.
    pub fn wait_for_ready_cancellable(
        &mut self,
        interval: Duration,
        token: &CancelToken,
    ) -> Result<bool> {
        while !token.is_cancelled() {
            if self.wait_for_ready(Wait::For(interval))? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Counterpart of [`wait_for_ready_cancellable`](Self::wait_for_ready_cancellable)
    /// for the producer side.
    pub fn wait_for_done_cancellable(
        &mut self,
        interval: Duration,
        token: &CancelToken,
    ) -> Result<bool> {
        while !token.is_cancelled() {
            if self.wait_for_done(Wait::For(interval))? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn wait_flag(&mut self, want_ready: bool, wait: Wait) -> Result<bool> {
        // The deadline is absolute, so spurious wakeups inside the loop
        // never reset the remaining timeout.
        let deadline = match wait {
            Wait::Forever => None,
            Wait::For(timeout) => Some(Deadline::after(timeout)),
        };
        let hdr = self.header();
        hdr.mutex.lock()?;
        let outcome = loop {
            let flag = if want_ready { hdr.ready } else { hdr.done };
            if flag {
                break Ok(true);
            }
            let cond = if want_ready {
                &mut hdr.cond_ready
            } else {
                &mut hdr.cond_done
            };
            let waited = match &deadline {
                None => cond.wait(&mut hdr.mutex).map(|()| true),
                Some(deadline) => cond.timedwait(&mut hdr.mutex, deadline),
            };
            match waited {
                Ok(true) => continue,
                Ok(false) => {
                    // Expired; the signal may still have raced us in.
                    let flag = if want_ready { hdr.ready } else { hdr.done };
                    break Ok(flag);
                }
                Err(err) => break Err(Error::from(err)),
            }
        };
        let (ready, done) = (hdr.ready, hdr.done);
        hdr.mutex.unlock()?;
        match outcome {
            Ok(true) => {
                // A satisfied wait must have left a coherent flag pair.
                HandshakeState::from_flags(ready, done)?;
                Ok(true)
            }
            other => other,
        }
    }
}
