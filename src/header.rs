use crate::error::{Error, Result};
use crate::sync::{PosixCondition, PosixMutex};

/// The handshake header placed at the start of every segment, immediately
/// followed by the fixed-capacity arena.
///
/// `mutex` guards every other field *and* the arena. `cond_ready` is
/// signaled when `ready` flips true, `cond_done` when `done` flips true;
/// keeping them separate ensures a readiness wakeup never rouses the
/// done-waiter and vice versa.
#[repr(C)]
pub struct FrameHeader {
    pub(crate) ready: bool,
    pub(crate) done: bool,
    pub(crate) width: u64,
    pub(crate) height: u64,
    pub(crate) channels: u64,
    pub(crate) payload_size: u64,
    pub(crate) mutex: PosixMutex,
    pub(crate) cond_ready: PosixCondition,
    pub(crate) cond_done: PosixCondition,
}

impl FrameHeader {
    /// Creator role only: constructs the header in raw mapped memory.
    /// Attachers must never call this; they take the header as already
    /// valid. Initial state is idle (`ready=false, done=true`).
    ///
    /// # Safety
    ///
    /// `this` must point to at least `size_of::<FrameHeader>()` writable,
    /// properly aligned bytes that no other process is using yet.
    pub(crate) unsafe fn init_in_place(this: *mut Self) -> Result<()> {
        (&raw mut (*this).ready).write(false);
        (&raw mut (*this).done).write(true);
        (&raw mut (*this).width).write(0);
        (&raw mut (*this).height).write(0);
        (&raw mut (*this).channels).write(0);
        (&raw mut (*this).payload_size).write(0);
        PosixMutex::init_in_place(&raw mut (*this).mutex)?;
        PosixCondition::init_in_place(&raw mut (*this).cond_ready)?;
        PosixCondition::init_in_place(&raw mut (*this).cond_done)?;
        Ok(())
    }
}

/// The two reachable readings of the `(ready, done)` flag pair.
///
/// The pair can encode two more combinations; the protocol never produces
/// them, so observing one is reported as [`Error::InvalidState`] instead of
/// being coerced into either variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandshakeState {
    /// No frame in flight; the arena may be overwritten.
    Idle,
    /// A frame is written and awaiting consumption.
    Pending,
}

impl HandshakeState {
    pub(crate) fn from_flags(ready: bool, done: bool) -> Result<Self> {
        match (ready, done) {
            (false, true) => Ok(HandshakeState::Idle),
            (true, false) => Ok(HandshakeState::Pending),
            (ready, done) => Err(Error::InvalidState { ready, done }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_pair_decodes() {
        assert_eq!(
            HandshakeState::from_flags(false, true).unwrap(),
            HandshakeState::Idle
        );
        assert_eq!(
            HandshakeState::from_flags(true, false).unwrap(),
            HandshakeState::Pending
        );
        assert!(matches!(
            HandshakeState::from_flags(true, true),
            Err(Error::InvalidState {
                ready: true,
                done: true
            })
        ));
        assert!(matches!(
            HandshakeState::from_flags(false, false),
            Err(Error::InvalidState {
                ready: false,
                done: false
            })
        ));
    }
}
