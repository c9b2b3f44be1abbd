use std::io;
use std::time::Duration;

use nix::errno::Errno;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Creating a segment collided with an existing name.
    #[error("shared memory segment '{name}' already exists")]
    AlreadyExists { name: String },

    /// Attaching to a segment that nobody has created.
    #[error("shared memory segment '{name}' not found")]
    NotFound { name: String },

    /// A write larger than the arena. The header is left untouched.
    #[error("payload of {got} bytes exceeds arena capacity of {capacity} bytes")]
    PayloadTooLarge { capacity: usize, got: usize },

    /// A full hand-off cycle did not complete within the bounded wait.
    #[error("timed out after {0:?} waiting for the peer")]
    Timeout(Duration),

    /// The flag pair holds a combination the handshake can never produce.
    #[error("handshake flags corrupted: ready={ready}, done={done}")]
    InvalidState { ready: bool, done: bool },

    /// Attached to a mapping with no room for the frame header.
    #[error("segment of {got} bytes is smaller than the {min}-byte frame header")]
    SegmentTooSmall { min: usize, got: usize },

    #[error("os error: {0}")]
    Os(#[from] Errno),

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}
