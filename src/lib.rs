//! Single-frame hand-off between two processes over POSIX shared memory.
//!
//! A producer and a consumer map the same named segment. The segment starts
//! with a [`FrameHeader`] embedding a process-shared mutex and two condition
//! variables, followed by a fixed-capacity byte arena holding the current
//! frame. A two-flag handshake (`ready`/`done`) guarantees at most one
//! frame in flight, with bounded or unbounded waits on either side.

pub mod error;
pub mod sync;

mod channel;
mod consumer;
mod header;
mod producer;
mod shm;
mod wait;

pub use channel::{Frame, FrameChannel};
pub use consumer::Consumer;
pub use error::{Error, Result};
pub use header::{FrameHeader, HandshakeState};
pub use producer::Producer;
pub use shm::{OpenOptions, Shm};
pub use wait::{CancelToken, Wait};
