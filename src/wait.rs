use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// How long a blocking call may wait for its counterpart.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Wait {
    /// Block until signaled. An infinite wait cannot be interrupted from
    /// outside; loops that must stay cancellable use bounded waits and a
    /// [`CancelToken`] instead.
    Forever,
    /// Give up once the duration elapses.
    For(Duration),
}

/// Cooperative stop flag for polling loops.
///
/// Clones share one flag, so any holder can stop a loop that checks the
/// token between bounded waits.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}
