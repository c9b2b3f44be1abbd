//! Process-shared pthread primitives embedded in shared memory.
//!
//! Everything here is initialized *in place*: a `pthread_mutex_t` that has
//! been moved after `pthread_mutex_init` is undefined, and a mapping shared
//! across address spaces leaves no room to cheat. Condition variables are
//! bound to `CLOCK_MONOTONIC` so timed waits survive wall-clock jumps.

use std::{
    io::{Error, Result},
    time::Duration,
};

use nix::libc::{
    c_long, clock_gettime, pthread_cond_broadcast, pthread_cond_init, pthread_cond_signal,
    pthread_cond_t, pthread_cond_timedwait, pthread_cond_wait, pthread_condattr_init,
    pthread_condattr_setclock, pthread_condattr_setpshared, pthread_condattr_t,
    pthread_mutex_init, pthread_mutex_lock, pthread_mutex_t, pthread_mutex_unlock,
    pthread_mutexattr_init, pthread_mutexattr_setpshared, pthread_mutexattr_t, time_t, timespec,
    CLOCK_MONOTONIC, ETIMEDOUT, PTHREAD_PROCESS_SHARED,
};

macro_rules! check_err {
    ($call:expr) => {
        let err = $call;
        if (err != 0) {
            return Err(Error::from_raw_os_error(err));
        }
    };
}

#[repr(C)]
pub struct PosixMutex {
    attr: pthread_mutexattr_t,
    mtx: pthread_mutex_t,
}

impl PosixMutex {
    /// Initializes a process-shared mutex at `this`.
    ///
    /// # Safety
    ///
    /// `this` must be valid for writes, properly aligned, and must not hold
    /// an already-initialized mutex that other processes could be using.
    pub unsafe fn init_in_place(this: *mut Self) -> Result<()> {
        let attr = &raw mut (*this).attr;
        check_err!(pthread_mutexattr_init(attr));
        check_err!(pthread_mutexattr_setpshared(attr, PTHREAD_PROCESS_SHARED));
        check_err!(pthread_mutex_init(&raw mut (*this).mtx, attr));
        Ok(())
    }

    pub fn lock(&mut self) -> Result<()> {
        unsafe {
            check_err!(pthread_mutex_lock(&raw mut self.mtx));
        }
        Ok(())
    }

    pub fn unlock(&mut self) -> Result<()> {
        unsafe {
            check_err!(pthread_mutex_unlock(&raw mut self.mtx));
        }
        Ok(())
    }
}

#[repr(C)]
pub struct PosixCondition {
    attr: pthread_condattr_t,
    cond: pthread_cond_t,
}

impl PosixCondition {
    /// Initializes a process-shared condition variable at `this`, clocked
    /// against `CLOCK_MONOTONIC`.
    ///
    /// # Safety
    ///
    /// Same contract as [`PosixMutex::init_in_place`].
    pub unsafe fn init_in_place(this: *mut Self) -> Result<()> {
        let attr = &raw mut (*this).attr;
        check_err!(pthread_condattr_init(attr));
        check_err!(pthread_condattr_setpshared(attr, PTHREAD_PROCESS_SHARED));
        check_err!(pthread_condattr_setclock(attr, CLOCK_MONOTONIC));
        check_err!(pthread_cond_init(&raw mut (*this).cond, attr));
        Ok(())
    }

    /// Blocks until signaled. `mtx` must be held and is atomically released
    /// while blocked, reacquired on wake. Callers re-check their predicate:
    /// spurious wakeups are allowed here.
    pub fn wait(&mut self, mtx: &mut PosixMutex) -> Result<()> {
        unsafe {
            check_err!(pthread_cond_wait(&raw mut self.cond, &raw mut mtx.mtx));
        }
        Ok(())
    }

    /// Like [`wait`](Self::wait), but gives up once `deadline` passes.
    /// Returns `Ok(false)` on expiry. Because the deadline is absolute,
    /// looping callers never grant extra time after a spurious wakeup.
    pub fn timedwait(&mut self, mtx: &mut PosixMutex, deadline: &Deadline) -> Result<bool> {
        let err =
            unsafe { pthread_cond_timedwait(&raw mut self.cond, &raw mut mtx.mtx, &deadline.ts) };
        match err {
            0 => Ok(true),
            ETIMEDOUT => Ok(false),
            err => Err(Error::from_raw_os_error(err)),
        }
    }

    pub fn signal(&mut self) -> Result<()> {
        unsafe {
            check_err!(pthread_cond_signal(&raw mut self.cond));
        }
        Ok(())
    }

    pub fn broadcast(&mut self) -> Result<()> {
        unsafe {
            check_err!(pthread_cond_broadcast(&raw mut self.cond));
        }
        Ok(())
    }
}

/// An absolute point on the monotonic clock, computed once per bounded wait.
#[derive(Clone, Copy)]
pub struct Deadline {
    ts: timespec,
}

impl Deadline {
    pub fn after(timeout: Duration) -> Self {
        let mut ts = timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        unsafe { clock_gettime(CLOCK_MONOTONIC, &mut ts) };
        ts.tv_sec += timeout.as_secs() as time_t;
        ts.tv_nsec += timeout.subsec_nanos() as c_long;
        if ts.tv_nsec >= 1_000_000_000 {
            ts.tv_sec += 1;
            ts.tv_nsec -= 1_000_000_000;
        }
        Deadline { ts }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::MaybeUninit;
    use std::time::Instant;

    #[test]
    fn lock_unlock() {
        let mut mtx = MaybeUninit::<PosixMutex>::uninit();
        unsafe {
            PosixMutex::init_in_place(mtx.as_mut_ptr()).unwrap();
            let mtx = &mut *mtx.as_mut_ptr();
            mtx.lock().unwrap();
            mtx.unlock().unwrap();
        }
    }

    #[test]
    fn timedwait_expires_without_signal() {
        let mut mtx = MaybeUninit::<PosixMutex>::uninit();
        let mut cond = MaybeUninit::<PosixCondition>::uninit();
        unsafe {
            PosixMutex::init_in_place(mtx.as_mut_ptr()).unwrap();
            PosixCondition::init_in_place(cond.as_mut_ptr()).unwrap();
            let mtx = &mut *mtx.as_mut_ptr();
            let cond = &mut *cond.as_mut_ptr();

            let timeout = Duration::from_millis(50);
            mtx.lock().unwrap();
            let start = Instant::now();
            let signaled = cond.timedwait(mtx, &Deadline::after(timeout)).unwrap();
            mtx.unlock().unwrap();

            assert!(!signaled);
            assert!(start.elapsed() >= timeout);
        }
    }
}
