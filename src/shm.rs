use std::num::NonZero;
use std::ops::{Deref, DerefMut};
use std::os::fd::{AsRawFd, OwnedFd};
use std::path::{Path, PathBuf};
use std::ptr::NonNull;
use std::slice;

use nix::errno::Errno;
use nix::sys::mman::shm_unlink;
use nix::unistd::ftruncate;
use nix::{
    fcntl::OFlag,
    libc::c_void,
    libc::off_t,
    sys::mman::{mmap, munmap, shm_open, MapFlags, ProtFlags},
    sys::stat::{fstat, Mode},
};

use crate::error::{Error, Result};

pub struct OpenOptions {
    mode: Mode,
    oflg: OFlag,
    prot: ProtFlags,
    flgs: MapFlags,
    offset: off_t,
}

impl OpenOptions {
    /// Maps an existing segment, discovering its size from the filesystem.
    /// The returned handle never unlinks the name.
    pub fn open(self, name: &str) -> Result<Shm> {
        let name = OpenOptions::prepend_slash(name);
        let fd = shm_open(name.as_str(), self.oflg, self.mode).map_err(|errno| match errno {
            Errno::ENOENT => Error::NotFound { name: name.clone() },
            errno => Error::Os(errno),
        })?;
        let statbuf = fstat(fd.as_raw_fd())?;
        let len = statbuf.st_size as usize;
        Self::map_raw(fd, name, len, false, self.prot, self.flgs, self.offset)
    }

    /// Creates and maps a segment of `len` bytes. The returned handle is the
    /// creator: dropping it unlinks the name for everyone.
    pub fn map(self, name: &str, len: usize) -> Result<Shm> {
        let name = Self::prepend_slash(name);
        let fd = shm_open(name.as_str(), self.oflg, self.mode).map_err(|errno| match errno {
            Errno::EEXIST => Error::AlreadyExists { name: name.clone() },
            errno => Error::Os(errno),
        })?;
        ftruncate(&fd, len as i64)?;
        Self::map_raw(fd, name, len, true, self.prot, self.flgs, self.offset)
    }

    pub fn mode(mut self, mode: u32) -> Self {
        self.mode = Mode::from_bits(mode).expect("invalid mode");
        self
    }

    pub fn create(mut self, create: bool) -> Self {
        if create {
            self.oflg |= OFlag::O_CREAT;
        } else {
            self.oflg &= !OFlag::O_CREAT;
        }
        self
    }

    pub fn exclusive(mut self, exclusive: bool) -> Self {
        if exclusive {
            self.oflg |= OFlag::O_EXCL;
        } else {
            self.oflg &= !OFlag::O_EXCL;
        }
        self
    }

    pub fn read(mut self, readable: bool) -> Self {
        if readable {
            self.prot |= ProtFlags::PROT_READ;
        } else {
            self.prot &= !ProtFlags::PROT_READ;
        }
        self
    }

    pub fn write(mut self, writable: bool) -> Self {
        if writable {
            self.prot |= ProtFlags::PROT_WRITE;
        } else {
            self.prot &= !ProtFlags::PROT_WRITE;
        }
        self
    }

    /// Must be aligned to page boundary.
    pub fn offset(mut self, offset: off_t) -> Self {
        self.offset = offset;
        self
    }

    fn map_raw(
        fd: OwnedFd,
        name: String,
        len: usize,
        creator: bool,
        prot: ProtFlags,
        flgs: MapFlags,
        offset: off_t,
    ) -> Result<Shm> {
        let len = NonZero::new(len).ok_or(Error::SegmentTooSmall { min: 1, got: 0 })?;
        let ptr = unsafe { mmap(None, len, prot, flgs, &fd, offset)? };
        Ok(Shm {
            ptr,
            len: len.into(),
            name: name.into(),
            creator,
        })
    }

    fn prepend_slash(name: &str) -> String {
        if name.chars().nth(0) != Some('/') {
            String::from("/") + name
        } else {
            String::from(name)
        }
    }
}

impl Default for OpenOptions {
    fn default() -> Self {
        OpenOptions {
            mode: Mode::from_bits(0o644).unwrap(),
            oflg: OFlag::O_RDWR,
            prot: ProtFlags::PROT_NONE,
            flgs: MapFlags::MAP_SHARED,
            offset: 0,
        }
    }
}

/// A named shared memory mapping.
///
/// Exactly one handle per name is the creator; only that handle removes the
/// name from the namespace on drop. Every handle unmaps its own view.
pub struct Shm {
    name: PathBuf,
    ptr: NonNull<c_void>,
    len: usize,
    creator: bool,
}

// The mapping is valid for the handle's lifetime; all access to shared
// content goes through the header lock one level up.
unsafe impl Send for Shm {}

impl Shm {
    /// Creates a new segment, failing if the name is taken.
    pub fn create(name: &str, len: usize) -> Result<Self> {
        Shm::options()
            .read(true)
            .write(true)
            .create(true)
            .exclusive(true)
            .map(name, len)
    }

    /// Attaches to a segment some other process created.
    pub fn open(name: &str) -> Result<Self> {
        Shm::options().read(true).write(true).open(name)
    }

    pub fn options() -> OpenOptions {
        OpenOptions::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn name(&self) -> &Path {
        &self.name
    }

    pub fn is_creator(&self) -> bool {
        self.creator
    }

    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr() as *mut u8
    }
}

impl Deref for Shm {
    type Target = [u8];
    fn deref(&self) -> &Self::Target {
        unsafe { slice::from_raw_parts(self.ptr.as_ptr() as *const u8, self.len) }
    }
}

impl DerefMut for Shm {
    fn deref_mut(&mut self) -> &mut Self::Target {
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr() as *mut u8, self.len) }
    }
}

impl Drop for Shm {
    fn drop(&mut self) {
        unsafe {
            munmap(self.ptr, self.len).unwrap();
        }
        if self.creator {
            // Ignore ENOENT in case another process already removed the name.
            match shm_unlink(&self.name) {
                Err(Errno::ENOENT) => (),
                r => r.unwrap(),
            }
        }
    }
}
