//! File-descriptor backend.
//!
//! [`Fd`] implements [`RawStream`] over a POSIX descriptor. Descriptors opened
//! or adopted here are owned and closed on `close` (or drop); the inherited
//! standard streams are borrowed and left open.

#[allow(unsafe_code)]
mod raw;

use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

pub use raw::{sys_close, sys_lseek_set, sys_open, sys_read, sys_regular_size, sys_write};

use crate::stdio::{AccessMode, RawStream};

/// Permission bits for files created by [`Fd::open`].
pub const CREATE_MODE: libc::mode_t = 0o666;

#[derive(Debug)]
pub struct Fd {
    fd: i32,
    owned: bool,
    closed: bool,
}

impl Fd {
    /// Open `path` with the flags `mode` implies (write-only creates and truncates).
    pub fn open(path: &Path, mode: AccessMode) -> Result<Self, i32> {
        let cpath = CString::new(path.as_os_str().as_bytes()).map_err(|_| libc::EINVAL)?;
        let fd = sys_open(&cpath, mode.open_flags(), CREATE_MODE)?;
        Ok(Self::adopt(fd))
    }

    /// Take ownership of an already-open descriptor.
    #[must_use]
    pub fn adopt(fd: i32) -> Self {
        Self {
            fd,
            owned: true,
            closed: false,
        }
    }

    /// Borrow standard input.
    #[must_use]
    pub fn stdin() -> Self {
        Self::borrowed(libc::STDIN_FILENO)
    }

    /// Borrow standard output.
    #[must_use]
    pub fn stdout() -> Self {
        Self::borrowed(libc::STDOUT_FILENO)
    }

    /// Use `fd` without taking ownership; `close` leaves it open.
    #[must_use]
    pub fn borrowed(fd: i32) -> Self {
        Self {
            fd,
            owned: false,
            closed: false,
        }
    }

    #[must_use]
    pub fn as_raw_fd(&self) -> i32 {
        self.fd
    }

    #[must_use]
    pub fn is_owned(&self) -> bool {
        self.owned
    }
}

impl RawStream for Fd {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, i32> {
        sys_read(self.fd, buf)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, i32> {
        sys_write(self.fd, buf)
    }

    fn seek(&mut self, offset: u64) -> Result<u64, i32> {
        sys_lseek_set(self.fd, offset)
    }

    fn close(&mut self) -> Result<(), i32> {
        if self.closed {
            return Err(libc::EBADF);
        }
        self.closed = true;
        if self.owned { sys_close(self.fd) } else { Ok(()) }
    }

    fn fileno(&self) -> i32 {
        self.fd
    }

    fn size(&self) -> Option<u64> {
        sys_regular_size(self.fd).ok().flatten()
    }
}

impl Drop for Fd {
    fn drop(&mut self) {
        if self.owned && !self.closed {
            let _ = sys_close(self.fd);
        }
    }
}
