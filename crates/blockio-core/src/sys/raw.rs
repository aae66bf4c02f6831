//! Thin `libc` veneer for descriptor I/O.
//!
//! Each wrapper issues exactly one call and converts the C convention
//! (negative return + `errno`) into `Result<_, i32>`. No retries: `EINTR`
//! is reported like any other failure.

use std::ffi::CStr;

#[inline]
fn last_errno() -> i32 {
    std::io::Error::last_os_error()
        .raw_os_error()
        .unwrap_or(libc::EIO)
}

/// `read(fd, buf, buf.len())`.
#[inline]
pub fn sys_read(fd: i32, buf: &mut [u8]) -> Result<usize, i32> {
    // SAFETY: `buf` is a valid writable region of `buf.len()` bytes.
    let rc = unsafe { libc::read(fd, buf.as_mut_ptr().cast(), buf.len()) };
    if rc < 0 { Err(last_errno()) } else { Ok(rc as usize) }
}

/// `write(fd, buf, buf.len())`.
#[inline]
pub fn sys_write(fd: i32, buf: &[u8]) -> Result<usize, i32> {
    // SAFETY: `buf` is a valid readable region of `buf.len()` bytes.
    let rc = unsafe { libc::write(fd, buf.as_ptr().cast(), buf.len()) };
    if rc < 0 { Err(last_errno()) } else { Ok(rc as usize) }
}

/// `lseek(fd, offset, SEEK_SET)`.
#[inline]
pub fn sys_lseek_set(fd: i32, offset: u64) -> Result<u64, i32> {
    let off = libc::off_t::try_from(offset).map_err(|_| libc::EINVAL)?;
    // SAFETY: lseek takes no pointers; any fd/offset value is safe to pass.
    let rc = unsafe { libc::lseek(fd, off, libc::SEEK_SET) };
    if rc < 0 { Err(last_errno()) } else { Ok(rc as u64) }
}

/// `open(path, flags, mode)`.
#[inline]
pub fn sys_open(path: &CStr, flags: i32, mode: libc::mode_t) -> Result<i32, i32> {
    // SAFETY: `path` is a valid NUL-terminated string for the duration of the call.
    let fd = unsafe { libc::open(path.as_ptr(), flags | libc::O_CLOEXEC, mode as libc::c_uint) };
    if fd < 0 { Err(last_errno()) } else { Ok(fd) }
}

/// `close(fd)`.
#[inline]
pub fn sys_close(fd: i32) -> Result<(), i32> {
    // SAFETY: close takes no pointers; a bad fd just returns EBADF.
    let rc = unsafe { libc::close(fd) };
    if rc < 0 { Err(last_errno()) } else { Ok(()) }
}

/// Size of a regular file via `fstat`, `None` for anything else.
#[inline]
pub fn sys_regular_size(fd: i32) -> Result<Option<u64>, i32> {
    let mut st = std::mem::MaybeUninit::<libc::stat>::uninit();
    // SAFETY: `st` is a valid writable `stat` buffer.
    let rc = unsafe { libc::fstat(fd, st.as_mut_ptr()) };
    if rc < 0 {
        return Err(last_errno());
    }
    // SAFETY: fstat succeeded, so the buffer is initialized.
    let st = unsafe { st.assume_init() };
    if st.st_mode & libc::S_IFMT == libc::S_IFREG {
        Ok(Some(st.st_size as u64))
    } else {
        Ok(None)
    }
}
