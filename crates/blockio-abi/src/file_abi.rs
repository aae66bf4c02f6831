//! ABI layer for buffered file handles.
//!
//! Provides the handle lifecycle (`blockio_fdopen`/`blockio_open`/
//! `blockio_fopen`/`blockio_close`), byte and bulk I/O (`blockio_readc`/`blockio_read`/
//! `blockio_writec`/`blockio_write`), `blockio_flush`, `blockio_seek`, and
//! the descriptor queries (`blockio_fileno`/`blockio_filesize`).

use std::ffi::{CStr, c_char, c_int, c_uchar};

use blockio_core::sys::{CREATE_MODE, sys_open};
use blockio_core::stdio::parse_mode;
use blockio_core::{AccessMode, BlockFile, BlockIoError, Fd};
use libc::{off_t, ssize_t};

/// Opaque handle type seen by C callers.
pub type BlockioFile = BlockFile<Fd>;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

#[inline]
unsafe fn set_abi_errno(val: c_int) {
    // SAFETY: __errno_location returns this thread's errno slot.
    let p = unsafe { libc::__errno_location() };
    unsafe { *p = val };
}

#[inline]
fn fail(err: &BlockIoError) -> c_int {
    // SAFETY: writes the calling thread's errno slot.
    unsafe { set_abi_errno(err.errno()) };
    -1
}

/// Borrow the handle behind `f`, setting `EBADF` when it is null.
#[inline]
unsafe fn handle<'a>(f: *mut BlockioFile) -> Option<&'a mut BlockioFile> {
    // SAFETY: non-null handles come from `Box::into_raw` in this module and
    // callers do not share one handle across concurrent calls.
    let h = unsafe { f.as_mut() };
    if h.is_none() {
        unsafe { set_abi_errno(libc::EBADF) };
    }
    h
}

fn access_mode(mode: c_int) -> Option<AccessMode> {
    let access = AccessMode::from_oflags(mode);
    if access.is_none() {
        // SAFETY: writes the calling thread's errno slot.
        unsafe { set_abi_errno(libc::EINVAL) };
    }
    access
}

// ---------------------------------------------------------------------------
// blockio_fdopen / blockio_open / blockio_fopen / blockio_close
// ---------------------------------------------------------------------------

/// Wrap descriptor `fd`; `mode` must be `O_RDONLY` or `O_WRONLY`.
///
/// On failure the descriptor is left untouched and stays with the caller.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn blockio_fdopen(fd: c_int, mode: c_int) -> *mut BlockioFile {
    if fd < 0 {
        unsafe { set_abi_errno(libc::EBADF) };
        return std::ptr::null_mut();
    }
    let Some(access) = access_mode(mode) else {
        return std::ptr::null_mut();
    };
    Box::into_raw(Box::new(BlockFile::new(Fd::adopt(fd), access)))
}

/// Open `path` read-only or write-only (write-only creates and truncates).
#[unsafe(no_mangle)]
pub unsafe extern "C" fn blockio_open(path: *const c_char, mode: c_int) -> *mut BlockioFile {
    if path.is_null() {
        unsafe { set_abi_errno(libc::EFAULT) };
        return std::ptr::null_mut();
    }
    let Some(access) = access_mode(mode) else {
        return std::ptr::null_mut();
    };
    // SAFETY: caller supplies a NUL-terminated path.
    let cpath = unsafe { CStr::from_ptr(path) };
    let flags = access.open_flags() | (mode & !libc::O_ACCMODE);
    match sys_open(cpath, flags, CREATE_MODE) {
        Ok(fd) => Box::into_raw(Box::new(BlockFile::new(Fd::adopt(fd), access))),
        Err(errno) => {
            unsafe { set_abi_errno(errno) };
            std::ptr::null_mut()
        }
    }
}

/// Open `path` with an fopen-style mode string (`"r"`, `"rb"`, `"w"`, `"wb"`).
#[unsafe(no_mangle)]
pub unsafe extern "C" fn blockio_fopen(path: *const c_char, mode: *const c_char) -> *mut BlockioFile {
    if mode.is_null() {
        unsafe { set_abi_errno(libc::EINVAL) };
        return std::ptr::null_mut();
    }
    // SAFETY: caller supplies a NUL-terminated mode string.
    let mode = unsafe { CStr::from_ptr(mode) };
    match parse_mode(mode.to_bytes()) {
        Some(access) => unsafe { blockio_open(path, access.oflags()) },
        None => {
            unsafe { set_abi_errno(libc::EINVAL) };
            std::ptr::null_mut()
        }
    }
}

/// Flush, close the descriptor, and free the handle. Returns 0 or -1.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn blockio_close(f: *mut BlockioFile) -> c_int {
    if f.is_null() {
        unsafe { set_abi_errno(libc::EBADF) };
        return -1;
    }
    // SAFETY: `f` came from `Box::into_raw` and ownership returns here.
    let file = unsafe { Box::from_raw(f) };
    match file.close() {
        Ok(()) => 0,
        Err(e) => fail(&e),
    }
}

// ---------------------------------------------------------------------------
// blockio_readc / blockio_read
// ---------------------------------------------------------------------------

/// Read one byte. Returns it as an unsigned value, or -1 on EOF or error.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn blockio_readc(f: *mut BlockioFile) -> c_int {
    let Some(file) = (unsafe { handle(f) }) else {
        return -1;
    };
    match file.read_byte() {
        Ok(Some(b)) => c_int::from(b),
        Ok(None) => -1,
        Err(e) => fail(&e),
    }
}

/// Read up to `sz` bytes into `buf`. Returns the count, 0 at EOF, or -1 if
/// an error occurred before any byte was read.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn blockio_read(
    f: *mut BlockioFile,
    buf: *mut c_uchar,
    sz: usize,
) -> ssize_t {
    let Some(file) = (unsafe { handle(f) }) else {
        return -1;
    };
    if sz == 0 {
        return 0;
    }
    if buf.is_null() {
        unsafe { set_abi_errno(libc::EFAULT) };
        return -1;
    }
    // SAFETY: caller guarantees `buf` is writable for `sz` bytes.
    let dst = unsafe { std::slice::from_raw_parts_mut(buf, sz) };
    match file.read(dst) {
        Ok(n) => n as ssize_t,
        Err(e) => fail(&e) as ssize_t,
    }
}

// ---------------------------------------------------------------------------
// blockio_writec / blockio_write / blockio_flush
// ---------------------------------------------------------------------------

/// Write the low byte of `ch`. Returns 0 or -1.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn blockio_writec(f: *mut BlockioFile, ch: c_int) -> c_int {
    let Some(file) = (unsafe { handle(f) }) else {
        return -1;
    };
    match file.write_byte(ch as u8) {
        Ok(()) => 0,
        Err(e) => fail(&e),
    }
}

/// Write `sz` bytes from `buf`. Returns `sz` on success, a shorter count if a
/// flush failed part way, or -1 if nothing was written.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn blockio_write(
    f: *mut BlockioFile,
    buf: *const c_uchar,
    sz: usize,
) -> ssize_t {
    let Some(file) = (unsafe { handle(f) }) else {
        return -1;
    };
    if sz == 0 {
        return 0;
    }
    if buf.is_null() {
        unsafe { set_abi_errno(libc::EFAULT) };
        return -1;
    }
    // SAFETY: caller guarantees `buf` is readable for `sz` bytes.
    let src = unsafe { std::slice::from_raw_parts(buf, sz) };
    match file.write(src) {
        Ok(n) => n as ssize_t,
        Err(e) => fail(&e) as ssize_t,
    }
}

/// Drain buffered writes. Always 0 for read handles.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn blockio_flush(f: *mut BlockioFile) -> c_int {
    let Some(file) = (unsafe { handle(f) }) else {
        return -1;
    };
    match file.flush() {
        Ok(()) => 0,
        Err(e) => fail(&e),
    }
}

// ---------------------------------------------------------------------------
// blockio_seek
// ---------------------------------------------------------------------------

/// Move to absolute offset `pos`. Returns 0 or -1.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn blockio_seek(f: *mut BlockioFile, pos: off_t) -> c_int {
    let Some(file) = (unsafe { handle(f) }) else {
        return -1;
    };
    let Ok(target) = u64::try_from(pos) else {
        unsafe { set_abi_errno(libc::EINVAL) };
        return -1;
    };
    match file.seek(target) {
        Ok(()) => 0,
        Err(e) => fail(&e),
    }
}

// ---------------------------------------------------------------------------
// blockio_fileno / blockio_filesize
// ---------------------------------------------------------------------------

/// Descriptor behind the handle, or -1 for a null handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn blockio_fileno(f: *mut BlockioFile) -> c_int {
    match unsafe { handle(f) } {
        Some(file) => file.fileno(),
        None => -1,
    }
}

/// Size of a regular file, or -1 for pipes, terminals, and other streams.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn blockio_filesize(f: *mut BlockioFile) -> off_t {
    let Some(file) = (unsafe { handle(f) }) else {
        return -1;
    };
    file.size()
        .and_then(|n| off_t::try_from(n).ok())
        .unwrap_or(-1)
}
