//! Buffered file handle.
//!
//! `BlockFile` owns a raw stream, an access mode, and one [`BlockBuffer`].
//! Reads refill the block from the stream (Fill); writes drain it to the
//! stream (Flush). Seeking inside the buffered window costs no I/O; seeking
//! elsewhere on a read handle repositions to the enclosing aligned block and
//! refills.
//!
//! Error/EOF conventions:
//! - `read_byte` returns `Ok(None)` at end-of-stream.
//! - `read` returns `Ok(0)` at end-of-stream with no data, a short count when
//!   the stream ended (or failed) after some bytes moved, and `Err` only when
//!   nothing was transferred.
//! - `write` returns a short count only when a Flush failed after some bytes
//!   were accepted, and `Err` when none were.

use std::path::Path;

use super::buffer::{BLOCK_SIZE, BlockBuffer};
use super::raw::RawStream;
use crate::config::check_level;
use crate::error::{BlockIoError, RawOp};
use crate::sys::Fd;

/// Largest offset a handle can be positioned at (`off_t::MAX`).
const MAX_OFFSET: u64 = i64::MAX as u64;

// ---------------------------------------------------------------------------
// Access mode
// ---------------------------------------------------------------------------

/// Direction a handle was opened for. Fixed for the handle's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessMode {
    ReadOnly,
    WriteOnly,
}

impl AccessMode {
    /// Convert from `open(2)` flags. Only the access bits are inspected;
    /// `O_RDWR` and any other access value are rejected.
    #[must_use]
    pub fn from_oflags(flags: i32) -> Option<Self> {
        match flags & libc::O_ACCMODE {
            libc::O_RDONLY => Some(Self::ReadOnly),
            libc::O_WRONLY => Some(Self::WriteOnly),
            _ => None,
        }
    }

    /// Access bits for this mode (`O_RDONLY` or `O_WRONLY`).
    #[must_use]
    pub const fn oflags(self) -> i32 {
        match self {
            Self::ReadOnly => libc::O_RDONLY,
            Self::WriteOnly => libc::O_WRONLY,
        }
    }

    /// Full `open(2)` flags used when opening a path in this mode.
    #[must_use]
    pub const fn open_flags(self) -> i32 {
        match self {
            Self::ReadOnly => libc::O_RDONLY,
            Self::WriteOnly => libc::O_WRONLY | libc::O_CREAT | libc::O_TRUNC,
        }
    }

    #[must_use]
    pub const fn is_readable(self) -> bool {
        matches!(self, Self::ReadOnly)
    }

    #[must_use]
    pub const fn is_writable(self) -> bool {
        matches!(self, Self::WriteOnly)
    }
}

/// Parse an fopen-style mode string (`"r"`, `"rb"`, `"w"`, `"wb"`).
///
/// Returns `None` for anything else, including `+` modes.
pub fn parse_mode(mode: &[u8]) -> Option<AccessMode> {
    let (&base, rest) = mode.split_first()?;
    let access = match base {
        b'r' => AccessMode::ReadOnly,
        b'w' => AccessMode::WriteOnly,
        _ => return None,
    };
    match rest {
        [] | [b'b'] => Some(access),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

/// Counters describing the raw traffic a handle generated.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Raw reads issued by Fill and by seek refills.
    pub fills: u64,
    /// Flushes that drained a non-empty write window.
    pub flushes: u64,
    /// Raw seeks issued.
    pub raw_seeks: u64,
    /// Seeks satisfied inside the buffered window.
    pub window_seeks: u64,
    /// Bytes delivered by raw reads.
    pub bytes_read: u64,
    /// Bytes accepted by raw writes.
    pub bytes_written: u64,
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Single-block buffered handle over a raw stream.
#[derive(Debug)]
pub struct BlockFile<R: RawStream> {
    raw: R,
    mode: AccessMode,
    buf: BlockBuffer,
    stats: CacheStats,
    /// Set once the raw stream has been released.
    closed: bool,
}

impl BlockFile<Fd> {
    /// Open `path` in `mode` and wrap it.
    pub fn open(path: impl AsRef<Path>, mode: AccessMode) -> Result<Self, BlockIoError> {
        let fd = Fd::open(path.as_ref(), mode).map_err(|e| BlockIoError::raw(RawOp::Open, e))?;
        Ok(Self::new(fd, mode))
    }

    /// Open `path`, or inherit stdin (read) / stdout (write) when `path` is `None`.
    pub fn open_or_std(path: Option<&Path>, mode: AccessMode) -> Result<Self, BlockIoError> {
        match path {
            Some(p) => Self::open(p, mode),
            None => {
                let fd = match mode {
                    AccessMode::ReadOnly => Fd::stdin(),
                    AccessMode::WriteOnly => Fd::stdout(),
                };
                Ok(Self::new(fd, mode))
            }
        }
    }
}

impl<R: RawStream> BlockFile<R> {
    /// Adopt `raw` with an empty window at offset 0.
    pub fn new(raw: R, mode: AccessMode) -> Self {
        Self {
            raw,
            mode,
            buf: BlockBuffer::new(),
            stats: CacheStats::default(),
            closed: false,
        }
    }

    /// Adopt `raw` using `open(2)` access flags.
    pub fn from_oflags(raw: R, flags: i32) -> Result<Self, BlockIoError> {
        let mode = AccessMode::from_oflags(flags).ok_or(BlockIoError::InvalidMode(flags))?;
        Ok(Self::new(raw, mode))
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    /// Stream offset of the first buffered byte.
    pub fn tag(&self) -> u64 {
        self.buf.tag()
    }

    /// Logical stream position.
    pub fn pos(&self) -> u64 {
        self.buf.pos()
    }

    /// Stream offset one past the last buffered byte.
    pub fn end(&self) -> u64 {
        self.buf.end()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Numeric identity of the underlying stream.
    pub fn fileno(&self) -> i32 {
        self.raw.fileno()
    }

    /// Size of the underlying stream, or `None` when it is not a regular file.
    pub fn size(&self) -> Option<u64> {
        self.raw.size()
    }

    pub fn get_ref(&self) -> &R {
        &self.raw
    }

    /// Mutable access to the raw stream. I/O issued through it bypasses the cache.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.raw
    }

    // -----------------------------------------------------------------------
    // Fill / Flush
    // -----------------------------------------------------------------------

    /// Refill the read window from the stream, starting at `end`.
    ///
    /// Collapses the window to `tag = pos = end`, then issues one raw read of
    /// up to a block. Returns the number of bytes obtained; `0` is
    /// end-of-stream. A handle positioned past end-of-stream returns `0`
    /// without I/O.
    pub fn fill(&mut self) -> Result<usize, BlockIoError> {
        self.require(AccessMode::ReadOnly, "fill")?;
        if self.buf.is_past_end() {
            return Ok(0);
        }
        self.buf.collapse_to_end();
        self.stats.fills += 1;
        let n = self
            .raw
            .read(self.buf.fill_target())
            .map_err(|e| BlockIoError::raw(RawOp::Read, e))?
            .min(BLOCK_SIZE);
        self.buf.commit_fill(n);
        self.stats.bytes_read += n as u64;
        Ok(n)
    }

    /// Drain pending writes to the stream. A no-op on read handles.
    pub fn flush(&mut self) -> Result<(), BlockIoError> {
        match self.mode {
            AccessMode::ReadOnly => Ok(()),
            AccessMode::WriteOnly => {
                self.guard()?;
                self.drain()
            }
        }
    }

    /// Write `[tag, pos)` out and move `tag` to `pos`, even when the raw write
    /// fails: the cache no longer holds that data either way.
    fn drain(&mut self) -> Result<(), BlockIoError> {
        let pending = self.buf.pending();
        if pending.is_empty() {
            return Ok(());
        }
        self.stats.flushes += 1;
        let (written, result) = write_all(&mut self.raw, pending);
        self.stats.bytes_written += written as u64;
        self.buf.mark_drained();
        result
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Read one byte. `Ok(None)` at end-of-stream.
    pub fn read_byte(&mut self) -> Result<Option<u8>, BlockIoError> {
        self.require(AccessMode::ReadOnly, "read_byte")?;
        self.guard()?;
        if self.buf.is_past_end() {
            return Ok(None);
        }
        if self.buf.is_exhausted() && self.fill()? == 0 {
            return Ok(None);
        }
        let byte = self.buf.take_byte();
        self.guard()?;
        Ok(byte)
    }

    /// Read up to `dst.len()` bytes. Returns the number transferred.
    pub fn read(&mut self, dst: &mut [u8]) -> Result<usize, BlockIoError> {
        self.require(AccessMode::ReadOnly, "read")?;
        self.guard()?;
        if self.buf.is_past_end() {
            return Ok(0);
        }

        let mut nr = 0;
        while nr < dst.len() {
            if self.buf.is_exhausted() {
                match self.fill() {
                    Ok(0) => break,
                    Ok(_) => {}
                    Err(e) if nr == 0 => return Err(e),
                    Err(_) => break,
                }
            }
            nr += self.buf.copy_out(&mut dst[nr..]);
        }

        self.guard()?;
        Ok(nr)
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Write one byte, flushing first if the block is full.
    pub fn write_byte(&mut self, byte: u8) -> Result<(), BlockIoError> {
        self.require(AccessMode::WriteOnly, "write_byte")?;
        self.guard()?;
        if self.buf.is_full() {
            self.drain()?;
        }
        let pushed = self.buf.push_byte(byte);
        debug_assert!(pushed);
        self.guard()
    }

    /// Write all of `src`, flushing each time the block fills.
    ///
    /// Every Flush result is checked: a failure stops the transfer and the
    /// count accepted so far is returned (or the error, if nothing was).
    pub fn write(&mut self, src: &[u8]) -> Result<usize, BlockIoError> {
        self.require(AccessMode::WriteOnly, "write")?;
        self.guard()?;

        let mut nw = 0;
        while nw < src.len() {
            if self.buf.is_full() {
                match self.drain() {
                    Ok(()) => {}
                    Err(e) if nw == 0 => return Err(e),
                    Err(_) => return Ok(nw),
                }
            }
            nw += self.buf.copy_in(&src[nw..]);
        }

        self.guard()?;
        Ok(nw)
    }

    // -----------------------------------------------------------------------
    // Seeking
    // -----------------------------------------------------------------------

    /// Reposition the handle to absolute offset `off`.
    ///
    /// Write handles flush, then seek the stream. Read handles stay inside the
    /// current window when `off` is in `[tag, end)`; otherwise they seek the
    /// stream to the enclosing block boundary and refill until the window
    /// reaches `off` or the stream ends. Landing beyond the data the stream
    /// holds leaves the handle past end-of-stream.
    ///
    /// A failed refill fails the seek and leaves the handle at the block
    /// boundary, so later reads go back to the stream.
    pub fn seek(&mut self, off: u64) -> Result<(), BlockIoError> {
        if off > MAX_OFFSET {
            return Err(BlockIoError::OffsetOverflow(off));
        }
        self.guard()?;
        match self.mode {
            AccessMode::WriteOnly => {
                self.drain()?;
                self.raw_seek(off)?;
                self.buf.reset_to(off);
            }
            AccessMode::ReadOnly => {
                if self.buf.contains(off) {
                    self.buf.set_pos(off);
                    self.stats.window_seeks += 1;
                    return self.guard();
                }
                let aligned = BlockBuffer::aligned(off);
                self.raw_seek(aligned)?;
                self.buf.reset_to(aligned);
                self.refill_through(off)?;
                self.buf.set_pos(off);
            }
        }
        self.guard()
    }

    /// Top up a window starting at a block boundary until it covers `off`.
    /// Stops early at end-of-stream; short raw reads keep the loop going.
    fn refill_through(&mut self, off: u64) -> Result<(), BlockIoError> {
        while self.buf.end() <= off {
            self.stats.fills += 1;
            let room = self.buf.fill_tail();
            let cap = room.len();
            let n = self
                .raw
                .read(room)
                .map_err(|e| BlockIoError::raw(RawOp::Read, e))?
                .min(cap);
            if n == 0 {
                break;
            }
            self.buf.commit_fill(n);
            self.stats.bytes_read += n as u64;
        }
        Ok(())
    }

    fn raw_seek(&mut self, off: u64) -> Result<(), BlockIoError> {
        self.stats.raw_seeks += 1;
        let landed = self
            .raw
            .seek(off)
            .map_err(|e| BlockIoError::raw(RawOp::Seek, e))?;
        if landed != off {
            return Err(BlockIoError::SeekMismatch {
                requested: off,
                landed,
            });
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Close
    // -----------------------------------------------------------------------

    /// Flush, then release the raw stream. The stream is released even when
    /// the flush fails; the first error is returned.
    pub fn close(mut self) -> Result<(), BlockIoError> {
        let flushed = self.flush();
        let released = self.release();
        flushed.and(released)
    }

    fn release(&mut self) -> Result<(), BlockIoError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.raw
            .close()
            .map_err(|e| BlockIoError::raw(RawOp::Close, e))
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn require(&self, mode: AccessMode, op: &'static str) -> Result<(), BlockIoError> {
        if self.mode == mode {
            Ok(())
        } else {
            Err(BlockIoError::WrongMode {
                op,
                mode: self.mode,
            })
        }
    }

    fn guard(&self) -> Result<(), BlockIoError> {
        if check_level().enabled() {
            self.buf.check(self.mode)
        } else {
            Ok(())
        }
    }
}

impl<R: RawStream> Drop for BlockFile<R> {
    fn drop(&mut self) {
        if !self.closed {
            let _ = self.flush();
            let _ = self.release();
        }
    }
}

/// Write `data` completely, continuing after partial writes.
/// Returns the bytes accepted alongside the outcome.
fn write_all<R: RawStream>(raw: &mut R, data: &[u8]) -> (usize, Result<(), BlockIoError>) {
    let mut off = 0;
    while off < data.len() {
        match raw.write(&data[off..]) {
            Ok(0) => return (off, Err(BlockIoError::WriteZero)),
            Ok(n) => off += n.min(data.len() - off),
            Err(e) => return (off, Err(BlockIoError::raw(RawOp::Write, e))),
        }
    }
    (off, Ok(()))
}

// ---------------------------------------------------------------------------
// std::io adapters
// ---------------------------------------------------------------------------

impl From<BlockIoError> for std::io::Error {
    fn from(err: BlockIoError) -> Self {
        match err {
            BlockIoError::Raw { errno, .. } if errno > 0 => std::io::Error::from_raw_os_error(errno),
            BlockIoError::WriteZero => std::io::Error::new(std::io::ErrorKind::WriteZero, err),
            other => std::io::Error::other(other),
        }
    }
}

impl<R: RawStream> std::io::Read for BlockFile<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        BlockFile::read(self, buf).map_err(Into::into)
    }
}

impl<R: RawStream> std::io::Write for BlockFile<R> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        BlockFile::write(self, buf).map_err(Into::into)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        BlockFile::flush(self).map_err(Into::into)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stdio::mem::MemStream;

    fn reader(data: &[u8]) -> BlockFile<MemStream> {
        BlockFile::new(MemStream::with_data(data.to_vec()), AccessMode::ReadOnly)
    }

    fn writer() -> BlockFile<MemStream> {
        BlockFile::new(MemStream::new(), AccessMode::WriteOnly)
    }

    fn assert_window_ok(f: &BlockFile<MemStream>) {
        assert!(f.tag() <= f.pos());
        assert!(f.end() - f.tag() <= BLOCK_SIZE as u64);
        match f.mode() {
            AccessMode::ReadOnly => assert!(f.pos() <= f.end()),
            AccessMode::WriteOnly => assert_eq!(f.pos(), f.end()),
        }
    }

    #[test]
    fn test_from_oflags() {
        assert_eq!(AccessMode::from_oflags(libc::O_RDONLY), Some(AccessMode::ReadOnly));
        assert_eq!(
            AccessMode::from_oflags(libc::O_WRONLY | libc::O_CREAT),
            Some(AccessMode::WriteOnly)
        );
        assert_eq!(AccessMode::from_oflags(libc::O_RDWR), None);
        let err = BlockFile::from_oflags(MemStream::new(), libc::O_RDWR).unwrap_err();
        assert_eq!(err, BlockIoError::InvalidMode(libc::O_RDWR));
    }

    #[test]
    fn test_parse_mode() {
        assert_eq!(parse_mode(b"r"), Some(AccessMode::ReadOnly));
        assert_eq!(parse_mode(b"rb"), Some(AccessMode::ReadOnly));
        assert_eq!(parse_mode(b"w"), Some(AccessMode::WriteOnly));
        assert_eq!(parse_mode(b"wb"), Some(AccessMode::WriteOnly));
        assert_eq!(parse_mode(b"r+"), None);
        assert_eq!(parse_mode(b"a"), None);
        assert_eq!(parse_mode(b""), None);
        assert_eq!(parse_mode(b"rbx"), None);
    }

    #[test]
    fn test_open_flags_create_and_truncate_for_writes() {
        let w = AccessMode::WriteOnly.open_flags();
        assert_eq!(w & libc::O_ACCMODE, libc::O_WRONLY);
        assert_ne!(w & libc::O_CREAT, 0);
        assert_ne!(w & libc::O_TRUNC, 0);
        assert_eq!(AccessMode::ReadOnly.open_flags(), libc::O_RDONLY);
    }

    #[test]
    fn test_read_bytes_hello() {
        let mut f = reader(b"hello world");
        let got: Vec<u8> = (0..5).map(|_| f.read_byte().unwrap().unwrap()).collect();
        assert_eq!(&got, b"hello");
        assert_eq!(f.stats().fills, 1);
        assert_window_ok(&f);
    }

    #[test]
    fn test_read_byte_eof_sentinel() {
        let mut f = reader(b"ab");
        assert_eq!(f.read_byte().unwrap(), Some(b'a'));
        assert_eq!(f.read_byte().unwrap(), Some(b'b'));
        assert_eq!(f.read_byte().unwrap(), None);
        assert_eq!(f.read_byte().unwrap(), None);
    }

    #[test]
    fn test_empty_stream_reads_zero_every_call() {
        let mut f = reader(b"");
        let mut buf = [0u8; 16];
        for _ in 0..3 {
            assert_eq!(f.read(&mut buf).unwrap(), 0);
        }
        assert_eq!(f.read_byte().unwrap(), None);
    }

    #[test]
    fn test_short_read_then_zero() {
        let mut f = reader(b"abc");
        let mut buf = [0u8; 10];
        assert_eq!(f.read(&mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], b"abc");
        assert_eq!(f.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_bulk_read_spans_blocks() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let mut f = reader(&data);
        let mut out = vec![0u8; 10_000];
        assert_eq!(f.read(&mut out).unwrap(), 10_000);
        assert_eq!(out, data);
        assert_eq!(f.stats().fills, 3);
        assert_window_ok(&f);
    }

    #[test]
    fn test_bulk_read_error_with_no_data_is_error() {
        let mut mem = MemStream::with_data(b"abc".to_vec());
        mem.fail_reads(true);
        let mut f = BlockFile::new(mem, AccessMode::ReadOnly);
        let mut buf = [0u8; 4];
        assert_eq!(
            f.read(&mut buf),
            Err(BlockIoError::raw(RawOp::Read, libc::EIO))
        );
        assert_eq!(f.read_byte(), Err(BlockIoError::raw(RawOp::Read, libc::EIO)));
    }

    #[test]
    fn test_bulk_read_error_after_data_is_short_count() {
        let data = vec![9u8; BLOCK_SIZE + 100];
        let mut f = reader(&data);
        let mut first = [0u8; 10];
        assert_eq!(f.read(&mut first).unwrap(), 10);
        f.get_mut().fail_reads(true);
        let mut rest = vec![0u8; BLOCK_SIZE * 2];
        assert_eq!(f.read(&mut rest).unwrap(), BLOCK_SIZE - 10);
    }

    #[test]
    fn test_read_ops_rejected_on_write_handle() {
        let mut f = writer();
        let mut buf = [0u8; 1];
        assert!(matches!(f.read_byte(), Err(BlockIoError::WrongMode { .. })));
        assert!(matches!(f.read(&mut buf), Err(BlockIoError::WrongMode { .. })));
        assert!(matches!(f.fill(), Err(BlockIoError::WrongMode { .. })));
    }

    #[test]
    fn test_write_ops_rejected_on_read_handle() {
        let mut f = reader(b"x");
        assert!(matches!(f.write_byte(b'a'), Err(BlockIoError::WrongMode { .. })));
        assert!(matches!(f.write(b"abc"), Err(BlockIoError::WrongMode { .. })));
        assert_eq!(f.read_byte().unwrap(), Some(b'x'));
    }

    #[test]
    fn test_flush_on_read_handle_is_noop() {
        let mut f = reader(b"abc");
        assert_eq!(f.read_byte().unwrap(), Some(b'a'));
        f.flush().unwrap();
        assert_eq!(f.read_byte().unwrap(), Some(b'b'));
        assert_eq!(f.get_ref().counters().writes, 0);
    }

    #[test]
    fn test_write_5000_bytes_flushes_once_then_on_close() {
        let mut mem = MemStream::new();
        {
            let mut f = BlockFile::new(&mut mem, AccessMode::WriteOnly);
            for _ in 0..5000 {
                f.write_byte(b'A').unwrap();
            }
            assert_eq!(f.stats().flushes, 1);
            assert_eq!(f.stats().bytes_written, BLOCK_SIZE as u64);
            assert_eq!((f.tag(), f.pos(), f.end()), (4096, 5000, 5000));
            f.close().unwrap();
        }
        assert_eq!(mem.data().len(), 5000);
        assert!(mem.data().iter().all(|&b| b == b'A'));
        assert_eq!(mem.counters().writes, 2);
        assert_eq!(mem.counters().closes, 1);
    }

    #[test]
    fn test_writing_exactly_capacity_defers_flush() {
        let mut f = writer();
        assert_eq!(f.write(&[1u8; BLOCK_SIZE]).unwrap(), BLOCK_SIZE);
        assert_eq!(f.stats().flushes, 0);
        f.write_byte(2).unwrap();
        assert_eq!(f.stats().flushes, 1);
        assert_eq!(f.get_ref().data().len(), BLOCK_SIZE);
        assert_window_ok(&f);
    }

    #[test]
    fn test_bulk_write_spans_blocks() {
        let data: Vec<u8> = (0..9000u32).map(|i| (i % 253) as u8).collect();
        let mut mem = MemStream::new();
        {
            let mut f = BlockFile::new(&mut mem, AccessMode::WriteOnly);
            assert_eq!(f.write(&data[..100]).unwrap(), 100);
            assert_eq!(f.write(&data[100..]).unwrap(), 8900);
            assert_eq!(f.stats().flushes, 2);
            f.flush().unwrap();
            assert_eq!(f.stats().flushes, 3);
        }
        assert_eq!(mem.data(), &data[..]);
    }

    #[test]
    fn test_bulk_write_reports_flush_failure_with_no_progress() {
        let mut f = writer();
        f.write(&[0u8; BLOCK_SIZE]).unwrap();
        f.get_mut().fail_writes(true);
        assert_eq!(
            f.write(b"more"),
            Err(BlockIoError::raw(RawOp::Write, libc::EIO))
        );
        // The failed drain still emptied the window.
        assert_eq!(f.tag(), BLOCK_SIZE as u64);
        assert_window_ok(&f);
    }

    #[test]
    fn test_bulk_write_reports_partial_count_on_midstream_flush_failure() {
        let mut f = writer();
        f.write(&[0u8; 100]).unwrap();
        f.get_mut().fail_writes(true);
        let n = f.write(&[1u8; BLOCK_SIZE * 2]).unwrap();
        assert_eq!(n, BLOCK_SIZE - 100);
    }

    #[test]
    fn test_write_byte_propagates_flush_failure() {
        let mut f = writer();
        f.write(&[0u8; BLOCK_SIZE]).unwrap();
        f.get_mut().fail_writes(true);
        assert!(f.write_byte(b'x').is_err());
        f.get_mut().fail_writes(false);
        f.write_byte(b'y').unwrap();
        f.flush().unwrap();
        assert_eq!(f.get_ref().data().len(), 1);
    }

    #[test]
    fn test_flush_survives_short_raw_writes() {
        let mut mem = MemStream::new();
        mem.max_write_chunk(7);
        let mut f = BlockFile::new(mem, AccessMode::WriteOnly);
        f.write(b"the quick brown fox").unwrap();
        f.flush().unwrap();
        assert_eq!(f.get_ref().data(), b"the quick brown fox");
        assert_eq!(f.get_ref().counters().writes, 3);
    }

    #[test]
    fn test_seek_inside_window_issues_no_io() {
        let mut f = reader(b"hello world");
        assert_eq!(f.read_byte().unwrap(), Some(b'h'));
        assert_eq!(f.read_byte().unwrap(), Some(b'e'));
        let before = f.get_ref().counters();
        f.seek(1).unwrap();
        assert_eq!(f.read_byte().unwrap(), Some(b'e'));
        assert_eq!(f.get_ref().counters(), before);
        assert_eq!(f.stats().window_seeks, 1);
        assert_eq!(f.stats().raw_seeks, 0);
    }

    #[test]
    fn test_seek_outside_window_aligns_and_fills() {
        let data: Vec<u8> = (0..3 * BLOCK_SIZE as u32).map(|i| (i % 256) as u8).collect();
        let mut f = reader(&data);
        f.seek(5000).unwrap();
        assert_eq!(f.get_ref().counters().seeks, 1);
        assert_eq!(f.get_ref().counters().reads, 1);
        assert_eq!(f.get_ref().last_seek(), Some(4096));
        assert_eq!((f.tag(), f.pos(), f.end()), (4096, 5000, 8192));
        assert_eq!(f.read_byte().unwrap(), Some(data[5000]));
    }

    #[test]
    fn test_seek_backwards_then_read_across_blocks() {
        let data: Vec<u8> = (0..2 * BLOCK_SIZE as u32).map(|i| (i % 199) as u8).collect();
        let mut f = reader(&data);
        f.seek(BLOCK_SIZE as u64 + 10).unwrap();
        assert_eq!(f.read_byte().unwrap(), Some(data[BLOCK_SIZE + 10]));
        f.seek(BLOCK_SIZE as u64 - 2).unwrap();
        let mut out = [0u8; 4];
        assert_eq!(f.read(&mut out).unwrap(), 4);
        assert_eq!(&out, &data[BLOCK_SIZE - 2..BLOCK_SIZE + 2]);
    }

    #[test]
    fn test_seek_past_end_reads_eof_without_io() {
        let mut f = reader(b"abc");
        f.seek(10).unwrap();
        assert!(f.pos() > f.end());
        let before = f.get_ref().counters();
        let mut buf = [0u8; 8];
        assert_eq!(f.read(&mut buf).unwrap(), 0);
        assert_eq!(f.read(&mut buf).unwrap(), 0);
        assert_eq!(f.read_byte().unwrap(), None);
        assert_eq!(f.get_ref().counters(), before);
        f.seek(1).unwrap();
        assert_eq!(f.read_byte().unwrap(), Some(b'b'));
    }

    #[test]
    fn test_seek_to_exact_length_reads_zero() {
        let mut f = reader(b"abc");
        f.seek(3).unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(f.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_failed_read_seek_leaves_window_untouched() {
        let mut f = reader(b"hello");
        assert_eq!(f.read_byte().unwrap(), Some(b'h'));
        f.get_mut().fail_seeks(true);
        assert_eq!(
            f.seek(9000),
            Err(BlockIoError::raw(RawOp::Seek, libc::EIO))
        );
        assert_eq!((f.tag(), f.pos(), f.end()), (0, 1, 5));
        assert_eq!(f.read_byte().unwrap(), Some(b'e'));
    }

    #[test]
    fn test_bulk_read_loops_over_short_fills() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 241) as u8).collect();
        let mut mem = MemStream::with_data(data.clone());
        mem.max_read_chunk(100);
        let mut f = BlockFile::new(mem, AccessMode::ReadOnly);
        let mut out = vec![0u8; 10_000];
        assert_eq!(f.read(&mut out).unwrap(), 10_000);
        assert_eq!(out, data);
        assert_eq!(f.stats().fills, 100);
        assert_window_ok(&f);
    }

    #[test]
    fn test_seek_tops_up_short_refills_until_target() {
        let data: Vec<u8> = (0..3 * BLOCK_SIZE as u32).map(|i| (i % 256) as u8).collect();
        let mut mem = MemStream::with_data(data.clone());
        mem.max_read_chunk(100);
        let mut f = BlockFile::new(mem, AccessMode::ReadOnly);
        f.seek(5000).unwrap();
        assert_eq!(f.get_ref().counters().reads, 10);
        assert_eq!((f.tag(), f.pos(), f.end()), (4096, 5000, 5096));
        assert_eq!(f.read_byte().unwrap(), Some(data[5000]));
        assert_window_ok(&f);
    }

    #[test]
    fn test_seek_past_short_stream_through_short_refills() {
        let data = vec![5u8; BLOCK_SIZE + 104];
        let mut mem = MemStream::with_data(data);
        mem.max_read_chunk(50);
        let mut f = BlockFile::new(mem, AccessMode::ReadOnly);
        f.seek(5000).unwrap();
        // 50 + 50 + 4 bytes, then end-of-stream.
        assert_eq!(f.get_ref().counters().reads, 4);
        assert_eq!((f.tag(), f.pos(), f.end()), (4096, 5000, 4200));
        let before = f.get_ref().counters();
        let mut buf = [0u8; 8];
        assert_eq!(f.read(&mut buf).unwrap(), 0);
        assert_eq!(f.get_ref().counters(), before);
        f.seek(4199).unwrap();
        assert_eq!(f.read_byte().unwrap(), Some(5));
    }

    #[test]
    fn test_failed_refill_fails_seek_and_reads_recover() {
        let data: Vec<u8> = (0..3 * BLOCK_SIZE as u32).map(|i| (i % 256) as u8).collect();
        let mut f = reader(&data);
        f.get_mut().fail_reads(true);
        assert_eq!(
            f.seek(5000),
            Err(BlockIoError::raw(RawOp::Read, libc::EIO))
        );
        assert!(!f.buf.is_past_end());
        assert_eq!((f.tag(), f.pos(), f.end()), (4096, 4096, 4096));
        let mut buf = [0u8; 4];
        assert_eq!(
            f.read(&mut buf),
            Err(BlockIoError::raw(RawOp::Read, libc::EIO))
        );

        f.get_mut().fail_reads(false);
        assert_eq!(f.read_byte().unwrap(), Some(data[4096]));
        f.seek(5000).unwrap();
        assert_eq!(f.read_byte().unwrap(), Some(data[5000]));
    }

    #[test]
    fn test_seek_beyond_largest_offset_is_rejected() {
        let mut w = writer();
        w.write(b"ab").unwrap();
        assert_eq!(
            w.seek(u64::MAX),
            Err(BlockIoError::OffsetOverflow(u64::MAX))
        );
        w.write_byte(b'c').unwrap();
        assert_eq!((w.tag(), w.pos(), w.end()), (0, 3, 3));

        let mut r = reader(b"xyz");
        assert_eq!(
            r.seek(MAX_OFFSET + 1),
            Err(BlockIoError::OffsetOverflow(MAX_OFFSET + 1))
        );
        assert_eq!(r.read_byte().unwrap(), Some(b'x'));
    }

    #[test]
    fn test_misplaced_seek_is_an_error() {
        let mut f = reader(b"hello");
        f.get_mut().misplace_seeks(true);
        assert_eq!(
            f.seek(4096),
            Err(BlockIoError::SeekMismatch {
                requested: 4096,
                landed: 4097
            })
        );
    }

    #[test]
    fn test_write_seek_flushes_then_repositions() {
        let mut mem = MemStream::new();
        {
            let mut f = BlockFile::new(&mut mem, AccessMode::WriteOnly);
            f.write(b"0123456789").unwrap();
            f.seek(2).unwrap();
            assert_eq!((f.tag(), f.pos(), f.end()), (2, 2, 2));
            f.write(b"ab").unwrap();
            f.seek(20).unwrap();
            f.write_byte(b'z').unwrap();
        }
        assert_eq!(&mem.data()[..10], b"01ab456789");
        assert_eq!(mem.data().len(), 21);
        assert_eq!(mem.data()[20], b'z');
    }

    #[test]
    fn test_write_seek_failure_keeps_drained_window() {
        let mut f = writer();
        f.write(b"abc").unwrap();
        f.get_mut().fail_seeks(true);
        assert!(f.seek(100).is_err());
        assert_eq!((f.tag(), f.pos(), f.end()), (3, 3, 3));
        assert_eq!(f.get_ref().data(), b"abc");
    }

    #[test]
    fn test_close_releases_stream_even_when_flush_fails() {
        let mut mem = MemStream::new();
        mem.fail_writes(true);
        let mut f = BlockFile::new(&mut mem, AccessMode::WriteOnly);
        f.write(b"lost").unwrap();
        assert!(f.close().is_err());
        assert_eq!(mem.counters().closes, 1);
    }

    #[test]
    fn test_drop_flushes_and_closes() {
        let mut mem = MemStream::new();
        {
            let mut f = BlockFile::new(&mut mem, AccessMode::WriteOnly);
            f.write(b"kept").unwrap();
        }
        assert_eq!(mem.data(), b"kept");
        assert_eq!(mem.counters().closes, 1);
    }

    #[test]
    fn test_queries_delegate_to_stream() {
        let f = reader(b"12345");
        assert_eq!(f.size(), Some(5));
        assert_eq!(f.fileno(), MemStream::DEFAULT_FILENO);
        let mut unsized_mem = MemStream::new();
        unsized_mem.unsized_stream(true);
        let g = BlockFile::new(unsized_mem, AccessMode::ReadOnly);
        assert_eq!(g.size(), None);
    }

    #[test]
    fn test_round_trip_through_same_stream() {
        let data: Vec<u8> = (0..12_345u32).map(|i| (i * 7 % 256) as u8).collect();
        let mut mem = MemStream::new();
        {
            let mut w = BlockFile::new(&mut mem, AccessMode::WriteOnly);
            assert_eq!(w.write(&data).unwrap(), data.len());
            w.close().unwrap();
        }
        mem.rewind();
        let mut r = BlockFile::new(&mut mem, AccessMode::ReadOnly);
        let mut out = Vec::new();
        let mut chunk = [0u8; 1000];
        loop {
            let n = r.read(&mut chunk).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&chunk[..n]);
        }
        assert_eq!(out, data);
    }

    #[test]
    fn test_std_io_traits() {
        use std::io::{Read, Write};
        let mut w = writer();
        w.write_all(b"via std").unwrap();
        Write::flush(&mut w).unwrap();
        assert_eq!(w.get_ref().data(), b"via std");

        let mut r = reader(b"via std");
        let mut s = String::new();
        r.read_to_string(&mut s).unwrap();
        assert_eq!(s, "via std");
    }
}
