//! In-memory raw stream.
//!
//! `MemStream` behaves like a regular file held in a `Vec<u8>`: reads and
//! writes happen at a cursor, writes past the end zero-fill the gap, and seeks
//! may land anywhere. Every raw call is counted, and failures can be injected
//! per call kind, so cache behavior can be observed without a kernel.

use super::raw::RawStream;

/// Raw calls observed by a [`MemStream`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RawCounters {
    pub reads: u64,
    pub writes: u64,
    pub seeks: u64,
    pub closes: u64,
}

#[derive(Debug, Default, Clone, Copy)]
struct Faults {
    reads: bool,
    writes: bool,
    seeks: bool,
    misplace_seeks: bool,
    max_read_chunk: Option<usize>,
    max_write_chunk: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct MemStream {
    data: Vec<u8>,
    cursor: u64,
    counters: RawCounters,
    faults: Faults,
    last_seek: Option<u64>,
    fileno: i32,
    sized: bool,
    closed: bool,
}

impl MemStream {
    /// Identity reported by `fileno` unless overridden.
    pub const DEFAULT_FILENO: i32 = 3;

    #[must_use]
    pub fn new() -> Self {
        Self::with_data(Vec::new())
    }

    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            data,
            cursor: 0,
            counters: RawCounters::default(),
            faults: Faults::default(),
            last_seek: None,
            fileno: Self::DEFAULT_FILENO,
            sized: true,
            closed: false,
        }
    }

    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[must_use]
    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }

    #[must_use]
    pub fn counters(&self) -> RawCounters {
        self.counters
    }

    /// Target of the most recent seek call.
    #[must_use]
    pub fn last_seek(&self) -> Option<u64> {
        self.last_seek
    }

    #[must_use]
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Move the cursor back to 0 and reopen, without counting a seek.
    pub fn rewind(&mut self) {
        self.cursor = 0;
        self.closed = false;
    }

    pub fn set_fileno(&mut self, fileno: i32) {
        self.fileno = fileno;
    }

    /// Report no size, like a pipe or terminal.
    pub fn unsized_stream(&mut self, on: bool) {
        self.sized = !on;
    }

    /// Fail every read with `EIO`.
    pub fn fail_reads(&mut self, on: bool) {
        self.faults.reads = on;
    }

    /// Fail every write with `EIO`.
    pub fn fail_writes(&mut self, on: bool) {
        self.faults.writes = on;
    }

    /// Fail every seek with `EIO`.
    pub fn fail_seeks(&mut self, on: bool) {
        self.faults.seeks = on;
    }

    /// Make seeks land one byte past the requested offset.
    pub fn misplace_seeks(&mut self, on: bool) {
        self.faults.misplace_seeks = on;
    }

    /// Deliver at most `n` bytes per read.
    pub fn max_read_chunk(&mut self, n: usize) {
        self.faults.max_read_chunk = Some(n.max(1));
    }

    /// Accept at most `n` bytes per write.
    pub fn max_write_chunk(&mut self, n: usize) {
        self.faults.max_write_chunk = Some(n.max(1));
    }

    fn check_open(&self) -> Result<(), i32> {
        if self.closed { Err(libc::EBADF) } else { Ok(()) }
    }
}

impl Default for MemStream {
    fn default() -> Self {
        Self::new()
    }
}

impl RawStream for MemStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, i32> {
        self.counters.reads += 1;
        self.check_open()?;
        if self.faults.reads {
            return Err(libc::EIO);
        }
        let start = usize::try_from(self.cursor).map_err(|_| libc::EOVERFLOW)?;
        if start >= self.data.len() {
            return Ok(0);
        }
        let limit = self.faults.max_read_chunk.unwrap_or(usize::MAX);
        let n = buf.len().min(self.data.len() - start).min(limit);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        self.cursor += n as u64;
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, i32> {
        self.counters.writes += 1;
        self.check_open()?;
        if self.faults.writes {
            return Err(libc::EIO);
        }
        let start = usize::try_from(self.cursor).map_err(|_| libc::EFBIG)?;
        let limit = self.faults.max_write_chunk.unwrap_or(usize::MAX);
        let n = buf.len().min(limit);
        let stop = start.checked_add(n).ok_or(libc::EFBIG)?;
        if self.data.len() < stop {
            self.data.resize(stop, 0);
        }
        self.data[start..stop].copy_from_slice(&buf[..n]);
        self.cursor += n as u64;
        Ok(n)
    }

    fn seek(&mut self, offset: u64) -> Result<u64, i32> {
        self.counters.seeks += 1;
        self.last_seek = Some(offset);
        self.check_open()?;
        if self.faults.seeks {
            return Err(libc::EIO);
        }
        if i64::try_from(offset).is_err() {
            return Err(libc::EINVAL);
        }
        self.cursor = if self.faults.misplace_seeks {
            offset + 1
        } else {
            offset
        };
        Ok(self.cursor)
    }

    fn close(&mut self) -> Result<(), i32> {
        self.counters.closes += 1;
        self.check_open()?;
        self.closed = true;
        Ok(())
    }

    fn fileno(&self) -> i32 {
        self.fileno
    }

    fn size(&self) -> Option<u64> {
        self.sized.then_some(self.data.len() as u64)
    }
}
