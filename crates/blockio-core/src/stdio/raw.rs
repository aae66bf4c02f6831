//! Raw stream contract.
//!
//! The cache sits on top of an unbuffered byte stream that supports read,
//! write, absolute seek, and close. Failures are reported as raw errno
//! values, matching what the underlying system call returned.

/// Unbuffered byte stream consumed by [`BlockFile`](super::BlockFile).
pub trait RawStream {
    /// Read up to `buf.len()` bytes at the current raw offset. `Ok(0)` is end-of-stream.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, i32>;

    /// Write up to `buf.len()` bytes at the current raw offset.
    fn write(&mut self, buf: &[u8]) -> Result<usize, i32>;

    /// Reposition to an absolute offset. Returns the offset actually reached.
    fn seek(&mut self, offset: u64) -> Result<u64, i32>;

    /// Release the stream.
    fn close(&mut self) -> Result<(), i32>;

    /// Numeric identity of the stream (a file descriptor for [`Fd`](crate::Fd)).
    fn fileno(&self) -> i32;

    /// Size in bytes when the stream is a fixed-size regular file.
    fn size(&self) -> Option<u64>;
}

impl<T: RawStream + ?Sized> RawStream for &mut T {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, i32> {
        (**self).read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, i32> {
        (**self).write(buf)
    }

    fn seek(&mut self, offset: u64) -> Result<u64, i32> {
        (**self).seek(offset)
    }

    fn close(&mut self) -> Result<(), i32> {
        (**self).close()
    }

    fn fileno(&self) -> i32 {
        (**self).fileno()
    }

    fn size(&self) -> Option<u64> {
        (**self).size()
    }
}
