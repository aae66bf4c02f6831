//! Block cache bookkeeping.
//!
//! The cache is one fixed block of memory plus three absolute stream offsets
//! ("tags") describing what it currently mirrors:
//!
//! ```text
//!   tag                pos                 end
//!    |------------------|-------------------|
//!    buffer[0]          next byte           one past last valid byte
//! ```
//!
//! Read handles consume `[pos, end)` and refill when it is empty. Write
//! handles accumulate `[tag, pos)` with `pos == end` and drain it on flush.
//!
//! Invariants:
//! - `tag <= pos <= end` (read handles may sit at `pos > end` after seeking
//!   past end-of-stream; see [`BlockBuffer::is_past_end`])
//! - `end - tag <= BLOCK_SIZE`
//! - write handles: `pos == end`
//!
//! Nothing in this module performs I/O.

use super::file::AccessMode;
use crate::error::BlockIoError;

/// Cache block size in bytes.
pub const BLOCK_SIZE: usize = 4096;

const BLOCK: u64 = BLOCK_SIZE as u64;

/// Fixed-capacity cache window over a stream.
pub struct BlockBuffer {
    data: Box<[u8; BLOCK_SIZE]>,
    /// Stream offset of `data[0]`.
    tag: u64,
    /// Stream offset of the next byte to consume (read) or produce (write).
    pos: u64,
    /// Stream offset one past the last valid byte.
    end: u64,
}

impl BlockBuffer {
    /// Empty window at stream offset 0.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: Box::new([0u8; BLOCK_SIZE]),
            tag: 0,
            pos: 0,
            end: 0,
        }
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        BLOCK_SIZE
    }

    #[must_use]
    pub const fn tag(&self) -> u64 {
        self.tag
    }

    #[must_use]
    pub const fn pos(&self) -> u64 {
        self.pos
    }

    #[must_use]
    pub const fn end(&self) -> u64 {
        self.end
    }

    /// Offset of `off` rounded down to a block boundary.
    #[must_use]
    pub const fn aligned(off: u64) -> u64 {
        (off / BLOCK) * BLOCK
    }

    /// Bytes of the stream currently mirrored (`end - tag`).
    #[must_use]
    pub fn used(&self) -> usize {
        (self.end - self.tag) as usize
    }

    /// Bytes left to consume in the window.
    #[must_use]
    pub fn available(&self) -> usize {
        self.end.saturating_sub(self.pos) as usize
    }

    /// True when the window mirrors a full block.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.used() == BLOCK_SIZE
    }

    /// True when no buffered byte remains at or after `pos`.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.pos >= self.end
    }

    /// True when a read seek left `pos` beyond the data the stream produced.
    ///
    /// Reads in this state report end-of-stream without touching the stream
    /// until the next seek repositions the handle.
    #[must_use]
    pub fn is_past_end(&self) -> bool {
        self.pos > self.end
    }

    /// True when `off` is inside `[tag, end)`.
    #[must_use]
    pub fn contains(&self, off: u64) -> bool {
        self.tag <= off && off < self.end
    }

    /// Unflushed write data, `[tag, pos)`.
    #[must_use]
    pub fn pending(&self) -> &[u8] {
        &self.data[..(self.pos - self.tag) as usize]
    }

    /// Place an empty window at `off`.
    pub fn reset_to(&mut self, off: u64) {
        self.tag = off;
        self.pos = off;
        self.end = off;
    }

    /// Drop everything buffered and place an empty window at `end`.
    pub fn collapse_to_end(&mut self) {
        self.tag = self.end;
        self.pos = self.end;
    }

    /// Whole block, for a raw read into a freshly collapsed window.
    pub fn fill_target(&mut self) -> &mut [u8] {
        &mut self.data[..]
    }

    /// Unused tail of the block, for topping up a partially filled window.
    pub fn fill_tail(&mut self) -> &mut [u8] {
        let used = self.used();
        &mut self.data[used..]
    }

    /// Record that a raw read delivered `n` bytes into the window.
    pub fn commit_fill(&mut self, n: usize) {
        debug_assert!(self.used() + n <= BLOCK_SIZE);
        self.end += n as u64;
    }

    /// Mark the pending write region as drained: `tag = pos`.
    pub fn mark_drained(&mut self) {
        self.tag = self.pos;
    }

    /// Move the cursor without touching the window bounds.
    pub fn set_pos(&mut self, off: u64) {
        self.pos = off;
    }

    /// Consume one buffered byte.
    pub fn take_byte(&mut self) -> Option<u8> {
        if self.is_exhausted() {
            return None;
        }
        let b = self.data[(self.pos - self.tag) as usize];
        self.pos += 1;
        Some(b)
    }

    /// Copy buffered bytes into `dst`. Returns the number copied.
    pub fn copy_out(&mut self, dst: &mut [u8]) -> usize {
        let n = dst.len().min(self.available());
        if n == 0 {
            return 0;
        }
        let start = (self.pos - self.tag) as usize;
        dst[..n].copy_from_slice(&self.data[start..start + n]);
        self.pos += n as u64;
        n
    }

    /// Append one byte to the write window. Returns false when the block is full.
    pub fn push_byte(&mut self, byte: u8) -> bool {
        if self.is_full() {
            return false;
        }
        self.data[(self.pos - self.tag) as usize] = byte;
        self.pos += 1;
        self.end = self.pos;
        true
    }

    /// Append as much of `src` as fits in the block. Returns the number copied.
    pub fn copy_in(&mut self, src: &[u8]) -> usize {
        let start = (self.pos - self.tag) as usize;
        let n = src.len().min(BLOCK_SIZE - start);
        self.data[start..start + n].copy_from_slice(&src[..n]);
        self.pos += n as u64;
        self.end = self.pos;
        n
    }

    /// Validate the window invariants for a handle in `mode`.
    pub fn check(&self, mode: AccessMode) -> Result<(), BlockIoError> {
        let bounds_ok = self.tag <= self.pos
            && self.tag <= self.end
            && self.end - self.tag <= BLOCK
            && self.pos - self.tag <= BLOCK;
        let cursor_ok = bounds_ok
            && match mode {
                AccessMode::ReadOnly => self.pos <= self.end || self.pos - self.tag < BLOCK,
                AccessMode::WriteOnly => self.pos == self.end,
            };
        if cursor_ok {
            Ok(())
        } else {
            Err(BlockIoError::Invariant {
                tag: self.tag,
                pos: self.pos,
                end: self.end,
            })
        }
    }
}

impl Default for BlockBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BlockBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockBuffer")
            .field("tag", &self.tag)
            .field("pos", &self.pos)
            .field("end", &self.end)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
