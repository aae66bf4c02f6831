//! Buffered stream operations.
//!
//! Implements the single-block cache: buffer bookkeeping, Fill/Flush,
//! byte and bulk transfers, and cache-aware seeking.

pub mod buffer;
pub mod file;
pub mod mem;
pub mod raw;

pub use buffer::{BLOCK_SIZE, BlockBuffer};
pub use file::{AccessMode, BlockFile, CacheStats, parse_mode};
pub use mem::{MemStream, RawCounters};
pub use raw::RawStream;
