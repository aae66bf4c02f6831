//! # blockio-core
//!
//! Single-block buffered I/O over raw, unbuffered byte streams.
//!
//! A [`BlockFile`] owns a raw stream (a file descriptor, or anything else
//! implementing [`RawStream`]) and a fixed 4096-byte cache. Byte-at-a-time and
//! bulk reads/writes go through the cache; `seek` respects what the cache
//! already holds. No `unsafe` code is permitted outside the descriptor
//! backend in [`sys`].

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod stdio;
pub mod sys;

pub use error::{BlockIoError, RawOp};
pub use stdio::{AccessMode, BLOCK_SIZE, BlockFile, CacheStats, MemStream, RawStream};
pub use sys::Fd;
