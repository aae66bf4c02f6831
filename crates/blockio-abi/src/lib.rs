// All extern "C" entry points accept raw pointers from C callers; null
// handles are rejected at runtime, so per-function safety docs would be
// redundant boilerplate.
#![allow(clippy::missing_safety_doc)]
//! # blockio-abi
//!
//! `extern "C"` boundary for blockio handles.
//!
//! ```text
//! C caller -> ABI entry (this crate) -> BlockFile (blockio-core) -> fd
//! ```
//!
//! Results follow the classic C conventions: `-1` (with `errno` set) for
//! failure, `0` for success or a clean end-of-stream, byte counts for bulk
//! transfers. Handles are heap-allocated `BlockFile<Fd>` values handed out as
//! opaque pointers; there is no global registry.

pub mod file_abi;

pub use file_abi::BlockioFile;
