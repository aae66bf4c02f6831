//! Tooling around blockio buffered handles.
//!
//! This crate provides:
//! - Copy drivers: byte, bulk, reversed, and strided transfers between handles
//! - Self-check: canned cache-behavior scenarios run against in-memory streams
//! - Structured logging: JSONL run records for the `blockio` CLI

#![forbid(unsafe_code)]

pub mod drivers;
pub mod error;
pub mod selfcheck;
pub mod structured_log;

pub use drivers::{StatsSnapshot, TransferReport};
pub use error::HarnessError;
pub use selfcheck::{ScenarioResult, run_selfcheck};
