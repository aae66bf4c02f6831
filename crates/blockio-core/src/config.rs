//! Runtime check configuration.
//!
//! The check level is set via the `BLOCKIO_CHECKS` environment variable:
//! - `strict` (default): every public handle operation re-validates the cache
//!   invariants on entry and exit and reports a violation as
//!   [`BlockIoError::Invariant`](crate::BlockIoError::Invariant).
//! - `off`: no validation. Pure passthrough for benchmarking.

use std::sync::atomic::{AtomicU8, Ordering};

/// Invariant validation level for handle operations.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckLevel {
    /// Validate `tag <= pos <= end` and the capacity bound around every operation.
    #[default]
    Strict,
    /// Skip validation.
    Off,
}

impl CheckLevel {
    /// Parse from string (case-insensitive). Unknown values fall back to `Strict`.
    #[must_use]
    pub fn from_str_loose(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" | "none" | "disabled" | "0" => Self::Off,
            _ => Self::Strict,
        }
    }

    /// Returns true if invariants should be validated.
    #[must_use]
    pub const fn enabled(self) -> bool {
        matches!(self, Self::Strict)
    }
}

// 0=unresolved, 1=Strict, 2=Off.
static CACHED_LEVEL: AtomicU8 = AtomicU8::new(LEVEL_UNRESOLVED);

const LEVEL_UNRESOLVED: u8 = 0;
const LEVEL_STRICT: u8 = 1;
const LEVEL_OFF: u8 = 2;

fn level_to_u8(level: CheckLevel) -> u8 {
    match level {
        CheckLevel::Strict => LEVEL_STRICT,
        CheckLevel::Off => LEVEL_OFF,
    }
}

fn u8_to_level(v: u8) -> CheckLevel {
    match v {
        LEVEL_OFF => CheckLevel::Off,
        _ => CheckLevel::Strict,
    }
}

/// Get the configured check level (reads the env var on first call, caches thereafter).
#[must_use]
pub fn check_level() -> CheckLevel {
    let cached = CACHED_LEVEL.load(Ordering::Relaxed);
    if cached != LEVEL_UNRESOLVED {
        return u8_to_level(cached);
    }

    let level = std::env::var("BLOCKIO_CHECKS")
        .map(|v| CheckLevel::from_str_loose(&v))
        .unwrap_or_default();
    // A concurrent resolver may have won; both read the same env var.
    let _ = CACHED_LEVEL.compare_exchange(
        LEVEL_UNRESOLVED,
        level_to_u8(level),
        Ordering::AcqRel,
        Ordering::Relaxed,
    );
    u8_to_level(CACHED_LEVEL.load(Ordering::Acquire))
}

/// Override the cached check level (benchmarks, tests).
pub fn set_check_level(level: CheckLevel) {
    CACHED_LEVEL.store(level_to_u8(level), Ordering::Release);
}
