//! Error taxonomy for handle operations.
//!
//! End-of-stream is not an error: it surfaces as `Ok(None)` from
//! `read_byte` and `Ok(0)` from `read`. Everything here is a genuine failure.

use thiserror::Error;

use crate::stdio::AccessMode;

/// Raw stream call that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawOp {
    Open,
    Read,
    Write,
    Seek,
    Close,
}

impl RawOp {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Read => "read",
            Self::Write => "write",
            Self::Seek => "seek",
            Self::Close => "close",
        }
    }
}

impl std::fmt::Display for RawOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlockIoError {
    #[error("raw {op} failed (errno {errno})")]
    Raw { op: RawOp, errno: i32 },
    #[error("raw write accepted zero bytes")]
    WriteZero,
    #[error("raw seek to {requested} landed at {landed}")]
    SeekMismatch { requested: u64, landed: u64 },
    #[error("{op} is not permitted on a {mode:?} handle")]
    WrongMode { op: &'static str, mode: AccessMode },
    #[error("access mode flags {0:#o} are neither read-only nor write-only")]
    InvalidMode(i32),
    #[error("offset {0} is beyond the largest seekable offset")]
    OffsetOverflow(u64),
    #[error("cache invariant violated: tag={tag} pos={pos} end={end}")]
    Invariant { tag: u64, pos: u64, end: u64 },
}

impl BlockIoError {
    /// Build a raw-call error from an errno value.
    #[must_use]
    pub const fn raw(op: RawOp, errno: i32) -> Self {
        Self::Raw { op, errno }
    }

    /// errno value reported across the C boundary.
    #[must_use]
    pub fn errno(&self) -> i32 {
        match self {
            Self::Raw { errno, .. } if *errno > 0 => *errno,
            Self::WrongMode { .. } => libc::EBADF,
            Self::InvalidMode(_) | Self::OffsetOverflow(_) => libc::EINVAL,
            Self::SeekMismatch { .. } => libc::ESPIPE,
            Self::Raw { .. } | Self::WriteZero | Self::Invariant { .. } => libc::EIO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_mapping() {
        assert_eq!(BlockIoError::raw(RawOp::Read, libc::ENOSPC).errno(), libc::ENOSPC);
        assert_eq!(BlockIoError::raw(RawOp::Read, 0).errno(), libc::EIO);
        assert_eq!(
            BlockIoError::WrongMode {
                op: "write",
                mode: AccessMode::ReadOnly
            }
            .errno(),
            libc::EBADF
        );
        assert_eq!(BlockIoError::InvalidMode(2).errno(), libc::EINVAL);
        assert_eq!(BlockIoError::WriteZero.errno(), libc::EIO);
        assert_eq!(BlockIoError::OffsetOverflow(u64::MAX).errno(), libc::EINVAL);
    }

    #[test]
    fn display_names_the_raw_call() {
        let err = BlockIoError::raw(RawOp::Seek, libc::ESPIPE);
        assert_eq!(err.to_string(), format!("raw seek failed (errno {})", libc::ESPIPE));
    }
}
