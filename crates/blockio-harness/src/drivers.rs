//! Copy drivers.
//!
//! Each driver moves every byte of an input handle to an output handle using
//! one access pattern, then reports how much moved and what raw traffic the
//! two caches generated. Drivers never close the handles they are given.

use blockio_core::{BLOCK_SIZE, BlockFile, CacheStats, RawStream};
use serde::Serialize;

use crate::error::HarnessError;

/// Default request size for `blockcat`.
pub const DEFAULT_BLOCK: usize = BLOCK_SIZE;
/// Default request size for `stride`.
pub const DEFAULT_STRIDE_BLOCK: usize = 1;
/// Default distance between consecutive `stride` requests.
pub const DEFAULT_STRIDE: u64 = 1024;

/// Serializable copy of [`CacheStats`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub fills: u64,
    pub flushes: u64,
    pub raw_seeks: u64,
    pub window_seeks: u64,
    pub bytes_read: u64,
    pub bytes_written: u64,
}

impl From<CacheStats> for StatsSnapshot {
    fn from(s: CacheStats) -> Self {
        Self {
            fills: s.fills,
            flushes: s.flushes,
            raw_seeks: s.raw_seeks,
            window_seeks: s.window_seeks,
            bytes_read: s.bytes_read,
            bytes_written: s.bytes_written,
        }
    }
}

/// Result of one driver run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransferReport {
    pub bytes: u64,
    pub input: StatsSnapshot,
    pub output: StatsSnapshot,
}

impl TransferReport {
    fn capture<R: RawStream, W: RawStream>(
        bytes: u64,
        input: &BlockFile<R>,
        output: &BlockFile<W>,
    ) -> Self {
        Self {
            bytes,
            input: input.stats().into(),
            output: output.stats().into(),
        }
    }
}

/// Copy one byte at a time.
pub fn cat<R: RawStream, W: RawStream>(
    input: &mut BlockFile<R>,
    output: &mut BlockFile<W>,
) -> Result<TransferReport, HarnessError> {
    let mut bytes = 0u64;
    while let Some(b) = input.read_byte()? {
        output.write_byte(b)?;
        bytes += 1;
    }
    output.flush()?;
    Ok(TransferReport::capture(bytes, input, output))
}

/// Copy with bulk requests of `block` bytes.
pub fn blockcat<R: RawStream, W: RawStream>(
    input: &mut BlockFile<R>,
    output: &mut BlockFile<W>,
    block: usize,
) -> Result<TransferReport, HarnessError> {
    if block == 0 {
        return Err(HarnessError::InvalidArgument(
            "block size must be positive".into(),
        ));
    }
    let mut buf = vec![0u8; block];
    let mut bytes = 0u64;
    loop {
        let n = input.read(&mut buf)?;
        if n == 0 {
            break;
        }
        write_exact(output, &buf[..n])?;
        bytes += n as u64;
    }
    output.flush()?;
    Ok(TransferReport::capture(bytes, input, output))
}

/// Copy the input reversed, seeking backward one byte per step.
pub fn reverse<R: RawStream, W: RawStream>(
    input: &mut BlockFile<R>,
    output: &mut BlockFile<W>,
) -> Result<TransferReport, HarnessError> {
    let size = input
        .size()
        .ok_or(HarnessError::Unsized { command: "reverse" })?;
    let mut bytes = 0u64;
    for off in (0..size).rev() {
        input.seek(off)?;
        // The file may have shrunk since `size` was taken.
        let Some(b) = input.read_byte()? else {
            continue;
        };
        output.write_byte(b)?;
        bytes += 1;
    }
    output.flush()?;
    Ok(TransferReport::capture(bytes, input, output))
}

/// Copy `block`-byte pieces taken `stride` bytes apart, wrapping through the
/// file until every byte has been visited once. Each piece is written at its
/// own offset, so the output is a faithful copy assembled out of order.
pub fn stride<R: RawStream, W: RawStream>(
    input: &mut BlockFile<R>,
    output: &mut BlockFile<W>,
    block: usize,
    stride: u64,
) -> Result<TransferReport, HarnessError> {
    if block == 0 || stride == 0 {
        return Err(HarnessError::InvalidArgument(
            "block and stride must be positive".into(),
        ));
    }
    let size = input
        .size()
        .ok_or(HarnessError::Unsized { command: "stride" })?;
    let piece = (block as u64).min(stride);
    let mut buf = vec![0u8; piece as usize];
    let mut bytes = 0u64;

    let mut lane = 0u64;
    while lane < stride && lane < size {
        let width = piece.min(stride - lane);
        let mut off = lane;
        while off < size {
            let want = width.min(size - off) as usize;
            input.seek(off)?;
            let n = input.read(&mut buf[..want])?;
            if n > 0 {
                output.seek(off)?;
                write_exact(output, &buf[..n])?;
                bytes += n as u64;
            }
            off += stride;
        }
        lane += width;
    }
    output.flush()?;
    Ok(TransferReport::capture(bytes, input, output))
}

fn write_exact<W: RawStream>(output: &mut BlockFile<W>, data: &[u8]) -> Result<(), HarnessError> {
    let written = output.write(data)?;
    if written < data.len() {
        return Err(HarnessError::ShortWrite {
            wanted: data.len(),
            written,
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
