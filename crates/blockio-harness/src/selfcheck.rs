//! Canned cache-behavior scenarios.
//!
//! Each scenario drives a handle over an instrumented [`MemStream`] and checks
//! both the data returned and the raw traffic the cache generated.

use blockio_core::{AccessMode, BLOCK_SIZE, BlockFile, BlockIoError, MemStream};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScenarioResult {
    pub name: &'static str,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

type Check = fn() -> Result<(), String>;

const SCENARIOS: &[(&str, Check)] = &[
    ("write_5000_bytes", write_5000_bytes),
    ("read_hello", read_hello),
    ("seek_within_window", seek_within_window),
    ("short_bulk_read", short_bulk_read),
    ("seek_past_end", seek_past_end),
    ("exact_block_write", exact_block_write),
    ("seek_outside_window", seek_outside_window),
    ("empty_stream", empty_stream),
    ("round_trip", round_trip),
];

/// Run every scenario and report each outcome.
#[must_use]
pub fn run_selfcheck() -> Vec<ScenarioResult> {
    SCENARIOS
        .iter()
        .map(|&(name, check)| match check() {
            Ok(()) => ScenarioResult {
                name,
                passed: true,
                detail: None,
            },
            Err(detail) => ScenarioResult {
                name,
                passed: false,
                detail: Some(detail),
            },
        })
        .collect()
}

fn ensure(cond: bool, msg: impl FnOnce() -> String) -> Result<(), String> {
    if cond { Ok(()) } else { Err(msg()) }
}

fn block(e: BlockIoError) -> String {
    e.to_string()
}

fn reader(data: &[u8]) -> BlockFile<MemStream> {
    BlockFile::new(MemStream::with_data(data.to_vec()), AccessMode::ReadOnly)
}

fn write_5000_bytes() -> Result<(), String> {
    let mut f = BlockFile::new(MemStream::new(), AccessMode::WriteOnly);
    for i in 0..5000 {
        f.write_byte(b'A').map_err(block)?;
        if i == BLOCK_SIZE - 1 {
            ensure(f.stats().flushes == 0, || "flushed before the block filled".into())?;
        }
    }
    ensure(f.stats().flushes == 1, || {
        format!("expected 1 flush before close, saw {}", f.stats().flushes)
    })?;
    f.flush().map_err(block)?;
    let mem = f.get_ref();
    ensure(mem.counters().writes == 2, || {
        format!("expected 2 raw writes, saw {}", mem.counters().writes)
    })?;
    ensure(mem.data().len() == 5000 && mem.data().iter().all(|&b| b == b'A'), || {
        format!("stream holds {} bytes, expected 5000 'A'", mem.data().len())
    })
}

fn read_hello() -> Result<(), String> {
    let mut f = reader(b"hello world");
    let mut got = Vec::new();
    for _ in 0..5 {
        match f.read_byte().map_err(block)? {
            Some(b) => got.push(b),
            None => return Err("unexpected end of stream".into()),
        }
    }
    ensure(got == b"hello", || format!("read {got:?}"))
}

fn seek_within_window() -> Result<(), String> {
    let mut f = reader(b"hello world");
    f.read_byte().map_err(block)?;
    f.read_byte().map_err(block)?;
    let before = f.get_ref().counters();
    f.seek(1).map_err(block)?;
    let b = f.read_byte().map_err(block)?;
    ensure(b == Some(b'e'), || format!("read {b:?} after seek"))?;
    ensure(f.get_ref().counters() == before, || {
        "seek inside the window issued raw I/O".into()
    })
}

fn short_bulk_read() -> Result<(), String> {
    let mut f = reader(b"abc");
    let mut buf = [0u8; 10];
    let first = f.read(&mut buf).map_err(block)?;
    ensure(first == 3, || format!("first read returned {first}"))?;
    let second = f.read(&mut buf).map_err(block)?;
    ensure(second == 0, || format!("second read returned {second}"))
}

fn seek_past_end() -> Result<(), String> {
    for target in [3u64, 10, BLOCK_SIZE as u64 * 3] {
        let mut f = reader(b"abc");
        f.seek(target).map_err(block)?;
        let reads_after_seek = f.get_ref().counters().reads;
        let mut buf = [0u8; 8];
        let n = f.read(&mut buf).map_err(block)?;
        ensure(n == 0, || format!("read {n} bytes after seeking to {target}"))?;
        ensure(f.get_ref().counters().reads <= reads_after_seek + 1, || {
            format!("repeated raw reads after seeking to {target}")
        })?;
    }
    Ok(())
}

fn exact_block_write() -> Result<(), String> {
    let mut f = BlockFile::new(MemStream::new(), AccessMode::WriteOnly);
    let data = vec![b'z'; BLOCK_SIZE];
    let n = f.write(&data).map_err(block)?;
    ensure(n == BLOCK_SIZE, || format!("write accepted {n}"))?;
    ensure(f.stats().flushes == 0, || "flushed a block that merely filled".into())?;
    f.write_byte(b'!').map_err(block)?;
    ensure(f.stats().flushes == 1, || {
        format!("expected exactly 1 flush, saw {}", f.stats().flushes)
    })
}

fn seek_outside_window() -> Result<(), String> {
    let data: Vec<u8> = (0..3 * BLOCK_SIZE).map(|i| (i % 199) as u8).collect();
    let mut f = reader(&data);
    f.read_byte().map_err(block)?;
    let before = f.get_ref().counters();
    let target = BLOCK_SIZE as u64 * 2 + 17;
    f.seek(target).map_err(block)?;
    let after = f.get_ref().counters();
    ensure(after.seeks == before.seeks + 1, || "expected one raw seek".into())?;
    ensure(after.reads == before.reads + 1, || "expected one fill".into())?;
    let landed = f.get_ref().last_seek();
    ensure(landed == Some(BLOCK_SIZE as u64 * 2), || {
        format!("raw seek went to {landed:?}, not the aligned block")
    })?;
    let b = f.read_byte().map_err(block)?;
    ensure(b == Some(data[target as usize]), || format!("read {b:?}"))
}

fn empty_stream() -> Result<(), String> {
    let mut f = reader(b"");
    let mut buf = [0u8; 16];
    for call in 0..3 {
        let n = f.read(&mut buf).map_err(block)?;
        ensure(n == 0, || format!("call {call} returned {n}"))?;
    }
    Ok(())
}

fn round_trip() -> Result<(), String> {
    let data: Vec<u8> = (0..20_000u32).map(|i| (i * 13 % 256) as u8).collect();
    let mut w = BlockFile::new(MemStream::new(), AccessMode::WriteOnly);
    let n = w.write(&data).map_err(block)?;
    ensure(n == data.len(), || format!("write accepted {n}"))?;
    w.flush().map_err(block)?;
    let mut mem = w.get_ref().clone();
    mem.rewind();
    let mut r = BlockFile::new(mem, AccessMode::ReadOnly);
    let mut back = vec![0u8; data.len() + 1];
    let mut got = 0;
    loop {
        let n = r.read(&mut back[got..]).map_err(block)?;
        if n == 0 {
            break;
        }
        got += n;
    }
    ensure(got == data.len() && back[..got] == data[..], || {
        format!("read back {got} bytes that differ from the {} written", data.len())
    })
}
