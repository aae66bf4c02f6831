//! CLI entrypoint for blockio copy drivers and self-checks.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use blockio_core::{AccessMode, BlockFile};
use blockio_harness::drivers::{self, DEFAULT_BLOCK, DEFAULT_STRIDE, DEFAULT_STRIDE_BLOCK};
use blockio_harness::structured_log::{LogEmitter, LogLevel, Outcome};
use blockio_harness::{HarnessError, TransferReport, run_selfcheck};
use clap::{Args, Parser, Subcommand};

/// Single-block buffered I/O drivers.
#[derive(Debug, Parser)]
#[command(name = "blockio")]
#[command(about = "Copy data through single-block buffered handles")]
struct Cli {
    /// Write a JSONL run log to this path (`-` for stderr).
    #[arg(long, global = true)]
    log: Option<PathBuf>,
    /// Run identifier used in log trace ids.
    #[arg(long, global = true, default_value = "local")]
    run_id: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct Endpoints {
    /// Input file (standard input when omitted).
    input: Option<PathBuf>,
    /// Output file (standard output when omitted).
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Copy one byte at a time.
    Cat {
        #[command(flatten)]
        io: Endpoints,
    },
    /// Copy with bulk requests.
    Blockcat {
        #[command(flatten)]
        io: Endpoints,
        /// Request size in bytes.
        #[arg(short = 'b', long = "block", default_value_t = DEFAULT_BLOCK)]
        block: usize,
    },
    /// Copy the input reversed (input must be a regular file).
    Reverse {
        #[command(flatten)]
        io: Endpoints,
    },
    /// Copy in strided pieces with positioned writes (both ends must be seekable).
    Stride {
        #[command(flatten)]
        io: Endpoints,
        /// Piece size in bytes.
        #[arg(short = 'b', long = "block", default_value_t = DEFAULT_STRIDE_BLOCK)]
        block: usize,
        /// Distance between consecutive pieces in bytes.
        #[arg(short = 's', long = "stride", default_value_t = DEFAULT_STRIDE)]
        stride: u64,
    },
    /// Run the built-in cache scenarios against in-memory streams.
    Selfcheck {
        /// Print results as a JSON array instead of PASS/FAIL lines.
        #[arg(long)]
        json: bool,
    },
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Self::Cat { .. } => "cat",
            Self::Blockcat { .. } => "blockcat",
            Self::Reverse { .. } => "reverse",
            Self::Stride { .. } => "stride",
            Self::Selfcheck { .. } => "selfcheck",
        }
    }

    fn endpoints(&self) -> Option<&Endpoints> {
        match self {
            Self::Cat { io } | Self::Reverse { io } => Some(io),
            Self::Blockcat { io, .. } | Self::Stride { io, .. } => Some(io),
            Self::Selfcheck { .. } => None,
        }
    }

    fn block_size(&self) -> Option<u64> {
        match self {
            Self::Blockcat { block, .. } | Self::Stride { block, .. } => Some(*block as u64),
            _ => None,
        }
    }
}

/// What a successful run produced.
enum RunResult {
    Transfer(TransferReport),
    Selfcheck { passed: usize, failed: usize },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let mut log = match &cli.log {
        Some(path) if path.as_os_str() == "-" => Some(LogEmitter::to_stderr(&cli.run_id)),
        Some(path) => match LogEmitter::to_file(path, &cli.run_id) {
            Ok(emitter) => Some(emitter),
            Err(e) => {
                eprintln!("blockio: cannot open log {}: {e}", path.display());
                return ExitCode::FAILURE;
            }
        },
        None => None,
    };

    let command = cli.command.name();
    if let Some(log) = log.as_mut() {
        let mut entry = log.entry(LogLevel::Info, "run_start").with_command(command);
        if let Some(io) = cli.command.endpoints() {
            entry = entry.with_endpoints(label(io.input.as_deref()), label(io.output.as_deref()));
        }
        if let Some(block) = cli.command.block_size() {
            entry = entry.with_block_size(block);
        }
        report_log_error(log.emit_entry(entry));
    }

    let started = Instant::now();
    let result = run(&cli.command);
    let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    let code = match &result {
        Ok(RunResult::Transfer(_)) => ExitCode::SUCCESS,
        Ok(RunResult::Selfcheck { failed, .. }) if *failed == 0 => ExitCode::SUCCESS,
        Ok(RunResult::Selfcheck { .. }) => ExitCode::from(1),
        Err(e) => {
            eprintln!("blockio {command}: {e}");
            ExitCode::FAILURE
        }
    };

    if let Some(log) = log.as_mut() {
        let entry = match &result {
            Ok(RunResult::Transfer(rep)) => log
                .entry(LogLevel::Info, "run_end")
                .with_command(command)
                .with_bytes(rep.bytes)
                .with_outcome(Outcome::Pass)
                .with_duration_ms(duration_ms)
                .with_stats(rep.input, rep.output),
            Ok(RunResult::Selfcheck { passed, failed }) => {
                let outcome = if *failed == 0 {
                    Outcome::Pass
                } else {
                    Outcome::Fail
                };
                log.entry(LogLevel::Info, "run_end")
                    .with_command(command)
                    .with_outcome(outcome)
                    .with_duration_ms(duration_ms)
                    .with_details(serde_json::json!({ "passed": passed, "failed": failed }))
            }
            Err(e) => {
                let mut entry = log
                    .entry(LogLevel::Error, "run_error")
                    .with_command(command)
                    .with_outcome(Outcome::Error)
                    .with_duration_ms(duration_ms)
                    .with_details(serde_json::json!({ "error": e.to_string() }));
                if let Some(errno) = e.errno() {
                    entry = entry.with_errno(errno);
                }
                entry
            }
        };
        report_log_error(log.emit_entry(entry));
        report_log_error(log.flush());
    }

    code
}

fn run(command: &Command) -> Result<RunResult, HarnessError> {
    let rep = match command {
        Command::Cat { io } => {
            let (mut input, mut output) = open_pair(io)?;
            let rep = drivers::cat(&mut input, &mut output)?;
            finish(input, output)?;
            rep
        }
        Command::Blockcat { io, block } => {
            let (mut input, mut output) = open_pair(io)?;
            let rep = drivers::blockcat(&mut input, &mut output, *block)?;
            finish(input, output)?;
            rep
        }
        Command::Reverse { io } => {
            let (mut input, mut output) = open_pair(io)?;
            let rep = drivers::reverse(&mut input, &mut output)?;
            finish(input, output)?;
            rep
        }
        Command::Stride { io, block, stride } => {
            let (mut input, mut output) = open_pair(io)?;
            let rep = drivers::stride(&mut input, &mut output, *block, *stride)?;
            finish(input, output)?;
            rep
        }
        Command::Selfcheck { json } => {
            let results = run_selfcheck();
            let failed = results.iter().filter(|r| !r.passed).count();
            if *json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                for r in &results {
                    match &r.detail {
                        None => println!("PASS {}", r.name),
                        Some(detail) => println!("FAIL {}: {detail}", r.name),
                    }
                }
            }
            return Ok(RunResult::Selfcheck {
                passed: results.len() - failed,
                failed,
            });
        }
    };
    Ok(RunResult::Transfer(rep))
}

type FdFile = BlockFile<blockio_core::Fd>;

fn open_pair(io: &Endpoints) -> Result<(FdFile, FdFile), HarnessError> {
    let input = BlockFile::open_or_std(io.input.as_deref(), AccessMode::ReadOnly)?;
    let output = BlockFile::open_or_std(io.output.as_deref(), AccessMode::WriteOnly)?;
    Ok((input, output))
}

fn finish(input: FdFile, output: FdFile) -> Result<(), HarnessError> {
    let closed_out = output.close();
    input.close()?;
    closed_out?;
    Ok(())
}

fn label(path: Option<&Path>) -> String {
    path.map_or_else(|| "-".to_string(), |p| p.display().to_string())
}

fn report_log_error(result: std::io::Result<()>) {
    if let Err(e) = result {
        eprintln!("blockio: log write failed: {e}");
    }
}
