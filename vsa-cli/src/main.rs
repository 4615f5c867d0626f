//! The analysis driver binary: loads a persisted program, optionally runs
//! the abstract interpreter to fixpoint, and writes out a serialized
//! warning bundle.

mod error;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use vsa_core::{AnalysisOutcome, ContextMode, InterpConfig};
use vsa_ir::program::Prog;
use vsa_storage::{WarningKind as StorageWarningKind, WarningSink};

use crate::error::CliError;

/// `vsa --cfg <file> [--interpret] [--intraproc] [--function <hex>]
/// [--dlev <0-4>] [--alev <0-4>] [--warns <file>] [--timeout <secs>]`.
/// No environment variables are read; every knob is a flag.
#[derive(Debug, Parser)]
#[command(name = "vsa", author, version, about = "Static value-set analyzer for 32-bit x86 binaries")]
struct Cli {
    /// Path to a persisted program produced by the loader/CFG-builder pipeline.
    #[arg(long)]
    cfg: PathBuf,

    /// Run the abstract interpreter to fixpoint; otherwise only dump the CFG.
    #[arg(long)]
    interpret: bool,

    /// Disable interprocedural call handling; calls become opaque no-ops.
    #[arg(long)]
    intraproc: bool,

    /// Start analysis at this function address (hex, with or without `0x`).
    /// Defaults to the persisted program's call graph's `main_entry`.
    #[arg(long, value_name = "HEX")]
    function: Option<String>,

    /// Debug log verbosity, 0 (quietest) through 4 (loudest).
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=4))]
    dlev: u8,

    /// Assertion/precision-loss log verbosity, 0 through 4.
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=4))]
    alev: u8,

    /// Write the accumulated warnings to this file.
    #[arg(long, value_name = "FILE")]
    warns: Option<PathBuf>,

    /// Abort the process if analysis hasn't finished after this many seconds.
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,
}

fn parse_function_address(s: &str) -> Result<u32, CliError> {
    let trimmed = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
    u32::from_str_radix(trimmed, 16).map_err(|_| CliError::BadFunctionAddress(s.to_string()))
}

/// Maps `--dlev`/`--alev` onto a `tracing` level: the louder of the two
/// flags wins, so either knob can raise verbosity.
fn tracing_filter(dlev: u8, alev: u8) -> &'static str {
    match dlev.max(alev) {
        0 => "warn",
        1 => "info",
        2 => "debug",
        3 => "vsa_core=trace,info",
        _ => "trace",
    }
}

fn init_tracing(dlev: u8, alev: u8) {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(tracing_filter(dlev, alev)))
        .with_target(false)
        .init();
}

fn run(cli: &Cli) -> Result<(), CliError> {
    let bytes = std::fs::read(&cli.cfg).map_err(|source| CliError::ReadInput { path: cli.cfg.display().to_string(), source })?;
    let prog: Prog = vsa_storage::decode(&bytes)?;
    tracing::info!(functions = prog.functions.len(), modules = prog.modules.len(), "loaded persisted program");

    let entry = match &cli.function {
        Some(hex) => parse_function_address(hex)?,
        None => prog.call_graph.main_entry,
    };

    if !cli.interpret {
        dump_cfg(&prog, entry);
        return Ok(());
    }

    let config = InterpConfig {
        mode: ContextMode::Insensitive,
        interprocedural: !cli.intraproc,
    };

    let outcome = match cli.timeout {
        Some(secs) => run_with_timeout(prog, entry, config, secs)?,
        None => vsa_core::analyze(&prog, entry, config)?,
    };

    tracing::info!(
        regions = outcome.final_state.regions().count(),
        warnings = outcome.warnings.len(),
        "analysis finished"
    );

    if let Some(path) = &cli.warns {
        write_warnings(&outcome, path)?;
    }

    Ok(())
}

/// Runs `analyze` on a worker thread and aborts the whole process if it
/// hasn't reported back within `secs`.
fn run_with_timeout(prog: Prog, entry: u32, config: InterpConfig, secs: u64) -> Result<AnalysisOutcome, CliError> {
    let prog = Arc::new(prog);
    let worker_prog = Arc::clone(&prog);
    let (tx, rx) = mpsc::channel();

    std::thread::spawn(move || {
        let outcome = vsa_core::analyze(&worker_prog, entry, config);
        let _ = tx.send(outcome);
    });

    match rx.recv_timeout(Duration::from_secs(secs)) {
        Ok(outcome) => Ok(outcome?),
        Err(mpsc::RecvTimeoutError::Timeout) => {
            tracing::error!(address = entry, timeout_secs = secs, "analysis timed out, aborting");
            std::process::abort();
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            // The worker thread panicked without sending; treat like a timeout
            // of zero duration rather than hang forever.
            Err(CliError::Timeout(entry, secs))
        }
    }
}

fn dump_cfg(prog: &Prog, entry: u32) {
    match prog.function_at(entry) {
        Some(func) => {
            tracing::info!(function = %func.name, address = entry, blocks = func.cfg.blocks.len(), edges = func.cfg.edges.len(), "CFG dump");
            for block in &func.cfg.blocks {
                println!("block {:?} @ {:#x}: {} instruction(s)", block.id, block.address, block.instructions.len());
            }
        }
        None => tracing::warn!(address = entry, "no function found at the requested entry address"),
    }
}

fn write_warnings(outcome: &AnalysisOutcome, path: &PathBuf) -> Result<(), CliError> {
    let mut sink = WarningSink::new();
    for warning in &outcome.warnings {
        sink.emit(to_storage_kind(warning.kind), warning.address, warning.backward_slice.clone());
    }
    let bytes = vsa_storage::encode(&sink.records().to_vec(), true)?;
    std::fs::write(path, bytes).map_err(|source| CliError::WriteOutput { path: path.display().to_string(), source })
}

/// `vsa-core`'s `WarningKind` can't simply be `vsa_storage`'s (the dependency
/// direction forbids `vsa-core` depending on `vsa-storage`), so the two
/// identically-shaped enums are bridged here at the one place both are in
/// scope.
fn to_storage_kind(kind: vsa_core::WarningKind) -> StorageWarningKind {
    use vsa_core::WarningKind as C;
    match kind {
        C::OutOfBoundsRead => StorageWarningKind::OutOfBoundsRead,
        C::OutOfBoundsWrite => StorageWarningKind::OutOfBoundsWrite,
        C::PossibleNullDeref => StorageWarningKind::PossibleNullDeref,
        C::UninitializedRead => StorageWarningKind::UninitializedRead,
        C::MisalignedAccess => StorageWarningKind::MisalignedAccess,
        C::UnboundedMallocSize => StorageWarningKind::UnboundedMallocSize,
        C::UnresolvedIndirectCall => StorageWarningKind::UnresolvedIndirectCall,
        C::WriteToTopAddress => StorageWarningKind::WriteToTopAddress,
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.dlev, cli.alev);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "analysis driver failed");
            ExitCode::FAILURE
        }
    }
}
