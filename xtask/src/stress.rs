//! Drives `testsuite`'s stress harness at a scale larger than its own
//! `#[test]`s use, and a thin wrapper around `cargo test` for the rest of
//! the workspace.

use std::process::Command;
use std::time::Instant;

use anyhow::{Result, anyhow, bail};
use testsuite::{StressConfig, run_stress};

/// Runs the multi-writer/multi-reader stress scenario with the given sizes.
pub fn run(writers: u32, readers: u32, bytes_per_writer: usize, chunk_max: usize, buf_len: usize) -> Result<()> {
    let cfg = StressConfig { writers, readers, bytes_per_writer, chunk_max, buf_len };
    println!("Running stress scenario: {cfg:?}");
    let started = Instant::now();
    run_stress(&cfg).map_err(|e| anyhow!(e))?;
    println!(
        "OK: {} writer(s) x {} byte(s) x {} reader(s) in {:?}",
        cfg.writers,
        cfg.bytes_per_writer,
        cfg.readers,
        started.elapsed()
    );
    Ok(())
}

/// Runs `cargo test` across the workspace, optionally filtered.
pub fn run_cargo_test(filter: Option<&str>) -> Result<()> {
    let mut cmd = Command::new(std::env::var("CARGO").unwrap_or_else(|_| "cargo".into()));
    cmd.args(["test", "--workspace"]);
    if let Some(f) = filter {
        cmd.arg(f);
    }
    let status = cmd.status()?;
    if !status.success() {
        bail!("cargo test failed");
    }
    Ok(())
}
