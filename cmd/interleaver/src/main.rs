//! Round-robin interleaving demo
//!
//! Runs a handful of simulated threads under the arbiter and prints the
//! order in which their compute ops ran. Syscalls run concurrently on the
//! owners' OS threads; compute ops never overlap.
//!
//! # Environment Variables
//!
//! - `VSPIN_LOG_LEVEL=debug` - Set log level (off, error, warn, info, debug, trace)
//! - `VSPIN_FLUSH_EPRINT=1` - Flush log output immediately
//! - `INTERLEAVER_THREADS=4` - Number of simulated threads
//! - `INTERLEAVER_OPS=6` - Compute ops per thread
//! - `INTERLEAVER_SYSCALL_MS=2` - Duration of each simulated syscall

use std::time::{Duration, Instant};

use vspin::sim::{Op, RoundRobin, SimSubstrate};
use vspin::{env_get, kinfo, Spin, SpinConfig, SpinResult, ThreadId};

// VSPIN_LOG_LEVEL=debug cargo run -p vspin-interleaver
fn main() {
    if let Err(e) = run() {
        eprintln!("interleaver failed: {}", e);
        std::process::exit(1);
    }
}

/// Thread `i` computes `ops` times, entering a syscall after every
/// `i + 2` compute ops
fn program(i: usize, ops: usize, syscall: Duration) -> Vec<Op> {
    let mut prog = Vec::new();
    for n in 1..=ops {
        prog.push(Op::Compute);
        if n % (i + 2) == 0 {
            prog.push(Op::Syscall(syscall));
        }
    }
    prog
}

fn run() -> SpinResult<()> {
    println!("=== vspin Interleaver ===\n");

    let threads: usize = env_get("INTERLEAVER_THREADS", 4);
    let ops: usize = env_get("INTERLEAVER_OPS", 6);
    let syscall = Duration::from_millis(env_get("INTERLEAVER_SYSCALL_MS", 2));

    let substrate = SimSubstrate::new();
    let policy = RoundRobin::new();
    let config = SpinConfig::default().max_threads(threads.max(1));
    let spin = Spin::initialize(&substrate, Box::new(policy.clone()), config)?;

    let programs: Vec<Vec<Op>> = (0..threads).map(|i| program(i, ops, syscall)).collect();
    kinfo!("running {} threads, {} compute ops each", threads, ops);

    let start = Instant::now();
    let report = substrate.run(programs, &policy)?;
    let elapsed = start.elapsed();

    println!("Execution order (owner:pc @ os thread):");
    for chunk in report.steps.chunks(8) {
        let line: Vec<String> = chunk
            .iter()
            .map(|s| format!("{}:{}@{}", s.owner, s.pc, s.os_thread))
            .collect();
        println!("  {}", line.join("  "));
    }

    println!();
    for i in 0..threads {
        let tid = ThreadId::new(i as u32);
        println!(
            "  thread {}: {} compute ops, {} run on another OS thread",
            tid,
            report.steps_of(tid).len(),
            report.foreign_steps(tid)
        );
    }

    println!("\nPeak concurrent runners: {}", report.peak_runners);
    println!("Arbiter stats:\n{}", spin.stats().snapshot());
    println!("\nElapsed: {:?}", elapsed);
    spin.check_quiescent()?;

    println!("\n=== Interleaver Complete ===");
    Ok(())
}
