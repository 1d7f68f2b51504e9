//! Timing report for the demo binary (C10): per-repetition write/read
//! bandwidth, reduced across ranks, in the same shape `ior-bench/src/report.rs`
//! prints for its write/read phases.

use mpi::collective::SystemOperation;
use mpi::topology::SimpleCommunicator;
use mpi::traits::*;

const MEBIBYTE: f64 = 1_048_576.0;

/// One repetition's result: elapsed time (max across ranks, so the slowest
/// rank sets the pace) and aggregate bytes moved (summed across ranks).
#[derive(Debug, Clone, Copy)]
pub struct IterResult {
    pub rep: i32,
    pub write_time: f64,
    pub read_time: f64,
    pub bytes_per_rank: usize,
}

impl IterResult {
    pub fn write_bw(&self, nranks: usize) -> f64 {
        bw(self.bytes_per_rank * nranks, self.write_time)
    }

    pub fn read_bw(&self, nranks: usize) -> f64 {
        bw(self.bytes_per_rank * nranks, self.read_time)
    }
}

fn bw(bytes: usize, secs: f64) -> f64 {
    if secs > 0.0 {
        bytes as f64 / secs
    } else {
        0.0
    }
}

/// Reduce a local elapsed time to the slowest (max) across `comm`.
pub fn reduce_max_time(local: f64, comm: &SimpleCommunicator) -> f64 {
    let mut reduced = local;
    comm.all_reduce_into(&local, &mut reduced, SystemOperation::max());
    reduced
}

pub fn print_header(comm: &SimpleCommunicator) {
    if comm.rank() != 0 {
        return;
    }
    println!();
    println!(
        "{:<6} {:>12} {:>12} {:>14} {:>14}",
        "iter", "write(s)", "read(s)", "write(MiB/s)", "read(MiB/s)"
    );
    println!(
        "{:<6} {:>12} {:>12} {:>14} {:>14}",
        "----", "--------", "-------", "------------", "-----------"
    );
}

pub fn print_result(result: &IterResult, nranks: usize, comm: &SimpleCommunicator) {
    if comm.rank() != 0 {
        return;
    }
    println!(
        "{:<6} {:>12.6} {:>12.6} {:>14.2} {:>14.2}",
        result.rep,
        result.write_time,
        result.read_time,
        result.write_bw(nranks) / MEBIBYTE,
        result.read_bw(nranks) / MEBIBYTE,
    );
}
