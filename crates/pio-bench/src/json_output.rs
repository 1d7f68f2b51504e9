//! `--json`/`--json-file` result dump (§2.1 ambient stack), grounded on
//! `ior-bench/src/json_output.rs`'s document shape: parameters the run was
//! invoked with, a result row per repetition, and a summary.

use serde::Serialize;

use crate::report::IterResult;

#[derive(Serialize)]
pub struct PioBenchJsonDocument {
    #[serde(rename = "commandLine")]
    pub command_line: String,
    #[serde(rename = "numTasks")]
    pub num_tasks: i32,
    #[serde(rename = "elemsPerRank")]
    pub elems_per_rank: usize,
    #[serde(rename = "numVars")]
    pub num_vars: usize,
    pub results: Vec<PioBenchJsonResult>,
}

#[derive(Serialize)]
pub struct PioBenchJsonResult {
    pub rep: i32,
    #[serde(rename = "writeTimeSec")]
    pub write_time_sec: f64,
    #[serde(rename = "readTimeSec")]
    pub read_time_sec: f64,
    #[serde(rename = "writeBwMiB")]
    pub write_bw_mib: f64,
    #[serde(rename = "readBwMiB")]
    pub read_bw_mib: f64,
}

const MEBIBYTE: f64 = 1_048_576.0;

pub fn build_json(
    results: &[IterResult],
    num_tasks: i32,
    elems_per_rank: usize,
    num_vars: usize,
    command_line: &str,
) -> PioBenchJsonDocument {
    let nranks = num_tasks.max(1) as usize;
    PioBenchJsonDocument {
        command_line: command_line.to_string(),
        num_tasks,
        elems_per_rank,
        num_vars,
        results: results
            .iter()
            .map(|r| PioBenchJsonResult {
                rep: r.rep,
                write_time_sec: r.write_time,
                read_time_sec: r.read_time,
                write_bw_mib: r.write_bw(nranks) / MEBIBYTE,
                read_bw_mib: r.read_bw(nranks) / MEBIBYTE,
            })
            .collect(),
    }
}
