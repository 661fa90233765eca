//! Matrix planning: problem sizes and per-version run commands
//!
//! The planner turns the size-generating expression into an ordered list of
//! mesh edge lengths and resolves each version's effective run command. The
//! ordering of sizes is an implicit contract between script synthesis and
//! log parsing and must never be sorted.

use serde::Serialize;

use crate::config::{BenchmarkParams, Config, VersionRecord};
use crate::error::{Result, TedbenchError};
use crate::expr;

/// Tetrahedron count for a mesh of edge length `s`
pub fn tet_count(size: u64) -> u64 {
    6 * size * size * size
}

/// Derive mesh edge lengths from target tet counts: `max(2, round(cbrt(n/6)))`
pub fn problem_sizes(counts: &[f64]) -> Vec<u64> {
    counts
        .iter()
        .map(|&n| ((n / 6.0).cbrt().round() as i64).max(2) as u64)
        .collect()
}

/// Effective run command: the version's custom command if non-empty,
/// else the benchmark-wide default
pub fn effective_run_command(version: &VersionRecord, params: &BenchmarkParams) -> String {
    version
        .custom_run_command
        .clone()
        .unwrap_or_else(|| params.run_command.clone())
}

/// Build step for a version that is not marked reuse
#[derive(Debug, Clone)]
pub struct BuildStep {
    pub git_ref: String,
    pub build_location: String,
    pub cmake_command: String,
}

/// One row of the run matrix: a version with its resolved run command
#[derive(Debug, Clone)]
pub struct PlannedRun {
    pub label: String,
    pub run_command: String,
    pub build: Option<BuildStep>,
}

/// The full (version x problem size) matrix for one config
#[derive(Debug, Clone)]
pub struct MatrixPlan {
    /// Ordered problem sizes, positionally aligned with the captured log
    pub sizes: Vec<u64>,
    /// Versions in config order
    pub runs: Vec<PlannedRun>,
}

impl MatrixPlan {
    pub fn from_config(config: &Config) -> Result<Self> {
        if config.versions.is_empty() {
            return Err(TedbenchError::Config {
                message: "no versions to benchmark".to_string(),
            });
        }
        let counts = expr::eval_sequence(&config.params.numtets)?;
        let sizes = problem_sizes(&counts);
        let runs = config
            .versions
            .iter()
            .map(|version| PlannedRun {
                label: version.label.clone(),
                run_command: effective_run_command(version, &config.params),
                build: version.needs_build().then(|| BuildStep {
                    git_ref: version.git_ref.clone(),
                    build_location: version.build_location.clone(),
                    cmake_command: version.cmake_command.clone(),
                }),
            })
            .collect();
        Ok(Self { sizes, runs })
    }

    /// Number of matrix cells (one profiled run each)
    pub fn cell_count(&self) -> usize {
        self.sizes.len() * self.runs.len()
    }
}

/// Runtime/memory projection from the per-tet cost parameters.
/// Estimation only; has no bearing on correctness.
#[derive(Debug, Clone, Serialize)]
pub struct Estimate {
    pub cells: usize,
    pub total_tets: u64,
    pub est_seconds: f64,
    pub est_peak_mem_kb: f64,
}

pub fn estimate(plan: &MatrixPlan, params: &BenchmarkParams) -> Estimate {
    let tets_per_sweep: u64 = plan.sizes.iter().map(|&s| tet_count(s)).sum();
    let total_tets = tets_per_sweep * plan.runs.len() as u64;
    let max_tets = plan.sizes.iter().map(|&s| tet_count(s)).max().unwrap_or(0);
    Estimate {
        cells: plan.cell_count(),
        total_tets,
        est_seconds: total_tets as f64 * params.time_per_tet,
        est_peak_mem_kb: max_tets as f64 * params.mem_per_tet,
    }
}
