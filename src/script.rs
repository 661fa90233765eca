//! Benchmark script synthesis
//!
//! Renders the planned (version x problem size) matrix into a single POSIX
//! shell script. The script is both the live console stream and the durable
//! structured record: every run's filtered output is appended to `data.txt`
//! between marker lines the log parser keys on. The marker formats live in
//! [`markers`] so synthesis and parsing can never drift apart.

use crate::config::Config;
use crate::planner::{tet_count, BuildStep, MatrixPlan, PlannedRun};

/// File name of the synthesized script inside the working directory
pub const SCRIPT_FILE: &str = "bench.sh";

/// The canonical captured-metrics file
pub const DATA_FILE: &str = "data.txt";

/// Log files truncated by the preamble, in creation order
pub const LOG_FILES: [&str; 5] = ["build.log", "stdout.log", "stderr.log", "time.log", DATA_FILE];

/// Temporary file the profiling wrapper writes per run
const TIME_TMP: &str = "time.tmp";

/// Parallel build jobs on a local target (typical workstation core count)
const LOCAL_BUILD_JOBS: u32 = 4;
/// Parallel build jobs on a remote target
const REMOTE_BUILD_JOBS: u32 = 16;

/// Marker lines shared between script synthesis and log parsing
pub mod markers {
    use super::tet_count;

    /// Block-start announcement written to the metrics file for size `s`
    pub fn size_announcement(size: u64) -> String {
        format!(
            "{s} * {s} * {s} * 6 =  {n}  tets",
            s = size,
            n = tet_count(size)
        )
    }

    /// Pattern recovering the tet count from an announcement line
    pub const SIZE_ANNOUNCEMENT_PATTERN: &str = r"\* 6 =\s+(\d+)\s+tets";

    /// Substring selecting the profiling wrapper's peak-memory line
    pub const PEAK_MEMORY_GREP: &str = "Maximum resident set size";
}

/// One named section of the synthesized script
#[derive(Debug, Clone)]
enum ScriptSection {
    /// Truncate/create every log file
    Preamble,
    /// Checkout, clean, configure, and build one version
    Build { label: String, step: BuildStep, jobs: u32 },
    /// One problem size: prep, announcement, then every version's run
    SizeSweep { size: u64, cells: Vec<RunCell> },
}

/// One matrix cell inside a size sweep
#[derive(Debug, Clone)]
struct RunCell {
    label: String,
    run_command: String,
    grep_args: String,
    run_cleanup: String,
}

/// A composed script, rendered to text exactly once
#[derive(Debug, Clone)]
pub struct Script {
    sections: Vec<ScriptSection>,
    final_cleanup: String,
    build_prep: String,
}

impl Script {
    /// Compose the script sections from the config and plan. `local` selects
    /// the build concurrency policy, not any structural difference.
    pub fn compose(config: &Config, plan: &MatrixPlan, local: bool) -> Self {
        let jobs = if local { LOCAL_BUILD_JOBS } else { REMOTE_BUILD_JOBS };

        let mut sections = vec![ScriptSection::Preamble];
        for run in &plan.runs {
            if let Some(step) = &run.build {
                sections.push(ScriptSection::Build {
                    label: run.label.clone(),
                    step: step.clone(),
                    jobs,
                });
            }
        }
        for &size in &plan.sizes {
            sections.push(ScriptSection::SizeSweep {
                size,
                cells: plan.runs.iter().map(|run| cell_for(run, config)).collect(),
            });
        }
        Self {
            sections,
            final_cleanup: config.params.final_cleanup.clone(),
            build_prep: config.params.build_prep.clone(),
        }
    }

    /// Render to shell text. Ordering within a sweep is a hard contract:
    /// prep -> announcement -> (per version: label -> run -> peak-memory ->
    /// cleanup -> blank separator) -> final cleanup.
    pub fn render(&self) -> String {
        let mut out = String::from("#!/bin/bash\nset -u\n");
        for section in &self.sections {
            out.push('\n');
            match section {
                ScriptSection::Preamble => {
                    for file in LOG_FILES {
                        out.push_str(&format!(": > {}\n", file));
                    }
                }
                ScriptSection::Build { label, step, jobs } => {
                    out.push_str(&format!("echo \"==== building {} ====\"\n", label));
                    out.push_str(&format!(
                        "(\n  cd {} &&\n  git checkout {} &&\n  rm -rf CMakeCache.txt CMakeFiles &&\n  {} &&\n  make -j{}\n) >> build.log 2>&1\n",
                        step.build_location, step.git_ref, step.cmake_command, jobs
                    ));
                }
                ScriptSection::SizeSweep { size, cells } => {
                    out.push_str(&format!("SIZE={}\nexport SIZE\n", size));
                    out.push_str(&format!("{}\n", self.build_prep));
                    out.push_str(&format!(
                        "echo \"{}\" | tee -a {}\n",
                        markers::size_announcement(*size),
                        DATA_FILE
                    ));
                    for cell in cells {
                        out.push_str(&format!(
                            "echo \"{}\" | tee -a {}\n",
                            cell.label, DATA_FILE
                        ));
                        out.push_str(&format!(
                            "/usr/bin/time -v -o {tmp} {cmd} 2>> stderr.log | tee -a stdout.log | grep {grep} >> {data}\n",
                            tmp = TIME_TMP,
                            cmd = cell.run_command,
                            grep = cell.grep_args,
                            data = DATA_FILE
                        ));
                        out.push_str(&format!("cat {} >> time.log\n", TIME_TMP));
                        out.push_str(&format!(
                            "grep '{}' {} >> {}\n",
                            markers::PEAK_MEMORY_GREP,
                            TIME_TMP,
                            DATA_FILE
                        ));
                        out.push_str(&format!("{}\n", cell.run_cleanup));
                        out.push_str(&format!("echo \"\" >> {}\n", DATA_FILE));
                    }
                    out.push_str(&format!("{}\n", self.final_cleanup));
                    out.push_str(&format!("rm -f {}\n", TIME_TMP));
                }
            }
        }
        out
    }
}

fn cell_for(run: &PlannedRun, config: &Config) -> RunCell {
    RunCell {
        label: run.label.clone(),
        run_command: run.run_command.clone(),
        grep_args: config.params.grep_args.clone(),
        run_cleanup: config.params.run_cleanup.clone(),
    }
}

/// Compose and render in one step
pub fn synthesize(config: &Config, plan: &MatrixPlan, local: bool) -> String {
    Script::compose(config, plan, local).render()
}
