//! Typed view over the two-section benchmark config table
//!
//! The table is a CSV file with two sections separated by one fully-empty
//! row: the top section is a header plus one row per software version, the
//! bottom section is a flat key/value parameter map. A missing separator row
//! is a fatal input error.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Result, TedbenchError};

/// Git-reference sentinel meaning "do not rebuild, reuse the existing binary"
pub const REUSE_SENTINEL: &str = "reuse";

/// Peak-memory phrase emitted by the profiling wrapper, always captured
pub const PEAK_MEMORY_PHRASE: &str = "Maximum resident set size (kbytes): ";

/// Column names of the top (version) section
const VERSION_COLUMNS: [&str; 5] = [
    "version label",
    "git ref",
    "build location",
    "cmake command",
    "run command",
];

/// Keys that must be present in the bottom (parameter) section
const REQUIRED_KEYS: [&str; 10] = [
    "machine",
    "numtets",
    "approx time per tet",
    "approx mem per tet",
    "run command",
    "run cleanup",
    "final cleanup",
    "build prep",
    "grep args",
    "benchmark title",
];

static GREP_PHRASE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-e\s+'([^']*)'").expect("valid grep-phrase regex"));

/// One row of the top config section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRecord {
    /// Unique display name, also the machine marker searched for in logs
    pub label: String,
    /// Git reference to build, or [`REUSE_SENTINEL`]
    pub git_ref: String,
    /// Build directory on the target
    pub build_location: String,
    /// Configure command run before the build
    pub cmake_command: String,
    /// Per-version run command; `None` means "use the benchmark default"
    pub custom_run_command: Option<String>,
}

impl VersionRecord {
    /// Whether this version requires a checkout/configure/build pass
    pub fn needs_build(&self) -> bool {
        self.git_ref != REUSE_SENTINEL
    }
}

/// The bottom config section, parsed into typed fields
#[derive(Debug, Clone)]
pub struct BenchmarkParams {
    /// Target machine identifier; `"local"` means no remote connection
    pub machine: String,
    /// Size-generating expression over target tetrahedron counts
    pub numtets: String,
    /// Approximate seconds per tet per run, for estimation only
    pub time_per_tet: f64,
    /// Approximate kbytes per tet, for estimation only
    pub mem_per_tet: f64,
    /// Default run command for versions without a custom one
    pub run_command: String,
    /// Cleanup executed after each run
    pub run_cleanup: String,
    /// Cleanup executed after all versions of one size
    pub final_cleanup: String,
    /// Build prep command(s), chained, parameterized by `$SIZE`
    pub build_prep: String,
    /// Metric-selection expression, `-e '<phrase>'` repeated
    pub grep_args: String,
    /// Human-facing benchmark title for chart captions
    pub benchmark_title: String,
}

impl BenchmarkParams {
    fn from_map(map: &BTreeMap<String, String>) -> Result<Self> {
        for key in REQUIRED_KEYS {
            if !map.contains_key(key) {
                return Err(TedbenchError::MissingParameter {
                    key: key.to_string(),
                });
            }
        }
        let get = |key: &str| map[key].clone();
        let get_f64 = |key: &str| -> Result<f64> {
            map[key].trim().parse().map_err(|_| TedbenchError::Config {
                message: format!("parameter '{}' is not a number: '{}'", key, map[key]),
            })
        };
        Ok(Self {
            machine: get("machine"),
            numtets: get("numtets"),
            time_per_tet: get_f64("approx time per tet")?,
            mem_per_tet: get_f64("approx mem per tet")?,
            run_command: get("run command"),
            run_cleanup: get("run cleanup"),
            final_cleanup: get("final cleanup"),
            build_prep: get("build prep"),
            grep_args: get("grep args"),
            benchmark_title: get("benchmark title"),
        })
    }

    /// Metric phrases named by `grep args`, plus the peak-memory phrase
    pub fn metric_phrases(&self) -> Vec<String> {
        let mut phrases: Vec<String> = GREP_PHRASE_RE
            .captures_iter(&self.grep_args)
            .map(|cap| cap[1].to_string())
            .collect();
        phrases.push(PEAK_MEMORY_PHRASE.to_string());
        phrases
    }
}

/// Complete parsed config: ordered versions plus the parameter map
#[derive(Debug, Clone)]
pub struct Config {
    pub versions: Vec<VersionRecord>,
    pub params: BenchmarkParams,
    /// Config path with its extension stripped; roots the working directory,
    /// session name, and output paths
    pub stem: String,
}

impl Config {
    /// Load and validate a two-section config table from disk
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let stem = path
            .with_extension("")
            .to_string_lossy()
            .trim_start_matches("./")
            .to_string();
        Self::from_csv_text(&text, &stem)
    }

    /// Parse config text; `stem` is the extension-stripped relative path
    pub fn from_csv_text(text: &str, stem: &str) -> Result<Self> {
        let lines: Vec<&str> = text.lines().collect();
        let separator = lines
            .iter()
            .enumerate()
            .skip(1)
            .find(|(_, line)| is_blank_row(line))
            .map(|(idx, _)| idx)
            .ok_or_else(|| TedbenchError::Config {
                message: "no blank separator row between versions and parameters".to_string(),
            })?;

        let versions = parse_versions(&lines[..separator])?;
        let params_map = parse_params(&lines[separator + 1..])?;
        let params = BenchmarkParams::from_map(&params_map)?;

        Ok(Self {
            versions,
            params,
            stem: stem.to_string(),
        })
    }

    /// Ordered version labels
    pub fn labels(&self) -> Vec<String> {
        self.versions.iter().map(|v| v.label.clone()).collect()
    }

    /// Metric phrases to capture from run output
    pub fn metric_phrases(&self) -> Vec<String> {
        self.params.metric_phrases()
    }
}

/// A row is blank when every cell is empty (a line of commas, or nothing)
fn is_blank_row(line: &str) -> bool {
    line.trim().chars().all(|c| c == ',' || c.is_whitespace())
}

fn parse_versions(lines: &[&str]) -> Result<Vec<VersionRecord>> {
    let joined = lines.join("\n");
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(joined.as_bytes());
    let headers = reader.headers()?.clone();

    let column = |name: &str| -> Result<usize> {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| TedbenchError::Config {
                message: format!("version section is missing column '{}'", name),
            })
    };
    let label_col = column(VERSION_COLUMNS[0])?;
    let git_ref_col = column(VERSION_COLUMNS[1])?;
    let location_col = column(VERSION_COLUMNS[2])?;
    let cmake_col = column(VERSION_COLUMNS[3])?;
    let run_col = column(VERSION_COLUMNS[4])?;

    let mut versions = Vec::new();
    for record in reader.records() {
        let record = record?;
        let cell = |idx: usize| record.get(idx).unwrap_or("").trim().to_string();
        let label = cell(label_col);
        if label.is_empty() {
            continue;
        }
        if versions.iter().any(|v: &VersionRecord| v.label == label) {
            return Err(TedbenchError::Config {
                message: format!("duplicate version label '{}'", label),
            });
        }
        let custom = cell(run_col);
        versions.push(VersionRecord {
            label,
            git_ref: cell(git_ref_col),
            build_location: cell(location_col),
            cmake_command: cell(cmake_col),
            custom_run_command: if custom.is_empty() { None } else { Some(custom) },
        });
    }
    Ok(versions)
}

fn parse_params(lines: &[&str]) -> Result<BTreeMap<String, String>> {
    let joined = lines.join("\n");
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(joined.as_bytes());

    let mut map = BTreeMap::new();
    for record in reader.records() {
        let record = record?;
        let key = record.get(0).unwrap_or("").trim().to_string();
        if key.is_empty() {
            continue;
        }
        let value = record.get(1).unwrap_or("").trim().to_string();
        map.insert(key, value);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_CSV: &str = "\
version label,git ref,build location,cmake command,run command
v1,reuse,build,cmake ..,
v2,feature-branch,build,cmake -DFAST=ON ..,./tetsim --fast mesh_$SIZE.xml
,,,,
machine,local
numtets,\"[48, 1296]\"
approx time per tet,1e-5
approx mem per tet,0.5
run command,./tetsim mesh_$SIZE.xml
run cleanup,rm -f out.vtu
final cleanup,rm -f mesh_$SIZE.xml
build prep,./genmesh $SIZE mesh_$SIZE.xml
grep args,-e 'InputXml CPU Time: ' -e 'OutputVtk CPU Time: '
benchmark title,tetsim scaling
";

    #[test]
    fn test_parse_two_sections() {
        let config = Config::from_csv_text(SAMPLE_CSV, "benchmarks/tetsim").unwrap();
        assert_eq!(config.versions.len(), 2);
        assert_eq!(config.versions[0].label, "v1");
        assert!(!config.versions[0].needs_build());
        assert_eq!(config.versions[0].custom_run_command, None);
        assert_eq!(config.versions[1].git_ref, "feature-branch");
        assert_eq!(
            config.versions[1].custom_run_command.as_deref(),
            Some("./tetsim --fast mesh_$SIZE.xml")
        );
        assert_eq!(config.params.machine, "local");
        assert_eq!(config.params.numtets, "[48, 1296]");
        assert_eq!(config.params.time_per_tet, 1e-5);
        assert_eq!(config.stem, "benchmarks/tetsim");
    }

    #[test]
    fn test_missing_separator_is_fatal() {
        let csv = "version label,git ref,build location,cmake command,run command\n\
                   v1,reuse,build,cmake ..,\n\
                   machine,local\n";
        let err = Config::from_csv_text(csv, "x").unwrap_err();
        assert!(matches!(err, TedbenchError::Config { .. }));
    }

    #[test]
    fn test_missing_required_key_is_fatal() {
        let csv = SAMPLE_CSV.replace("machine,local\n", "");
        let err = Config::from_csv_text(&csv, "x").unwrap_err();
        match err {
            TedbenchError::MissingParameter { key } => assert_eq!(key, "machine"),
            other => panic!("expected MissingParameter, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_label_is_fatal() {
        let csv = SAMPLE_CSV.replace("v2,", "v1,");
        let err = Config::from_csv_text(&csv, "x").unwrap_err();
        assert!(matches!(err, TedbenchError::Config { .. }));
    }

    #[test]
    fn test_metric_phrases_include_peak_memory() {
        let config = Config::from_csv_text(SAMPLE_CSV, "x").unwrap();
        let phrases = config.metric_phrases();
        assert_eq!(
            phrases,
            vec![
                "InputXml CPU Time: ".to_string(),
                "OutputVtk CPU Time: ".to_string(),
                PEAK_MEMORY_PHRASE.to_string(),
            ]
        );
    }

    #[test]
    fn test_blank_row_detection() {
        assert!(is_blank_row(",,,,"));
        assert!(is_blank_row(""));
        assert!(is_blank_row(" , , "));
        assert!(!is_blank_row("machine,local"));
    }
}
