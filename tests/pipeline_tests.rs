//! End-to-end pipeline tests: config table -> matrix plan -> synthesized
//! script, and synthesized log -> parsed series -> aggregate.
//!
//! Tests use tempfile scratch directories; nothing here launches a session
//! or touches the network.

use std::fs;

use tedbench::config::PEAK_MEMORY_PHRASE;
use tedbench::logparse::{parse_log, MetricValue};
use tedbench::report::{chart_file_name, Aggregate, PlotOptions};
use tedbench::script::{markers, synthesize};
use tedbench::{Config, MatrixPlan, TedbenchError};

const CONFIG_CSV: &str = "\
version label,git ref,build location,cmake command,run command
v1,reuse,build,cmake ..,
v2,perf-tuning,build,cmake -DFAST=ON ..,./tetsim --fast mesh_$SIZE.xml
,,,,
machine,local
numtets,\"[48, 1296]\"
approx time per tet,2e-5
approx mem per tet,0.4
run command,./tetsim mesh_$SIZE.xml
run cleanup,rm -f out.vtu
final cleanup,rm -f mesh_$SIZE.xml
build prep,./genmesh $SIZE mesh_$SIZE.xml
grep args,-e 'InputXml CPU Time: ' -e 'OutputVtk CPU Time: '
benchmark title,tetsim scaling
";

fn load_sample() -> Config {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sweep.csv");
    fs::write(&path, CONFIG_CSV).unwrap();
    // load from disk to exercise stem derivation
    let config = Config::load(&path).unwrap();
    assert!(config.stem.ends_with("sweep"));
    config
}

/// Build the log text the synthesized script would capture for this config,
/// following the script's ordering contract exactly.
fn captured_log(sizes: &[u64], labels: &[&str]) -> String {
    let mut log = String::new();
    for (i, &s) in sizes.iter().enumerate() {
        log.push_str(&markers::size_announcement(s));
        log.push('\n');
        for (j, label) in labels.iter().enumerate() {
            log.push_str(label);
            log.push('\n');
            log.push_str(&format!("InputXml CPU Time: {}.25\n", i + 1));
            log.push_str(&format!("OutputVtk CPU Time: {}.5\n", i + j + 1));
            log.push_str(&format!(
                "\tMaximum resident set size (kbytes): {}\n",
                (i + 1) * 100_000
            ));
            log.push('\n');
        }
    }
    log
}

#[test]
fn script_matches_parser_round_trip() {
    let config = load_sample();
    let plan = MatrixPlan::from_config(&config).unwrap();
    assert_eq!(plan.sizes, vec![2, 6]);

    let script = synthesize(&config, &plan, true);

    // exactly one announcement per size, in order
    for &size in &plan.sizes {
        assert_eq!(script.matches(&markers::size_announcement(size)).count(), 1);
    }

    // a log shaped like the script's output parses back cleanly
    let log = captured_log(&plan.sizes, &["v1", "v2"]);
    let versions = config.labels();
    let phrases = config.metric_phrases();
    let data = parse_log(&log, &versions, &phrases).unwrap();

    assert_eq!(data.numtets, vec![48, 1296]);
    for version in &versions {
        for phrase in &phrases {
            assert_eq!(
                data.series[version][phrase].len(),
                plan.sizes.len(),
                "series length for {}/{}",
                version,
                phrase
            );
        }
    }
    assert_eq!(
        data.series["v2"][PEAK_MEMORY_PHRASE],
        vec![MetricValue::Int(100_000), MetricValue::Int(200_000)]
    );
}

#[test]
fn aggregate_merges_two_sweeps_with_distinct_keys() {
    let config = load_sample();
    let plan = MatrixPlan::from_config(&config).unwrap();
    let versions = config.labels();
    let phrases = config.metric_phrases();
    let log = captured_log(&plan.sizes, &["v1", "v2"]);
    let data = parse_log(&log, &versions, &phrases).unwrap();

    let mut aggregate = Aggregate::new();
    aggregate
        .merge_file("bench/a", &data, &versions, &phrases, true)
        .unwrap();
    aggregate
        .merge_file("bench/b", &data, &versions, &phrases, true)
        .unwrap();

    let keys: Vec<&str> = aggregate.runs().iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(
        keys,
        vec![
            "v1 (bench/a)",
            "v2 (bench/a)",
            "v1 (bench/b)",
            "v2 (bench/b)"
        ]
    );
    assert_eq!(aggregate.phrases().len(), 3);
}

#[test]
fn missing_metric_line_rejects_the_series() {
    let config = load_sample();
    let plan = MatrixPlan::from_config(&config).unwrap();
    let versions = config.labels();
    let phrases = config.metric_phrases();

    // drop v2's peak-memory line for the second size only
    let mut log = captured_log(&plan.sizes, &["v1", "v2"]);
    let needle = "v2\nInputXml CPU Time: 2.25\nOutputVtk CPU Time: 3.5\n\tMaximum resident set size (kbytes): 200000\n";
    let replacement = "v2\nInputXml CPU Time: 2.25\nOutputVtk CPU Time: 3.5\n";
    log = log.replacen(needle, replacement, 1);

    let err = parse_log(&log, &versions, &phrases).unwrap_err();
    match err {
        TedbenchError::ParseInconsistency {
            version, phrase, ..
        } => {
            assert_eq!(version, "v2");
            assert_eq!(phrase, PEAK_MEMORY_PHRASE);
        }
        other => panic!("expected ParseInconsistency, got {:?}", other),
    }
}

#[test]
fn chart_names_unique_across_phrases_and_modes() {
    let config = load_sample();
    let phrases = config.metric_phrases();

    let mut names = Vec::new();
    for log_axes in [false, true] {
        let options = PlotOptions {
            log_axes,
            ..Default::default()
        };
        for phrase in &phrases {
            names.push(chart_file_name(phrase, &options));
        }
    }
    let mut deduped = names.clone();
    deduped.sort();
    deduped.dedup();
    assert_eq!(deduped.len(), names.len(), "collision in {:?}", names);
}
