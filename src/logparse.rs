//! Parsing captured metrics logs back into numeric series
//!
//! The captured `data.txt` is split on blank-line boundaries into blocks.
//! Size-announcement lines are collected in order across the whole log to
//! reconstruct the tet-count sequence; a block belongs to a version when the
//! version label appears as a standalone line in it. For every requested
//! metric phrase, the first line containing the phrase yields one value.
//!
//! Two conditions are hard errors, never warnings: a metric line carrying
//! more than one numeric token, and a series whose length differs from the
//! announcement count. A ragged series is never handed to the reporter.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::error::{Result, TedbenchError};
use crate::script::markers;

static ANNOUNCEMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(markers::SIZE_ANNOUNCEMENT_PATTERN).expect("valid announcement regex"));

static NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+\.?\d*").expect("valid number regex"));

/// One extracted measurement: integer when the token has no decimal point
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Int(u64),
    Float(f64),
}

impl MetricValue {
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Int(v) => v as f64,
            Self::Float(v) => v,
        }
    }
}

/// Parsed contents of one captured log
#[derive(Debug, Clone)]
pub struct LogData {
    /// Tet counts in announcement order, one per run block
    pub numtets: Vec<u64>,
    /// version label -> metric phrase -> one value per block
    pub series: BTreeMap<String, BTreeMap<String, Vec<MetricValue>>>,
}

/// Extract the single numeric token from a metric line
fn extract_value(line: &str, version: &str, phrase: &str) -> Result<MetricValue> {
    let tokens: Vec<&str> = NUMBER_RE.find_iter(line).map(|m| m.as_str()).collect();
    match tokens.len() {
        0 => Err(TedbenchError::ParseInconsistency {
            version: version.to_string(),
            phrase: phrase.to_string(),
            message: format!("no numeric token on line '{}'", line.trim()),
        }),
        1 => Ok(parse_token(tokens[0], version, phrase)?),
        n => Err(TedbenchError::ParseInconsistency {
            version: version.to_string(),
            phrase: phrase.to_string(),
            message: format!("{} numeric tokens on one line: '{}'", n, line.trim()),
        }),
    }
}

fn parse_token(token: &str, version: &str, phrase: &str) -> Result<MetricValue> {
    let inconsistent = |message: String| TedbenchError::ParseInconsistency {
        version: version.to_string(),
        phrase: phrase.to_string(),
        message,
    };
    if token.contains('.') {
        token
            .parse::<f64>()
            .map(MetricValue::Float)
            .map_err(|_| inconsistent(format!("unreadable float '{}'", token)))
    } else {
        token
            .parse::<u64>()
            .map(MetricValue::Int)
            .map_err(|_| inconsistent(format!("unreadable integer '{}'", token)))
    }
}

/// Parse a captured log for the given versions and phrases.
///
/// Every returned series has exactly one value per announcement; any
/// shortfall or surplus is reported against the offending version/phrase.
pub fn parse_log(text: &str, versions: &[String], phrases: &[String]) -> Result<LogData> {
    let numtets: Vec<u64> = ANNOUNCEMENT_RE
        .captures_iter(text)
        .filter_map(|caps| caps[1].parse().ok())
        .collect();

    let blocks: Vec<&str> = text.split("\n\n").collect();
    let mut series: BTreeMap<String, BTreeMap<String, Vec<MetricValue>>> = BTreeMap::new();

    for version in versions {
        let mut per_phrase: BTreeMap<String, Vec<MetricValue>> = phrases
            .iter()
            .map(|phrase| (phrase.clone(), Vec::new()))
            .collect();

        for block in &blocks {
            let lines: Vec<&str> = block.lines().collect();
            if !lines.iter().any(|line| line.trim_end() == version) {
                continue;
            }
            for phrase in phrases {
                if let Some(line) = lines.iter().find(|line| line.contains(phrase.as_str())) {
                    let value = extract_value(line, version, phrase)?;
                    if let Some(values) = per_phrase.get_mut(phrase) {
                        values.push(value);
                    }
                }
            }
        }

        for phrase in phrases {
            let found = per_phrase.get(phrase).map(Vec::len).unwrap_or(0);
            if found != numtets.len() {
                return Err(TedbenchError::ParseInconsistency {
                    version: version.clone(),
                    phrase: phrase.clone(),
                    message: format!(
                        "expected {} values (one per problem size), found {}",
                        numtets.len(),
                        found
                    ),
                });
            }
        }
        series.insert(version.clone(), per_phrase);
    }

    Ok(LogData { numtets, series })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Synthesize a captured log the way the generated script writes one:
    /// per size an announcement, then per version a label block ending with
    /// the peak-memory line and a blank separator.
    fn synthetic_log(sizes: &[u64], versions: &[&str]) -> String {
        let mut log = String::new();
        for (i, &s) in sizes.iter().enumerate() {
            let mut first = true;
            for version in versions {
                if first {
                    log.push_str(&markers::size_announcement(s));
                    log.push('\n');
                    first = false;
                }
                log.push_str(version);
                log.push('\n');
                log.push_str(&format!("Solve CPU Time: {}.{}\n", i + 1, 5));
                log.push_str(&format!(
                    "\tMaximum resident set size (kbytes): {}\n",
                    (i + 1) * 1000
                ));
                log.push('\n');
            }
        }
        log
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_round_trip_series_lengths() {
        let log = synthetic_log(&[2, 6, 10], &["v1", "v2"]);
        let phrases = strings(&["Solve CPU Time: ", "Maximum resident set size (kbytes): "]);
        let data = parse_log(&log, &strings(&["v1", "v2"]), &phrases).unwrap();

        assert_eq!(data.numtets, vec![48, 1296, 6000]);
        for version in ["v1", "v2"] {
            for phrase in &phrases {
                assert_eq!(data.series[version][phrase].len(), 3);
            }
        }
        assert_eq!(
            data.series["v1"]["Solve CPU Time: "],
            vec![
                MetricValue::Float(1.5),
                MetricValue::Float(2.5),
                MetricValue::Float(3.5)
            ]
        );
        assert_eq!(
            data.series["v2"]["Maximum resident set size (kbytes): "][2],
            MetricValue::Int(3000)
        );
    }

    #[test]
    fn test_int_vs_float_token() {
        let line = "\tMaximum resident set size (kbytes): 123456";
        assert_eq!(
            extract_value(line, "v1", "p").unwrap(),
            MetricValue::Int(123456)
        );
        assert_eq!(
            extract_value("Solve CPU Time: 12.25", "v1", "p").unwrap(),
            MetricValue::Float(12.25)
        );
    }

    #[test]
    fn test_multiple_numeric_tokens_is_hard_error() {
        let err = extract_value("Solve CPU Time: 1.5 over 3 iterations", "v2", "Solve CPU Time: ")
            .unwrap_err();
        match err {
            TedbenchError::ParseInconsistency { version, phrase, .. } => {
                assert_eq!(version, "v2");
                assert_eq!(phrase, "Solve CPU Time: ");
            }
            other => panic!("expected ParseInconsistency, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_line_is_hard_error_not_a_shift() {
        // drop v2's peak-memory line for the second size
        let mut log = synthetic_log(&[2, 6], &["v1", "v2"]);
        let needle =
            "v2\nSolve CPU Time: 2.5\n\tMaximum resident set size (kbytes): 2000\n".to_string();
        let replacement = "v2\nSolve CPU Time: 2.5\n".to_string();
        log = log.replacen(&needle, &replacement, 1);

        let phrases = strings(&["Solve CPU Time: ", "Maximum resident set size (kbytes): "]);
        let err = parse_log(&log, &strings(&["v1", "v2"]), &phrases).unwrap_err();
        match err {
            TedbenchError::ParseInconsistency { version, phrase, message } => {
                assert_eq!(version, "v2");
                assert_eq!(phrase, "Maximum resident set size (kbytes): ");
                assert!(message.contains("expected 2"));
            }
            other => panic!("expected ParseInconsistency, got {:?}", other),
        }
    }

    #[test]
    fn test_label_must_be_standalone_line() {
        // "v1" appearing inside another line must not claim the block
        let log = format!(
            "{}\nv1\nSolve CPU Time: 1.5\n\n{}\nrunning v1 again\nSolve CPU Time: 9.9\n\n",
            markers::size_announcement(2),
            markers::size_announcement(6),
        );
        let err = parse_log(
            &log,
            &strings(&["v1"]),
            &strings(&["Solve CPU Time: "]),
        )
        .unwrap_err();
        assert!(matches!(err, TedbenchError::ParseInconsistency { .. }));
    }

    #[test]
    fn test_interleaved_noise_is_ignored() {
        let log = format!(
            "{}\nv1\nmesh generated in 2 parts? no\nSolve CPU Time: 1.5\n\tMaximum resident set size (kbytes): 1000\n\n",
            markers::size_announcement(2)
        );
        // noise lines without the phrase are skipped entirely
        let data = parse_log(
            &log,
            &strings(&["v1"]),
            &strings(&["Solve CPU Time: "]),
        )
        .unwrap();
        assert_eq!(data.series["v1"]["Solve CPU Time: "], vec![MetricValue::Float(1.5)]);
    }
}
