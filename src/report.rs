//! Series aggregation and chart rendering
//!
//! Parsed logs from one or more config files are merged into an explicit
//! [`Aggregate`] value (threaded through the pipeline, never a global), then
//! rendered one chart per metric phrase with one line per run key. Run keys
//! are version labels, suffixed with the source stem when more than one file
//! is merged.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use plotters::prelude::*;
use serde_json::json;

use crate::config::PEAK_MEMORY_PHRASE;
use crate::error::{Result, TedbenchError};
use crate::logparse::{LogData, MetricValue};

/// One source argument of the graph command: a config path optionally
/// followed by `:<run label>` selectors; no selector means every version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSpec {
    pub path: PathBuf,
    /// Requested version labels; empty means all
    pub runs: Vec<String>,
}

/// Parse `path.csv[:run1[:run2...]]`
pub fn parse_source_arg(arg: &str) -> SourceSpec {
    match arg.split_once(':') {
        Some((path, runs)) => SourceSpec {
            path: PathBuf::from(path),
            runs: runs.split(':').map(str::to_string).collect(),
        },
        None => SourceSpec {
            path: PathBuf::from(arg),
            runs: Vec::new(),
        },
    }
}

/// All series for one run key
#[derive(Debug, Clone)]
pub struct RunSeries {
    pub numtets: Vec<u64>,
    /// phrase -> one value per problem size
    pub values: Vec<(String, Vec<MetricValue>)>,
}

impl RunSeries {
    fn phrase_values(&self, phrase: &str) -> Option<&[MetricValue]> {
        self.values
            .iter()
            .find(|(p, _)| p == phrase)
            .map(|(_, v)| v.as_slice())
    }
}

/// Merged series across all source files, in insertion order
#[derive(Debug, Clone, Default)]
pub struct Aggregate {
    phrases: Vec<String>,
    runs: Vec<(String, RunSeries)>,
}

impl Aggregate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one parsed log into the aggregate. `phrases` carries the capture
    /// order (the parser's map is sorted); `disambiguate` suffixes run keys
    /// with the source stem.
    pub fn merge_file(
        &mut self,
        stem: &str,
        data: &LogData,
        versions: &[String],
        phrases: &[String],
        disambiguate: bool,
    ) -> Result<()> {
        for phrase in phrases {
            if !self.phrases.contains(phrase) {
                self.phrases.push(phrase.clone());
            }
        }
        for version in versions {
            let run_key = if disambiguate {
                format!("{} ({})", version, stem)
            } else {
                version.clone()
            };
            if self.runs.iter().any(|(key, _)| *key == run_key) {
                return Err(TedbenchError::Config {
                    message: format!("duplicate run key '{}'", run_key),
                });
            }
            let per_phrase = data.series.get(version).ok_or_else(|| {
                TedbenchError::ParseInconsistency {
                    version: version.clone(),
                    phrase: String::new(),
                    message: "version missing from parsed log".to_string(),
                }
            })?;
            let values = phrases
                .iter()
                .filter_map(|phrase| {
                    per_phrase
                        .get(phrase)
                        .map(|v| (phrase.clone(), v.clone()))
                })
                .collect();
            self.runs.push((
                run_key,
                RunSeries {
                    numtets: data.numtets.clone(),
                    values,
                },
            ));
        }
        Ok(())
    }

    pub fn phrases(&self) -> &[String] {
        &self.phrases
    }

    pub fn runs(&self) -> &[(String, RunSeries)] {
        &self.runs
    }

    /// Machine-readable dump of every merged series
    pub fn to_json(&self) -> serde_json::Value {
        let runs: Vec<serde_json::Value> = self
            .runs
            .iter()
            .map(|(key, series)| {
                let values: serde_json::Map<String, serde_json::Value> = series
                    .values
                    .iter()
                    .map(|(phrase, v)| {
                        (phrase.clone(), serde_json::to_value(v).unwrap_or_default())
                    })
                    .collect();
                json!({
                    "run": key,
                    "numtets": series.numtets,
                    "series": values,
                })
            })
            .collect();
        json!({ "phrases": self.phrases, "runs": runs })
    }

    /// Plain-text summary, one table row per (run, phrase)
    pub fn format_table(&self) -> String {
        let mut out = String::new();
        for (key, series) in &self.runs {
            let _ = writeln!(out, "{}", key);
            let _ = writeln!(
                out,
                "  numtets: {}",
                series
                    .numtets
                    .iter()
                    .map(|n| n.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            for (phrase, values) in &series.values {
                let format = phrase_format(phrase);
                let rendered: Vec<String> = values
                    .iter()
                    .map(|v| format!("{:.4}", v.as_f64() / format.divisor))
                    .collect();
                let _ = writeln!(
                    out,
                    "  {} ({}): {}",
                    format.display,
                    if format.unit.is_empty() { "-" } else { &format.unit },
                    rendered.join(", ")
                );
            }
        }
        out
    }
}

/// Display name, unit, and raw-value divisor for a metric phrase
pub struct PhraseFormat {
    pub display: String,
    pub unit: String,
    pub divisor: f64,
}

/// Unit-conversion/display table. Unknown phrases pass through unscaled.
pub fn phrase_format(phrase: &str) -> PhraseFormat {
    let (display, unit, divisor) = match phrase {
        "InputXml CPU Time: " => ("InputXml time", "s", 1.0),
        "OutputVtk CPU Time: " => ("OutputVtu time", "s", 1.0),
        "Solve CPU Time: " => ("Solve time", "s", 1.0),
        PEAK_MEMORY_PHRASE => ("Peak ram usage", "GB", 1e6),
        other => (other.trim().trim_end_matches(':').trim_end(), "", 1.0),
    };
    PhraseFormat {
        display: display.to_string(),
        unit: unit.to_string(),
        divisor,
    }
}

/// Chart options shared by every phrase plot of one invocation
#[derive(Debug, Clone, Default)]
pub struct PlotOptions {
    /// Log-log axes
    pub log_axes: bool,
    /// Inserted into the file name before the axis-mode suffix
    pub suffix: String,
    /// Display labels overriding run keys, in run order
    pub custom_labels: Vec<String>,
    /// Benchmark title appended to chart captions (single-source mode)
    pub title_context: Option<String>,
}

/// Deterministic, collision-free chart file name for a phrase + axis mode
pub fn chart_file_name(phrase: &str, options: &PlotOptions) -> String {
    let format = phrase_format(phrase);
    let sanitized = format.display.to_lowercase().replace(' ', "_");
    let mode = if options.log_axes { "_log" } else { "" };
    format!("{}{}{}.png", sanitized, options.suffix, mode)
}

fn plot_error(e: impl std::fmt::Display) -> TedbenchError {
    TedbenchError::Plot {
        message: e.to_string(),
    }
}

/// Render one chart for `phrase` into `out_dir`; returns the written path
pub fn plot_phrase(
    out_dir: &Path,
    phrase: &str,
    aggregate: &Aggregate,
    options: &PlotOptions,
) -> Result<PathBuf> {
    let format = phrase_format(phrase);
    let out_path = out_dir.join(chart_file_name(phrase, options));

    // collect (label, points) for every run carrying this phrase
    let mut lines: Vec<(String, Vec<(f64, f64)>)> = Vec::new();
    for (i, (run_key, series)) in aggregate.runs().iter().enumerate() {
        let Some(values) = series.phrase_values(phrase) else {
            continue;
        };
        let label = options
            .custom_labels
            .get(i)
            .cloned()
            .unwrap_or_else(|| run_key.clone());
        let points: Vec<(f64, f64)> = series
            .numtets
            .iter()
            .zip(values.iter())
            .map(|(&x, v)| (x as f64, v.as_f64() / format.divisor))
            .collect();
        lines.push((label, points));
    }
    if lines.is_empty() {
        return Err(TedbenchError::Plot {
            message: format!("no series to plot for phrase '{}'", phrase),
        });
    }

    let title = match &options.title_context {
        Some(context) => format!("{} - {}", format.display, context),
        None => format.display.clone(),
    };
    let y_desc = if format.unit.is_empty() {
        format.display.clone()
    } else {
        format!("{} ({})", format.display, format.unit)
    };

    let (mut x_min, mut x_max) = (f64::MAX, f64::MIN);
    let (mut y_min, mut y_max) = (f64::MAX, f64::MIN);
    for (_, points) in &lines {
        for &(x, y) in points {
            x_min = x_min.min(x);
            x_max = x_max.max(x);
            y_min = y_min.min(y);
            y_max = y_max.max(y);
        }
    }

    let root = BitMapBackend::new(&out_path, (1050, 750)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_error)?;

    if options.log_axes {
        // log scales need strictly positive bounds
        let x_lo = (x_min * 0.9).max(1e-9);
        let y_lo = (y_min * 0.9).max(1e-9);
        let mut chart = ChartBuilder::on(&root)
            .caption(&title, ("sans-serif", 24))
            .margin(12)
            .x_label_area_size(46)
            .y_label_area_size(68)
            .build_cartesian_2d(
                (x_lo..x_max * 1.1).log_scale(),
                (y_lo..y_max * 1.1).log_scale(),
            )
            .map_err(plot_error)?;
        chart
            .configure_mesh()
            .x_desc("Number of tets")
            .y_desc(&y_desc)
            .draw()
            .map_err(plot_error)?;
        for (i, (label, points)) in lines.iter().enumerate() {
            let color = Palette99::pick(i).mix(0.95);
            chart
                .draw_series(LineSeries::new(
                    points.iter().copied(),
                    color.stroke_width(2),
                ))
                .map_err(plot_error)?
                .label(label)
                .legend(move |(x, y)| {
                    PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2))
                });
            chart
                .draw_series(
                    points
                        .iter()
                        .map(|&(x, y)| Circle::new((x, y), 4, color.filled())),
                )
                .map_err(plot_error)?;
        }
        chart
            .configure_series_labels()
            .border_style(BLACK)
            .background_style(WHITE.mix(0.8))
            .draw()
            .map_err(plot_error)?;
    } else {
        let y_pad = 0.05 * (y_max - y_min).max(f64::EPSILON);
        let mut chart = ChartBuilder::on(&root)
            .caption(&title, ("sans-serif", 24))
            .margin(12)
            .x_label_area_size(46)
            .y_label_area_size(68)
            .build_cartesian_2d(x_min..x_max * 1.02, (y_min - y_pad)..(y_max + y_pad))
            .map_err(plot_error)?;
        chart
            .configure_mesh()
            .x_desc("Number of tets")
            .y_desc(&y_desc)
            .draw()
            .map_err(plot_error)?;
        for (i, (label, points)) in lines.iter().enumerate() {
            let color = Palette99::pick(i).mix(0.95);
            chart
                .draw_series(LineSeries::new(
                    points.iter().copied(),
                    color.stroke_width(2),
                ))
                .map_err(plot_error)?
                .label(label)
                .legend(move |(x, y)| {
                    PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2))
                });
            chart
                .draw_series(
                    points
                        .iter()
                        .map(|&(x, y)| Circle::new((x, y), 4, color.filled())),
                )
                .map_err(plot_error)?;
        }
        chart
            .configure_series_labels()
            .border_style(BLACK)
            .background_style(WHITE.mix(0.8))
            .draw()
            .map_err(plot_error)?;
    }

    root.present().map_err(plot_error)?;
    drop(root);
    Ok(out_path)
}
