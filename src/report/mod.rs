//! Report writers. Each variant renders a [`UnifiedModel`] to a file under the
//! report directory or to the console. The set of variants is closed
//! ([`ReportKind`]); callers only ever see the [`ReportWriter`] capability.

pub mod clover;
pub mod html;
pub mod json;
pub mod lcov;
pub mod teamcity;
pub mod text;

use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;

use crate::collect::UnifiedModel;
use crate::error::{CovrunError, Result};
use crate::summary::Metric;

/// Every report variant implements this trait.
pub trait ReportWriter: Send + Sync {
    fn kind(&self) -> ReportKind;

    /// Render the model to this writer's destination.
    fn write_report(&self, model: &UnifiedModel) -> Result<()>;
}

/// Supported report formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum ReportKind {
    #[serde(rename = "text")]
    Text,
    #[serde(rename = "text-summary")]
    TextSummary,
    #[serde(rename = "lcov")]
    Lcov,
    #[serde(rename = "lcovonly")]
    LcovOnly,
    #[serde(rename = "html")]
    Html,
    #[serde(rename = "clover")]
    Clover,
    #[serde(rename = "json")]
    Json,
    #[serde(rename = "json-summary")]
    JsonSummary,
    #[serde(rename = "teamcity")]
    Teamcity,
    #[serde(rename = "none")]
    None,
}

impl ReportKind {
    pub const ALL: [ReportKind; 10] = [
        ReportKind::Text,
        ReportKind::TextSummary,
        ReportKind::Lcov,
        ReportKind::LcovOnly,
        ReportKind::Html,
        ReportKind::Clover,
        ReportKind::Json,
        ReportKind::JsonSummary,
        ReportKind::Teamcity,
        ReportKind::None,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::Text => "text",
            ReportKind::TextSummary => "text-summary",
            ReportKind::Lcov => "lcov",
            ReportKind::LcovOnly => "lcovonly",
            ReportKind::Html => "html",
            ReportKind::Clover => "clover",
            ReportKind::Json => "json",
            ReportKind::JsonSummary => "json-summary",
            ReportKind::Teamcity => "teamcity",
            ReportKind::None => "none",
        }
    }
}

impl FromStr for ReportKind {
    type Err = CovrunError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        ReportKind::ALL
            .iter()
            .find(|k| k.as_str() == s.to_lowercase())
            .copied()
            .ok_or_else(|| {
                let supported: Vec<&str> = ReportKind::ALL.iter().map(|k| k.as_str()).collect();
                CovrunError::Config(format!(
                    "Unknown report format: '{}'. Supported: {}",
                    s,
                    supported.join(", ")
                ))
            })
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which summaries are duplicated to the console.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Print {
    None,
    #[default]
    Summary,
    Detail,
    Both,
}

/// Low/high percentage bounds used to classify a metric.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct Watermarks {
    pub statements: [f64; 2],
    pub branches: [f64; 2],
    pub functions: [f64; 2],
    pub lines: [f64; 2],
}

impl Default for Watermarks {
    fn default() -> Self {
        Self {
            statements: [50.0, 80.0],
            branches: [50.0, 80.0],
            functions: [50.0, 80.0],
            lines: [50.0, 80.0],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    Medium,
    High,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Low => "low",
            Level::Medium => "medium",
            Level::High => "high",
        }
    }
}

impl Watermarks {
    pub fn level(&self, metric: Metric, pct: f64) -> Level {
        let [low, high] = match metric {
            Metric::Statements => self.statements,
            Metric::Branches => self.branches,
            Metric::Functions => self.functions,
            Metric::Lines => self.lines,
        };
        if pct < low {
            Level::Low
        } else if pct >= high {
            Level::High
        } else {
            Level::Medium
        }
    }
}

/// Settings shared by every writer.
#[derive(Debug, Clone)]
pub struct ReportOptions {
    /// Directory file-based reports are written into.
    pub dir: PathBuf,
    /// Base for resolving relative source paths when a report shows source.
    pub source_root: PathBuf,
    pub watermarks: Watermarks,
}

/// Where a text-producing writer sends its output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sink {
    Console,
    File(PathBuf),
}

impl Sink {
    pub fn emit(&self, content: &str) -> Result<()> {
        match self {
            Sink::Console => {
                let mut out = std::io::stdout().lock();
                out.write_all(content.as_bytes())?;
                out.flush()?;
            }
            Sink::File(path) => write_file(path, content.as_bytes())?,
        }
        Ok(())
    }
}

pub(crate) fn write_file(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    Ok(())
}

/// Instantiate the writers for the requested formats, plus the console
/// summaries selected by `print`.
pub fn build_writers(
    kinds: &[ReportKind],
    print: Print,
    options: &ReportOptions,
) -> Vec<Box<dyn ReportWriter>> {
    let dir = &options.dir;
    let mut writers: Vec<Box<dyn ReportWriter>> = Vec::new();
    for kind in kinds {
        match kind {
            ReportKind::Text => writers.push(Box::new(text::TextReport::new(Sink::File(
                dir.join("coverage.txt"),
            )))),
            ReportKind::TextSummary => writers.push(Box::new(text::TextSummaryReport::new(
                Sink::File(dir.join("coverage-summary.txt")),
            ))),
            ReportKind::Lcov => {
                writers.push(Box::new(lcov::LcovReport::new(dir.join("lcov.info"))));
                writers.push(Box::new(html::HtmlReport::new(
                    dir.join("lcov-report"),
                    options,
                )));
            }
            ReportKind::LcovOnly => {
                writers.push(Box::new(lcov::LcovReport::new(dir.join("lcov.info"))))
            }
            ReportKind::Html => writers.push(Box::new(html::HtmlReport::new(dir.clone(), options))),
            ReportKind::Clover => {
                writers.push(Box::new(clover::CloverReport::new(dir.join("clover.xml"))))
            }
            ReportKind::Json => writers.push(Box::new(json::JsonReport::new(
                dir.join("coverage-final.json"),
            ))),
            ReportKind::JsonSummary => writers.push(Box::new(json::JsonSummaryReport::new(
                dir.join("coverage-summary.json"),
            ))),
            ReportKind::Teamcity => {
                writers.push(Box::new(teamcity::TeamcityReport::new(Sink::Console)))
            }
            ReportKind::None => {}
        }
    }

    if matches!(print, Print::Detail | Print::Both) {
        writers.push(Box::new(text::TextReport::new(Sink::Console)));
    }
    if matches!(print, Print::Summary | Print::Both) {
        writers.push(Box::new(text::TextSummaryReport::new(Sink::Console)));
    }
    writers
}

/// Run every writer in order, stopping at the first failure.
pub fn write_all(writers: &[Box<dyn ReportWriter>], model: &UnifiedModel) -> Result<()> {
    for writer in writers {
        log::debug!("Writing {} report", writer.kind());
        writer.write_report(model)?;
    }
    Ok(())
}

/// Maximum number of consecutive non-instrumentable lines that can be bridged
/// when coalescing uncovered ranges.
const MAX_BRIDGE_GAP: u32 = 2;

/// Coalesce sorted line numbers into `(start, end)` ranges, bridging small
/// gaps where every line in the gap is non-instrumentable.
///
/// Both `lines` and `all_instrumentable` must be sorted and deduplicated.
#[must_use]
pub fn coalesce_ranges(lines: &[u32], all_instrumentable: &[u32]) -> Vec<(u32, u32)> {
    if lines.is_empty() {
        return Vec::new();
    }

    debug_assert!(
        lines.windows(2).all(|w| w[0] < w[1]),
        "coalesce_ranges requires sorted, deduplicated input"
    );

    let mut ranges: Vec<(u32, u32)> = Vec::new();
    let mut start = lines[0];
    let mut end = lines[0];

    for &line in &lines[1..] {
        let gap = line - end - 1;
        if gap <= MAX_BRIDGE_GAP
            && (end + 1..line).all(|l| all_instrumentable.binary_search(&l).is_err())
        {
            end = line;
        } else {
            ranges.push((start, end));
            start = line;
            end = line;
        }
    }

    ranges.push((start, end));
    ranges
}

/// Format line numbers into compact range notation, e.g. "1, 3-5, 8".
#[must_use]
pub fn format_line_ranges(lines: &[u32], all_instrumentable: &[u32]) -> String {
    coalesce_ranges(lines, all_instrumentable)
        .iter()
        .map(|&(start, end)| {
            if start == end {
                start.to_string()
            } else {
                format!("{start}-{end}")
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}
