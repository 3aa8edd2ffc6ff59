//! Command handler functions for the covrun CLI.
//!
//! These work offline on coverage documents already persisted by earlier
//! runs. Each `cmd_*` function returns its output as a `String`, making them
//! easy to test without capturing stdout.

use std::fmt::Write;
use std::path::Path;

use anyhow::{bail, Result};

use crate::collect::{Collector, UnifiedModel};
use crate::config::Options;
use crate::report::{self, build_writers, format_line_ranges, text, ReportOptions};
use crate::threshold;

/// Merge every document the options' `collect` patterns match under the
/// report directory.
pub fn load_model(options: &Options, base_dir: &Path) -> Result<UnifiedModel> {
    let coverage = &options.coverage;
    let report_dir = base_dir.join(&coverage.report_dir);
    let mut collector = if coverage.relativize {
        Collector::relativize_to(base_dir)
    } else {
        Collector::new()
    };
    let merged = collector.add_matching(&report_dir, &coverage.collect, &[])?;
    if merged == 0 {
        bail!(
            "No coverage documents matching [{}] in {}",
            coverage.collect.join(", "),
            report_dir.display()
        );
    }
    log::info!("Merged {merged} coverage documents from {}", report_dir.display());
    Ok(collector.finish())
}

/// Collect, write every configured report, then enforce thresholds.
pub fn cmd_report(options: &Options, base_dir: &Path) -> Result<String> {
    let model = load_model(options, base_dir)?;
    let coverage = &options.coverage;
    let report_options = ReportOptions {
        dir: base_dir.join(&coverage.report_dir),
        source_root: base_dir.to_path_buf(),
        watermarks: coverage.watermarks,
    };
    let kinds = coverage.report_kinds(&options.jasmine);
    let writers = build_writers(&kinds, coverage.print, &report_options);
    report::write_all(&writers, &model)?;
    threshold::enforce(&model, &coverage.thresholds)?;

    let names: Vec<&str> = kinds.iter().map(|k| k.as_str()).collect();
    Ok(format!(
        "Wrote [{}] for {} files to {}\n",
        names.join(", "),
        model.len(),
        report_options.dir.display()
    ))
}

/// Collect and enforce thresholds without writing anything.
pub fn cmd_check(options: &Options, base_dir: &Path) -> Result<String> {
    let model = load_model(options, base_dir)?;
    threshold::enforce(&model, &options.coverage.thresholds)?;
    Ok(format!("Coverage thresholds met for {} files\n", model.len()))
}

pub fn cmd_summary(options: &Options, base_dir: &Path) -> Result<String> {
    let model = load_model(options, base_dir)?;
    Ok(text::TextSummaryReport::render(&model))
}

pub fn cmd_files(options: &Options, base_dir: &Path) -> Result<String> {
    let model = load_model(options, base_dir)?;
    Ok(text::TextReport::render(&model))
}

pub fn cmd_uncovered(options: &Options, base_dir: &Path, source_file: &str) -> Result<String> {
    let model = load_model(options, base_dir)?;
    let Some(file) = model.get(source_file) else {
        return Ok(format!("No coverage data for '{}'\n", source_file));
    };

    let uncovered = file.uncovered_lines();
    if uncovered.is_empty() {
        return Ok(format!(
            "All instrumentable lines are covered in '{}'\n",
            source_file
        ));
    }

    let instrumentable: Vec<u32> = file.line_counts().into_keys().collect();
    let mut out = String::new();
    writeln!(out, "Uncovered lines in '{}':", source_file).unwrap();
    writeln!(out, "  {}", format_line_ranges(&uncovered, &instrumentable)).unwrap();
    writeln!(out, "  ({} lines)", uncovered.len()).unwrap();
    Ok(out)
}
