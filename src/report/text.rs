use std::fmt::Write;

use super::{format_line_ranges, ReportKind, ReportWriter, Sink};
use crate::collect::UnifiedModel;
use crate::error::Result;
use crate::summary::{CoverageSummary, Totals};

/// Per-file table with uncovered line ranges.
pub struct TextReport {
    sink: Sink,
}

impl TextReport {
    pub fn new(sink: Sink) -> Self {
        Self { sink }
    }

    #[must_use]
    pub fn render(model: &UnifiedModel) -> String {
        let mut out = String::new();
        let rule = "-".repeat(110);
        writeln!(
            out,
            "{:<50} {:>8} {:>8} {:>8} {:>8}  UNCOVERED LINES",
            "FILE", "% STMTS", "% BRANCH", "% FUNCS", "% LINES"
        )
        .unwrap();
        writeln!(out, "{rule}").unwrap();

        let total = model.summary();
        write_row(&mut out, "All files", &total, "");

        for file in model.files() {
            let summary = CoverageSummary::for_file(file);
            let instrumentable: Vec<u32> = file.line_counts().into_keys().collect();
            let uncovered = format_line_ranges(&file.uncovered_lines(), &instrumentable);
            write_row(&mut out, &format!(" {}", file.path), &summary, &uncovered);
        }
        writeln!(out, "{rule}").unwrap();
        out
    }
}

fn write_row(out: &mut String, label: &str, summary: &CoverageSummary, uncovered: &str) {
    writeln!(
        out,
        "{:<50} {:>8.2} {:>8.2} {:>8.2} {:>8.2}  {}",
        label,
        summary.statements.pct,
        summary.branches.pct,
        summary.functions.pct,
        summary.lines.pct,
        uncovered
    )
    .unwrap();
}

impl ReportWriter for TextReport {
    fn kind(&self) -> ReportKind {
        ReportKind::Text
    }

    fn write_report(&self, model: &UnifiedModel) -> Result<()> {
        self.sink.emit(&Self::render(model))
    }
}

/// Totals for the whole model.
pub struct TextSummaryReport {
    sink: Sink,
}

impl TextSummaryReport {
    pub fn new(sink: Sink) -> Self {
        Self { sink }
    }

    #[must_use]
    pub fn render(model: &UnifiedModel) -> String {
        let summary = model.summary();
        let mut out = String::new();
        writeln!(out).unwrap();
        writeln!(out, "{:=^80}", " Coverage summary ").unwrap();
        summary_line(&mut out, "Statements", &summary.statements);
        summary_line(&mut out, "Branches", &summary.branches);
        summary_line(&mut out, "Functions", &summary.functions);
        summary_line(&mut out, "Lines", &summary.lines);
        writeln!(out, "{}", "=".repeat(80)).unwrap();
        out
    }
}

fn summary_line(out: &mut String, label: &str, totals: &Totals) {
    writeln!(
        out,
        "{:<13}: {}% ( {}/{} )",
        label, totals.pct, totals.covered, totals.total
    )
    .unwrap();
}

impl ReportWriter for TextSummaryReport {
    fn kind(&self) -> ReportKind {
        ReportKind::TextSummary
    }

    fn write_report(&self, model: &UnifiedModel) -> Result<()> {
        self.sink.emit(&Self::render(model))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CoverageDocument, FileCoverage, Location};

    fn model() -> UnifiedModel {
        let mut file = FileCoverage::new("src/a.js");
        for line in 1..=5u32 {
            file.statement_map.insert(line - 1, Location::lines(line, line));
            file.s.insert(line - 1, u64::from(line <= 2));
        }
        std::iter::once(file).collect::<CoverageDocument>().into()
    }

    #[test]
    fn test_text_lists_uncovered_ranges() {
        let out = TextReport::render(&model());
        assert!(out.contains("All files"));
        assert!(out.contains(" src/a.js"));
        assert!(out.contains("40.00"));
        assert!(out.contains("3-5"));
    }

    #[test]
    fn test_text_summary() {
        let out = TextSummaryReport::render(&model());
        assert!(out.contains("Coverage summary"));
        assert!(out.contains("Statements   : 40% ( 2/5 )"));
        assert!(out.contains("Branches     : 100% ( 0/0 )"));
    }

    #[test]
    fn test_writes_to_file_sink() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/coverage.txt");
        TextSummaryReport::new(Sink::File(path.clone()))
            .write_report(&model())
            .unwrap();
        let written = std::fs::read_to_string(path).unwrap();
        assert!(written.contains("Lines        : 40%"));
    }
}
