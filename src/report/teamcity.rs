/// TeamCity build statistics as service messages.
///
/// Reference: https://www.jetbrains.com/help/teamcity/service-messages.html
use std::fmt::Write;

use super::{ReportKind, ReportWriter, Sink};
use crate::collect::UnifiedModel;
use crate::error::Result;

const BLOCK_NAME: &str = "Code Coverage Summary";

pub struct TeamcityReport {
    sink: Sink,
}

impl TeamcityReport {
    pub fn new(sink: Sink) -> Self {
        Self { sink }
    }

    #[must_use]
    pub fn render(model: &UnifiedModel) -> String {
        let summary = model.summary();
        let mut out = String::new();
        writeln!(out).unwrap();
        writeln!(out, "##teamcity[blockOpened name='{BLOCK_NAME}']").unwrap();
        for (key, value) in [
            ("CodeCoverageAbsBCovered", summary.branches.covered.to_string()),
            ("CodeCoverageAbsBTotal", summary.branches.total.to_string()),
            ("CodeCoverageB", summary.branches.pct.to_string()),
            ("CodeCoverageAbsMCovered", summary.functions.covered.to_string()),
            ("CodeCoverageAbsMTotal", summary.functions.total.to_string()),
            ("CodeCoverageM", summary.functions.pct.to_string()),
            ("CodeCoverageAbsLCovered", summary.lines.covered.to_string()),
            ("CodeCoverageAbsLTotal", summary.lines.total.to_string()),
            ("CodeCoverageL", summary.lines.pct.to_string()),
        ] {
            writeln!(out, "##teamcity[buildStatisticValue key='{key}' value='{value}']").unwrap();
        }
        writeln!(out, "##teamcity[blockClosed name='{BLOCK_NAME}']").unwrap();
        out
    }
}

impl ReportWriter for TeamcityReport {
    fn kind(&self) -> ReportKind {
        ReportKind::Teamcity
    }

    fn write_report(&self, model: &UnifiedModel) -> Result<()> {
        self.sink.emit(&Self::render(model))
    }
}
