//! Per-metric totals for a file or a whole model.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::CovrunError;
use crate::model::{pct, FileCoverage};

/// The four metrics every summary carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Metric {
    Lines,
    Statements,
    Functions,
    Branches,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::Lines,
        Metric::Statements,
        Metric::Functions,
        Metric::Branches,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Lines => "lines",
            Metric::Statements => "statements",
            Metric::Functions => "functions",
            Metric::Branches => "branches",
        }
    }
}

impl FromStr for Metric {
    type Err = CovrunError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "lines" => Ok(Metric::Lines),
            "statements" => Ok(Metric::Statements),
            "functions" => Ok(Metric::Functions),
            "branches" => Ok(Metric::Branches),
            _ => Err(CovrunError::Config(format!(
                "unrecognized metric: '{}'. Supported: lines, statements, functions, branches",
                s
            ))),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Covered/total counts for one metric.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Totals {
    pub total: u64,
    pub covered: u64,
    pub pct: f64,
}

impl Totals {
    pub fn new(covered: u64, total: u64) -> Self {
        Self {
            total,
            covered,
            pct: pct(covered, total),
        }
    }

    fn add(&mut self, other: &Totals) {
        *self = Totals::new(self.covered + other.covered, self.total + other.total);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CoverageSummary {
    pub lines: Totals,
    pub statements: Totals,
    pub functions: Totals,
    pub branches: Totals,
}

impl Default for CoverageSummary {
    fn default() -> Self {
        let empty = Totals::new(0, 0);
        Self {
            lines: empty,
            statements: empty,
            functions: empty,
            branches: empty,
        }
    }
}

impl CoverageSummary {
    pub fn for_file(file: &FileCoverage) -> Self {
        let lines = file.line_counts();
        let line_hits = lines.values().filter(|c| **c > 0).count() as u64;

        let statement_hits = file
            .statement_map
            .keys()
            .filter(|idx| file.s.get(idx).copied().unwrap_or(0) > 0)
            .count() as u64;

        let function_hits = file
            .fn_map
            .keys()
            .filter(|idx| file.f.get(idx).copied().unwrap_or(0) > 0)
            .count() as u64;

        let mut branch_total = 0u64;
        let mut branch_hits = 0u64;
        for (idx, meta) in &file.branch_map {
            branch_total += meta.locations.len() as u64;
            if let Some(arms) = file.b.get(idx) {
                branch_hits += arms.iter().filter(|c| **c > 0).count() as u64;
            }
        }

        Self {
            lines: Totals::new(line_hits, lines.len() as u64),
            statements: Totals::new(statement_hits, file.statement_map.len() as u64),
            functions: Totals::new(function_hits, file.fn_map.len() as u64),
            branches: Totals::new(branch_hits, branch_total),
        }
    }

    pub fn metric(&self, metric: Metric) -> &Totals {
        match metric {
            Metric::Lines => &self.lines,
            Metric::Statements => &self.statements,
            Metric::Functions => &self.functions,
            Metric::Branches => &self.branches,
        }
    }

    pub fn merge(&mut self, other: &CoverageSummary) {
        self.lines.add(&other.lines);
        self.statements.add(&other.statements);
        self.functions.add(&other.functions);
        self.branches.add(&other.branches);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BranchMeta, FunctionMeta, Location};

    fn file() -> FileCoverage {
        let mut file = FileCoverage::new("a.js");
        for idx in 0..4u32 {
            file.statement_map.insert(idx, Location::lines(idx / 2 + 1, idx / 2 + 1));
        }
        file.s = [(0, 1), (1, 0), (2, 0), (3, 0)].into_iter().collect();
        file.fn_map.insert(
            0,
            FunctionMeta {
                name: "main".to_string(),
                line: 1,
                loc: Location::lines(1, 2),
                decl: None,
            },
        );
        file.f.insert(0, 2);
        file.branch_map.insert(
            0,
            BranchMeta {
                kind: "if".to_string(),
                line: 2,
                loc: None,
                locations: vec![Location::lines(2, 2), Location::lines(2, 2)],
            },
        );
        file.b.insert(0, vec![0, 3]);
        file
    }

    #[test]
    fn test_summary_for_file() {
        let summary = CoverageSummary::for_file(&file());
        assert_eq!(summary.statements, Totals::new(1, 4));
        assert_eq!(summary.lines, Totals::new(1, 2));
        assert_eq!(summary.functions.pct, 100.0);
        assert_eq!(summary.branches.pct, 50.0);
    }

    #[test]
    fn test_empty_file_is_fully_covered() {
        let summary = CoverageSummary::for_file(&FileCoverage::new("empty.js"));
        for metric in Metric::ALL {
            assert_eq!(summary.metric(metric).pct, 100.0);
        }
    }

    #[test]
    fn test_merge_recomputes_pct() {
        let mut total = CoverageSummary::for_file(&file());
        total.merge(&CoverageSummary::for_file(&FileCoverage::new("empty.js")));
        assert_eq!(total.statements.pct, 25.0);
    }
}
