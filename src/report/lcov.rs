/// Writer for the LCOV `.info` format.
///
/// Reference: https://ltp.sourceforge.net/coverage/lcov/geninfo.1.php
///
/// Records emitted per file, in order:
///   TN:
///   SF:<path>
///   FN:<line>,<function name>
///   FNDA:<execution count>,<function name>
///   FNF / FNH
///   DA:<line number>,<execution count>
///   LF / LH
///   BRDA:<line>,<block>,<branch>,<taken>
///   BRF / BRH
///   end_of_record
use std::fmt::Write;
use std::path::PathBuf;

use super::{write_file, ReportKind, ReportWriter};
use crate::collect::UnifiedModel;
use crate::error::Result;
use crate::model::{BranchMeta, FileCoverage, FunctionMeta};

pub struct LcovReport {
    path: PathBuf,
}

impl LcovReport {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    #[must_use]
    pub fn render(model: &UnifiedModel) -> String {
        let mut out = String::new();
        for file in model.files() {
            write_file_record(&mut out, file);
        }
        out
    }
}

impl ReportWriter for LcovReport {
    fn kind(&self) -> ReportKind {
        ReportKind::LcovOnly
    }

    fn write_report(&self, model: &UnifiedModel) -> Result<()> {
        write_file(&self.path, Self::render(model).as_bytes())
    }
}

fn write_file_record(out: &mut String, file: &FileCoverage) {
    writeln!(out, "TN:").unwrap();
    writeln!(out, "SF:{}", file.path).unwrap();

    for meta in file.fn_map.values() {
        writeln!(out, "FN:{},{}", function_line(meta), meta.name).unwrap();
    }
    let mut functions_hit = 0;
    for (idx, meta) in &file.fn_map {
        let count = file.f.get(idx).copied().unwrap_or(0);
        if count > 0 {
            functions_hit += 1;
        }
        writeln!(out, "FNDA:{},{}", count, meta.name).unwrap();
    }
    writeln!(out, "FNF:{}", file.fn_map.len()).unwrap();
    writeln!(out, "FNH:{functions_hit}").unwrap();

    let lines = file.line_counts();
    for (line, count) in &lines {
        writeln!(out, "DA:{line},{count}").unwrap();
    }
    writeln!(out, "LF:{}", lines.len()).unwrap();
    writeln!(out, "LH:{}", lines.values().filter(|c| **c > 0).count()).unwrap();

    let mut branches_found = 0;
    let mut branches_hit = 0;
    for (idx, meta) in &file.branch_map {
        let line = branch_line(meta);
        let arms = file.b.get(idx);
        for arm in 0..meta.locations.len() {
            let taken = arms.and_then(|a| a.get(arm)).copied().unwrap_or(0);
            branches_found += 1;
            if taken > 0 {
                branches_hit += 1;
            }
            writeln!(out, "BRDA:{line},{idx},{arm},{taken}").unwrap();
        }
    }
    writeln!(out, "BRF:{branches_found}").unwrap();
    writeln!(out, "BRH:{branches_hit}").unwrap();
    writeln!(out, "end_of_record").unwrap();
}

pub(crate) fn function_line(meta: &FunctionMeta) -> u32 {
    if meta.line > 0 {
        return meta.line;
    }
    meta.decl.unwrap_or(meta.loc).start.line
}

pub(crate) fn branch_line(meta: &BranchMeta) -> u32 {
    if meta.line > 0 {
        return meta.line;
    }
    meta.loc
        .or_else(|| meta.locations.first().copied())
        .map(|loc| loc.start.line)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CoverageDocument, Location};

    fn model() -> UnifiedModel {
        let mut file = FileCoverage::new("src/lib.js");
        file.statement_map.insert(0, Location::lines(1, 1));
        file.statement_map.insert(1, Location::lines(2, 2));
        file.statement_map.insert(2, Location::lines(3, 3));
        file.s = [(0, 5), (1, 5), (2, 0)].into_iter().collect();
        file.fn_map.insert(
            0,
            FunctionMeta {
                name: "main".to_string(),
                line: 0,
                loc: Location::lines(1, 3),
                decl: Some(Location::lines(1, 1)),
            },
        );
        file.f.insert(0, 5);
        file.branch_map.insert(
            0,
            BranchMeta {
                kind: "if".to_string(),
                line: 2,
                loc: None,
                locations: vec![Location::lines(2, 2), Location::lines(3, 3)],
            },
        );
        file.b.insert(0, vec![5, 0]);
        std::iter::once(file).collect::<CoverageDocument>().into()
    }

    #[test]
    fn test_render_lcov_record() {
        let out = LcovReport::render(&model());
        let expected = "\
TN:
SF:src/lib.js
FN:1,main
FNDA:5,main
FNF:1
FNH:1
DA:1,5
DA:2,5
DA:3,0
LF:3
LH:2
BRDA:2,0,0,5
BRDA:2,0,1,0
BRF:2
BRH:1
end_of_record
";
        assert_eq!(out, expected);
    }

    #[test]
    fn test_write_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deep/lcov.info");
        LcovReport::new(path.clone()).write_report(&model()).unwrap();
        assert!(std::fs::read_to_string(path).unwrap().starts_with("TN:"));
    }
}
