#![allow(dead_code)]

use std::fmt::Write;
use std::path::{Path, PathBuf};

use covrun::instrument::{Instrumented, Instrumenter};
use covrun::model::{BranchMeta, CoverageDocument, FileCoverage, FunctionMeta, Location};
use tempfile::TempDir;

/// Source containing this marker fails to instrument.
pub const SYNTAX_ERROR: &str = "@@syntax-error";

/// Deterministic stand-in for an instrumenting compiler. Every non-blank line
/// is one statement; `function name(` lines also declare a function and, like
/// real instrumenters compensating for hoisting, start their statement at 1;
/// `if ` lines declare a two-arm branch.
pub struct FakeInstrumenter;

impl Instrumenter for FakeInstrumenter {
    fn instrument(
        &self,
        source: &str,
        path: &Path,
        coverage_variable: &str,
    ) -> anyhow::Result<Instrumented> {
        if source.contains(SYNTAX_ERROR) {
            anyhow::bail!("unexpected token in {}", path.display());
        }

        let mut coverage = FileCoverage::new(path.to_string_lossy());
        let mut code = String::new();
        let (mut s, mut f, mut b) = (0u32, 0u32, 0u32);
        for (idx, line) in source.lines().enumerate() {
            let text = line.trim();
            if text.is_empty() {
                writeln!(code, "{line}").unwrap();
                continue;
            }
            let line_no = idx as u32 + 1;
            let loc = Location::lines(line_no, line_no);
            coverage.statement_map.insert(s, loc);
            coverage.s.insert(s, 0);

            if let Some(rest) = text.strip_prefix("function ") {
                let name = rest.split('(').next().unwrap_or_default().to_string();
                coverage.fn_map.insert(
                    f,
                    FunctionMeta {
                        name,
                        line: line_no,
                        loc,
                        decl: None,
                    },
                );
                coverage.f.insert(f, 0);
                coverage.s.insert(s, 1);
                f += 1;
            }
            if text.starts_with("if ") {
                coverage.branch_map.insert(
                    b,
                    BranchMeta {
                        kind: "if".to_string(),
                        line: line_no,
                        loc: None,
                        locations: vec![loc, loc],
                    },
                );
                coverage.b.insert(b, vec![0, 0]);
                b += 1;
            }
            writeln!(code, "{coverage_variable}.s[{s}]++; {line}").unwrap();
            s += 1;
        }
        Ok(Instrumented { code, coverage })
    }
}

pub const SOURCE_A: &str = "\
function add(a, b) {
  return a + b;
}
if (add(1, 2) > 2) {
  console.log('big');
}
";

pub const SOURCE_B: &str = "\
function unused() {
  return 42;
}
";

/// A scratch project with `src/a.js` and `src/b.js`.
pub fn setup_project() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("src")).unwrap();
    std::fs::write(dir.path().join("src/a.js"), SOURCE_A).unwrap();
    std::fs::write(dir.path().join("src/b.js"), SOURCE_B).unwrap();
    dir
}

/// Coverage for `source` as instrumented, keyed under `path`.
pub fn instrumented(source: &str, path: &str) -> FileCoverage {
    FakeInstrumenter
        .instrument(source, Path::new(path), "$$cov_test$$")
        .unwrap()
        .coverage
}

/// A file with `counts.len()` single-line statements.
pub fn statements(path: &str, counts: &[u64]) -> FileCoverage {
    let mut file = FileCoverage::new(path);
    for (idx, count) in counts.iter().enumerate() {
        let idx = idx as u32;
        file.statement_map.insert(idx, Location::lines(idx + 1, idx + 1));
        file.s.insert(idx, *count);
    }
    file
}

pub fn write_document(path: &Path, files: Vec<FileCoverage>) -> PathBuf {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let doc: CoverageDocument = files.into_iter().collect();
    doc.write(path).unwrap();
    path.to_path_buf()
}
