mod common;

use common::{setup_project, FakeInstrumenter, SOURCE_A, SYNTAX_ERROR};
use covrun::backfill::include_all_sources;
use covrun::error::CovrunError;
use covrun::instrument::Instrumenter;
use covrun::matcher::Matcher;
use covrun::model::CoverageDocument;
use pretty_assertions::assert_eq;

fn matcher(root: &std::path::Path, excludes: &[&str]) -> Matcher {
    let excludes: Vec<String> = excludes.iter().map(|e| e.to_string()).collect();
    Matcher::new(root, &["**/*.js".to_string()], &excludes).unwrap()
}

#[test]
fn test_unloaded_files_are_added_with_zero_counts() {
    let dir = setup_project();
    let mut doc = CoverageDocument::new();

    let added = include_all_sources(
        &mut doc,
        &matcher(dir.path(), &[]),
        &FakeInstrumenter,
        "$$cov_1$$",
    )
    .unwrap();
    assert_eq!(added, 2);

    let b = doc
        .get(&dir.path().join("src/b.js").to_string_lossy())
        .unwrap();
    assert_eq!(b.statement_map.len(), 3);
    // The function declaration was pre-seeded to 1 by the instrumenter.
    assert!(b.s.values().all(|c| *c == 0));
    assert!(b.f.values().all(|c| *c == 0));
}

#[test]
fn test_loaded_files_are_left_alone() {
    let dir = setup_project();
    let a_path = dir.path().join("src/a.js");
    let mut loaded = FakeInstrumenter
        .instrument(SOURCE_A, &a_path, "$$cov_1$$")
        .unwrap()
        .coverage;
    loaded.s.insert(1, 4);
    let mut doc: CoverageDocument = std::iter::once(loaded.clone()).collect();

    let added = include_all_sources(
        &mut doc,
        &matcher(dir.path(), &[]),
        &FakeInstrumenter,
        "$$cov_1$$",
    )
    .unwrap();
    assert_eq!(added, 1);
    assert_eq!(doc.get(&a_path.to_string_lossy()), Some(&loaded));
}

#[test]
fn test_excluded_and_dependency_files_are_skipped() {
    let dir = setup_project();
    std::fs::create_dir_all(dir.path().join("node_modules/dep")).unwrap();
    std::fs::write(dir.path().join("node_modules/dep/index.js"), "x();\n").unwrap();
    let mut doc = CoverageDocument::new();

    let added = include_all_sources(
        &mut doc,
        &matcher(dir.path(), &["src/b.js"]),
        &FakeInstrumenter,
        "$$cov_1$$",
    )
    .unwrap();
    assert_eq!(added, 1);
    assert_eq!(
        doc.paths().collect::<Vec<_>>(),
        vec![dir.path().join("src/a.js").to_string_lossy().into_owned()]
    );
}

#[test]
fn test_instrumentation_failure_propagates() {
    let dir = setup_project();
    std::fs::write(dir.path().join("src/broken.js"), SYNTAX_ERROR).unwrap();
    let mut doc = CoverageDocument::new();

    let err = include_all_sources(
        &mut doc,
        &matcher(dir.path(), &[]),
        &FakeInstrumenter,
        "$$cov_1$$",
    )
    .unwrap_err();
    assert!(matches!(err, CovrunError::Instrumentation { ref path, .. } if path.ends_with("broken.js")));
}
