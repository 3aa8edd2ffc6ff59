mod common;

use std::path::Path;

use common::{statements, write_document};
use covrun::collect::Collector;
use covrun::error::CovrunError;
use covrun::model::{CoverageDocument, FileCoverage};
use pretty_assertions::assert_eq;

fn counts(file: &FileCoverage) -> Vec<u64> {
    file.s.values().copied().collect()
}

fn document(files: Vec<FileCoverage>) -> CoverageDocument {
    files.into_iter().collect()
}

#[test]
fn test_counts_sum_index_wise() {
    let mut collector = Collector::new();
    collector
        .add(document(vec![statements("a.js", &[1, 0, 2])]))
        .unwrap();
    collector
        .add(document(vec![statements("a.js", &[0, 3, 1])]))
        .unwrap();
    let model = collector.finish();
    assert_eq!(counts(model.get("a.js").unwrap()), vec![1, 3, 3]);
}

#[test]
fn test_merge_order_is_irrelevant() {
    let docs = [
        document(vec![statements("a.js", &[1, 0, 2]), statements("b.js", &[4])]),
        document(vec![statements("a.js", &[0, 3, 1])]),
        document(vec![statements("b.js", &[1]), statements("c.js", &[0, 0])]),
    ];

    let mut forward = Collector::new();
    for doc in docs.iter().cloned() {
        forward.add(doc).unwrap();
    }
    let mut backward = Collector::new();
    for doc in docs.iter().rev().cloned() {
        backward.add(doc).unwrap();
    }
    assert_eq!(forward.finish().document(), backward.finish().document());
}

#[test]
fn test_relativize_joins_paths_from_different_directories() {
    let base = Path::new("/work/proj");
    let first = document(vec![statements("/work/proj/src/a.js", &[1, 0])]);
    let second = document(vec![statements("/work/proj/test/../src/a.js", &[0, 1])]);

    let mut relative = Collector::relativize_to(base);
    relative.add(first.clone()).unwrap();
    relative.add(second.clone()).unwrap();
    let model = relative.finish();
    assert_eq!(model.len(), 1);
    assert_eq!(counts(model.get("src/a.js").unwrap()), vec![1, 1]);

    let mut verbatim = Collector::new();
    verbatim.add(first).unwrap();
    verbatim.add(second).unwrap();
    assert_eq!(verbatim.finish().len(), 2);
}

#[test]
fn test_collects_matching_documents_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    write_document(
        &dir.path().join("coverage-1.json"),
        vec![statements("a.js", &[1, 0])],
    );
    write_document(
        &dir.path().join("nested/coverage-2.json"),
        vec![statements("a.js", &[0, 2])],
    );
    write_document(
        &dir.path().join("unrelated.json"),
        vec![statements("a.js", &[9, 9])],
    );

    let mut collector = Collector::new();
    let merged = collector
        .add_matching(
            dir.path(),
            &["coverage*.json".to_string(), "nested/*.json".to_string()],
            &[],
        )
        .unwrap();
    assert_eq!(merged, 2);
    assert_eq!(counts(collector.finish().get("a.js").unwrap()), vec![1, 2]);
}

#[test]
fn test_directory_name_is_not_a_pattern() {
    let dir = tempfile::tempdir().unwrap();
    let bracketed = dir.path().join("run[1]");
    write_document(
        &bracketed.join("coverage-1.json"),
        vec![statements("a.js", &[1, 0])],
    );
    write_document(
        &dir.path().join("run1/coverage-1.json"),
        vec![statements("a.js", &[0, 5])],
    );

    let mut collector = Collector::new();
    let merged = collector
        .add_matching(&bracketed, &["coverage*.json".to_string()], &[])
        .unwrap();
    assert_eq!(merged, 1);
    assert_eq!(counts(collector.finish().get("a.js").unwrap()), vec![1, 0]);
}

#[test]
fn test_malformed_document_is_a_hard_failure() {
    let dir = tempfile::tempdir().unwrap();
    write_document(
        &dir.path().join("coverage-good.json"),
        vec![statements("a.js", &[1])],
    );
    // Counter for a statement the map does not describe.
    std::fs::write(
        dir.path().join("coverage-bad.json"),
        r#"{ "a.js": { "path": "a.js", "statementMap": {}, "fnMap": {}, "branchMap": {},
             "s": { "0": 1 }, "f": {}, "b": {} } }"#,
    )
    .unwrap();

    let err = Collector::new()
        .add_matching(dir.path(), &["coverage*.json".to_string()], &[])
        .unwrap_err();
    assert!(err.is_configuration());
    assert!(err.to_string().contains("coverage-bad.json"));
}

#[test]
fn test_different_instrumentation_does_not_merge() {
    let mut collector = Collector::new();
    collector
        .add(document(vec![statements("a.js", &[1, 0])]))
        .unwrap();
    let err = collector
        .add(document(vec![statements("a.js", &[1, 0, 0])]))
        .unwrap_err();
    assert!(matches!(err, CovrunError::StructureMismatch(ref p) if p == "a.js"));
}

#[test]
fn test_document_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let mut file = common::instrumented(common::SOURCE_A, "src/a.js");
    file.s.insert(1, 7);
    file.b.insert(0, vec![2, 5]);
    let original = document(vec![file, statements("src/c.js", &[0, 4])]);

    let path = dir.path().join("coverage.json");
    original.write(&path).unwrap();
    assert_eq!(CoverageDocument::read(&path).unwrap(), original);
}
