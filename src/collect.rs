//! Collector/Merger: combines the live run's document with documents written
//! by earlier or parallel runs into one [`UnifiedModel`].

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

use rayon::prelude::*;

use crate::error::{CovrunError, Result};
use crate::model::{CoverageDocument, FileCoverage};
use crate::summary::CoverageSummary;

/// The merged coverage of a run. Read-only once built.
#[derive(Debug, Clone, Default)]
pub struct UnifiedModel {
    doc: CoverageDocument,
}

impl UnifiedModel {
    pub fn files(&self) -> impl Iterator<Item = &FileCoverage> {
        self.doc.files()
    }

    #[must_use]
    pub fn get(&self, path: &str) -> Option<&FileCoverage> {
        self.doc.get(path)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.doc.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.doc.is_empty()
    }

    pub fn document(&self) -> &CoverageDocument {
        &self.doc
    }

    /// Totals across every file.
    pub fn summary(&self) -> CoverageSummary {
        let mut total = CoverageSummary::default();
        for file in self.doc.files() {
            total.merge(&CoverageSummary::for_file(file));
        }
        total
    }
}

impl From<CoverageDocument> for UnifiedModel {
    fn from(doc: CoverageDocument) -> Self {
        Self { doc }
    }
}

#[derive(Debug, Default)]
pub struct Collector {
    relativize_to: Option<PathBuf>,
    doc: CoverageDocument,
}

impl Collector {
    /// A collector that keys files by the path they were recorded under.
    pub fn new() -> Self {
        Self::default()
    }

    /// A collector that rewrites absolute paths relative to `base` before
    /// merging, so runs from different working directories line up.
    pub fn relativize_to(base: impl Into<PathBuf>) -> Self {
        Self {
            relativize_to: Some(base.into()),
            doc: CoverageDocument::new(),
        }
    }

    pub fn add(&mut self, doc: CoverageDocument) -> Result<()> {
        for mut file in doc.into_files() {
            if let Some(base) = &self.relativize_to {
                file.path = relativize(&file.path, base);
            }
            self.doc.merge_file(file)?;
        }
        Ok(())
    }

    /// Merge every document matched by `patterns` (relative to `dir`),
    /// except the paths in `skip`. Any unreadable or malformed document
    /// fails the whole collection. Returns the number of documents merged.
    pub fn add_matching(
        &mut self,
        dir: &Path,
        patterns: &[String],
        skip: &[PathBuf],
    ) -> Result<usize> {
        let paths = discover(dir, patterns, skip)?;
        let docs: Vec<CoverageDocument> = paths
            .par_iter()
            .map(|path| {
                CoverageDocument::read(path).map_err(|e| CovrunError::Collect {
                    path: path.clone(),
                    message: e.to_string(),
                })
            })
            .collect::<Result<_>>()?;

        for (path, doc) in paths.iter().zip(docs) {
            log::debug!("Merging coverage from {}", path.display());
            self.add(doc)?;
        }
        Ok(paths.len())
    }

    pub fn finish(self) -> UnifiedModel {
        UnifiedModel { doc: self.doc }
    }
}

/// Expand `patterns` under `dir` into a sorted, de-duplicated file list.
pub fn discover(dir: &Path, patterns: &[String], skip: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let skip: BTreeSet<PathBuf> = skip.iter().map(|p| normalize(p)).collect();
    let base = PathBuf::from(glob::Pattern::escape(&dir.to_string_lossy()));
    let mut found = BTreeSet::new();
    for pattern in patterns {
        let full = base.join(pattern);
        let full = full.to_string_lossy();
        let entries = glob::glob(&full).map_err(|e| CovrunError::pattern(pattern, e))?;
        for entry in entries {
            let path = entry.map_err(|e| CovrunError::Collect {
                path: e.path().to_path_buf(),
                message: e.error().to_string(),
            })?;
            if path.is_file() && !skip.contains(&normalize(&path)) {
                found.insert(path);
            }
        }
    }
    Ok(found.into_iter().collect())
}

/// Rewrite an absolute path relative to `base`. Relative paths are only
/// normalized.
pub fn relativize(path: &str, base: &Path) -> String {
    let normalized = normalize(Path::new(path));
    if !normalized.is_absolute() {
        return normalized.to_string_lossy().into_owned();
    }
    pathdiff::diff_paths(&normalized, normalize(base))
        .unwrap_or(normalized)
        .to_string_lossy()
        .into_owned()
}

/// Lexically resolve `.` and `..` components.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relativize_absolute() {
        assert_eq!(relativize("/work/proj/src/a.js", Path::new("/work/proj")), "src/a.js");
        assert_eq!(
            relativize("/work/proj/lib/../src/a.js", Path::new("/work/proj")),
            "src/a.js"
        );
        assert_eq!(relativize("/other/a.js", Path::new("/work/proj")), "../../other/a.js");
    }

    #[test]
    fn test_relativize_keeps_relative() {
        assert_eq!(relativize("./src/a.js", Path::new("/work/proj")), "src/a.js");
    }

    #[test]
    fn test_discover_skips_and_dedupes() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["coverage.json", "coverage-1.json", "coverage-2.json", "other.json"] {
            std::fs::write(dir.path().join(name), "{}").unwrap();
        }
        let patterns = vec!["coverage*.json".to_string(), "coverage-1.json".to_string()];
        let skip = vec![dir.path().join("coverage.json")];
        let found = discover(dir.path(), &patterns, &skip).unwrap();
        assert_eq!(
            found,
            vec![dir.path().join("coverage-1.json"), dir.path().join("coverage-2.json")]
        );
    }

    #[test]
    fn test_discover_rejects_bad_pattern() {
        let dir = tempfile::tempdir().unwrap();
        let err = discover(dir.path(), &["[".to_string()], &[]).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_malformed_document_fails_collection() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("coverage-a.json"), "{}").unwrap();
        std::fs::write(dir.path().join("coverage-b.json"), "{ truncated").unwrap();
        let mut collector = Collector::new();
        let err = collector
            .add_matching(dir.path(), &["coverage*.json".to_string()], &[])
            .unwrap_err();
        match err {
            CovrunError::Collect { path, .. } => assert!(path.ends_with("coverage-b.json")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
