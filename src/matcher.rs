//! File-matching policy for instrumentation: include globs, exclude globs,
//! evaluated against paths relative to the project root.

use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use walkdir::WalkDir;

use crate::error::{CovrunError, Result};

/// Dependency-manager directories that are never instrumented.
pub const DEPENDENCY_EXCLUDES: &[&str] = &["**/node_modules/**"];

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

#[derive(Debug, Clone)]
pub struct Matcher {
    root: PathBuf,
    includes: Vec<Pattern>,
    excludes: Vec<Pattern>,
}

impl Matcher {
    /// Build a matcher. The dependency exclusions are always added.
    pub fn new(root: &Path, includes: &[String], excludes: &[String]) -> Result<Self> {
        let includes = compile(includes.iter().map(String::as_str))?;
        let excludes = compile(
            excludes
                .iter()
                .map(String::as_str)
                .chain(DEPENDENCY_EXCLUDES.iter().copied()),
        )?;
        Ok(Self {
            root: root.to_path_buf(),
            includes,
            excludes,
        })
    }

    /// Whether a file should be instrumented when loaded.
    #[must_use]
    pub fn matches(&self, path: &Path) -> bool {
        let relative = match self.relative(path) {
            Some(r) => r,
            None => return false,
        };
        let matched = |patterns: &[Pattern]| {
            patterns
                .iter()
                .any(|p| p.matches_path_with(&relative, MATCH_OPTIONS))
        };
        matched(&self.includes) && !matched(&self.excludes)
    }

    /// Every file under the root that the policy selects, sorted.
    pub fn files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root).follow_links(false) {
            let entry = entry.map_err(|e| CovrunError::Io(e.into()))?;
            if entry.file_type().is_file() && self.matches(entry.path()) {
                files.push(entry.into_path());
            }
        }
        files.sort();
        Ok(files)
    }

    fn relative(&self, path: &Path) -> Option<PathBuf> {
        if path.is_absolute() {
            path.strip_prefix(&self.root).ok().map(Path::to_path_buf)
        } else {
            Some(path.to_path_buf())
        }
    }
}

fn compile<'a>(patterns: impl Iterator<Item = &'a str>) -> Result<Vec<Pattern>> {
    patterns
        .map(|p| Pattern::new(p).map_err(|e| CovrunError::pattern(p, e)))
        .collect()
}
