//! Uniform in-memory representation of per-file coverage. Structural maps
//! describe what can be counted; the `s`/`f`/`b` maps hold how often it ran.
//! The serialized shape is the Istanbul `coverage.json` layout so documents
//! written by earlier runs (or other tools) can be merged back in.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CovrunError, Result};

/// Compute a coverage percentage rounded down to two decimals.
/// A metric with nothing to cover is fully covered.
#[must_use]
pub fn pct(covered: u64, total: u64) -> f64 {
    if total == 0 {
        100.0
    } else {
        (covered as f64 * 100.0 * 100.0 / total as f64).floor() / 100.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    #[serde(default)]
    pub column: Option<u32>,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Self {
        Self {
            line,
            column: Some(column),
        }
    }
}

/// A source range for a statement, function or branch arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Location {
    pub start: Position,
    pub end: Position,
}

impl Location {
    /// A range covering `start_line` through `end_line`, columns unknown.
    pub fn lines(start_line: u32, end_line: u32) -> Self {
        Self {
            start: Position::new(start_line, 0),
            end: Position::new(end_line, 0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionMeta {
    pub name: String,
    #[serde(default)]
    pub line: u32,
    pub loc: Location,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decl: Option<Location>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchMeta {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub line: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loc: Option<Location>,
    pub locations: Vec<Location>,
}

/// Coverage for a single source file.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileCoverage {
    #[serde(default)]
    pub path: String,
    pub statement_map: BTreeMap<u32, Location>,
    pub fn_map: BTreeMap<u32, FunctionMeta>,
    pub branch_map: BTreeMap<u32, BranchMeta>,
    /// Statement hit counts.
    pub s: BTreeMap<u32, u64>,
    /// Function hit counts.
    pub f: BTreeMap<u32, u64>,
    /// Branch hit counts, one per arm.
    pub b: BTreeMap<u32, Vec<u64>>,
}

impl FileCoverage {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Check that every counter refers to an entry of its structural map.
    pub fn validate(&self) -> Result<()> {
        let invalid = |kind: &'static str, index: u32| CovrunError::InvalidCounter {
            path: self.path.clone(),
            kind,
            index,
        };
        if let Some(idx) = self.s.keys().find(|k| !self.statement_map.contains_key(*k)) {
            return Err(invalid("statement", *idx));
        }
        if let Some(idx) = self.f.keys().find(|k| !self.fn_map.contains_key(*k)) {
            return Err(invalid("function", *idx));
        }
        for (idx, arms) in &self.b {
            match self.branch_map.get(idx) {
                Some(meta) if meta.locations.len() == arms.len() => {}
                _ => return Err(invalid("branch", *idx)),
            }
        }
        Ok(())
    }

    /// Whether both entries came from the same instrumentation of a file.
    #[must_use]
    pub fn same_structure(&self, other: &FileCoverage) -> bool {
        self.statement_map == other.statement_map
            && self.fn_map == other.fn_map
            && self.branch_map == other.branch_map
    }

    /// Add the counts of `other` into `self`, index by index.
    pub fn merge(&mut self, other: &FileCoverage) -> Result<()> {
        if !self.same_structure(other) {
            return Err(CovrunError::StructureMismatch(self.path.clone()));
        }
        for (idx, count) in &other.s {
            let entry = self.s.entry(*idx).or_insert(0);
            *entry = entry.saturating_add(*count);
        }
        for (idx, count) in &other.f {
            let entry = self.f.entry(*idx).or_insert(0);
            *entry = entry.saturating_add(*count);
        }
        for (idx, arms) in &other.b {
            let entry = self.b.entry(*idx).or_insert_with(|| vec![0; arms.len()]);
            for (mine, theirs) in entry.iter_mut().zip(arms) {
                *mine = mine.saturating_add(*theirs);
            }
        }
        Ok(())
    }

    /// Zero every counter while keeping the structural maps. Missing
    /// counters are filled in so every mapped entry is reported.
    pub fn reset_counts(&mut self) {
        self.s = self.statement_map.keys().map(|k| (*k, 0)).collect();
        self.f = self.fn_map.keys().map(|k| (*k, 0)).collect();
        self.b = self
            .branch_map
            .iter()
            .map(|(k, meta)| (*k, vec![0; meta.locations.len()]))
            .collect();
    }

    /// Per-line hit counts derived from statements. A line takes the
    /// highest count of the statements that start on it.
    #[must_use]
    pub fn line_counts(&self) -> BTreeMap<u32, u64> {
        let mut lines: BTreeMap<u32, u64> = BTreeMap::new();
        for (idx, loc) in &self.statement_map {
            let count = self.s.get(idx).copied().unwrap_or(0);
            lines
                .entry(loc.start.line)
                .and_modify(|c| *c = (*c).max(count))
                .or_insert(count);
        }
        lines
    }

    /// Lines with at least one statement that never ran.
    #[must_use]
    pub fn uncovered_lines(&self) -> Vec<u32> {
        self.line_counts()
            .into_iter()
            .filter(|(_, count)| *count == 0)
            .map(|(line, _)| line)
            .collect()
    }
}

/// Mapping from file path to its coverage; the unit persisted to disk and
/// exchanged between processes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CoverageDocument {
    files: BTreeMap<String, FileCoverage>,
}

impl CoverageDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a document. Entries without a `path` take their key.
    pub fn from_slice(input: &[u8]) -> Result<Self> {
        let raw: BTreeMap<String, FileCoverage> = serde_json::from_slice(input)?;
        let mut doc = Self::new();
        for (key, mut file) in raw {
            if file.path.is_empty() {
                file.path = key;
            }
            file.validate()?;
            doc.merge_file(file)?;
        }
        Ok(doc)
    }

    pub fn read(path: &Path) -> Result<Self> {
        let content = fs::read(path)?;
        Self::from_slice(&content)
    }

    /// Write the document with blocking I/O; safe to call during exit.
    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Insert a file, or sum its counts into an existing entry for the same path.
    pub fn merge_file(&mut self, file: FileCoverage) -> Result<()> {
        match self.files.get_mut(&file.path) {
            Some(existing) => existing.merge(&file),
            None => {
                self.files.insert(file.path.clone(), file);
                Ok(())
            }
        }
    }

    pub fn merge(&mut self, other: CoverageDocument) -> Result<()> {
        for file in other.into_files() {
            self.merge_file(file)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn get(&self, path: &str) -> Option<&FileCoverage> {
        self.files.get(path)
    }

    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    pub fn files(&self) -> impl Iterator<Item = &FileCoverage> {
        self.files.values()
    }

    pub fn into_files(self) -> impl Iterator<Item = FileCoverage> {
        self.files.into_values()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FromIterator<FileCoverage> for CoverageDocument {
    /// Later entries for an already-present path replace earlier ones.
    fn from_iter<I: IntoIterator<Item = FileCoverage>>(iter: I) -> Self {
        let files = iter
            .into_iter()
            .map(|file| (file.path.clone(), file))
            .collect();
        Self { files }
    }
}
