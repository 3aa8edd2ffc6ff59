//! Run-scoped counter store written by instrumented code and drained once at
//! finalization. Counters are atomics, so instrumented code may run on any
//! thread; structural maps are fixed when a file is first registered.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::Utc;

use crate::error::{CovrunError, Result};
use crate::model::{CoverageDocument, FileCoverage};

/// Live counters for one instrumented file.
#[derive(Debug)]
pub struct FileCounters {
    structure: FileCoverage,
    statements: BTreeMap<u32, AtomicU64>,
    functions: BTreeMap<u32, AtomicU64>,
    branches: BTreeMap<u32, Vec<AtomicU64>>,
}

impl FileCounters {
    fn new(coverage: FileCoverage) -> Self {
        let seed = |counts: &BTreeMap<u32, u64>, idx: &u32| {
            AtomicU64::new(counts.get(idx).copied().unwrap_or(0))
        };
        let statements = coverage
            .statement_map
            .keys()
            .map(|idx| (*idx, seed(&coverage.s, idx)))
            .collect();
        let functions = coverage
            .fn_map
            .keys()
            .map(|idx| (*idx, seed(&coverage.f, idx)))
            .collect();
        let branches = coverage
            .branch_map
            .iter()
            .map(|(idx, meta)| {
                let arms = coverage.b.get(idx);
                let counters = (0..meta.locations.len())
                    .map(|arm| {
                        AtomicU64::new(arms.and_then(|a| a.get(arm)).copied().unwrap_or(0))
                    })
                    .collect();
                (*idx, counters)
            })
            .collect();
        Self {
            structure: coverage,
            statements,
            functions,
            branches,
        }
    }

    pub fn path(&self) -> &str {
        &self.structure.path
    }

    pub fn hit_statement(&self, index: u32) -> Result<()> {
        self.statements
            .get(&index)
            .ok_or_else(|| self.invalid("statement", index))?
            .fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn hit_function(&self, index: u32) -> Result<()> {
        self.functions
            .get(&index)
            .ok_or_else(|| self.invalid("function", index))?
            .fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn hit_branch(&self, index: u32, arm: usize) -> Result<()> {
        self.branches
            .get(&index)
            .and_then(|arms| arms.get(arm))
            .ok_or_else(|| self.invalid("branch", index))?
            .fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Current structural maps and counts.
    pub fn snapshot(&self) -> FileCoverage {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        let mut file = self.structure.clone();
        file.s = self.statements.iter().map(|(k, c)| (*k, load(c))).collect();
        file.f = self.functions.iter().map(|(k, c)| (*k, load(c))).collect();
        file.b = self
            .branches
            .iter()
            .map(|(k, arms)| (*k, arms.iter().map(load).collect()))
            .collect();
        file
    }

    fn invalid(&self, kind: &'static str, index: u32) -> CovrunError {
        CovrunError::InvalidCounter {
            path: self.structure.path.clone(),
            kind,
            index,
        }
    }
}

/// Process-wide coverage store for one run, keyed by file path.
#[derive(Debug)]
pub struct Accumulator {
    variable: String,
    files: RwLock<BTreeMap<String, Arc<FileCounters>>>,
}

impl Default for Accumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Accumulator {
    /// Create an empty store with a coverage variable name unique to this
    /// process, so instrumented code never collides with unrelated state.
    pub fn new() -> Self {
        Self::with_variable(format!("$$cov_{}$$", Utc::now().timestamp_millis()))
    }

    pub fn with_variable(variable: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
            files: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn variable(&self) -> &str {
        &self.variable
    }

    /// Register a freshly instrumented file and return its counters. A file
    /// loaded again with the same instrumentation keeps its counters.
    pub fn register(&self, coverage: FileCoverage) -> Result<Arc<FileCounters>> {
        coverage.validate()?;
        let mut files = self.files.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = files.get(&coverage.path) {
            if !existing.structure.same_structure(&coverage) {
                return Err(CovrunError::StructureMismatch(coverage.path));
            }
            return Ok(Arc::clone(existing));
        }
        let path = coverage.path.clone();
        let counters = Arc::new(FileCounters::new(coverage));
        files.insert(path, Arc::clone(&counters));
        Ok(counters)
    }

    pub fn file(&self, path: &str) -> Option<Arc<FileCounters>> {
        self.files
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
    }

    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.files
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(path)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    /// Copy every file's counters into a document.
    pub fn snapshot(&self) -> CoverageDocument {
        self.files
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|counters| counters.snapshot())
            .collect()
    }
}
