//! The instrumenting-compiler seam. Parsing and rewriting source text is left
//! to an implementation of [`Instrumenter`]; everything else in the crate only
//! relies on what it returns.

use std::path::Path;

use crate::model::FileCoverage;

/// Result of instrumenting one source file.
#[derive(Debug, Clone)]
pub struct Instrumented {
    /// Rewritten source that reports into the coverage variable as it runs.
    pub code: String,
    /// Structural maps plus initial counts. Some instrumenters pre-seed
    /// counters (for example hoisted function declarations start at 1).
    pub coverage: FileCoverage,
}

/// Every instrumenting compiler implements this trait.
pub trait Instrumenter: Send + Sync {
    /// Rewrite `source` so that executing it increments counters held under
    /// `coverage_variable`, and describe the counters it created.
    fn instrument(
        &self,
        source: &str,
        path: &Path,
        coverage_variable: &str,
    ) -> anyhow::Result<Instrumented>;
}
