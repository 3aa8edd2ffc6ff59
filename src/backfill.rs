//! "Include all sources": files the policy selects but the run never loaded
//! are instrumented without being executed and added with zero counts, so
//! they show up in reports instead of silently raising the totals.

use std::fs;

use crate::error::{CovrunError, Result};
use crate::instrument::Instrumenter;
use crate::matcher::Matcher;
use crate::model::CoverageDocument;

/// Add a zero-count entry to `doc` for every matched file it lacks.
/// Returns how many files were added.
pub fn include_all_sources(
    doc: &mut CoverageDocument,
    matcher: &Matcher,
    instrumenter: &dyn Instrumenter,
    coverage_variable: &str,
) -> Result<usize> {
    let mut added = 0;
    for path in matcher.files()? {
        let key = path.to_string_lossy().into_owned();
        if doc.contains(&key) {
            continue;
        }
        let source = fs::read_to_string(&path)?;
        let instrumented = instrumenter
            .instrument(&source, &path, coverage_variable)
            .map_err(|e| CovrunError::Instrumentation {
                path: key.clone(),
                message: format!("{e:#}"),
            })?;

        // Pre-seeded counters (hoisted declarations) never ran either.
        let mut coverage = instrumented.coverage;
        coverage.path = key;
        coverage.reset_counts();
        log::debug!("Including unloaded source {}", coverage.path);
        doc.merge_file(coverage)?;
        added += 1;
    }
    Ok(added)
}
