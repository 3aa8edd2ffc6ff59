//! The end-of-run phase: drain the accumulator once, persist it, merge it with
//! earlier runs, write reports and enforce thresholds.
//!
//! Everything here is blocking. The phase may run from a process-exit path
//! where no further scheduled work is guaranteed to execute.

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::accumulator::Accumulator;
use crate::backfill;
use crate::collect::Collector;
use crate::error::Result;
use crate::instrument::Instrumenter;
use crate::matcher::Matcher;
use crate::report::{self, ReportWriter};
use crate::summary::CoverageSummary;
use crate::threshold::{self, ThresholdConfig};

/// Everything the phase needs, resolved before the run starts.
pub struct FinalizePlan {
    /// Base for relativizing recorded paths.
    pub base_dir: PathBuf,
    pub report_dir: PathBuf,
    pub report_file: String,
    /// Patterns relative to `report_dir` naming documents from other runs.
    pub collect: Vec<String>,
    pub relativize: bool,
    /// Set when unloaded sources should be added with zero counts.
    pub backfill: Option<Backfill>,
    pub writers: Vec<Box<dyn ReportWriter>>,
    pub thresholds: ThresholdConfig,
}

pub struct Backfill {
    pub matcher: Arc<Matcher>,
    pub instrumenter: Arc<dyn Instrumenter>,
}

impl FinalizePlan {
    pub fn snapshot_path(&self) -> PathBuf {
        self.report_dir.join(&self.report_file)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FinalizeOutcome {
    /// Nothing was instrumented and executed; nothing was written.
    NoCoverage,
    /// A previous call already ran the phase.
    AlreadyRan,
    Completed {
        snapshot: PathBuf,
        /// Documents merged in from other runs.
        collected: usize,
        files: usize,
        summary: CoverageSummary,
    },
}

pub struct Finalizer {
    accumulator: Arc<Accumulator>,
    plan: FinalizePlan,
    fired: AtomicBool,
}

impl Finalizer {
    pub fn new(accumulator: Arc<Accumulator>, plan: FinalizePlan) -> Self {
        Self {
            accumulator,
            plan,
            fired: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn has_run(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    /// Mark the phase as done without running it. Later calls and exit
    /// guards become no-ops. Returns false if the phase already ran.
    pub fn cancel(&self) -> bool {
        !self.fired.swap(true, Ordering::SeqCst)
    }

    pub fn plan(&self) -> &FinalizePlan {
        &self.plan
    }

    /// Run the phase. Only the first call does any work.
    pub fn finalize(&self) -> Result<FinalizeOutcome> {
        if self.fired.swap(true, Ordering::SeqCst) {
            return Ok(FinalizeOutcome::AlreadyRan);
        }
        if self.accumulator.is_empty() {
            log::warn!("No coverage information was collected, exit without writing coverage information");
            return Ok(FinalizeOutcome::NoCoverage);
        }

        let plan = &self.plan;
        let mut doc = self.accumulator.snapshot();
        if let Some(bf) = &plan.backfill {
            let added = backfill::include_all_sources(
                &mut doc,
                &bf.matcher,
                bf.instrumenter.as_ref(),
                self.accumulator.variable(),
            )?;
            log::debug!("Added {added} unloaded source files");
        }

        // The test run may have removed the directory created at start-up.
        fs::create_dir_all(&plan.report_dir)?;
        let snapshot = plan.snapshot_path();
        log::debug!("Writing coverage object [{}]", snapshot.display());
        doc.write(&snapshot)?;

        let mut collector = if plan.relativize {
            Collector::relativize_to(&plan.base_dir)
        } else {
            Collector::new()
        };
        collector.add(doc)?;
        let collected =
            collector.add_matching(&plan.report_dir, &plan.collect, &[snapshot.clone()])?;
        let model = collector.finish();

        log::debug!("Writing coverage reports at [{}]", plan.report_dir.display());
        report::write_all(&plan.writers, &model)?;
        threshold::enforce(&model, &plan.thresholds)?;

        Ok(FinalizeOutcome::Completed {
            snapshot,
            collected,
            files: model.len(),
            summary: model.summary(),
        })
    }

    /// Bind the phase to scope exit. The guard runs [`Finalizer::finalize`]
    /// when dropped unless it already ran.
    pub fn exit_guard(self: &Arc<Self>) -> ExitGuard {
        ExitGuard {
            finalizer: Arc::clone(self),
        }
    }
}

/// Fires finalization on drop unless the phase already ran or was
/// cancelled. Errors can only be logged at that point.
pub struct ExitGuard {
    finalizer: Arc<Finalizer>,
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        if self.finalizer.has_run() {
            return;
        }
        if let Err(e) = self.finalizer.finalize() {
            log::error!("Coverage finalization failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FileCoverage, Location};

    fn plan(dir: &std::path::Path) -> FinalizePlan {
        FinalizePlan {
            base_dir: dir.to_path_buf(),
            report_dir: dir.join("coverage"),
            report_file: "coverage.json".to_string(),
            collect: vec!["coverage*.json".to_string()],
            relativize: true,
            backfill: None,
            writers: Vec::new(),
            thresholds: ThresholdConfig::new(),
        }
    }

    fn accumulator_with_file(path: &str) -> Arc<Accumulator> {
        let accumulator = Accumulator::with_variable("$$cov_test$$");
        let mut file = FileCoverage::new(path);
        file.statement_map.insert(0, Location::lines(1, 1));
        let counters = accumulator.register(file).unwrap();
        counters.hit_statement(0).unwrap();
        Arc::new(accumulator)
    }

    #[test]
    fn test_empty_accumulator_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let finalizer = Finalizer::new(Arc::new(Accumulator::new()), plan(dir.path()));
        assert_eq!(finalizer.finalize().unwrap(), FinalizeOutcome::NoCoverage);
        assert!(!dir.path().join("coverage").exists());
    }

    #[test]
    fn test_runs_once() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.js");
        let finalizer = Finalizer::new(
            accumulator_with_file(&source.to_string_lossy()),
            plan(dir.path()),
        );
        match finalizer.finalize().unwrap() {
            FinalizeOutcome::Completed {
                snapshot, files, ..
            } => {
                assert_eq!(files, 1);
                assert!(snapshot.exists());
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(finalizer.finalize().unwrap(), FinalizeOutcome::AlreadyRan);
    }

    #[test]
    fn test_exit_guard_fires_once() {
        let dir = tempfile::tempdir().unwrap();
        let finalizer = Arc::new(Finalizer::new(
            accumulator_with_file("a.js"),
            plan(dir.path()),
        ));
        drop(finalizer.exit_guard());
        assert!(finalizer.has_run());
        assert!(dir.path().join("coverage/coverage.json").exists());
        drop(finalizer.exit_guard());
        assert_eq!(finalizer.finalize().unwrap(), FinalizeOutcome::AlreadyRan);
    }

    #[test]
    fn test_cancel_disarms_exit_guard() {
        let dir = tempfile::tempdir().unwrap();
        let finalizer = Arc::new(Finalizer::new(
            accumulator_with_file("a.js"),
            plan(dir.path()),
        ));
        let guard = finalizer.exit_guard();
        assert!(finalizer.cancel());
        drop(guard);
        assert!(!dir.path().join("coverage").exists());
        assert!(!finalizer.cancel());
        assert_eq!(finalizer.finalize().unwrap(), FinalizeOutcome::AlreadyRan);
    }
}
