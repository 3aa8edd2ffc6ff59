//! One coverage run: owns the accumulator and wires options to the load hook
//! and the finalization phase.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::accumulator::Accumulator;
use crate::config::Options;
use crate::error::{CovrunError, Result};
use crate::finalize::{Backfill, ExitGuard, FinalizeOutcome, FinalizePlan, Finalizer};
use crate::hook::LoadHook;
use crate::instrument::Instrumenter;
use crate::matcher::Matcher;
use crate::report::{build_writers, ReportOptions};

pub enum Session {
    /// Coverage is turned off; every operation is a no-op.
    Disabled,
    Enabled(CoverageRun),
}

pub struct CoverageRun {
    verbose: bool,
    accumulator: Arc<Accumulator>,
    matcher: Arc<Matcher>,
    instrumenter: Arc<dyn Instrumenter>,
    finalizer: Arc<Finalizer>,
    hook_installed: AtomicBool,
}

impl Session {
    /// Prepare a run relative to the working directory.
    pub fn start(options: &Options, instrumenter: Arc<dyn Instrumenter>) -> Result<Self> {
        let cwd = std::env::current_dir()?;
        Self::start_in(options, instrumenter, &cwd)
    }

    /// Prepare a run whose relative paths resolve against `base_dir`. The
    /// report directory is created now so an unwritable location fails
    /// before any test runs.
    pub fn start_in(
        options: &Options,
        instrumenter: Arc<dyn Instrumenter>,
        base_dir: &Path,
    ) -> Result<Self> {
        let coverage = &options.coverage;
        if !coverage.enabled {
            log::debug!("Coverage disabled");
            return Ok(Session::Disabled);
        }

        let report_dir = base_dir.join(&coverage.report_dir);
        fs::create_dir_all(&report_dir)?;

        let root = options.project_root(base_dir);
        let matcher = Arc::new(Matcher::new(
            &root,
            &coverage.includes,
            &coverage.all_excludes(),
        )?);

        let report_options = ReportOptions {
            dir: report_dir.clone(),
            source_root: base_dir.to_path_buf(),
            watermarks: coverage.watermarks,
        };
        let writers = build_writers(
            &coverage.report_kinds(&options.jasmine),
            coverage.print,
            &report_options,
        );

        let backfill = coverage.include_all_sources.then(|| Backfill {
            matcher: Arc::clone(&matcher),
            instrumenter: Arc::clone(&instrumenter),
        });
        let plan = FinalizePlan {
            base_dir: base_dir.to_path_buf(),
            report_dir,
            report_file: coverage.report_file.clone(),
            collect: coverage.collect.clone(),
            relativize: coverage.relativize,
            backfill,
            writers,
            thresholds: coverage.thresholds.clone(),
        };

        let accumulator = Arc::new(Accumulator::new());
        log::debug!("Coverage variable is {}", accumulator.variable());
        Ok(Session::Enabled(CoverageRun {
            verbose: options.verbose,
            finalizer: Arc::new(Finalizer::new(Arc::clone(&accumulator), plan)),
            accumulator,
            matcher,
            instrumenter,
            hook_installed: AtomicBool::new(false),
        }))
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        matches!(self, Session::Enabled(_))
    }

    /// The load hook for this run, or `None` when coverage is disabled.
    /// A run installs its hook at most once.
    pub fn install_hook(&self) -> Result<Option<LoadHook>> {
        match self {
            Session::Disabled => Ok(None),
            Session::Enabled(run) => run.install_hook().map(Some),
        }
    }

    /// Suite-completion callback. Finalizes only when the suite passed; a
    /// failed suite cancels the phase so an exit guard does not run it.
    /// Returns whether the run as a whole succeeded.
    pub fn on_complete(&self, passed: bool) -> Result<bool> {
        match self {
            Session::Disabled => Ok(passed),
            Session::Enabled(run) => {
                if !passed {
                    log::info!("Test suite failed; skipping coverage reports");
                    run.finalizer.cancel();
                    return Ok(false);
                }
                run.finalize()?;
                Ok(true)
            }
        }
    }

    /// A guard that finalizes on drop if the completion callback never ran.
    pub fn exit_guard(&self) -> Option<ExitGuard> {
        match self {
            Session::Disabled => None,
            Session::Enabled(run) => Some(run.finalizer.exit_guard()),
        }
    }
}

impl CoverageRun {
    pub fn install_hook(&self) -> Result<LoadHook> {
        if self.hook_installed.swap(true, Ordering::SeqCst) {
            return Err(CovrunError::HookAlreadyInstalled);
        }
        Ok(LoadHook::new(
            Arc::clone(&self.matcher),
            Arc::clone(&self.instrumenter),
            Arc::clone(&self.accumulator),
            self.verbose,
        ))
    }

    pub fn accumulator(&self) -> &Arc<Accumulator> {
        &self.accumulator
    }

    pub fn report_dir(&self) -> &Path {
        &self.finalizer.plan().report_dir
    }

    pub fn finalize(&self) -> Result<FinalizeOutcome> {
        self.finalizer.finalize()
    }
}
