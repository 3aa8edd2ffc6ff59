//! Load-time interception. The host runtime hands every module it is about to
//! execute to [`LoadHook::transform`]; matching files come back instrumented
//! and registered with the accumulator, everything else passes through.

use std::borrow::Cow;
use std::path::Path;
use std::sync::Arc;

use crate::accumulator::Accumulator;
use crate::error::{CovrunError, Result};
use crate::instrument::Instrumenter;
use crate::matcher::Matcher;

pub struct LoadHook {
    matcher: Arc<Matcher>,
    instrumenter: Arc<dyn Instrumenter>,
    accumulator: Arc<Accumulator>,
    verbose: bool,
}

impl LoadHook {
    pub fn new(
        matcher: Arc<Matcher>,
        instrumenter: Arc<dyn Instrumenter>,
        accumulator: Arc<Accumulator>,
        verbose: bool,
    ) -> Self {
        Self {
            matcher,
            instrumenter,
            accumulator,
            verbose,
        }
    }

    /// Source text to execute for `path`. Instrumentation failures are fatal
    /// for the load; there is no partially instrumented fallback.
    pub fn transform<'a>(&self, path: &Path, source: &'a str) -> Result<Cow<'a, str>> {
        if !self.matcher.matches(path) {
            return Ok(Cow::Borrowed(source));
        }
        if self.verbose {
            log::info!("Module load hook: transform [{}]", path.display());
        }

        let instrumented = self
            .instrumenter
            .instrument(source, path, self.accumulator.variable())
            .map_err(|e| CovrunError::Instrumentation {
                path: path.display().to_string(),
                message: format!("{e:#}"),
            })?;

        let mut coverage = instrumented.coverage;
        coverage.path = path.to_string_lossy().into_owned();
        self.accumulator.register(coverage)?;
        Ok(Cow::Owned(instrumented.code))
    }

    pub fn accumulator(&self) -> &Arc<Accumulator> {
        &self.accumulator
    }
}
