//! Minimum-coverage policy, enforced per file and per metric.

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;

use crate::collect::UnifiedModel;
use crate::error::{CovrunError, Result};
use crate::summary::{CoverageSummary, Metric};

/// Metric name to minimum percentage. Immutable once loaded.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct ThresholdConfig {
    minimums: BTreeMap<String, f64>,
}

impl ThresholdConfig {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, metric: impl Into<String>, minimum: f64) -> Self {
        self.minimums.insert(metric.into(), minimum);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.minimums.iter().map(|(k, v)| (k.as_str(), *v))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.minimums.is_empty()
    }

    /// Every name must be a known metric and every minimum within `[0, 100]`.
    pub fn validate(&self) -> Result<()> {
        for (name, minimum) in self.iter() {
            name.parse::<Metric>()?;
            if !(0.0..=100.0).contains(&minimum) {
                return Err(CovrunError::Config(format!(
                    "threshold for {name} must be between 0 and 100, got {minimum}"
                )));
            }
        }
        Ok(())
    }
}

impl FromIterator<(String, f64)> for ThresholdConfig {
    fn from_iter<T: IntoIterator<Item = (String, f64)>>(iter: T) -> Self {
        Self {
            minimums: iter.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ThresholdFailure {
    Below {
        file: String,
        metric: Metric,
        actual: f64,
        required: f64,
    },
    /// The configured name has no counterpart in the file's summary.
    UnknownMetric { file: String, metric: String },
}

impl fmt::Display for ThresholdFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThresholdFailure::Below {
                file,
                metric,
                actual,
                required,
            } => write!(
                f,
                "expected {metric} coverage to be at least {required}% but was {actual}%\n\tat ({file})"
            ),
            ThresholdFailure::UnknownMetric { file, metric } => {
                write!(f, "unrecognized metric: {metric}\n\tat ({file})")
            }
        }
    }
}

/// Every violation found in one pass over the model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThresholdReport {
    pub failures: Vec<ThresholdFailure>,
}

impl ThresholdReport {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }

    /// True if any failure is a misconfigured metric rather than a low score.
    #[must_use]
    pub fn has_configuration_errors(&self) -> bool {
        self.failures
            .iter()
            .any(|f| matches!(f, ThresholdFailure::UnknownMetric { .. }))
    }
}

impl fmt::Display for ThresholdReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Coverage thresholds not met ({} violation{}):",
            self.failures.len(),
            if self.failures.len() == 1 { "" } else { "s" }
        )?;
        for failure in &self.failures {
            writeln!(f, "{failure}")?;
        }
        Ok(())
    }
}

/// Compare every file against every configured minimum. Never stops early.
pub fn check(model: &UnifiedModel, thresholds: &ThresholdConfig) -> ThresholdReport {
    let mut report = ThresholdReport::default();
    if thresholds.is_empty() {
        return report;
    }
    for file in model.files() {
        let summary = CoverageSummary::for_file(file);
        for (name, required) in thresholds.iter() {
            let Ok(metric) = name.parse::<Metric>() else {
                report.failures.push(ThresholdFailure::UnknownMetric {
                    file: file.path.clone(),
                    metric: name.to_string(),
                });
                continue;
            };
            let actual = summary.metric(metric).pct;
            if actual < required {
                report.failures.push(ThresholdFailure::Below {
                    file: file.path.clone(),
                    metric,
                    actual,
                    required,
                });
            }
        }
    }
    report
}

/// [`check`], turning any violation into [`CovrunError::ThresholdsNotMet`].
pub fn enforce(model: &UnifiedModel, thresholds: &ThresholdConfig) -> Result<()> {
    let report = check(model, thresholds);
    if report.passed() {
        return Ok(());
    }
    for failure in &report.failures {
        log::error!("{failure}");
    }
    Err(CovrunError::ThresholdsNotMet(report))
}
