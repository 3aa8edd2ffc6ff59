//! Run options, read from a JSON document.
//!
//! Older option files used different names for several fields. [`migrate`]
//! rewrites those into the current shape before deserialization, so the rest
//! of the crate only ever sees [`Options`].

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{CovrunError, Result};
use crate::matcher::DEPENDENCY_EXCLUDES;
use crate::report::{Print, ReportKind, Watermarks};
use crate::threshold::ThresholdConfig;

/// Shape version written by [`migrate`].
pub const CONFIG_VERSION: u64 = 2;

/// Default options file name.
pub const DEFAULT_CONFIG_FILE: &str = "covrun.json";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Options {
    pub config_version: u64,
    /// Root that include/exclude patterns are evaluated against, relative to
    /// the run's base directory. Defaults to the base directory.
    pub project_root: Option<PathBuf>,
    pub verbose: bool,
    pub jasmine: RunnerOptions,
    pub coverage: CoverageOptions,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            config_version: CONFIG_VERSION,
            project_root: None,
            verbose: false,
            jasmine: RunnerOptions::default(),
            coverage: CoverageOptions::default(),
        }
    }
}

/// Test-runner settings. Only the reporter list matters here.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RunnerOptions {
    pub reporters: Map<String, Value>,
}

impl RunnerOptions {
    #[must_use]
    pub fn has_teamcity_reporter(&self) -> bool {
        self.reporters
            .get("teamcity")
            .is_some_and(|v| !matches!(v, Value::Null | Value::Bool(false)))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CoverageOptions {
    pub enabled: bool,
    pub include_all_sources: bool,
    pub relativize: bool,
    pub report_dir: PathBuf,
    pub report_file: String,
    pub report: Vec<ReportKind>,
    pub print: Print,
    /// Patterns relative to `report_dir`.
    pub collect: Vec<String>,
    pub thresholds: ThresholdConfig,
    pub includes: Vec<String>,
    pub excludes: Vec<String>,
    pub watermarks: Watermarks,
}

impl Default for CoverageOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            include_all_sources: false,
            relativize: true,
            report_dir: PathBuf::from("coverage"),
            report_file: "coverage.json".to_string(),
            report: vec![ReportKind::Lcov],
            print: Print::Summary,
            collect: vec!["coverage*.json".to_string()],
            thresholds: ["statements", "branches", "lines", "functions"]
                .into_iter()
                .map(|m| (m.to_string(), 0.0))
                .collect(),
            includes: vec!["**/*.js".to_string()],
            excludes: Vec::new(),
            watermarks: Watermarks::default(),
        }
    }
}

impl Options {
    /// Read, migrate and validate an options file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read(path)?;
        let value: Value = serde_json::from_slice(&content).map_err(|e| {
            CovrunError::Config(format!("cannot parse {}: {e}", path.display()))
        })?;
        Self::from_value(value)
    }

    /// Options from an in-memory JSON document.
    pub fn from_value(value: Value) -> Result<Self> {
        let options: Options = serde_json::from_value(migrate(value)?)
            .map_err(|e| CovrunError::Config(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<()> {
        let coverage = &self.coverage;
        coverage.thresholds.validate()?;
        for pattern in coverage
            .includes
            .iter()
            .chain(&coverage.excludes)
            .chain(&coverage.collect)
        {
            glob::Pattern::new(pattern).map_err(|e| CovrunError::pattern(pattern, e))?;
        }
        if coverage.report_file.is_empty() {
            return Err(CovrunError::Config("reportFile must not be empty".to_string()));
        }
        Ok(())
    }

    /// The configured project root resolved against `base`, or `base`
    /// itself when none is configured.
    pub fn project_root(&self, base: &Path) -> PathBuf {
        match &self.project_root {
            Some(root) => base.join(root),
            None => base.to_path_buf(),
        }
    }
}

impl CoverageOptions {
    /// Requested report formats. A TeamCity test reporter adds the
    /// `teamcity` coverage report when it is not already listed.
    pub fn report_kinds(&self, runner: &RunnerOptions) -> Vec<ReportKind> {
        let mut kinds = self.report.clone();
        if runner.has_teamcity_reporter() && !kinds.contains(&ReportKind::Teamcity) {
            kinds.push(ReportKind::Teamcity);
        }
        kinds
    }

    /// Configured excludes plus the dependency directories.
    pub fn all_excludes(&self) -> Vec<String> {
        let mut excludes = self.excludes.clone();
        for pattern in DEPENDENCY_EXCLUDES {
            if !excludes.iter().any(|e| e == pattern) {
                excludes.push((*pattern).to_string());
            }
        }
        excludes
    }
}

/// Rewrite legacy field names into the current shape.
///
/// | legacy                      | current                      |
/// |-----------------------------|------------------------------|
/// | `isVerbose`                 | `verbose`                    |
/// | `coverage.savePath`         | `coverage.reportDir`         |
/// | `coverage: true`            | `coverage: {}`               |
/// | `coverage: false`           | `coverage: {enabled: false}` |
/// | `coverage.collect: false`   | `coverage.collect: []`       |
/// | `jasmine.reporter`          | `jasmine.reporters.spec`     |
pub fn migrate(value: Value) -> Result<Value> {
    let Value::Object(mut root) = value else {
        return Err(CovrunError::Config(
            "options must be a JSON object".to_string(),
        ));
    };
    let version = root.get("configVersion").and_then(Value::as_u64).unwrap_or(1);
    if version > CONFIG_VERSION {
        return Err(CovrunError::Config(format!(
            "unsupported configVersion {version} (newest known is {CONFIG_VERSION})"
        )));
    }

    rename(&mut root, "isVerbose", "verbose");

    match root.remove("coverage") {
        None | Some(Value::Bool(true)) => {
            root.insert("coverage".to_string(), Value::Object(Map::new()));
        }
        Some(Value::Bool(false)) => {
            let mut disabled = Map::new();
            disabled.insert("enabled".to_string(), Value::Bool(false));
            root.insert("coverage".to_string(), Value::Object(disabled));
        }
        Some(Value::Object(mut coverage)) => {
            rename(&mut coverage, "savePath", "reportDir");
            if coverage.get("collect") == Some(&Value::Bool(false)) {
                coverage.insert("collect".to_string(), Value::Array(Vec::new()));
            }
            root.insert("coverage".to_string(), Value::Object(coverage));
        }
        Some(other) => {
            return Err(CovrunError::Config(format!(
                "coverage must be a boolean or an object, got {other}"
            )))
        }
    }

    if let Some(Value::Object(runner)) = root.get_mut("jasmine") {
        if let Some(reporter) = runner.remove("reporter") {
            let mut reporters = Map::new();
            reporters.insert("spec".to_string(), reporter);
            runner.insert("reporters".to_string(), Value::Object(reporters));
        }
    }

    root.insert("configVersion".to_string(), Value::from(CONFIG_VERSION));
    Ok(Value::Object(root))
}

/// Move `from` to `to` unless `to` is already set.
fn rename(map: &mut Map<String, Value>, from: &str, to: &str) {
    if let Some(value) = map.remove(from) {
        map.entry(to.to_string()).or_insert(value);
    }
}
