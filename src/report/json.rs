use std::path::PathBuf;

use serde_json::{Map, Value};

use super::{write_file, ReportKind, ReportWriter};
use crate::collect::UnifiedModel;
use crate::error::Result;
use crate::summary::CoverageSummary;

/// The merged document in the same shape as the raw snapshot.
pub struct JsonReport {
    path: PathBuf,
}

impl JsonReport {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl ReportWriter for JsonReport {
    fn kind(&self) -> ReportKind {
        ReportKind::Json
    }

    fn write_report(&self, model: &UnifiedModel) -> Result<()> {
        let json = serde_json::to_vec(model.document())?;
        write_file(&self.path, &json)
    }
}

/// `{ "total": {...}, "<path>": {...} }` with per-metric totals.
pub struct JsonSummaryReport {
    path: PathBuf,
}

impl JsonSummaryReport {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn render(model: &UnifiedModel) -> Result<Value> {
        let mut out = Map::new();
        out.insert("total".to_string(), serde_json::to_value(model.summary())?);
        for file in model.files() {
            out.insert(
                file.path.clone(),
                serde_json::to_value(CoverageSummary::for_file(file))?,
            );
        }
        Ok(Value::Object(out))
    }
}

impl ReportWriter for JsonSummaryReport {
    fn kind(&self) -> ReportKind {
        ReportKind::JsonSummary
    }

    fn write_report(&self, model: &UnifiedModel) -> Result<()> {
        let json = serde_json::to_vec_pretty(&Self::render(model)?)?;
        write_file(&self.path, &json)
    }
}
