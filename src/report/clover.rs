/// Writer for Clover XML coverage reports.
///
/// Layout:
///
///   <coverage generated="..." clover="3.2.0">
///     <project timestamp="..." name="All files">
///       <metrics statements=".." coveredstatements=".." .../>
///       <file name="a.js" path="src/a.js">
///         <metrics .../>
///         <line num="1" count="5" type="method" signature="main()"/>
///         <line num="2" count="5" type="stmt"/>
///         <line num="3" count="1" type="cond" truecount="1" falsecount="1"/>
///       </file>
///     </project>
///   </coverage>
///
/// Lines that carry branches are written as `cond` with `truecount` (arms
/// taken) and `falsecount` (arms never taken).
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::Writer;

use super::lcov::{branch_line, function_line};
use super::{write_file, ReportKind, ReportWriter};
use crate::collect::UnifiedModel;
use crate::error::Result;
use crate::model::FileCoverage;
use crate::summary::CoverageSummary;

pub struct CloverReport {
    path: PathBuf,
}

impl CloverReport {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn render(model: &UnifiedModel) -> Result<Vec<u8>> {
        let now = chrono::Utc::now().timestamp_millis().to_string();
        let mut xml = Writer::new_with_indent(Vec::new(), b' ', 2);
        xml.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

        let mut coverage = BytesStart::new("coverage");
        coverage.push_attribute(("generated", now.as_str()));
        coverage.push_attribute(("clover", "3.2.0"));
        xml.write_event(Event::Start(coverage))?;

        let mut project = BytesStart::new("project");
        project.push_attribute(("timestamp", now.as_str()));
        project.push_attribute(("name", "All files"));
        xml.write_event(Event::Start(project))?;

        let total = model.summary();
        let mut metrics = metrics_element(&total);
        metrics.push_attribute(("files", model.len().to_string().as_str()));
        xml.write_event(Event::Empty(metrics))?;

        for file in model.files() {
            write_file_element(&mut xml, file)?;
        }

        xml.write_event(Event::End(BytesEnd::new("project")))?;
        xml.write_event(Event::End(BytesEnd::new("coverage")))?;
        Ok(xml.into_inner())
    }
}

impl ReportWriter for CloverReport {
    fn kind(&self) -> ReportKind {
        ReportKind::Clover
    }

    fn write_report(&self, model: &UnifiedModel) -> Result<()> {
        write_file(&self.path, &Self::render(model)?)
    }
}

fn metrics_element(summary: &CoverageSummary) -> BytesStart<'static> {
    let elements = summary.statements.total + summary.branches.total + summary.functions.total;
    let covered =
        summary.statements.covered + summary.branches.covered + summary.functions.covered;
    let mut metrics = BytesStart::new("metrics");
    for (name, value) in [
        ("statements", summary.statements.total),
        ("coveredstatements", summary.statements.covered),
        ("conditionals", summary.branches.total),
        ("coveredconditionals", summary.branches.covered),
        ("methods", summary.functions.total),
        ("coveredmethods", summary.functions.covered),
        ("elements", elements),
        ("coveredelements", covered),
        ("loc", summary.lines.total),
        ("ncloc", summary.lines.total),
    ] {
        metrics.push_attribute((name, value.to_string().as_str()));
    }
    metrics
}

fn write_file_element(xml: &mut Writer<Vec<u8>>, file: &FileCoverage) -> Result<()> {
    let name = Path::new(&file.path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.path.clone());
    let mut element = BytesStart::new("file");
    element.push_attribute(("name", name.as_str()));
    element.push_attribute(("path", file.path.as_str()));
    xml.write_event(Event::Start(element))?;
    xml.write_event(Event::Empty(metrics_element(&CoverageSummary::for_file(file))))?;

    for (idx, meta) in &file.fn_map {
        let count = file.f.get(idx).copied().unwrap_or(0).to_string();
        let signature = format!("{}()", meta.name);
        let line = function_line(meta).to_string();
        let mut el = BytesStart::new("line");
        el.push_attribute(("num", line.as_str()));
        el.push_attribute(("count", count.as_str()));
        el.push_attribute(("type", "method"));
        el.push_attribute(("signature", signature.as_str()));
        xml.write_event(Event::Empty(el))?;
    }

    // Arms taken / not taken, per source line.
    let mut conditions: BTreeMap<u32, (u64, u64)> = BTreeMap::new();
    for (idx, meta) in &file.branch_map {
        let arms = file.b.get(idx).cloned().unwrap_or_default();
        let taken = arms.iter().filter(|c| **c > 0).count() as u64;
        let entry = conditions.entry(branch_line(meta)).or_default();
        entry.0 += taken;
        entry.1 += meta.locations.len() as u64 - taken;
    }

    for (line, count) in file.line_counts() {
        let num = line.to_string();
        let count = count.to_string();
        let mut el = BytesStart::new("line");
        el.push_attribute(("num", num.as_str()));
        el.push_attribute(("count", count.as_str()));
        match conditions.get(&line) {
            Some((taken, missed)) => {
                el.push_attribute(("type", "cond"));
                el.push_attribute(("truecount", taken.to_string().as_str()));
                el.push_attribute(("falsecount", missed.to_string().as_str()));
            }
            None => el.push_attribute(("type", "stmt")),
        }
        xml.write_event(Event::Empty(el))?;
    }

    xml.write_event(Event::End(BytesEnd::new("file")))?;
    Ok(())
}
