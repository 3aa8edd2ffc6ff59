//! Static HTML report: an index table plus one annotated page per file.

use std::fmt::Write;
use std::fs;
use std::path::{Component, Path, PathBuf};

use html_escape::encode_text;

use super::{write_file, ReportKind, ReportOptions, ReportWriter, Watermarks};
use crate::collect::UnifiedModel;
use crate::error::Result;
use crate::model::FileCoverage;
use crate::summary::{CoverageSummary, Metric};

const STYLE: &str = "\
body { font-family: sans-serif; margin: 2em; }
table { border-collapse: collapse; }
td, th { padding: 2px 8px; border: 1px solid #ddd; text-align: right; }
td.file { text-align: left; }
.low { background: #fce1e5; }
.medium { background: #fff4c2; }
.high { background: #e6f5d0; }
pre { margin: 0; }
tr.miss td { background: #fce1e5; }
tr.hit td.count { color: #3c763d; }
";

pub struct HtmlReport {
    dir: PathBuf,
    source_root: PathBuf,
    watermarks: Watermarks,
}

impl HtmlReport {
    pub fn new(dir: PathBuf, options: &ReportOptions) -> Self {
        Self {
            dir,
            source_root: options.source_root.clone(),
            watermarks: options.watermarks,
        }
    }

    fn render_index(&self, model: &UnifiedModel) -> String {
        let mut html = page_start("Code coverage report for All files");
        html.push_str("<h1>All files</h1>\n<table>\n");
        html.push_str(
            "<tr><th>File</th><th>Statements</th><th>Branches</th>\
             <th>Functions</th><th>Lines</th></tr>\n",
        );
        self.summary_row(&mut html, "All files", None, &model.summary());
        for file in model.files() {
            let link = page_name(&file.path);
            self.summary_row(
                &mut html,
                &file.path,
                Some(&link),
                &CoverageSummary::for_file(file),
            );
        }
        html.push_str("</table>\n");
        page_end(&mut html);
        html
    }

    fn summary_row(
        &self,
        html: &mut String,
        label: &str,
        link: Option<&str>,
        summary: &CoverageSummary,
    ) {
        let label = encode_text(label);
        let cell = match link {
            Some(href) => format!("<tr><td class=\"file\"><a href=\"{href}\">{label}</a></td>"),
            None => format!("<tr><td class=\"file\"><strong>{label}</strong></td>"),
        };
        html.push_str(&cell);
        for metric in [
            Metric::Statements,
            Metric::Branches,
            Metric::Functions,
            Metric::Lines,
        ] {
            let totals = summary.metric(metric);
            let level = self.watermarks.level(metric, totals.pct);
            write!(
                html,
                "<td class=\"{}\">{}% ({}/{})</td>",
                level.as_str(),
                totals.pct,
                totals.covered,
                totals.total
            )
            .unwrap();
        }
        html.push_str("</tr>\n");
    }

    fn render_file(&self, file: &FileCoverage) -> String {
        let title = format!("Code coverage report for {}", file.path);
        let mut html = page_start(&title);
        writeln!(html, "<h1>{}</h1>", encode_text(&file.path)).unwrap();
        let mut summary = String::from("<table>\n");
        self.summary_row(&mut summary, &file.path, None, &CoverageSummary::for_file(file));
        summary.push_str("</table>\n");
        html.push_str(&summary);

        let counts = file.line_counts();
        html.push_str("<table class=\"source\">\n");
        match read_source(&self.source_root, &file.path) {
            Some(source) => {
                for (idx, text) in source.lines().enumerate() {
                    source_row(&mut html, idx as u32 + 1, counts.get(&(idx as u32 + 1)), text);
                }
            }
            None => {
                for (line, count) in &counts {
                    source_row(&mut html, *line, Some(count), "");
                }
            }
        }
        html.push_str("</table>\n");
        page_end(&mut html);
        html
    }
}

impl ReportWriter for HtmlReport {
    fn kind(&self) -> ReportKind {
        ReportKind::Html
    }

    fn write_report(&self, model: &UnifiedModel) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        write_file(&self.dir.join("index.html"), self.render_index(model).as_bytes())?;
        for file in model.files() {
            let page = self.render_file(file);
            write_file(&self.dir.join(page_name(&file.path)), page.as_bytes())?;
        }
        Ok(())
    }
}

fn source_row(html: &mut String, line: u32, count: Option<&u64>, text: &str) {
    let (class, count) = match count {
        Some(&0) => ("miss", "0".to_string()),
        Some(c) => ("hit", format!("{c}x")),
        None => ("", String::new()),
    };
    writeln!(
        html,
        "<tr class=\"{class}\"><td>{line}</td><td class=\"count\">{count}</td>\
         <td class=\"file\"><pre>{}</pre></td></tr>",
        encode_text(text)
    )
    .unwrap();
}

/// Page location for a source path, mirroring its directories under the
/// report directory. Root and drive prefixes are dropped and `..` becomes
/// `__`, so pages stay inside the report directory.
pub fn page_name(path: &str) -> String {
    let segments: Vec<String> = Path::new(path)
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().replace(':', "_")),
            Component::ParentDir => Some("__".to_string()),
            Component::RootDir | Component::Prefix(_) | Component::CurDir => None,
        })
        .collect();
    format!("{}.html", segments.join("/"))
}

fn read_source(root: &Path, path: &str) -> Option<String> {
    let path = Path::new(path);
    let full = if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    };
    fs::read_to_string(full).ok()
}

fn page_start(title: &str) -> String {
    let mut html = String::new();
    writeln!(
        html,
        "<!doctype html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n<style>\n{STYLE}</style>\n</head>\n<body>",
        encode_text(title)
    )
    .unwrap();
    html
}

fn page_end(html: &mut String) {
    writeln!(
        html,
        "<p><small>Generated {}</small></p>\n</body>\n</html>",
        chrono::Utc::now().to_rfc3339()
    )
    .unwrap();
}
