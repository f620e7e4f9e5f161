mod progress;
mod styling;
mod tables;

use std::fmt::Write;

use crate::config::OutputFormat;
use crate::error::Result;
use crate::report::BatchReport;

pub use progress::PhaseProgress;
pub use styling::{dim, magenta_bold};

/// Prints the glfetch banner to stderr.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        magenta_bold("🦊 glfetch"),
        dim(env!("CARGO_PKG_VERSION")),
        dim("GitLab project and pipeline fetcher")
    );
}

/// Renders a batch report in the requested format.
///
/// Text output has one `Project:` line per project whose metadata parsed,
/// followed by one `Pipeline id=` line per pipeline in API order.
pub fn render(report: &BatchReport, format: OutputFormat, pretty: bool) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(render_text(report)),
        OutputFormat::Json if pretty => Ok(serde_json::to_string_pretty(report)?),
        OutputFormat::Json => Ok(serde_json::to_string(report)?),
        OutputFormat::Table => Ok(tables::render_tables(report)),
    }
}

fn render_text(report: &BatchReport) -> String {
    let mut output = String::new();
    for project in &report.projects {
        if project.metadata_parsed {
            let _ = writeln!(
                output,
                "Project: id={} path_with_namespace={} name={}",
                project.id, project.path_with_namespace, project.name
            );
        }
        for pipeline in &project.pipelines {
            let _ = writeln!(output, "Pipeline id={}", pipeline.id);
        }
    }
    output
}
