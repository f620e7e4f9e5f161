use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color as TableColor, ContentArrangement, Table};

use crate::report::{BatchReport, FailureReport, ProjectReport};

pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn header(labels: &[&str]) -> Vec<Cell> {
    labels
        .iter()
        .map(|label| Cell::new(*label).fg(TableColor::Cyan))
        .collect()
}

/// Colors a pipeline status the way the GitLab UI does.
pub fn color_coded_status_cell(status: &str) -> Cell {
    let cell = Cell::new(status);
    match status {
        "success" => cell.fg(TableColor::Green),
        "failed" => cell.fg(TableColor::Red),
        "running" | "pending" | "created" | "preparing" | "waiting_for_resource" => {
            cell.fg(TableColor::Yellow)
        }
        _ => cell,
    }
}

pub fn projects_table(projects: &[ProjectReport]) -> Table {
    let mut table = create_table();
    table.set_header(header(&["Project", "Path", "Name", "Pipeline", "Ref", "Status"]));

    for project in projects {
        let first = project.pipelines.first();
        table.add_row(vec![
            Cell::new(project.id),
            Cell::new(&project.path_with_namespace),
            Cell::new(&project.name),
            first.map_or_else(|| Cell::new("-"), |p| Cell::new(p.id)),
            first.map_or_else(|| Cell::new("-"), |p| Cell::new(&p.ref_)),
            first.map_or_else(|| Cell::new("-"), |p| color_coded_status_cell(&p.status)),
        ]);

        for pipeline in project.pipelines.iter().skip(1) {
            table.add_row(vec![
                Cell::new(""),
                Cell::new(""),
                Cell::new(""),
                Cell::new(pipeline.id),
                Cell::new(&pipeline.ref_),
                color_coded_status_cell(&pipeline.status),
            ]);
        }
    }
    table
}

pub fn failures_table(failures: &[FailureReport]) -> Table {
    let mut table = create_table();
    table.set_header(header(&["Project", "Phase", "Error"]));
    for failure in failures {
        table.add_row(vec![
            Cell::new(failure.project_id),
            Cell::new(failure.phase),
            Cell::new(&failure.error).fg(TableColor::Red),
        ]);
    }
    table
}

pub fn render_tables(report: &BatchReport) -> String {
    let mut output = projects_table(&report.projects).to_string();
    if !report.failures.is_empty() {
        output.push('\n');
        output.push_str(&failures_table(&report.failures).to_string());
    }
    output
}
