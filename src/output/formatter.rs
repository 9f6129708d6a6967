use super::{MapReport, PinPathReport, PinReport, ProgramReport, Report};
use crate::cli::OutputFormat;
use crate::pin::PinState;
use anyhow::{Context, Result};
use colored::*;
use prettytable::{format, Cell, Row, Table};
use std::path::Path;

/// Formats a report based on the specified output format
pub fn format_output(report: &Report, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Table => Ok(format_table(report)),
        OutputFormat::Json => format_json(report),
    }
}

/// JSON stays uncoloured so it can be piped
fn format_json(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).context("Failed to serialize report to JSON")
}

fn format_table(report: &Report) -> String {
    match report {
        Report::Map(map) => map_table(map),
        Report::Program(prog) => program_table(prog),
        Report::PinPath(pin) => pin_path_table(pin),
    }
}

fn map_table(map: &MapReport) -> String {
    let mut output = format!("\n{}\n", "Map created".bold());
    let mut table = new_table();
    add_row(&mut table, "Name", display_name(&map.name));
    add_row(&mut table, "Type", &map.map_type);
    add_row(
        &mut table,
        "Key/Value Size",
        &format!("{}/{}", map.key_size, map.value_size),
    );
    add_row(&mut table, "Max Entries", &map.max_entries.to_string());
    let flags = if map.flags.is_empty() {
        "-".to_string()
    } else {
        map.flags.join(",")
    };
    add_row(&mut table, "Flags", &flags);
    if let Some(node) = map.numa_node {
        add_row(&mut table, "NUMA Node", &node.to_string());
    }
    add_row(&mut table, "FD", &map.fd.to_string());
    add_pin_rows(&mut table, &map.pin);
    output.push_str(&table.to_string());
    output
}

fn program_table(prog: &ProgramReport) -> String {
    let mut output = format!("\n{}\n", "Program loaded".bold());
    let mut table = new_table();
    add_row(&mut table, "Object", &prog.object.display().to_string());
    add_row(&mut table, "Section", &prog.section);
    add_row(
        &mut table,
        "Name",
        display_name(prog.name.as_deref().unwrap_or("")),
    );
    add_row(&mut table, "Type", &prog.program_type);
    add_row(&mut table, "Instructions", &prog.instructions.to_string());
    add_row(&mut table, "License", &prog.license);
    add_row(&mut table, "FD", &prog.fd.to_string());
    add_pin_rows(&mut table, &prog.pin);
    output.push_str(&table.to_string());
    output
}

fn pin_path_table(pin: &PinPathReport) -> String {
    let mut table = new_table();
    add_row(&mut table, "Name", &pin.name);
    add_row(&mut table, "Mode", &pin.mode);
    add_row(&mut table, "Path", &display_path(pin.path.as_deref()));
    table.to_string()
}

fn add_pin_rows(table: &mut Table, pin: &PinReport) {
    add_row(table, "Pin Mode", &pin.mode);
    // Pin failures surface as errors, so only the two settled states reach here
    let state = match pin.state {
        PinState::Pinned => pin.state.to_string().green(),
        _ => pin.state.to_string().normal(),
    };
    table.add_row(Row::new(vec![
        Cell::new("Pin State").style_spec("b"),
        Cell::new(&state.to_string()),
    ]));
    add_row(table, "Pin Path", &display_path(pin.path.as_deref()));
}

fn new_table() -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
    table
}

fn add_row(table: &mut Table, key: &str, value: &str) {
    table.add_row(Row::new(vec![
        Cell::new(key).style_spec("b"),
        Cell::new(value),
    ]));
}

fn display_name(name: &str) -> &str {
    if name.is_empty() {
        "-"
    } else {
        name
    }
}

fn display_path(path: Option<&Path>) -> String {
    path.map(|p| p.display().to_string())
        .unwrap_or_else(|| "-".to_string())
}
