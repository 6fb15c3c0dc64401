//! Human and machine readable matrix output

use crate::{Error, Result};

use super::Entry;

/// Output format for a rendered matrix
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Columnar table (default)
    #[default]
    Table,
    /// Pretty-printed JSON array
    Json,
}

/// Render matrix entries in the requested format
pub fn render(entries: &[Entry], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Table => Ok(render_table(entries)),
        OutputFormat::Json => serde_json::to_string_pretty(entries)
            .map_err(|e| Error::internal(format!("failed to serialize matrix to JSON: {}", e))),
    }
}

fn or_dash(value: &str) -> String {
    if value.is_empty() {
        "-".to_string()
    } else {
        value.to_string()
    }
}

fn or_derived(value: &str) -> String {
    if value.is_empty() {
        "(derived)".to_string()
    } else {
        value.to_string()
    }
}

/// Format rows as a column-aligned table with headers.
fn format_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.len());
            }
        }
    }

    let line = |cells: Vec<&str>| -> String {
        cells
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let w = widths.get(i).copied().unwrap_or(0);
                format!("{:<width$}", cell, width = w)
            })
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = String::new();
    out.push_str(&line(headers.to_vec()));
    out.push('\n');
    for row in rows {
        out.push_str(&line(row.iter().map(String::as_str).collect()));
        out.push('\n');
    }
    out
}

fn render_table(entries: &[Entry]) -> String {
    if entries.is_empty() {
        return "No matrix entries found.".to_string();
    }

    let headers = [
        "VER",
        "SCENARIO",
        "SHORT",
        "FLOW",
        "PLATFORM",
        "IDENTITY",
        "PERSISTENCE",
        "FEATURES",
    ];
    let rows: Vec<Vec<String>> = entries
        .iter()
        .map(|e| {
            vec![
                e.version.clone(),
                e.scenario.clone(),
                or_dash(&e.shortname),
                e.flow.to_string(),
                or_dash(e.platform.as_deref().unwrap_or_default()),
                or_derived(&e.identity),
                or_derived(&e.persistence),
                or_dash(&e.features.join(",")),
            ]
        })
        .collect();

    let mut out = format_table(&headers, &rows);
    out.push_str(&format!("\nTotal: {} entries\n", entries.len()));
    out
}
