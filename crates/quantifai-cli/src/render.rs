//! Text and JSON rendering of lifecycle states.
//!
//! Everything here is a pure function of its inputs so it can be tested
//! without a terminal or a service.

use std::fmt::Write as _;

use quantifai_client::{AnalysisResult, AnalysisSummary, DetailRow, LifecycleState, Url};
use serde::Serialize;
use serde_json::Value;

pub(crate) const PROGRESS_MESSAGE: &str = "Analysis in progress...";

const MISSING: &str = "\u{2014}";

/// Render any lifecycle state for the terminal.
pub(crate) fn render_state(state: &LifecycleState, download_url: Option<&Url>) -> String {
    match state {
        LifecycleState::Idle => String::new(),
        LifecycleState::Submitting => format!("{PROGRESS_MESSAGE}\n"),
        LifecycleState::Failed(message) => format!("{message}\n"),
        LifecycleState::Succeeded(result) => {
            let mut out = render_summary(&result.summary, download_url);
            out.push('\n');
            if result.detail.is_empty() {
                out.push_str("No per-day breakdown returned.\n");
            } else {
                out.push_str(&render_detail(&result.detail));
            }
            out
        }
    }
}

pub(crate) fn render_summary(summary: &AnalysisSummary, download_url: Option<&Url>) -> String {
    let link = download_url.map_or_else(|| "unavailable".to_string(), ToString::to_string);
    format!(
        "Analysis result\n  Recommended stock (kg): {}\n  Recommended staff:      {}\n  Result file:            {link}\n",
        fmt_number(summary.stock),
        fmt_number(summary.staff),
    )
}

/// Table with one line per row. Columns are the union of every row's
/// columns in first-seen order; a row missing a column shows a dash.
pub(crate) fn render_detail(rows: &[DetailRow]) -> String {
    let mut columns: Vec<&str> = Vec::new();
    for row in rows {
        for column in row.columns() {
            if !columns.contains(&column) {
                columns.push(column);
            }
        }
    }

    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| columns.iter().map(|c| fmt_cell(row, c)).collect())
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, header)| {
            cells
                .iter()
                .map(|line| line[i].chars().count())
                .chain(std::iter::once(header.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut out = String::new();
    write_line(&mut out, columns.iter().copied(), &widths);
    for line in &cells {
        write_line(&mut out, line.iter().map(String::as_str), &widths);
    }
    out
}

fn write_line<'a>(out: &mut String, cells: impl Iterator<Item = &'a str>, widths: &[usize]) {
    let line = cells
        .zip(widths)
        .map(|(cell, width)| format!("{cell:<width$}"))
        .collect::<Vec<_>>()
        .join("  ");
    let _ = writeln!(out, "{}", line.trim_end());
}

fn fmt_cell(row: &DetailRow, column: &str) -> String {
    if column == DetailRow::DATE_COLUMN {
        if let Some(date) = row.date() {
            return date.to_string();
        }
    }
    match row.get(column) {
        None | Some(Value::Null) => MISSING.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => fmt_number(n.as_f64()),
        Some(other) => other.to_string(),
    }
}

/// Whole numbers print without a fractional part, others with two decimals.
pub(crate) fn fmt_number(value: Option<f64>) -> String {
    match value {
        None => MISSING.to_string(),
        Some(v) if v.fract().abs() < f64::EPSILON => format!("{v:.0}"),
        Some(v) => format!("{v:.2}"),
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    #[serde(flatten)]
    result: &'a AnalysisResult,
    download_url: Option<&'a str>,
}

/// Normalized result plus the resolved download link, as pretty JSON.
pub(crate) fn render_json(
    result: &AnalysisResult,
    download_url: Option<&Url>,
) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&JsonReport {
        result,
        download_url: download_url.map(Url::as_str),
    })
}
