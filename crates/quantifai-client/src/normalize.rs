//! Normalization of analysis service responses into [`AnalysisResult`].
//!
//! Two response shapes exist in the wild: a flat summary
//! (`stock`, `staff`, `output_file`) and the same summary plus a
//! `detailed_results` array of per-day rows. Both go through the same path
//! with no version switch.

use serde_json::{Map, Value};

use crate::types::{AnalysisResult, AnalysisSummary, DetailRow};

/// Converts a raw response body into an [`AnalysisResult`].
///
/// Missing or mistyped summary fields become `None`. A missing or
/// non-array `detailed_results` becomes an empty `detail`; array elements
/// that are not objects are skipped. Row contents are passed through
/// untouched.
#[must_use]
pub fn normalize_response(body: &Map<String, Value>) -> AnalysisResult {
    let summary = AnalysisSummary {
        stock: body.get("stock").and_then(Value::as_f64),
        staff: body.get("staff").and_then(Value::as_f64),
        output_file: body
            .get("output_file")
            .and_then(Value::as_str)
            .map(str::to_owned),
    };

    let detail = match body.get("detailed_results") {
        Some(Value::Array(rows)) => rows
            .iter()
            .enumerate()
            .filter_map(|(index, row)| match row {
                Value::Object(columns) => Some(DetailRow::from(columns.clone())),
                _ => {
                    tracing::warn!(index, "normalize_response: skipping non-object detail row");
                    None
                }
            })
            .collect(),
        Some(Value::Null) | None => Vec::new(),
        Some(_) => {
            tracing::warn!("normalize_response: detailed_results is not an array; ignoring");
            Vec::new()
        }
    };

    AnalysisResult { summary, detail }
}
