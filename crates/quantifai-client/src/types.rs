//! Normalized analysis results and the lifecycle state that carries them.
//!
//! The service returns either a bare summary or a summary plus a per-day
//! table. [`normalize_response`](crate::normalize_response) folds both into
//! [`AnalysisResult`], whose `detail` is always a (possibly empty) sequence.

use chrono::{DateTime, NaiveDate};
use serde::Serialize;
use serde_json::{Map, Value};

/// Aggregate recommendation.
///
/// Fields the service did not send stay `None`. Zero is a real
/// recommendation and is never used to mean "absent".
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnalysisSummary {
    pub stock: Option<f64>,
    pub staff: Option<f64>,
    /// Opaque identifier passed back to the download endpoint.
    pub output_file: Option<String>,
}

impl AnalysisSummary {
    /// `true` when there is a non-empty identifier to download.
    #[must_use]
    pub fn download_available(&self) -> bool {
        self.output_file.as_deref().is_some_and(|f| !f.is_empty())
    }
}

/// One per-day row of the detailed forecast.
///
/// Columns are kept exactly as the service named and ordered them. The
/// product columns come from a ratio table on the service side, so the set
/// is open; only the date, total and staff columns have fixed names.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DetailRow(Map<String, Value>);

impl DetailRow {
    pub const DATE_COLUMN: &'static str = "Date";
    pub const TOTAL_COLUMN: &'static str = "Total (kg)";
    pub const STAFF_COLUMN: &'static str = "Staff";

    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.get(column)
    }

    /// Column names in the order the service sent them.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parses the `Date` column.
    ///
    /// Accepts `YYYY-MM-DD`, `DD/MM/YYYY`, and the RFC 2822 form Flask's JSON
    /// encoder produces for dates (`Mon, 01 Jan 2024 00:00:00 GMT`).
    #[must_use]
    pub fn date(&self) -> Option<NaiveDate> {
        let raw = self.get(Self::DATE_COLUMN)?.as_str()?.trim();
        parse_service_date(raw)
    }

    #[must_use]
    pub fn total(&self) -> Option<f64> {
        self.get(Self::TOTAL_COLUMN).and_then(Value::as_f64)
    }

    #[must_use]
    pub fn staff(&self) -> Option<f64> {
        self.get(Self::STAFF_COLUMN).and_then(Value::as_f64)
    }

    /// Numeric columns other than date, total and staff: the per-category
    /// breakdown.
    pub fn categories(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().filter_map(|(name, value)| {
            let name = name.as_str();
            if [Self::DATE_COLUMN, Self::TOTAL_COLUMN, Self::STAFF_COLUMN].contains(&name) {
                return None;
            }
            value.as_f64().map(|v| (name, v))
        })
    }
}

impl From<Map<String, Value>> for DetailRow {
    fn from(columns: Map<String, Value>) -> Self {
        Self(columns)
    }
}

pub(crate) fn parse_service_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%d/%m/%Y"))
        .ok()
        .or_else(|| DateTime::parse_from_rfc2822(raw).ok().map(|d| d.date_naive()))
}

/// Outcome of one completed analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub summary: AnalysisSummary,
    pub detail: Vec<DetailRow>,
}

impl AnalysisResult {
    /// Re-encodes the result in the service's own response shape.
    ///
    /// Absent summary fields are omitted and an empty `detail` is written as
    /// an empty `detailed_results` array.
    #[must_use]
    pub fn to_body(&self) -> Map<String, Value> {
        let mut body = Map::new();
        if let Some(stock) = self.summary.stock {
            body.insert("stock".to_string(), Value::from(stock));
        }
        if let Some(staff) = self.summary.staff {
            body.insert("staff".to_string(), Value::from(staff));
        }
        if let Some(output_file) = &self.summary.output_file {
            body.insert("output_file".to_string(), Value::from(output_file.clone()));
        }
        let rows = self
            .detail
            .iter()
            .map(|row| Value::Object(row.0.clone()))
            .collect();
        body.insert("detailed_results".to_string(), Value::Array(rows));
        body
    }
}

/// Where a submission currently stands. Exactly one variant holds at a time.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum LifecycleState {
    #[default]
    Idle,
    Submitting,
    Succeeded(AnalysisResult),
    /// Carries a fixed, user-facing message; the technical cause is only
    /// logged.
    Failed(String),
}

impl LifecycleState {
    #[must_use]
    pub fn is_submitting(&self) -> bool {
        matches!(self, LifecycleState::Submitting)
    }

    #[must_use]
    pub fn result(&self) -> Option<&AnalysisResult> {
        match self {
            LifecycleState::Succeeded(result) => Some(result),
            _ => None,
        }
    }

    #[must_use]
    pub fn failure_message(&self) -> Option<&str> {
        match self {
            LifecycleState::Failed(message) => Some(message),
            _ => None,
        }
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleState::Idle => write!(f, "idle"),
            LifecycleState::Submitting => write!(f, "submitting"),
            LifecycleState::Succeeded(_) => write!(f, "succeeded"),
            LifecycleState::Failed(_) => write!(f, "failed"),
        }
    }
}
