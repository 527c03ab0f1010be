use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// One object as returned by the remote source, keyed by column name
pub type RawRecord = Map<String, Value>;

/// A reported call for service, as read back from the stored table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentRecord {
    /// Parsed incident time, `None` when the stored value is missing or unparseable
    pub created_at: Option<NaiveDateTime>,
    /// The stored timestamp text exactly as it appeared in the table
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_raw: Option<String>,
    /// Offense type code, e.g. "ROBBERY PERSONAL (IP)"
    pub incident_type_id: Option<String>,
    pub incident_type_desc: Option<String>,
    pub disposition_text: Option<String>,
    /// Primary (police) neighborhood name
    pub cpd_neighborhood: String,
    /// Statistical neighborhood name
    pub sna_neighborhood: Option<String>,
    pub priority: Option<f64>,
    pub event_number: Option<String>,
}

impl IncidentRecord {
    /// Calendar date of the incident, if the timestamp parsed
    pub fn date(&self) -> Option<NaiveDate> {
        self.created_at.map(|ts| ts.date())
    }
}

/// A fetched table before normalization: the union of all keys seen, in
/// first-seen order, and the records themselves
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<RawRecord>,
}

impl RawTable {
    pub fn from_records(rows: Vec<RawRecord>) -> Self {
        let headers = {
            let mut headers: Vec<String> = Vec::new();
            let mut seen: HashSet<&str> = HashSet::new();
            for row in &rows {
                for key in row.keys() {
                    if seen.insert(key.as_str()) {
                        headers.push(key.clone());
                    }
                }
            }
            headers
        };
        Self { headers, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Render a JSON cell the way it is written to the stored table
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %H:%M",
];

/// Parse an incident timestamp in any of the shapes the source and the
/// stored table use. Returns `None` instead of failing.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    for format in TIMESTAMP_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(ts);
        }
    }

    // Offset-qualified values keep their wall-clock time
    if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(ts.naive_local());
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Timestamp format written by the normalized refresh
pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Parse a priority cell; non-numeric values become `None`
pub fn parse_priority(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|p| p.is_finite())
}

/// Integral priorities print without a fractional part
pub fn format_priority(priority: f64) -> String {
    if priority.fract() == 0.0 && priority.abs() < 1e15 {
        format!("{}", priority as i64)
    } else {
        priority.to_string()
    }
}
