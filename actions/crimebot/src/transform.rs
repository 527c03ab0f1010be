//! Column projection and cleanup applied before the table is saved.

use serde_json::Value;
use tracing::info;

use crate::types::{
    cell_text, format_priority, format_timestamp, parse_priority, parse_timestamp, RawRecord,
    RawTable,
};

pub const CREATE_TIME: &str = "create_time_incident";
pub const TYPE_DESC: &str = "incident_type_desc";
pub const TYPE_ID: &str = "incident_type_id";
pub const DISPOSITION: &str = "disposition_text";
pub const EVENT_NUMBER: &str = "event_number";
pub const SNA_NEIGHBORHOOD: &str = "sna_neighborhood";
pub const CPD_NEIGHBORHOOD: &str = "cpd_neighborhood";
pub const PRIORITY: &str = "priority";

/// Columns kept by [`normalize`], in output order
pub const KEEP_COLUMNS: [&str; 8] = [
    CREATE_TIME,
    TYPE_DESC,
    TYPE_ID,
    DISPOSITION,
    EVENT_NUMBER,
    SNA_NEIGHBORHOOD,
    CPD_NEIGHBORHOOD,
    PRIORITY,
];

/// Non-empty text of a cell, if any
fn text(record: &RawRecord, column: &str) -> Option<String> {
    record
        .get(column)
        .map(cell_text)
        .filter(|s| !s.trim().is_empty())
}

fn to_value(cell: Option<String>) -> Value {
    cell.map(Value::String).unwrap_or(Value::Null)
}

/// Project one record onto [`KEEP_COLUMNS`]
pub fn normalize_record(record: &RawRecord) -> RawRecord {
    let created = text(record, CREATE_TIME)
        .and_then(|raw| parse_timestamp(&raw))
        .map(|ts| format_timestamp(&ts));
    let priority = text(record, PRIORITY)
        .and_then(|raw| parse_priority(&raw))
        .map(format_priority);
    let disposition = text(record, DISPOSITION);
    let description = text(record, TYPE_DESC).or_else(|| disposition.clone());
    let cpd = text(record, CPD_NEIGHBORHOOD);
    let sna = text(record, SNA_NEIGHBORHOOD).or_else(|| cpd.clone());

    let mut out = RawRecord::new();
    out.insert(CREATE_TIME.to_string(), to_value(created));
    out.insert(TYPE_DESC.to_string(), to_value(description));
    out.insert(TYPE_ID.to_string(), to_value(text(record, TYPE_ID)));
    out.insert(DISPOSITION.to_string(), to_value(disposition));
    out.insert(EVENT_NUMBER.to_string(), to_value(text(record, EVENT_NUMBER)));
    out.insert(SNA_NEIGHBORHOOD.to_string(), to_value(sna));
    out.insert(CPD_NEIGHBORHOOD.to_string(), to_value(cpd));
    out.insert(PRIORITY.to_string(), to_value(priority));
    out
}

/// Keep the fixed column set, coerce the timestamp and priority, and fill
/// the description and statistical neighborhood from their fallbacks
pub fn normalize(records: Vec<RawRecord>) -> RawTable {
    let rows: Vec<RawRecord> = records.iter().map(normalize_record).collect();
    info!(rows = rows.len(), columns = KEEP_COLUMNS.len(), "Data transformed");
    RawTable {
        headers: KEEP_COLUMNS.iter().map(|c| c.to_string()).collect(),
        rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> RawRecord {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_projection_and_coercion() {
        let record = raw(json!({
            "create_time_incident": "2024-03-15T08:12:00.000",
            "incident_type_id": "THEFT (IP)(W)",
            "incident_type_desc": "THEFT IN PROGRESS",
            "disposition_text": "ARREST",
            "event_number": "CPD240315000123",
            "sna_neighborhood": "WESTWOOD",
            "cpd_neighborhood": "WESTWOOD",
            "priority": "2",
            "beat": "P3",
            "location": {"latitude": "39.1"}
        }));

        let out = normalize_record(&record);
        assert_eq!(out.len(), KEEP_COLUMNS.len());
        assert!(out.get("beat").is_none());
        assert_eq!(out[CREATE_TIME], "2024-03-15 08:12:00");
        assert_eq!(out[PRIORITY], "2");
        assert_eq!(out[TYPE_DESC], "THEFT IN PROGRESS");
    }

    #[test]
    fn test_fallbacks() {
        let record = raw(json!({
            "create_time_incident": "garbage",
            "disposition_text": "REPORT TAKEN",
            "cpd_neighborhood": "CUF",
            "priority": "urgent"
        }));

        let out = normalize_record(&record);
        assert_eq!(out[TYPE_DESC], "REPORT TAKEN");
        assert_eq!(out[SNA_NEIGHBORHOOD], "CUF");
        assert_eq!(out[CREATE_TIME], Value::Null);
        assert_eq!(out[PRIORITY], Value::Null);
        assert_eq!(out[TYPE_ID], Value::Null);
    }

    #[test]
    fn test_normalize_headers_are_fixed() {
        let table = normalize(vec![raw(json!({"zzz": "1"}))]);
        assert_eq!(table.headers, KEEP_COLUMNS.to_vec());
        assert_eq!(table.len(), 1);
    }
}
