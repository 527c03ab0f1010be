use crate::offense;
use crate::types::{format_priority, parse_timestamp, IncidentRecord};

/// Number of example incidents rendered into a summary
pub const MAX_EXAMPLES: usize = 5;

pub const NO_RECORDS: &str = "No matching records found.";

const MISSING: &str = "N/A";

/// Render the records selected for `question` as plain sentences for the
/// model prompt.
///
/// Counting questions get the size of `records` as given, including any
/// undated rows a caller passes in; nothing is re-filtered here.
pub fn summarize(question: &str, records: &[IncidentRecord]) -> String {
    if records.is_empty() {
        return NO_RECORDS.to_string();
    }

    if offense::has_count_cue(&question.to_lowercase()) {
        return format!("There were {} incidents matching your query.", records.len());
    }

    records
        .iter()
        .take(MAX_EXAMPLES)
        .map(describe)
        .collect::<Vec<_>>()
        .join("\n")
}

/// One sentence per incident
pub fn describe(record: &IncidentRecord) -> String {
    let offense = record.incident_type_id.as_deref().unwrap_or(MISSING);
    let priority = record
        .priority
        .map(format_priority)
        .unwrap_or_else(|| MISSING.to_string());
    let hood = if record.cpd_neighborhood.is_empty() {
        MISSING
    } else {
        record.cpd_neighborhood.as_str()
    };
    let incident = record.event_number.as_deref().unwrap_or(MISSING);

    format!(
        "On {}, a {} (Priority {}) occurred in {} (Incident #{}).",
        display_date(record),
        offense,
        priority,
        hood,
        incident
    )
}

/// Date part of the timestamp. Falls back to re-parsing the stored text and
/// then to the text itself.
fn display_date(record: &IncidentRecord) -> String {
    if let Some(date) = record.date() {
        return date.to_string();
    }
    match record.created_raw.as_deref() {
        Some(raw) => parse_timestamp(raw)
            .map(|ts| ts.date().to_string())
            .unwrap_or_else(|| raw.to_string()),
        None => MISSING.to_string(),
    }
}
