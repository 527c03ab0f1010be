//! Turn a free-text question into a narrowed, ordered set of incidents.
//!
//! Matching is plain substring and regex presence over the lower-cased
//! question. It is a best-effort heuristic: a number that looks like a year
//! or a day count will be read as one.

use chrono::{Datelike, Duration, Local, NaiveDate, NaiveDateTime};
use regex::Regex;
use std::sync::OnceLock;

use crate::offense::{self, OffenseGroup};
use crate::types::IncidentRecord;

/// Filter result indicating whether a record should be kept
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterResult {
    Keep,
    FilterOut,
}

/// An explicit `YYYY-MM-DD` / `YYYY/M/D` date found in the question
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExplicitDate {
    Valid(NaiveDate),
    /// The digits matched but do not form a calendar date; nothing matches
    Impossible,
}

/// Relative time phrases. Only one applies per question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeWindow {
    /// Timestamp at or after the instant
    Since(NaiveDateTime),
    /// Timestamp falls on the calendar date
    OnDate(NaiveDate),
    /// A day count too large to subtract from now; any dated record passes
    Unbounded,
}

/// The predicates read out of one question
#[derive(Debug, Clone, PartialEq)]
pub struct QueryFilter {
    pub neighborhood: Option<String>,
    pub group: Option<&'static OffenseGroup>,
    pub date: Option<ExplicitDate>,
    pub window: Option<TimeWindow>,
    pub month: Option<u32>,
    pub year: Option<i32>,
    pub newest_first: bool,
}

fn explicit_date_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(20\d{2})[-/](\d{1,2})[-/](\d{1,2})").expect("explicit date pattern")
    })
}

fn last_n_days_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(past|last)\s+(\d+)\s+day").expect("day count pattern"))
}

fn year_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(20\d{2})").expect("year pattern"))
}

impl QueryFilter {
    /// Read the predicates out of `question`. Neighborhood names come from
    /// the table itself; `now` anchors the relative phrases.
    pub fn parse(question: &str, table: &[IncidentRecord], now: NaiveDateTime) -> Self {
        let q = question.to_lowercase();

        Self {
            neighborhood: match_neighborhood(&q, table),
            group: offense::find_group(&q),
            date: match_explicit_date(&q),
            window: match_window(&q, now),
            month: offense::find_month(&q),
            year: year_regex()
                .captures(&q)
                .and_then(|caps| caps.get(1))
                .and_then(|m| m.as_str().parse().ok()),
            newest_first: offense::has_recency_cue(&q),
        }
    }

    /// Check one record against every detected predicate
    pub fn check(&self, record: &IncidentRecord) -> FilterResult {
        if let Some(hood) = &self.neighborhood {
            if record.cpd_neighborhood.to_lowercase() != hood.to_lowercase() {
                return FilterResult::FilterOut;
            }
        }

        if let Some(group) = self.group {
            let in_group = record
                .incident_type_id
                .as_deref()
                .map(|code| group.contains(code))
                .unwrap_or(false);
            if !in_group {
                return FilterResult::FilterOut;
            }
        }

        if let Some(date) = self.date {
            let keep = match date {
                ExplicitDate::Valid(d) => record.date() == Some(d),
                ExplicitDate::Impossible => false,
            };
            if !keep {
                return FilterResult::FilterOut;
            }
        }

        if let Some(window) = self.window {
            let keep = match (window, record.created_at) {
                (TimeWindow::Since(start), Some(ts)) => ts >= start,
                (TimeWindow::OnDate(day), Some(ts)) => ts.date() == day,
                (TimeWindow::Unbounded, Some(_)) => true,
                (_, None) => false,
            };
            if !keep {
                return FilterResult::FilterOut;
            }
        }

        if let Some(month) = self.month {
            if record.created_at.map(|ts| ts.month()) != Some(month) {
                return FilterResult::FilterOut;
            }
        }

        if let Some(year) = self.year {
            if record.created_at.map(|ts| ts.year()) != Some(year) {
                return FilterResult::FilterOut;
            }
        }

        FilterResult::Keep
    }

    /// Narrow `table` to the matching records, newest first when asked,
    /// and without undated records
    pub fn apply(&self, table: &[IncidentRecord]) -> Vec<IncidentRecord> {
        let mut rows: Vec<IncidentRecord> = table
            .iter()
            .filter(|r| self.check(r) == FilterResult::Keep)
            .cloned()
            .collect();

        if self.newest_first {
            // Stable, so ties keep table order; undated rows sink to the end
            rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        }

        rows.retain(|r| r.created_at.is_some());
        rows
    }
}

/// Distinct neighborhoods in order of first appearance; the first one named
/// in the question wins
fn match_neighborhood(q: &str, table: &[IncidentRecord]) -> Option<String> {
    let mut seen: Vec<&str> = Vec::new();
    for record in table {
        let hood = record.cpd_neighborhood.as_str();
        if hood.is_empty() || seen.contains(&hood) {
            continue;
        }
        if q.contains(&hood.to_lowercase()) {
            return Some(hood.to_string());
        }
        seen.push(hood);
    }
    None
}

fn match_explicit_date(q: &str) -> Option<ExplicitDate> {
    let caps = explicit_date_regex().captures(q)?;
    let year: i32 = caps.get(1)?.as_str().parse().ok()?;
    let month: u32 = caps.get(2)?.as_str().parse().ok()?;
    let day: u32 = caps.get(3)?.as_str().parse().ok()?;

    Some(match NaiveDate::from_ymd_opt(year, month, day) {
        Some(date) => ExplicitDate::Valid(date),
        None => ExplicitDate::Impossible,
    })
}

fn match_window(q: &str, now: NaiveDateTime) -> Option<TimeWindow> {
    if q.contains("last week") || q.contains("past week") {
        return Some(TimeWindow::Since(now - Duration::days(7)));
    }
    if q.contains("last month") || q.contains("past month") {
        return Some(TimeWindow::Since(now - Duration::days(30)));
    }
    if q.contains("yesterday") {
        return Some(TimeWindow::OnDate((now - Duration::days(1)).date()));
    }
    if q.contains("today") {
        return Some(TimeWindow::OnDate(now.date()));
    }

    let caps = last_n_days_regex().captures(q)?;
    let since = caps
        .get(2)
        .and_then(|m| m.as_str().parse::<i64>().ok())
        .and_then(Duration::try_days)
        .and_then(|span| now.checked_sub_signed(span));

    Some(match since {
        Some(start) => TimeWindow::Since(start),
        None => TimeWindow::Unbounded,
    })
}

/// Filter `table` for `question` relative to the local clock
pub fn filter_rows(question: &str, table: &[IncidentRecord]) -> Vec<IncidentRecord> {
    filter_rows_at(question, table, Local::now().naive_local())
}

/// Filter `table` for `question` relative to `now`
pub fn filter_rows_at(
    question: &str,
    table: &[IncidentRecord],
    now: NaiveDateTime,
) -> Vec<IncidentRecord> {
    QueryFilter::parse(question, table, now).apply(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn record(event: &str, hood: &str, code: &str, at: Option<NaiveDateTime>) -> IncidentRecord {
        IncidentRecord {
            created_at: at,
            created_raw: at.map(|t| t.to_string()),
            incident_type_id: Some(code.to_string()),
            incident_type_desc: None,
            disposition_text: None,
            cpd_neighborhood: hood.to_string(),
            sna_neighborhood: None,
            priority: Some(2.0),
            event_number: Some(event.to_string()),
        }
    }

    fn table() -> Vec<IncidentRecord> {
        vec![
            record("E1", "WESTWOOD", "THEFT (IP)(W)", Some(ts(2024, 3, 15, 9))),
            record("E2", "OVER-THE-RHINE", "ROBBERY PERSONAL (IP)", Some(ts(2024, 3, 15, 22))),
            record("E3", "Westwood", "ASSAULT (IP)(W)", Some(ts(2024, 4, 2, 12))),
            record("E4", "WESTWOOD", "THEFT (IP)(W)", None),
            record("E5", "CUF", "DRUG SALE (IP)(W)(E)", Some(ts(2023, 3, 1, 8))),
            record("E6", "OVER-THE-RHINE", "THEFT (IP)(W)", Some(ts(2024, 4, 20, 18))),
        ]
    }

    fn events(rows: &[IncidentRecord]) -> Vec<&str> {
        rows.iter()
            .map(|r| r.event_number.as_deref().unwrap_or(""))
            .collect()
    }

    fn now() -> NaiveDateTime {
        ts(2024, 4, 21, 12)
    }

    #[test]
    fn test_neighborhood_is_case_insensitive() {
        let rows = filter_rows_at("what happened in westwood?", &table(), now());
        assert_eq!(events(&rows), vec!["E1", "E3"]);
        for row in &rows {
            assert_eq!(row.cpd_neighborhood.to_lowercase(), "westwood");
        }
    }

    #[test]
    fn test_offense_group_restricts_codes() {
        let rows = filter_rows_at("any theft reports?", &table(), now());
        assert_eq!(events(&rows), vec!["E1", "E6"]);
        let group = offense::find_group("theft").unwrap();
        assert!(rows
            .iter()
            .all(|r| group.contains(r.incident_type_id.as_deref().unwrap())));
    }

    #[test]
    fn test_explicit_date() {
        let rows = filter_rows_at("incidents on 2024-03-15", &table(), now());
        assert_eq!(events(&rows), vec!["E1", "E2"]);

        let rows = filter_rows_at("incidents on 2024/3/15", &table(), now());
        assert_eq!(events(&rows), vec!["E1", "E2"]);
    }

    #[test]
    fn test_impossible_date_matches_nothing() {
        let rows = filter_rows_at("incidents on 2024-13-45", &table(), now());
        assert!(rows.is_empty());
    }

    #[test]
    fn test_last_week_window() {
        let rows = filter_rows_at("crime last week", &table(), now());
        assert_eq!(events(&rows), vec!["E6"]);
        let start = now() - Duration::days(7);
        assert!(rows.iter().all(|r| r.created_at.unwrap() >= start));

        // Later clock never grows the result
        let later = filter_rows_at("crime last week", &table(), now() + Duration::days(3));
        assert!(later.len() <= rows.len());
    }

    #[test]
    fn test_relative_phrases_first_match_wins() {
        let q = QueryFilter::parse("last month and yesterday", &table(), now());
        assert_eq!(q.window, Some(TimeWindow::Since(now() - Duration::days(30))));

        let q = QueryFilter::parse("yesterday", &table(), now());
        assert_eq!(q.window, Some(TimeWindow::OnDate(ts(2024, 4, 20, 0).date())));
        assert_eq!(events(&q.apply(&table())), vec!["E6"]);

        let q = QueryFilter::parse("today", &table(), now());
        assert_eq!(q.window, Some(TimeWindow::OnDate(now().date())));
    }

    #[test]
    fn test_last_n_days() {
        let rows = filter_rows_at("past 20 days", &table(), now());
        assert_eq!(events(&rows), vec!["E3", "E6"]);

        let q = QueryFilter::parse("last 99999999999999999999 days", &table(), now());
        assert_eq!(q.window, Some(TimeWindow::Unbounded));
    }

    #[test]
    fn test_month_and_year() {
        let rows = filter_rows_at("anything in march?", &table(), now());
        assert_eq!(events(&rows), vec!["E1", "E2", "E5"]);

        let rows = filter_rows_at("march 2024", &table(), now());
        assert_eq!(events(&rows), vec!["E1", "E2"]);

        let rows = filter_rows_at("all of 2023", &table(), now());
        assert_eq!(events(&rows), vec!["E5"]);
    }

    #[test]
    fn test_recent_sorts_descending_and_drops_undated() {
        let rows = filter_rows_at("latest incidents in westwood", &table(), now());
        assert_eq!(events(&rows), vec!["E3", "E1"]);
    }

    #[test]
    fn test_filters_are_cumulative() {
        let rows = filter_rows_at("theft in over-the-rhine in april", &table(), now());
        assert_eq!(events(&rows), vec!["E6"]);
    }

    #[test]
    fn test_no_cues_keeps_dated_rows_in_order() {
        let rows = filter_rows_at("tell me something", &table(), now());
        assert_eq!(events(&rows), vec!["E1", "E2", "E3", "E5", "E6"]);
    }
}
