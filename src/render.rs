//! Text rendering of log records: fixed tables, enhanced tables and flat rows.

use std::collections::BTreeMap;

use crate::model::{LogRecord, FACET_MARKER};

pub const NO_RESULTS: &str = "No logs found.";

const ELLIPSIS: &str = "...";
const COLUMN_SEPARATOR: &str = " | ";
const MESSAGE_WIDTH: usize = 80;
const ENHANCED_MESSAGE_WIDTH: usize = 50;

const BASE_COLUMNS: [(&str, &str); 5] = [
    ("Timestamp", "timestamp"),
    ("Status", "status"),
    ("Service", "service"),
    ("Host", "host"),
    ("Message", "message"),
];

/// Well-known attributes surfaced by the enhanced table, in column order.
pub const PRIORITY_ATTRIBUTES: [&str; 6] = [
    "trace_id",
    "user_id",
    "http.status_code",
    "error.kind",
    "span_id",
    "request_id",
];

/// Columns of a flat export row, in file order.
pub const FLAT_COLUMNS: [&str; 9] = [
    "timestamp",
    "message",
    "status",
    "service",
    "host",
    "trace_id",
    "user_id",
    "http_status_code",
    "tags",
];

pub type FlatRecord = BTreeMap<String, String>;

pub fn render_table(records: &[LogRecord]) -> String {
    if records.is_empty() {
        return NO_RESULTS.to_string();
    }
    let headers = BASE_COLUMNS.iter().map(|(h, _)| h.to_string()).collect();
    let rows = records
        .iter()
        .map(|r| base_cells(r, MESSAGE_WIDTH))
        .collect();
    layout(headers, rows)
}

/// Base columns plus any priority attribute present in at least one record.
pub fn render_enhanced_table(records: &[LogRecord]) -> String {
    if records.is_empty() {
        return NO_RESULTS.to_string();
    }

    let extras: Vec<&str> = PRIORITY_ATTRIBUTES
        .iter()
        .copied()
        .filter(|key| records.iter().any(|r| r.has_attribute(key)))
        .collect();

    let headers = BASE_COLUMNS
        .iter()
        .map(|(h, _)| h.to_string())
        .chain(extras.iter().map(|key| header_name(key)))
        .collect();

    let rows = records
        .iter()
        .map(|r| {
            let mut cells = base_cells(r, ENHANCED_MESSAGE_WIDTH);
            cells.extend(extras.iter().map(|key| single_line(&r.attribute_text(key))));
            cells
        })
        .collect();

    layout(headers, rows)
}

pub fn render_json(records: &[LogRecord]) -> String {
    serde_json::to_string_pretty(records).unwrap_or_else(|_| "[]".to_string())
}

/// Every `FLAT_COLUMNS` key is present; missing attributes become "".
pub fn to_flat_record(record: &LogRecord) -> FlatRecord {
    FLAT_COLUMNS
        .iter()
        .map(|column| {
            let source = match *column {
                "http_status_code" => "http.status_code",
                other => other,
            };
            (column.to_string(), record.attribute_text(source))
        })
        .collect()
}

/// `@http.status_code` becomes `Http Status Code`.
pub fn header_name(key: &str) -> String {
    key.trim_start_matches(FACET_MARKER)
        .split(|c: char| c == '_' || c == '.' || c == '-')
        .filter(|w| !w.is_empty())
        .map(title_case)
        .collect::<Vec<_>>()
        .join(" ")
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn base_cells(record: &LogRecord, message_width: usize) -> Vec<String> {
    BASE_COLUMNS
        .iter()
        .map(|(_, key)| {
            let text = single_line(&record.attribute_text(key));
            if *key == "message" {
                truncate(&text, message_width)
            } else {
                text
            }
        })
        .collect()
}

fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let keep = width.saturating_sub(ELLIPSIS.len());
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(ELLIPSIS);
    out
}

fn layout(headers: Vec<String>, rows: Vec<Vec<String>>) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let format_row = |cells: &[String]| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, &width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join(COLUMN_SEPARATOR)
    };

    let total = widths.iter().sum::<usize>()
        + COLUMN_SEPARATOR.len() * widths.len().saturating_sub(1);

    let mut lines = Vec::with_capacity(rows.len() + 2);
    lines.push(format_row(&headers));
    lines.push("-".repeat(total));
    lines.extend(rows.iter().map(|r| format_row(r)));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn record(id: &str, attrs: Value) -> LogRecord {
        LogRecord::new(id, attrs.as_object().cloned().unwrap())
    }

    fn sample() -> Vec<LogRecord> {
        vec![
            record(
                "a",
                json!({
                    "timestamp": "2024-06-01T11:59:00.000Z",
                    "status": "error",
                    "service": "checkout",
                    "host": "web-1",
                    "message": "payment declined",
                    "@trace_id": "abc123",
                }),
            ),
            record(
                "b",
                json!({
                    "timestamp": "2024-06-01T11:59:30.000Z",
                    "status": "info",
                    "service": "cart",
                    "message": "x".repeat(200),
                    "http": {"status_code": 200},
                }),
            ),
        ]
    }

    fn split_cells(line: &str) -> Vec<&str> {
        line.split(COLUMN_SEPARATOR).collect()
    }

    #[test]
    fn empty_input_yields_sentinel() {
        assert_eq!(render_table(&[]), NO_RESULTS);
        assert_eq!(render_enhanced_table(&[]), NO_RESULTS);
    }

    #[test]
    fn cells_are_padded_to_header_width() {
        let out = render_table(&sample());
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 4);

        let header = split_cells(lines[0]);
        assert_eq!(header.len(), 5);
        for line in &lines[2..] {
            let cells = split_cells(line);
            assert_eq!(cells.len(), header.len());
            for (cell, head) in cells.iter().zip(&header) {
                assert_eq!(cell.chars().count(), head.chars().count());
            }
        }
        assert_eq!(lines[1].len(), lines[0].chars().count());
        assert!(lines[1].chars().all(|c| c == '-'));
    }

    #[test]
    fn long_messages_are_truncated() {
        let out = render_table(&sample());
        let row = out.lines().nth(3).unwrap();
        let message = split_cells(row)[4].trim_end();
        assert_eq!(message.chars().count(), MESSAGE_WIDTH);
        assert!(message.ends_with("..."));

        let out = render_enhanced_table(&sample());
        let row = out.lines().nth(3).unwrap();
        let message = split_cells(row)[4].trim_end();
        assert_eq!(message.chars().count(), ENHANCED_MESSAGE_WIDTH);
    }

    #[test]
    fn missing_attributes_render_blank() {
        let out = render_table(&sample());
        let row = out.lines().nth(3).unwrap();
        assert_eq!(split_cells(row)[3].trim(), "");
    }

    #[test]
    fn enhanced_table_adds_present_priority_columns_once() {
        let out = render_enhanced_table(&sample());
        let header = out.lines().next().unwrap();
        let names: Vec<&str> = split_cells(header).iter().map(|h| h.trim()).collect();
        assert_eq!(
            names,
            vec!["Timestamp", "Status", "Service", "Host", "Message", "Trace Id", "Http Status Code"]
        );
        assert!(!header.contains('@'));

        let first = out.lines().nth(2).unwrap();
        assert_eq!(split_cells(first)[5].trim(), "abc123");
        let second = out.lines().nth(3).unwrap();
        assert_eq!(split_cells(second)[5].trim(), "");
        assert_eq!(split_cells(second)[6].trim(), "200");
    }

    #[test]
    fn bare_and_prefixed_keys_share_one_column() {
        let records = vec![
            record("a", json!({"timestamp": "t1", "message": "one", "trace_id": "bare-1"})),
            record("b", json!({"timestamp": "t2", "message": "two", "@trace_id": "facet-2"})),
        ];
        let out = render_enhanced_table(&records);
        let header = out.lines().next().unwrap();
        let names: Vec<&str> = split_cells(header).iter().map(|h| h.trim()).collect();
        assert_eq!(names.iter().filter(|n| **n == "Trace Id").count(), 1);
        assert_eq!(names.len(), 6);

        assert_eq!(split_cells(out.lines().nth(2).unwrap())[5].trim(), "bare-1");
        assert_eq!(split_cells(out.lines().nth(3).unwrap())[5].trim(), "facet-2");
    }

    #[test]
    fn enhanced_table_without_extras_matches_base_columns() {
        let records = vec![record("a", json!({"timestamp": "t", "message": "hi"}))];
        let header = render_enhanced_table(&records).lines().next().unwrap().to_string();
        assert_eq!(split_cells(&header).len(), 5);
    }

    #[test]
    fn header_names_are_title_cased() {
        assert_eq!(header_name("@trace_id"), "Trace Id");
        assert_eq!(header_name("http.status_code"), "Http Status Code");
        assert_eq!(header_name("request-id"), "Request Id");
    }

    #[test]
    fn flat_record_has_every_column() {
        let flat = to_flat_record(&record(
            "a",
            json!({
                "timestamp": "2024-06-01T00:00:00Z",
                "message": "boom",
                "@usr": {"id": "ignored"},
                "@user_id": "u-7",
                "http": {"status_code": 503},
                "tags": ["env:prod", "team:pay"],
            }),
        ));
        for column in FLAT_COLUMNS {
            assert!(flat.contains_key(column), "{column}");
        }
        assert_eq!(flat["user_id"], "u-7");
        assert_eq!(flat["http_status_code"], "503");
        assert_eq!(flat["tags"], "env:prod,team:pay");
        assert_eq!(flat["trace_id"], "");
        assert_eq!(flat["host"], "");
    }

    #[test]
    fn json_dump_keeps_ids() {
        let out = render_json(&sample());
        let parsed: Vec<LogRecord> = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].id, "a");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo wörld", 8), "héllo...");
        assert_eq!(truncate("short", 8), "short");
    }
}
