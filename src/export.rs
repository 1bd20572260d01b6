//! Flat-file export of log records.
//!
//! Writers take any `Write`; choosing and creating the destination is up to
//! the caller.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{LogQueryError, Result};
use crate::model::{ExportFormat, LogRecord};
use crate::render::{to_flat_record, FLAT_COLUMNS};

/// Writes a header row of `FLAT_COLUMNS` followed by one row per record.
pub fn write_csv<W: Write>(records: &[LogRecord], writer: W) -> Result<usize> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(FLAT_COLUMNS)?;

    for record in records {
        let flat = to_flat_record(record);
        csv_writer.write_record(
            FLAT_COLUMNS
                .iter()
                .map(|c| flat.get(*c).map(String::as_str).unwrap_or_default()),
        )?;
    }
    csv_writer.flush()?;
    Ok(records.len())
}

/// Writes the flat records as a JSON array.
pub fn write_json<W: Write>(records: &[LogRecord], writer: W) -> Result<usize> {
    let flat: Vec<_> = records.iter().map(to_flat_record).collect();
    serde_json::to_writer_pretty(writer, &flat)?;
    Ok(records.len())
}

pub fn write_records<W: Write>(records: &[LogRecord], format: ExportFormat, writer: W) -> Result<usize> {
    match format {
        ExportFormat::Csv => write_csv(records, writer),
        ExportFormat::Json => write_json(records, writer),
    }
}

/// Joins a caller-supplied file name onto `dir`, refusing anything that would
/// escape it.
pub fn destination_path(dir: &Path, name: &str, format: ExportFormat) -> Result<PathBuf> {
    let name = name.trim();
    if name.is_empty()
        || name.contains('/')
        || name.contains('\\')
        || name.split('.').all(|part| part.is_empty())
        || name.contains("..")
    {
        return Err(LogQueryError::InvalidRequest(format!(
            "无效的导出文件名: {name:?}"
        )));
    }

    let mut path = dir.join(name);
    if path.extension().is_none() {
        path.set_extension(format.extension());
    }
    Ok(path)
}

/// Creates `path` and writes `records` into it.
pub fn export_to_file(records: &[LogRecord], format: ExportFormat, path: &Path) -> Result<usize> {
    let file = std::fs::File::create(path).map_err(|e| LogQueryError::Export {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let mut writer = std::io::BufWriter::new(file);
    let count = write_records(records, format, &mut writer)?;
    writer.flush()?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn records() -> Vec<LogRecord> {
        vec![
            LogRecord::new(
                "a",
                json!({
                    "timestamp": "2024-06-01T00:00:00Z",
                    "message": "card declined, retrying",
                    "status": "error",
                    "service": "payments",
                    "@trace_id": "t-1",
                    "tags": ["env:prod", "team:pay"],
                })
                .as_object()
                .cloned()
                .unwrap(),
            ),
            LogRecord::new("b", json!({"message": "ok"}).as_object().cloned().unwrap()),
        ]
    }

    #[test]
    fn csv_has_fixed_header_and_quotes_commas() {
        let mut buf = Vec::new();
        let n = write_csv(&records(), &mut buf).unwrap();
        assert_eq!(n, 2);

        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "timestamp,message,status,service,host,trace_id,user_id,http_status_code,tags"
        );
        assert_eq!(
            lines.next().unwrap(),
            r#"2024-06-01T00:00:00Z,"card declined, retrying",error,payments,,t-1,,,"env:prod,team:pay""#
        );
        assert_eq!(lines.next().unwrap(), ",ok,,,,,,,");
    }

    #[test]
    fn json_export_uses_flat_rows() {
        let mut buf = Vec::new();
        write_json(&records(), &mut buf).unwrap();
        let rows: Vec<serde_json::Map<String, serde_json::Value>> =
            serde_json::from_slice(&buf).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["trace_id"], "");
        assert_eq!(rows[0]["tags"], "env:prod,team:pay");
    }

    #[test]
    fn destination_rejects_escapes() {
        let dir = Path::new("/exports");
        assert_eq!(
            destination_path(dir, "errors", ExportFormat::Csv).unwrap(),
            PathBuf::from("/exports/errors.csv")
        );
        assert_eq!(
            destination_path(dir, "dump.txt", ExportFormat::Json).unwrap(),
            PathBuf::from("/exports/dump.txt")
        );
        for bad in ["", "../x.csv", "a/b.csv", "..", "a\\b", "."] {
            assert!(destination_path(dir, bad, ExportFormat::Csv).is_err(), "{bad}");
        }
    }

    #[test]
    fn export_to_file_writes_csv() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let n = export_to_file(&records(), ExportFormat::Csv, &path).unwrap();
        assert_eq!(n, 2);
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 3);
    }
}
