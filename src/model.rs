use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Prefix the backend uses for facet (custom) attributes in raw storage.
pub const FACET_MARKER: char = '@';

/// 日志条目。由检索后端返回，字段均按原样保留。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub id: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl LogRecord {
    pub fn new(id: impl Into<String>, attributes: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            attributes,
        }
    }

    /// Looks up `key`, then `@key`. Dotted keys such as `http.status_code`
    /// also resolve through nested objects.
    pub fn attribute(&self, key: &str) -> Option<&Value> {
        let bare = key.trim_start_matches(FACET_MARKER);
        lookup(&self.attributes, bare)
            .or_else(|| lookup(&self.attributes, &format!("{FACET_MARKER}{bare}")))
    }

    /// Display form of an attribute; absent or null renders as an empty string.
    pub fn attribute_text(&self, key: &str) -> String {
        self.attribute(key).map(value_text).unwrap_or_default()
    }

    pub fn has_attribute(&self, key: &str) -> bool {
        self.attribute(key).is_some_and(|v| !v.is_null())
    }
}

fn lookup<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    if let Some(v) = map.get(key) {
        return Some(v);
    }
    let mut parts = key.split('.');
    let mut current = map.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

pub fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(value_text).collect::<Vec<_>>().join(","),
        other => other.to_string(),
    }
}

/// Concrete search window. `from <= to` is expected but not enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl ResolvedRange {
    pub fn from_iso(&self) -> String {
        iso8601(self.from)
    }

    pub fn to_iso(&self) -> String {
        iso8601(self.to)
    }
}

pub fn iso8601(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[serde(alias = "ascending")]
    Asc,
    #[serde(alias = "descending")]
    Desc,
}

impl SortOrder {
    /// Native sort key understood by the backend.
    pub fn sort_key(self) -> &'static str {
        match self {
            SortOrder::Asc => "timestamp",
            SortOrder::Desc => "-timestamp",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

/// Fully resolved request handed to the transport.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchRequest {
    pub query: String,
    pub from: String,
    pub to: String,
    pub limit: usize,
    pub sort: SortOrder,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub query: String,
    #[serde(default = "default_from", alias = "from_time")]
    pub from: String,
    #[serde(default, alias = "to_time")]
    pub to: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub sort: Option<SortOrder>,
    #[serde(default)]
    pub format: OutputFormat,
}

fn default_from() -> String {
    "1h".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceParams {
    pub trace_id: String,
    #[serde(default, alias = "from_time")]
    pub from: Option<String>,
    #[serde(default, alias = "to_time")]
    pub to: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub sort: Option<SortOrder>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TailParams {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub since: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub follow: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportParams {
    #[serde(default)]
    pub query: String,
    #[serde(default = "default_from", alias = "from_time")]
    pub from: String,
    #[serde(default, alias = "to_time")]
    pub to: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub format: ExportFormat,
    /// Output file name, relative to the configured export directory.
    #[serde(default, alias = "filename")]
    pub destination: Option<String>,
}

/// What a tool hands back to the dispatch shell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolOutput {
    pub text: String,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: true,
        }
    }
}
