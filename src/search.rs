use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::export;
use crate::model::{
    iso8601, ExportParams, LogRecord, OutputFormat, SearchParams, SearchRequest, SortOrder,
    TailParams, ToolOutput, TraceParams,
};
use crate::query::QueryNormalizer;
use crate::render;
use crate::time_range;
use crate::transport::LogSearchTransport;

pub const MAX_LIMIT: usize = 1000;
pub const DEFAULT_FROM: &str = "1h";
pub const TRACE_DEFAULT_FROM: &str = "24h";

/// Facet that carries the trace correlation id.
pub const TRACE_FACET: &str = "@trace_id";

pub type Clock = fn() -> DateTime<Utc>;

/// Search engine: normalises, resolves the window, calls the transport, renders.
pub struct SearchEngine {
    transport: Arc<dyn LogSearchTransport>,
    normalizer: QueryNormalizer,
    export_dir: PathBuf,
    clock: Clock,
}

impl SearchEngine {
    pub fn new(transport: Arc<dyn LogSearchTransport>) -> Self {
        Self {
            transport,
            normalizer: QueryNormalizer::new(),
            export_dir: PathBuf::from("."),
            clock: Utc::now,
        }
    }

    pub fn with_export_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.export_dir = dir.into();
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Builds the backend request for a free-form search.
    pub fn build_request(&self, params: &SearchParams, now: DateTime<Utc>) -> SearchRequest {
        let normalized = self.normalizer.classify(&params.query);
        debug!(rule = normalized.rule, query = %normalized.query, "normalized query");

        let from = non_blank(Some(params.from.as_str())).unwrap_or(DEFAULT_FROM);
        let (from, to) = resolve_window(from, non_blank(params.to.as_deref()), now);
        SearchRequest {
            query: normalized.query,
            from,
            to,
            limit: clamp_limit(params.limit),
            sort: params.sort.unwrap_or(SortOrder::Desc),
        }
    }

    pub async fn search_logs(&self, params: SearchParams) -> ToolOutput {
        let request = self.build_request(&params, (self.clock)());
        let records = match self.execute(&request).await {
            Ok(records) => records,
            Err(e) => return ToolOutput::error(format!("Error searching logs: {e}")),
        };

        match params.format {
            OutputFormat::Json => ToolOutput::ok(render::render_json(&records)),
            OutputFormat::Table => ToolOutput::ok(format!(
                "{}\n\n{}",
                summary(&request, records.len()),
                render::render_table(&records)
            )),
        }
    }

    /// Builds the exact facet query for one trace; no heuristics are applied.
    pub fn build_trace_request(&self, params: &TraceParams, now: DateTime<Utc>) -> SearchRequest {
        let from = non_blank(params.from.as_deref()).unwrap_or(TRACE_DEFAULT_FROM);
        let (from, to) = resolve_window(from, non_blank(params.to.as_deref()), now);
        SearchRequest {
            query: facet_clause(TRACE_FACET, params.trace_id.trim()),
            from,
            to,
            limit: clamp_limit(params.limit),
            sort: params.sort.unwrap_or(SortOrder::Asc),
        }
    }

    pub async fn logs_by_trace_id(&self, params: TraceParams) -> ToolOutput {
        if params.trace_id.trim().is_empty() {
            return ToolOutput::error("Error searching logs: trace_id must not be empty");
        }
        let request = self.build_trace_request(&params, (self.clock)());
        match self.execute(&request).await {
            Ok(records) => ToolOutput::ok(format!(
                "Found {} logs for trace {} ({} to {})\n\n{}",
                records.len(),
                params.trace_id.trim(),
                request.from,
                request.to,
                render::render_enhanced_table(&records)
            )),
            Err(e) => ToolOutput::error(format!("Error searching logs: {e}")),
        }
    }

    /// Tail window: `since` (token or timestamp) up to now, or the last minute.
    pub fn build_tail_request(&self, params: &TailParams, now: DateTime<Utc>) -> SearchRequest {
        let query = match non_blank(Some(params.query.as_str())) {
            Some(q) => self.normalizer.normalize(q),
            None => "*".to_string(),
        };
        let (from, to) = match non_blank(params.since.as_deref()) {
            Some(since) => resolve_window(since, None, now),
            None => (iso8601(time_range::tail_start(now)), iso8601(now)),
        };
        SearchRequest {
            query,
            from,
            to,
            limit: clamp_limit(params.limit),
            sort: SortOrder::Desc,
        }
    }

    /// `follow` only labels the output; a single fetch is made either way.
    pub async fn tail_logs(&self, params: TailParams) -> ToolOutput {
        let request = self.build_tail_request(&params, (self.clock)());
        let records = match self.execute(&request).await {
            Ok(records) => records,
            Err(e) => return ToolOutput::error(format!("Error searching logs: {e}")),
        };

        let label = if params.follow { "[follow mode] " } else { "" };
        ToolOutput::ok(format!(
            "{label}{}\n\n{}",
            summary(&request, records.len()),
            render::render_table(&records)
        ))
    }

    pub async fn export_logs(&self, params: ExportParams) -> ToolOutput {
        let now = (self.clock)();
        let search = SearchParams {
            query: params.query.clone(),
            from: params.from.clone(),
            to: params.to.clone(),
            limit: params.limit,
            sort: None,
            format: OutputFormat::Table,
        };
        let request = self.build_request(&search, now);
        let records = match self.execute(&request).await {
            Ok(records) => records,
            Err(e) => return ToolOutput::error(format!("Error searching logs: {e}")),
        };

        let name = match non_blank(params.destination.as_deref()) {
            Some(name) => name.to_string(),
            None => format!("logs_export_{}", now.format("%Y%m%d_%H%M%S")),
        };
        match self.write_export(&records, &params, &name) {
            Ok((count, path)) => ToolOutput::ok(format!(
                "Exported {count} logs to {} (query: {})",
                path.display(),
                request.query
            )),
            Err(e) => {
                error!("export failed: {e}");
                ToolOutput::error(format!("Error exporting logs: {e}"))
            }
        }
    }

    fn write_export(
        &self,
        records: &[LogRecord],
        params: &ExportParams,
        name: &str,
    ) -> Result<(usize, PathBuf)> {
        let path = export::destination_path(&self.export_dir, name, params.format)?;
        let count = export::export_to_file(records, params.format, &path)?;
        info!(count, path = %path.display(), "exported logs");
        Ok((count, path))
    }

    async fn execute(&self, request: &SearchRequest) -> Result<Vec<LogRecord>> {
        let started = Instant::now();
        info!(
            query = %request.query,
            from = %request.from,
            to = %request.to,
            limit = request.limit,
            sort = request.sort.sort_key(),
            "searching logs"
        );
        let result = self.transport.search(request).await;
        match &result {
            Ok(records) => debug!(
                count = records.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "search finished"
            ),
            Err(e) => error!("search failed: {e}"),
        }
        result
    }
}

/// Token hit: resolved start, explicit `to` or the resolved end.
/// Token miss: `reference` verbatim as the start, explicit `to` or now.
pub fn resolve_window(reference: &str, to: Option<&str>, now: DateTime<Utc>) -> (String, String) {
    let (from, to) = match time_range::resolve(reference, now) {
        Some(range) => (
            range.from_iso(),
            to.map(str::to_string).unwrap_or_else(|| range.to_iso()),
        ),
        None => (
            reference.to_string(),
            to.map(str::to_string).unwrap_or_else(|| iso8601(now)),
        ),
    };

    // An inverted window is passed through as given.
    if let (Ok(f), Ok(t)) = (
        DateTime::parse_from_rfc3339(&from),
        DateTime::parse_from_rfc3339(&to),
    ) {
        if t < f {
            warn!(%from, %to, "end time precedes start time");
        }
    }
    (from, to)
}

pub fn clamp_limit(limit: Option<usize>) -> usize {
    limit.unwrap_or(MAX_LIMIT).clamp(1, MAX_LIMIT)
}

/// `facet:value`, quoting the value when it would otherwise split into several terms.
pub fn facet_clause(facet: &str, value: &str) -> String {
    if value.contains(char::is_whitespace) || value.contains('"') {
        let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
        format!("{facet}:\"{escaped}\"")
    } else {
        format!("{facet}:{value}")
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn summary(request: &SearchRequest, count: usize) -> String {
    format!(
        "Found {count} logs for query: {}\nTime range: {} to {}",
        request.query, request.from, request.to
    )
}
