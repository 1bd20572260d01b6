use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::config::ApiConfig;
use crate::error::{LogQueryError, Result, TransportError};
use crate::model::{LogRecord, SearchRequest};

const SEARCH_PATH: &str = "/api/v2/logs/events/search";

/// Backend that executes a resolved search.
#[async_trait]
pub trait LogSearchTransport: Send + Sync {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<LogRecord>>;
}

/// Datadog Logs v2 search over HTTPS.
#[derive(Debug, Clone)]
pub struct DatadogTransport {
    client: Client,
    endpoint: String,
    api_key: String,
    app_key: String,
}

impl DatadogTransport {
    /// Fails with a configuration error before any network traffic when
    /// credentials are missing.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let api_key = required(config.api_key.as_deref(), "DD_API_KEY")?;
        let app_key = required(config.app_key.as_deref(), "DD_APP_KEY")?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .user_agent(format!("log-query-mcp/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| LogQueryError::Config(format!("创建 HTTP 客户端失败: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}{SEARCH_PATH}", config.endpoint_base()),
            api_key,
            app_key,
        })
    }
}

fn required(value: Option<&str>, name: &str) -> Result<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| LogQueryError::Config(format!("缺少凭据: 请设置 {name}")))
}

#[async_trait]
impl LogSearchTransport for DatadogTransport {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<LogRecord>> {
        let body = json!({
            "filter": {
                "query": request.query,
                "from": request.from,
                "to": request.to,
            },
            "sort": request.sort.sort_key(),
            "page": { "limit": request.limit },
        });
        debug!(endpoint = %self.endpoint, query = %request.query, "sending log search");

        let resp = self
            .client
            .post(&self.endpoint)
            .header("DD-API-KEY", &self.api_key)
            .header("DD-APPLICATION-KEY", &self.app_key)
            .json(&body)
            .send()
            .await
            .map_err(TransportError::from)?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(TransportError::from_status(status.as_u16(), error_message(&text)).into());
        }

        let parsed: SearchResponseBody = resp.json().await.map_err(TransportError::from)?;
        let records: Vec<LogRecord> = parsed.data.into_iter().map(LogRecord::from).collect();
        info!(count = records.len(), "log search returned");
        Ok(records)
    }
}

/// Builds the HTTP transport on first use and reuses it afterwards.
#[derive(Debug)]
pub struct LazyTransport {
    config: ApiConfig,
    inner: OnceCell<DatadogTransport>,
}

impl LazyTransport {
    pub fn new(config: ApiConfig) -> Self {
        Self {
            config,
            inner: OnceCell::new(),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.initialized()
    }
}

#[async_trait]
impl LogSearchTransport for LazyTransport {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<LogRecord>> {
        let transport = self
            .inner
            .get_or_try_init(|| async { DatadogTransport::new(&self.config) })
            .await?;
        transport.search(request).await
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponseBody {
    #[serde(default)]
    data: Vec<EventData>,
}

#[derive(Debug, Deserialize)]
struct EventData {
    #[serde(default)]
    id: String,
    #[serde(default)]
    attributes: Map<String, Value>,
}

impl From<EventData> for LogRecord {
    /// Custom attributes nested under `attributes` are lifted next to the
    /// standard ones; standard fields keep precedence.
    fn from(event: EventData) -> Self {
        let mut attributes = event.attributes;
        if let Some(Value::Object(custom)) = attributes.remove("attributes") {
            for (key, value) in custom {
                attributes.entry(key).or_insert(value);
            }
        }
        LogRecord::new(event.id, attributes)
    }
}

/// Pulls a readable cause out of an error body such as `{"errors": ["..."]}`.
fn error_message(body: &str) -> String {
    let from_json = serde_json::from_str::<Value>(body).ok().and_then(|v| {
        let errors = v.get("errors")?.as_array()?;
        let joined = errors
            .iter()
            .filter_map(|e| match e {
                Value::String(s) => Some(s.clone()),
                Value::Object(o) => o
                    .get("detail")
                    .or_else(|| o.get("title"))
                    .and_then(Value::as_str)
                    .map(str::to_string),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("; ");
        (!joined.is_empty()).then_some(joined)
    });
    from_json.unwrap_or_else(|| body.trim().chars().take(200).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_credentials_fail_before_network() {
        let err = DatadogTransport::new(&ApiConfig::default()).unwrap_err();
        assert!(err.to_string().contains("DD_API_KEY"));

        let cfg = ApiConfig {
            api_key: Some("k".into()),
            app_key: Some("  ".into()),
            ..ApiConfig::default()
        };
        let err = DatadogTransport::new(&cfg).unwrap_err();
        assert!(matches!(err, LogQueryError::Config(_)));
        assert!(err.to_string().contains("DD_APP_KEY"));
    }

    #[test]
    fn nested_attributes_are_lifted_without_overriding() {
        let event: EventData = serde_json::from_value(json!({
            "id": "evt-1",
            "attributes": {
                "service": "web",
                "message": "top",
                "attributes": {"trace_id": "t-1", "message": "nested", "http": {"status_code": 500}}
            }
        }))
        .unwrap();
        let record = LogRecord::from(event);
        assert_eq!(record.id, "evt-1");
        assert_eq!(record.attribute_text("message"), "top");
        assert_eq!(record.attribute_text("trace_id"), "t-1");
        assert_eq!(record.attribute_text("http.status_code"), "500");
        assert!(!record.attributes.contains_key("attributes"));
    }

    #[test]
    fn error_messages_prefer_json_errors() {
        assert_eq!(error_message(r#"{"errors": ["Forbidden", "bad key"]}"#), "Forbidden; bad key");
        assert_eq!(error_message(r#"{"errors": [{"detail": "query invalid"}]}"#), "query invalid");
        assert_eq!(error_message("  gateway timeout \n"), "gateway timeout");
    }

    #[tokio::test]
    async fn lazy_transport_reports_config_error_and_stays_uninitialized() {
        let lazy = LazyTransport::new(ApiConfig::default());
        let req = SearchRequest {
            query: "*".into(),
            from: "now-1h".into(),
            to: "now".into(),
            limit: 10,
            sort: crate::model::SortOrder::Desc,
        };
        let err = lazy.search(&req).await.unwrap_err();
        assert!(matches!(err, LogQueryError::Config(_)));
        assert!(!lazy.is_initialized());
    }
}
