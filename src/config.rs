use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{LogQueryError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ServerMode {
    #[default]
    Stdio,
    Http,
    Both,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub mode: ServerMode,
    pub http_addr: Option<String>,
    pub http_port: Option<u16>,
}

/// Connection settings for the log-search backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_site")]
    pub site: String,
    /// Overrides the URL derived from `site`. Mostly useful for tests and proxies.
    pub base_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    pub api_key: Option<String>,
    pub app_key: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            site: default_site(),
            base_url: None,
            timeout_secs: default_timeout_secs(),
            api_key: None,
            app_key: None,
        }
    }
}

impl ApiConfig {
    pub fn endpoint_base(&self) -> String {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://api.{}", self.site),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default = "default_export_dir")]
    pub dir: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            dir: default_export_dir(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

impl Config {
    /// Loads a YAML or JSON config file, chosen by extension (YAML when unknown).
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            LogQueryError::Config(format!("无法读取配置文件 {}: {e}", path.display()))
        })?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));

        let cfg = if is_json {
            serde_json::from_str(&raw)
                .map_err(|e| LogQueryError::Config(format!("JSON 配置解析失败: {e}")))?
        } else {
            serde_yaml::from_str(&raw)
                .map_err(|e| LogQueryError::Config(format!("YAML 配置解析失败: {e}")))?
        };
        Ok(cfg)
    }

    /// Environment credentials win over file values.
    pub fn apply_env(&mut self) {
        self.apply_vars(|name| std::env::var(name).ok());
    }

    fn apply_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        if let Some(key) = non_empty("DD_API_KEY") {
            self.api.api_key = Some(key);
        }
        if let Some(key) = non_empty("DD_APP_KEY") {
            self.api.app_key = Some(key);
        }
        if let Some(site) = non_empty("DD_SITE") {
            self.api.site = site;
        }
    }
}

fn default_site() -> String {
    "datadoghq.com".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_export_dir() -> PathBuf {
    PathBuf::from(".")
}
