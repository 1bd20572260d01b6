use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LogQueryError>;

#[derive(Debug, Error)]
pub enum LogQueryError {
    #[error("配置错误: {0}")]
    Config(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("无效请求: {0}")]
    InvalidRequest(String),

    #[error("导出失败: {path} - {reason}")]
    Export { path: PathBuf, reason: String },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// 日志检索后端返回的错误，按 HTTP 状态码分类。
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("认证失败 (401): 请检查 API key 与 application key")]
    Auth,

    #[error("权限不足 (403): application key 缺少日志读取权限")]
    Permission,

    #[error("请求频率超限 (429): 请稍后重试")]
    RateLimit,

    #[error("服务端错误 ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("HTTP 错误 ({status}): {message}")]
    Http { status: u16, message: String },

    #[error("网络错误: {0}")]
    Network(String),

    #[error("响应体解析失败: {0}")]
    Decode(String),
}

impl TransportError {
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        match status {
            401 => TransportError::Auth,
            403 => TransportError::Permission,
            429 => TransportError::RateLimit,
            500..=599 => TransportError::Server {
                status,
                message: message.into(),
            },
            _ => TransportError::Http {
                status,
                message: message.into(),
            },
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            return TransportError::from_status(status.as_u16(), e.to_string());
        }
        if e.is_decode() {
            return TransportError::Decode(e.to_string());
        }
        TransportError::Network(e.to_string())
    }
}
