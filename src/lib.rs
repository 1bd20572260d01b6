//! 日志查询 MCP 工具核心库
//! 自然语言查询归一化、相对时间窗口解析、远程日志检索与表格渲染。

pub mod config;
pub mod error;
pub mod export;
pub mod http;
pub mod mcp;
pub mod model;
pub mod query;
pub mod render;
pub mod search;
pub mod time_range;
pub mod transport;
