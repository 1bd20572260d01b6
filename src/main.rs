use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use log_query_mcp::config::{Config, ServerMode};
use log_query_mcp::http::serve_http;
use log_query_mcp::mcp::run_stdio;
use log_query_mcp::search::SearchEngine;
use log_query_mcp::transport::LazyTransport;

/// MCP server exposing log search tools.
#[derive(Debug, Parser)]
#[command(name = "log-query-mcp", version, about)]
struct Cli {
    /// YAML or JSON config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Overrides `server.mode` from the config file.
    #[arg(long, value_enum)]
    mode: Option<ServerMode>,

    /// Overrides `server.http_port`.
    #[arg(long)]
    port: Option<u16>,

    /// Overrides `export.dir`.
    #[arg(long)]
    export_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries JSON-RPC frames; logs go to stderr.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from_path(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::default(),
    };
    config.apply_env();
    if let Some(mode) = cli.mode {
        config.server.mode = mode;
    }
    if let Some(port) = cli.port {
        config.server.http_port = Some(port);
    }
    if let Some(dir) = cli.export_dir {
        config.export.dir = dir;
    }
    info!(mode = ?config.server.mode, site = %config.api.site, "starting log-query-mcp");

    // Credentials are checked on the first tool call, not at startup.
    let transport = Arc::new(LazyTransport::new(config.api.clone()));
    let engine = Arc::new(SearchEngine::new(transport).with_export_dir(config.export.dir.clone()));

    match config.server.mode {
        ServerMode::Stdio => run_stdio(engine).await?,
        ServerMode::Http => serve_http(engine, &config.server).await?,
        ServerMode::Both => {
            let http_engine = engine.clone();
            let server = config.server.clone();
            let http_task = tokio::spawn(async move { serve_http(http_engine, &server).await });
            run_stdio(engine).await?;
            http_task.await.context("http task panicked")??;
        }
    }

    Ok(())
}
