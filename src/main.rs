//! MCP HTTP Proxy
//!
//! Serves MCP over stdio and forwards every call to a JSON-RPC-over-HTTP
//! origin, mirroring only the capabilities the origin declares.

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use mcp_http_proxy::config::{Config, DEFAULT_TIMEOUT_SECS};
use mcp_http_proxy::mcp::server::McpServer;

/// MCP HTTP Proxy
#[derive(Parser)]
#[command(name = "mcp-http-proxy")]
#[command(author, version, about = "MCP HTTP Proxy - mirrors a JSON-RPC-over-HTTP origin as a stdio MCP server")]
struct Cli {
    /// Upstream to proxy to; its URL is read from <UPSTREAM>_API_URL
    #[arg(long, short = 'u', env = "MCP_PROXY_UPSTREAM")]
    upstream: String,

    /// Deadline for each upstream call in seconds (0 disables it)
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout_secs: u64,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries JSON-RPC only
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env(&cli.upstream, cli.timeout_secs)
        .context("failed to load proxy configuration")?;

    let mut server = McpServer::bootstrap(&config)
        .await
        .with_context(|| format!("failed to start proxy for upstream '{}'", config.selector))?;

    server.run_stdio().await.context("proxy transport failed")?;

    Ok(())
}
