//! Mailroom MCP Server
//!
//! Spawned by an MCP client; exposes the Gmail, MongoDB and Excel tools over
//! stdio JSON-RPC. Logs go to a daily file so stdout stays protocol-only.

use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use mailroom_core::config::Config;
use mailroom_core::mcp::{McpServer, ToolHandler};

#[tokio::main]
async fn main() -> Result<()> {
    // Load config first to get log path
    let (config, config_error) = match Config::load() {
        Ok(config) => (config, None),
        Err(e) => {
            let mut config = Config::default();
            config.apply_env(|key| std::env::var(key).ok());
            (config, Some(e))
        }
    };
    let config = Arc::new(config);

    let log_dir = config.logs_dir();
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, "mcp.log");

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_appender)
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S%.3f".to_string()))
        .with_ansi(false)
        .with_target(false);

    let filter = EnvFilter::try_new(&config.general.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(file_layer.with_filter(filter))
        .init();

    info!("Mailroom MCP server starting");
    if let Some(e) = config_error {
        warn!("Ignoring unreadable config file, using defaults: {}", e);
    }

    let services = mailroom_core::build_services(&config)?;
    let documents = services.documents.clone();
    let server = McpServer::new(ToolHandler::new(services, config));

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("MCP server stopped with error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl-C, shutting down");
        }
    }

    documents.close().await;
    info!("Mailroom MCP server stopped");

    Ok(())
}
