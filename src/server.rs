//! MCP server over stdio or streamable HTTP.
//!
//! Both transports share one [`MemoryCoordinator`]. When
//! `storage.export_on_shutdown` is set, the training export is written after
//! the server stops.

use crate::config::KeepsakeConfig;
use crate::coordinator::MemoryCoordinator;
use crate::tools::KeepsakeTools;
use anyhow::Result;
use rmcp::ServiceExt;
use std::path::PathBuf;
use std::sync::Arc;

/// Serve on the transport named by `server.transport`.
pub async fn serve(config: KeepsakeConfig) -> Result<()> {
    match config.server.transport.as_str() {
        "stdio" => serve_stdio(config).await,
        "sse" | "http" => serve_sse(config).await,
        other => anyhow::bail!("unknown transport: {other}. Supported: stdio, sse"),
    }
}

async fn setup(config: KeepsakeConfig) -> Result<(Arc<MemoryCoordinator>, ShutdownExport)> {
    let shutdown = ShutdownExport {
        enabled: config.storage.export_on_shutdown,
        path: config.resolved_export_path(),
    };
    let memory = MemoryCoordinator::open(config).await?;
    tracing::info!(semantic = memory.semantic_enabled(), "memory ready");
    Ok((memory, shutdown))
}

struct ShutdownExport {
    enabled: bool,
    path: PathBuf,
}

impl ShutdownExport {
    async fn run(&self, memory: &MemoryCoordinator) {
        if !self.enabled {
            return;
        }
        if let Err(e) = memory.export_training_data(&self.path).await {
            tracing::warn!(error = %e, "shutdown export failed");
        }
    }
}

/// Start the MCP server over stdio transport.
pub async fn serve_stdio(config: KeepsakeConfig) -> Result<()> {
    tracing::info!("starting keepsake MCP server on stdio");

    let (memory, shutdown) = setup(config).await?;
    let tools = KeepsakeTools::new(Arc::clone(&memory), shutdown.path.clone());

    let server = tools.serve(rmcp::transport::stdio()).await?;
    tracing::info!("MCP server running, waiting for client");
    server.waiting().await?;
    tracing::info!("MCP server shut down");

    shutdown.run(&memory).await;
    Ok(())
}

/// Start the MCP server over Streamable HTTP (SSE) transport.
pub async fn serve_sse(config: KeepsakeConfig) -> Result<()> {
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!(addr = %bind_addr, "starting keepsake MCP server on SSE/HTTP");

    let (memory, shutdown) = setup(config).await?;

    let factory_memory = Arc::clone(&memory);
    let export_path = shutdown.path.clone();
    let service = rmcp::transport::streamable_http_server::StreamableHttpService::new(
        move || Ok(KeepsakeTools::new(Arc::clone(&factory_memory), export_path.clone())),
        rmcp::transport::streamable_http_server::session::local::LocalSessionManager::default()
            .into(),
        Default::default(),
    );

    let router = axum::Router::new().nest_service("/mcp", service);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "MCP server listening at http://{bind_addr}/mcp");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
            tracing::info!("shutting down SSE server");
        })
        .await?;

    shutdown.run(&memory).await;
    Ok(())
}
