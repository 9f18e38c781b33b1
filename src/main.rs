//! HPC Assistant HTTP 服务
//!
//! 入口：初始化日志、加载配置、装配网关并启动 axum；收到关闭信号后停止接收请求并排空在途任务。
//!
//! 用法：`hpc-assistant [config.toml]`，未给出时读取 config/default.toml 与 HPCA__* 环境变量。

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use hpc_assistant::{
    config::load_config,
    core::{ServiceBuilder, ShutdownManager},
    gateway::router,
    observability,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let cfg = load_config(config_path).context("Failed to load config")?;
    let bind = cfg.server.bind.clone();
    let shutdown_timeout = Duration::from_secs(cfg.server.shutdown_timeout_secs);

    let gateway = ServiceBuilder::new(cfg)
        .build_gateway()
        .context("Failed to build services")?;

    let shutdown = ShutdownManager::new();
    shutdown.install_signal_handlers();

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    tracing::info!("HPC Assistant listening on http://{}", bind);

    let token = shutdown.token();
    axum::serve(listener, router(Arc::clone(&gateway)))
        .with_graceful_shutdown(async move { token.cancelled().await })
        .await
        .context("Server error")?;

    tracing::info!("HTTP server stopped, draining jobs");
    if gateway.shutdown(shutdown_timeout).await {
        tracing::info!("All jobs finished");
    }
    Ok(())
}
