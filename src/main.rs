//! Trivia API 服务进程入口
//!
//! 启动顺序：日志 → 配置 → 数据库 → HTTP 服务。

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use trivia_api::server;
use trivia_api::{TriviaConfig, TriviaDatabase, TriviaService};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = TriviaConfig::from_env_and_file();
    info!(
        "[Main] Starting trivia-api (bind_addr={}, database_dir={})",
        config.bind_addr,
        config.database_dir.display()
    );

    let db = TriviaDatabase::new(&config.database_dir)
        .with_context(|| format!("opening database in {:?}", config.database_dir))?;
    let service = Arc::new(TriviaService::new(Arc::new(db)));

    server::serve(&config, service).await
}
