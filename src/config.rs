//! 服务配置
//!
//! 配置来源（优先级从低到高）：内置默认值 → `trivia.toml`（存在时）→
//! `TRIVIA_` 前缀环境变量。`.env` 文件经 dotenvy 载入。
//! 配置解析失败只降级为默认值并告警，不会中断启动。

use serde::Deserialize;
use std::path::PathBuf;
use tracing::warn;

/// 服务配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TriviaConfig {
    /// HTTP 监听地址
    pub bind_addr: String,
    /// 数据库文件所在目录
    pub database_dir: PathBuf,
    /// 允许绑定非回环地址（默认仅本机）
    pub allow_external: bool,
}

impl Default for TriviaConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:5000".to_string(),
            database_dir: PathBuf::from("data"),
            allow_external: false,
        }
    }
}

impl TriviaConfig {
    /// 从环境与配置文件加载
    pub fn from_env_and_file() -> Self {
        dotenvy::dotenv().ok();

        let mut builder = config::Config::builder()
            .add_source(config::Environment::with_prefix("TRIVIA").try_parsing(true));
        if std::path::Path::new("trivia.toml").exists() {
            builder = builder.add_source(config::File::with_name("trivia"));
        }

        match builder.build().and_then(|loaded| loaded.try_deserialize()) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!("[Config] Failed to load configuration, using defaults: {}", e);
                TriviaConfig::default()
            }
        }
    }
}
