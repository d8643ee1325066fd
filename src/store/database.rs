//! 题库数据库管理模块
//!
//! 提供题库 SQLite 数据库的初始化和连接管理。
//! 使用 r2d2 连接池，支持并发请求访问。
//!
//! ## 设计原则
//! - **单一数据库**：使用单个 `trivia.db`
//! - **连接池管理**：使用 r2d2 管理连接池
//! - **WAL 模式**：提升读多写少场景下的并发性能

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info};

use super::error::{StoreError, StoreResult};

/// 数据库文件名
const DATABASE_FILENAME: &str = "trivia.db";

/// 当前 Schema 版本
const CURRENT_DB_VERSION: u32 = 1;

/// SQLite 连接池类型
pub type TriviaPool = Pool<SqliteConnectionManager>;

/// SQLite 池化连接类型
pub type TriviaPooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// 题库数据库管理器
///
/// 管理题库的 SQLite 数据库文件（`trivia.db`）。
/// 支持：
/// - r2d2 连接池管理
/// - 幂等的 Schema 初始化
/// - WAL 模式提升并发性能
pub struct TriviaDatabase {
    /// 数据库连接池
    pool: TriviaPool,
    /// 数据库文件路径
    db_path: PathBuf,
}

impl TriviaDatabase {
    /// 创建新的题库数据库管理器
    ///
    /// # Arguments
    /// * `data_dir` - 数据目录路径（数据库文件所在目录）
    ///
    /// # Errors
    /// * 目录创建失败
    /// * 数据库连接失败
    /// * Schema 初始化失败
    pub fn new(data_dir: &Path) -> StoreResult<Self> {
        info!(
            "[Store::Database] Initializing trivia database in: {}",
            data_dir.display()
        );

        if let Err(e) = fs::create_dir_all(data_dir) {
            error!("[Store::Database] Failed to create data directory: {}", e);
            return Err(StoreError::Database(format!(
                "Failed to create data directory: {}",
                e
            )));
        }

        let db_path = data_dir.join(DATABASE_FILENAME);
        let pool = Self::build_pool(&db_path)?;

        let db = Self { pool, db_path };
        db.initialize_schema()?;

        info!(
            "[Store::Database] Trivia database initialized successfully: {}",
            db.db_path.display()
        );

        Ok(db)
    }

    /// 构建连接池
    fn build_pool(db_path: &Path) -> StoreResult<TriviaPool> {
        debug!(
            "[Store::Database] Building connection pool for: {}",
            db_path.display()
        );

        let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
            // 启用外键约束（必须！）
            conn.pragma_update(None, "foreign_keys", "ON")?;
            // 使用 WAL 模式提升并发性能
            conn.pragma_update(None, "journal_mode", "WAL")?;
            // 同步模式设为 NORMAL（平衡安全与性能）
            conn.pragma_update(None, "synchronous", "NORMAL")?;
            // 设置 busy_timeout 避免无界等待
            conn.pragma_update(None, "busy_timeout", 5000i64)?;
            Ok(())
        });

        let pool = Pool::builder()
            .max_size(8) // SQLite 单写者模型下无需太多连接
            .min_idle(Some(1))
            .connection_timeout(Duration::from_secs(5))
            .idle_timeout(Some(Duration::from_secs(600)))
            .build(manager)
            .map_err(|e| StoreError::Pool(format!("Failed to create connection pool: {}", e)))?;

        Ok(pool)
    }

    /// 获取数据库连接
    pub fn get_conn(&self) -> StoreResult<TriviaPooledConnection> {
        self.pool
            .get()
            .map_err(|e| StoreError::Pool(format!("Failed to get connection: {}", e)))
    }

    /// 数据库文件路径
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// 初始化/迁移数据库 Schema（幂等）
    fn initialize_schema(&self) -> StoreResult<()> {
        let conn = self.get_conn()?;
        conn.execute_batch(
            "BEGIN;
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY NOT NULL
            );
            CREATE TABLE IF NOT EXISTS categories (
                id   INTEGER PRIMARY KEY AUTOINCREMENT,
                type TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS questions (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                question   TEXT NOT NULL,
                answer     TEXT NOT NULL,
                category   INTEGER NOT NULL REFERENCES categories(id),
                difficulty INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_questions_category ON questions(category);
            COMMIT;",
        )?;

        let current_version: u32 = conn
            .query_row(
                "SELECT version FROM schema_version ORDER BY version DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?
            .unwrap_or(0);

        if current_version < CURRENT_DB_VERSION {
            conn.execute(
                "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
                params![CURRENT_DB_VERSION],
            )?;
            debug!(
                "[Store::Database] Schema migrated: v{} -> v{}",
                current_version, CURRENT_DB_VERSION
            );
        }

        Ok(())
    }
}
