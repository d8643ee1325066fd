//! 存储层错误类型定义
//!
//! 本模块定义题库存储操作的错误类型和结果类型别名。

use std::fmt;

/// 存储操作结果类型别名
pub type StoreResult<T> = Result<T, StoreError>;

/// 存储层错误类型
#[derive(Debug)]
pub enum StoreError {
    /// 数据库错误
    Database(String),

    /// 连接池错误
    Pool(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Database(msg) => write!(f, "Database error: {}", msg),
            StoreError::Pool(msg) => write!(f, "Connection pool error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

// 从标准错误类型转换
impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

impl From<r2d2::Error> for StoreError {
    fn from(err: r2d2::Error) -> Self {
        StoreError::Pool(err.to_string())
    }
}
