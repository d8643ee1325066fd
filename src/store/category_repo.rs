//! 分类表查询操作
//!
//! 分类在 API 层面只读，仅提供有序列表与单条查询；
//! `insert` 用于初始数据灌入与测试数据准备。

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::database::TriviaDatabase;
use super::error::StoreResult;

/// 分类实体
///
/// `type` 是 SQL 列名与对外字段名，Rust 侧用 `kind` 承载。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
}

/// 分类仓储
pub struct CategoryRepo;

impl CategoryRepo {
    /// 按 id 顺序列出全部分类
    pub fn list_all(db: &TriviaDatabase) -> StoreResult<Vec<Category>> {
        let conn = db.get_conn()?;
        Self::list_all_with_conn(&conn)
    }

    pub fn list_all_with_conn(conn: &Connection) -> StoreResult<Vec<Category>> {
        let mut stmt = conn.prepare("SELECT id, type FROM categories ORDER BY id")?;
        let rows = stmt.query_map([], Self::map_row)?;
        Ok(rows
            .filter_map(|r| match r {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!("[Store::CategoryRepo] Row parse error (skipped): {}", e);
                    None
                }
            })
            .collect())
    }

    /// 获取单个分类
    pub fn get(db: &TriviaDatabase, id: i64) -> StoreResult<Option<Category>> {
        let conn = db.get_conn()?;
        let category = conn
            .query_row(
                "SELECT id, type FROM categories WHERE id = ?1",
                params![id],
                Self::map_row,
            )
            .optional()?;
        Ok(category)
    }

    /// 创建分类，返回分配的 id
    pub fn insert(db: &TriviaDatabase, label: &str) -> StoreResult<i64> {
        let conn = db.get_conn()?;
        conn.execute("INSERT INTO categories (type) VALUES (?1)", params![label])?;
        Ok(conn.last_insert_rowid())
    }

    fn map_row(row: &Row<'_>) -> Result<Category, rusqlite::Error> {
        Ok(Category {
            id: row.get(0)?,
            kind: row.get(1)?,
        })
    }
}
