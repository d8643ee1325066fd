//! 题目表 CRUD 操作
//!
//! ## 核心方法
//! - `list_all`: 按 id 顺序列出全部题目
//! - `list_by_category`: 按分类筛选题目
//! - `list_excluding_ids`: 排除指定 id 集合（随机出题用）
//! - `search`: 按题干子串搜索（大小写不敏感）
//! - `insert`: 创建题目，返回分配的 id
//! - `delete`: 按 id 删除题目

use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::database::TriviaDatabase;
use super::error::StoreResult;

/// Log row-parse errors instead of silently discarding them.
fn log_and_skip_err<T>(result: Result<T, rusqlite::Error>) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(e) => {
            warn!("[Store::QuestionRepo] Row parse error (skipped): {}", e);
            None
        }
    }
}

// ============================================================================
// 数据类型定义
// ============================================================================

/// 题目实体
///
/// 对外可见字段集与数据库列一一对应，序列化结果即 API 返回的题目记录。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Question {
    pub id: i64,
    pub question: String,
    pub answer: String,
    pub category: i64,
    pub difficulty: i32,
}

/// 题目创建参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateQuestionParams {
    pub question: String,
    pub answer: String,
    pub category: i64,
    pub difficulty: i32,
}

// ============================================================================
// 仓储实现
// ============================================================================

/// 题目仓储
pub struct QuestionRepo;

impl QuestionRepo {
    /// 按 id 顺序列出全部题目
    pub fn list_all(db: &TriviaDatabase) -> StoreResult<Vec<Question>> {
        let conn = db.get_conn()?;
        Self::list_all_with_conn(&conn)
    }

    pub fn list_all_with_conn(conn: &Connection) -> StoreResult<Vec<Question>> {
        let mut stmt = conn.prepare(
            "SELECT id, question, answer, category, difficulty FROM questions ORDER BY id",
        )?;
        let rows = stmt.query_map([], Self::map_row)?;
        Ok(rows.filter_map(log_and_skip_err).collect())
    }

    /// 按分类筛选题目（按 id 顺序）
    pub fn list_by_category(db: &TriviaDatabase, category_id: i64) -> StoreResult<Vec<Question>> {
        let conn = db.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, question, answer, category, difficulty FROM questions \
             WHERE category = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![category_id], Self::map_row)?;
        Ok(rows.filter_map(log_and_skip_err).collect())
    }

    /// 列出不在给定 id 集合中的题目
    ///
    /// 空集合等价于 `list_all`。占位符按 id 个数动态生成。
    pub fn list_excluding_ids(db: &TriviaDatabase, excluded: &[i64]) -> StoreResult<Vec<Question>> {
        if excluded.is_empty() {
            return Self::list_all(db);
        }

        let conn = db.get_conn()?;
        let placeholders: Vec<String> = (1..=excluded.len()).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "SELECT id, question, answer, category, difficulty FROM questions \
             WHERE id NOT IN ({}) ORDER BY id",
            placeholders.join(", ")
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(excluded.iter()), Self::map_row)?;
        let questions: Vec<Question> = rows.filter_map(log_and_skip_err).collect();

        debug!(
            "[Store::QuestionRepo] list_excluding_ids: {} excluded, {} remaining",
            excluded.len(),
            questions.len()
        );

        Ok(questions)
    }

    /// 按题干子串搜索（大小写不敏感）
    ///
    /// SQLite 的 LIKE 对 ASCII 默认大小写不敏感，与原有检索行为一致。
    pub fn search(db: &TriviaDatabase, term: &str) -> StoreResult<Vec<Question>> {
        let conn = db.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, question, answer, category, difficulty FROM questions \
             WHERE question LIKE ?1 ORDER BY id",
        )?;
        let pattern = format!("%{}%", term);
        let rows = stmt.query_map(params![pattern], Self::map_row)?;
        Ok(rows.filter_map(log_and_skip_err).collect())
    }

    /// 获取单题
    pub fn get(db: &TriviaDatabase, id: i64) -> StoreResult<Option<Question>> {
        let conn = db.get_conn()?;
        let question = conn
            .query_row(
                "SELECT id, question, answer, category, difficulty FROM questions WHERE id = ?1",
                params![id],
                Self::map_row,
            )
            .optional()?;
        Ok(question)
    }

    /// 创建题目，返回分配的 id
    pub fn insert(db: &TriviaDatabase, params: &CreateQuestionParams) -> StoreResult<i64> {
        let conn = db.get_conn()?;
        conn.execute(
            "INSERT INTO questions (question, answer, category, difficulty) \
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
                params.question,
                params.answer,
                params.category,
                params.difficulty
            ],
        )?;
        let id = conn.last_insert_rowid();

        debug!("[Store::QuestionRepo] Inserted question id={}", id);

        Ok(id)
    }

    /// 按 id 删除题目，返回是否实际删除了记录
    pub fn delete(db: &TriviaDatabase, id: i64) -> StoreResult<bool> {
        let conn = db.get_conn()?;
        let affected = conn.execute("DELETE FROM questions WHERE id = ?1", params![id])?;
        Ok(affected > 0)
    }

    /// 题目总数
    pub fn count(db: &TriviaDatabase) -> StoreResult<i64> {
        let conn = db.get_conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM questions", [], |row| row.get(0))?;
        Ok(count)
    }

    fn map_row(row: &Row<'_>) -> Result<Question, rusqlite::Error> {
        Ok(Question {
            id: row.get(0)?,
            question: row.get(1)?,
            answer: row.get(2)?,
            category: row.get(3)?,
            difficulty: row.get(4)?,
        })
    }
}
