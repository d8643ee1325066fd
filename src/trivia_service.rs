//! 题库服务
//!
//! 提供题目与分类的业务逻辑处理：分页列表、创建、删除、
//! 子串搜索、按分类列表与随机出题。
//!
//! ## 核心功能
//! - 题目 CRUD（委托给 QuestionRepo / CategoryRepo）
//! - 分页（固定每页 10 条）
//! - 随机出题（分类过滤 + 排除集，等概率选取）
//! - 错误统一映射为 API 错误分类，在请求边界转成响应信封

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::pagination::{paginate, QUESTIONS_PER_PAGE};
use crate::quiz;
use crate::store::{
    CategoryRepo, CreateQuestionParams, Question, QuestionRepo, StoreError, TriviaDatabase,
};

// ============================================================================
// API 错误分类
// ============================================================================

/// API 层错误分类
///
/// 全部在请求处理边界被回收并翻译成统一响应信封，
/// 内部故障细节只进日志，不外泄给客户端。
#[derive(Debug)]
pub enum ApiError {
    /// 请求的实体不存在，或检索结果为空
    NotFound,

    /// 请求载荷格式错误（缺字段、JSON 解析失败）
    BadRequest(String),

    /// 结构合法但业务规则拒绝的输入
    Unprocessable(String),

    /// 路由存在但动词不支持
    MethodNotAllowed,

    /// 出题候选集为空（题目出尽）
    ///
    /// 对外映射为 404，但内部与存储故障严格区分：
    /// 题目出尽走 debug 日志，不算系统错误。
    QuizExhausted,

    /// 存储层故障
    Store(StoreError),
}

impl ApiError {
    /// 对应的 HTTP 状态码
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::NotFound | ApiError::QuizExhausted => 404,
            ApiError::BadRequest(_) => 400,
            ApiError::Unprocessable(_) => 422,
            ApiError::MethodNotAllowed => 405,
            ApiError::Store(_) => 422,
        }
    }

    /// 响应信封中的 message 字段（固定短语，不含内部细节）
    pub fn envelope_message(&self) -> &'static str {
        match self {
            ApiError::NotFound | ApiError::QuizExhausted => "not found",
            ApiError::BadRequest(_) => "bad request",
            ApiError::Unprocessable(_) | ApiError::Store(_) => "unprocessable",
            ApiError::MethodNotAllowed => "method not allowed",
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::NotFound => write!(f, "not found"),
            ApiError::BadRequest(reason) => write!(f, "bad request: {}", reason),
            ApiError::Unprocessable(reason) => write!(f, "unprocessable: {}", reason),
            ApiError::MethodNotAllowed => write!(f, "method not allowed"),
            ApiError::QuizExhausted => write!(f, "quiz exhausted: no candidate questions remain"),
            ApiError::Store(e) => write!(f, "store failure: {}", e),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Store(err)
    }
}

// ============================================================================
// 服务结果类型
// ============================================================================

/// 分页题目列表结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionPage {
    pub questions: Vec<Question>,
    pub total: i64,
}

/// 创建题目结果（含刷新后的第一页）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedQuestion {
    pub id: i64,
    pub questions: Vec<Question>,
    pub total: i64,
}

/// 搜索结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub questions: Vec<Question>,
    pub total: i64,
    pub categories: Vec<String>,
}

/// 按分类的分页列表结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryQuestions {
    pub questions: Vec<Question>,
    pub total: i64,
    pub category_id: i64,
}

// ============================================================================
// 服务结构
// ============================================================================

/// 题库服务
pub struct TriviaService {
    db: Arc<TriviaDatabase>,
}

impl TriviaService {
    /// 创建服务实例
    pub fn new(db: Arc<TriviaDatabase>) -> Self {
        Self { db }
    }

    /// 列出全部分类标签（按 id 顺序的平铺标签列表）
    pub fn list_categories(&self) -> Result<Vec<String>, ApiError> {
        let categories = CategoryRepo::list_all(&self.db)?;
        Ok(categories.into_iter().map(|c| c.kind).collect())
    }

    /// 列出题目（分页，每页固定 10 条）
    ///
    /// 越界页码返回空列表与真实总数，不是错误。
    pub fn list_questions(&self, page: u32) -> Result<QuestionPage, ApiError> {
        let all = QuestionRepo::list_all(&self.db)?;
        let total = all.len() as i64;
        let questions = paginate(&all, page, QUESTIONS_PER_PAGE).to_vec();

        debug!(
            "[TriviaService] list_questions: page={}, returned={}, total={}",
            page,
            questions.len(),
            total
        );

        Ok(QuestionPage { questions, total })
    }

    /// 创建题目
    ///
    /// 题干/答案不能为空白，难度限定 1~5；违反业务规则返回 Unprocessable。
    pub fn create_question(&self, params: CreateQuestionParams) -> Result<CreatedQuestion, ApiError> {
        if params.question.trim().is_empty() {
            return Err(ApiError::Unprocessable("question text is blank".to_string()));
        }
        if params.answer.trim().is_empty() {
            return Err(ApiError::Unprocessable("answer text is blank".to_string()));
        }
        if !(1..=5).contains(&params.difficulty) {
            return Err(ApiError::Unprocessable(format!(
                "difficulty {} outside 1..=5",
                params.difficulty
            )));
        }

        let id = QuestionRepo::insert(&self.db, &params)?;

        info!("[TriviaService] Created question id={}", id);

        // 与列表端点一致：返回刷新后的第一页与总数
        let page = self.list_questions(1)?;
        Ok(CreatedQuestion {
            id,
            questions: page.questions,
            total: page.total,
        })
    }

    /// 按 id 删除题目
    pub fn delete_question(&self, id: i64) -> Result<i64, ApiError> {
        let existing = QuestionRepo::get(&self.db, id)?;
        if existing.is_none() {
            return Err(ApiError::NotFound);
        }

        QuestionRepo::delete(&self.db, id)?;

        info!("[TriviaService] Deleted question id={}", id);

        Ok(id)
    }

    /// 按题干子串搜索（大小写不敏感）
    ///
    /// 零命中返回 NotFound；命中时附带全部分类标签。
    pub fn search_questions(&self, term: &str) -> Result<SearchOutcome, ApiError> {
        let questions = QuestionRepo::search(&self.db, term)?;
        if questions.is_empty() {
            return Err(ApiError::NotFound);
        }

        let total = questions.len() as i64;
        let categories = self.list_categories()?;

        debug!(
            "[TriviaService] search_questions: term={:?}, hits={}",
            term, total
        );

        Ok(SearchOutcome {
            questions,
            total,
            categories,
        })
    }

    /// 按分类列出题目（分页）
    ///
    /// 请求页为空时返回 NotFound（含分类不存在、分类下无题目的情况）。
    pub fn questions_by_category(
        &self,
        category_id: i64,
        page: u32,
    ) -> Result<CategoryQuestions, ApiError> {
        let all = QuestionRepo::list_by_category(&self.db, category_id)?;
        let total = all.len() as i64;
        let questions = paginate(&all, page, QUESTIONS_PER_PAGE).to_vec();

        if questions.is_empty() {
            return Err(ApiError::NotFound);
        }

        Ok(CategoryQuestions {
            questions,
            total,
            category_id,
        })
    }

    /// 随机出题
    ///
    /// 存储层先按排除集粗筛（SQL NOT IN），选择器再执行完整契约：
    /// 分类过滤 + 排除过滤 + `[0, 候选数)` 等概率选取。
    pub fn play_quiz(
        &self,
        category: Option<i64>,
        previous_questions: &[i64],
    ) -> Result<Question, ApiError> {
        let snapshot = QuestionRepo::list_excluding_ids(&self.db, previous_questions)?;
        let excluded: HashSet<i64> = previous_questions.iter().copied().collect();

        let mut rng = rand::thread_rng();
        match quiz::select_question(&mut rng, &snapshot, category, &excluded) {
            Ok(question) => {
                debug!(
                    "[TriviaService] play_quiz: picked question id={} (category={:?})",
                    question.id, category
                );
                Ok(question.clone())
            }
            Err(quiz::NoCandidates) => {
                // 题目出尽是预期结果，不按故障记日志
                debug!(
                    "[TriviaService] play_quiz: exhausted (category={:?}, {} previous)",
                    category,
                    previous_questions.len()
                );
                Err(ApiError::QuizExhausted)
            }
        }
    }

    /// 记录存储故障细节（仅日志，客户端只见统一信封）
    pub fn log_failure(&self, context: &str, err: &ApiError) {
        match err {
            ApiError::Store(store_err) => {
                error!("[TriviaService] {} failed: {}", context, store_err);
            }
            ApiError::QuizExhausted => {
                debug!("[TriviaService] {}: quiz exhausted", context);
            }
            other => {
                debug!("[TriviaService] {} rejected: {}", context, other);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn service_with_data(question_count: usize) -> (TempDir, TriviaService, i64) {
        let tmp = TempDir::new().unwrap();
        let db = Arc::new(TriviaDatabase::new(tmp.path()).unwrap());
        let category = CategoryRepo::insert(&db, "Science").unwrap();
        for i in 1..=question_count {
            QuestionRepo::insert(
                &db,
                &CreateQuestionParams {
                    question: format!("question {}", i),
                    answer: format!("answer {}", i),
                    category,
                    difficulty: 3,
                },
            )
            .unwrap();
        }
        (tmp, TriviaService::new(db), category)
    }

    #[test]
    fn test_list_questions_pagination() {
        let (_tmp, service, _) = service_with_data(25);

        let first = service.list_questions(1).unwrap();
        assert_eq!(first.questions.len(), 10);
        assert_eq!(first.total, 25);

        let last = service.list_questions(3).unwrap();
        assert_eq!(last.questions.len(), 5);

        // 越界页码：空列表 + 真实总数，仍是成功
        let beyond = service.list_questions(9).unwrap();
        assert!(beyond.questions.is_empty());
        assert_eq!(beyond.total, 25);
    }

    #[test]
    fn test_create_question_validation() {
        let (_tmp, service, category) = service_with_data(0);

        let blank = service.create_question(CreateQuestionParams {
            question: "   ".to_string(),
            answer: "a".to_string(),
            category,
            difficulty: 1,
        });
        assert!(matches!(blank, Err(ApiError::Unprocessable(_))));

        let out_of_range = service.create_question(CreateQuestionParams {
            question: "q".to_string(),
            answer: "a".to_string(),
            category,
            difficulty: 9,
        });
        assert!(matches!(out_of_range, Err(ApiError::Unprocessable(_))));

        let created = service
            .create_question(CreateQuestionParams {
                question: "q".to_string(),
                answer: "a".to_string(),
                category,
                difficulty: 5,
            })
            .unwrap();
        assert_eq!(created.total, 1);
        assert_eq!(created.questions.len(), 1);
    }

    #[test]
    fn test_delete_missing_question_is_not_found() {
        let (_tmp, service, _) = service_with_data(1);
        assert!(matches!(
            service.delete_question(999),
            Err(ApiError::NotFound)
        ));

        let deleted = service.delete_question(1).unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(service.list_questions(1).unwrap().total, 0);
    }

    #[test]
    fn test_search_zero_hits_is_not_found() {
        let (_tmp, service, _) = service_with_data(3);

        let outcome = service.search_questions("QUESTION 2").unwrap();
        assert_eq!(outcome.total, 1);
        assert_eq!(outcome.categories, vec!["Science".to_string()]);

        assert!(matches!(
            service.search_questions("unrelated"),
            Err(ApiError::NotFound)
        ));
    }

    #[test]
    fn test_questions_by_category_empty_page_is_not_found() {
        let (_tmp, service, category) = service_with_data(5);

        let page = service.questions_by_category(category, 1).unwrap();
        assert_eq!(page.questions.len(), 5);
        assert_eq!(page.total, 5);

        assert!(matches!(
            service.questions_by_category(category, 2),
            Err(ApiError::NotFound)
        ));
        assert!(matches!(
            service.questions_by_category(category + 1, 1),
            Err(ApiError::NotFound)
        ));
    }

    #[test]
    fn test_play_quiz_respects_exclusions_until_exhausted() {
        let (_tmp, service, category) = service_with_data(3);

        let mut seen = Vec::new();
        for _ in 0..3 {
            let q = service.play_quiz(Some(category), &seen).unwrap();
            assert!(!seen.contains(&q.id));
            seen.push(q.id);
        }

        assert!(matches!(
            service.play_quiz(Some(category), &seen),
            Err(ApiError::QuizExhausted)
        ));
    }

    #[test]
    fn test_error_envelope_mapping() {
        assert_eq!(ApiError::NotFound.status_code(), 404);
        assert_eq!(ApiError::QuizExhausted.status_code(), 404);
        assert_eq!(ApiError::MethodNotAllowed.status_code(), 405);
        assert_eq!(ApiError::BadRequest("x".into()).status_code(), 400);
        assert_eq!(ApiError::Unprocessable("x".into()).status_code(), 422);
        assert_eq!(ApiError::QuizExhausted.envelope_message(), "not found");
    }
}
