//! 随机出题选择器
//!
//! 从题目快照中计算候选集（分类过滤 + 已出题排除），
//! 再等概率随机选出一题。
//!
//! ## 约定
//! - 分类过滤使用显式 `Option`：`None` 表示不过滤，`Some(0)` 就是过滤 id 为 0
//!   的分类，不存在"假值即全部"的隐式语义
//! - 随机索引取自 `[0, len)`（`SliceRandom::choose`），不存在越界一位的取法
//! - 候选集为空是正常业务结果（题目出尽），与存储故障严格区分
//! - 无副作用：不标记"已使用"，由调用方自行累积排除集

use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;
use thiserror::Error;
use tracing::debug;

use crate::store::Question;

/// 过滤后无可选题目（题目出尽）
///
/// 这是预期中的业务结果，不是系统故障；调用方应将其映射为
/// "未找到"一类的响应，而不是错误日志。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no quiz candidates remain after filtering")]
pub struct NoCandidates;

/// 计算候选集：先按分类过滤（提供时），再剔除已出过的题目
pub fn candidates<'a>(
    questions: &'a [Question],
    category: Option<i64>,
    excluded: &HashSet<i64>,
) -> Vec<&'a Question> {
    questions
        .iter()
        .filter(|q| category.map_or(true, |c| q.category == c))
        .filter(|q| !excluded.contains(&q.id))
        .collect()
}

/// 从题目快照中等概率随机选出一题
///
/// 每个候选的被选概率均为 `1/候选数`。候选集为空时返回 [`NoCandidates`]。
pub fn select_question<'a, R: Rng + ?Sized>(
    rng: &mut R,
    questions: &'a [Question],
    category: Option<i64>,
    excluded: &HashSet<i64>,
) -> Result<&'a Question, NoCandidates> {
    let pool = candidates(questions, category, excluded);

    debug!(
        "[QuizSelector] {} candidates (category={:?}, {} excluded)",
        pool.len(),
        category,
        excluded.len()
    );

    pool.choose(rng).copied().ok_or(NoCandidates)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(id: i64, category: i64) -> Question {
        Question {
            id,
            question: format!("question {}", id),
            answer: format!("answer {}", id),
            category,
            difficulty: 1,
        }
    }

    fn ids(set: &[i64]) -> HashSet<i64> {
        set.iter().copied().collect()
    }

    #[test]
    fn test_never_returns_excluded_question() {
        let questions: Vec<Question> = (1..=10).map(|i| question(i, 1)).collect();
        let excluded = ids(&[1, 2, 3, 4, 5]);
        let mut rng = rand::thread_rng();

        for _ in 0..200 {
            let picked = select_question(&mut rng, &questions, None, &excluded).unwrap();
            assert!(!excluded.contains(&picked.id));
        }
    }

    #[test]
    fn test_category_filter_is_respected() {
        let questions = vec![question(1, 1), question(2, 2), question(3, 1)];
        let mut rng = rand::thread_rng();

        for _ in 0..100 {
            let picked = select_question(&mut rng, &questions, Some(2), &HashSet::new()).unwrap();
            assert_eq!(picked.category, 2);
        }
    }

    #[test]
    fn test_single_remaining_candidate_is_deterministic() {
        // {Q1(cat=1), Q2(cat=2), Q3(cat=1)}, category=1, excluded={Q1} → 必然 Q3
        let questions = vec![question(1, 1), question(2, 2), question(3, 1)];
        let mut rng = rand::thread_rng();

        let picked = select_question(&mut rng, &questions, Some(1), &ids(&[1])).unwrap();
        assert_eq!(picked.id, 3);
    }

    #[test]
    fn test_exhausted_candidates() {
        let questions = vec![question(1, 1), question(2, 2), question(3, 1)];
        let mut rng = rand::thread_rng();

        let result = select_question(&mut rng, &questions, Some(1), &ids(&[1, 3]));
        assert_eq!(result, Err(NoCandidates));
    }

    #[test]
    fn test_empty_input_is_no_candidates_not_a_panic() {
        let questions: Vec<Question> = Vec::new();
        let mut rng = rand::thread_rng();
        assert_eq!(
            select_question(&mut rng, &questions, None, &HashSet::new()),
            Err(NoCandidates)
        );
    }

    #[test]
    fn test_explicit_category_zero_is_a_filter_not_all() {
        let questions = vec![question(1, 1), question(2, 2)];
        let mut rng = rand::thread_rng();
        assert_eq!(
            select_question(&mut rng, &questions, Some(0), &HashSet::new()),
            Err(NoCandidates)
        );
    }

    /// 两个候选反复采样应接近 50/50
    #[test]
    fn test_two_candidates_approach_uniform() {
        let questions = vec![question(1, 1), question(2, 1)];
        let mut rng = rand::thread_rng();

        const SAMPLES: usize = 2000;
        let mut first = 0usize;
        for _ in 0..SAMPLES {
            let picked = select_question(&mut rng, &questions, None, &HashSet::new()).unwrap();
            if picked.id == 1 {
                first += 1;
            }
        }

        // 期望 1000，容差放宽到 ±200（远超 3σ），避免偶发失败
        assert!(
            (800..=1200).contains(&first),
            "distribution skewed: {}/{}",
            first,
            SAMPLES
        );
    }
}
