//! 题目难度调整服务
//!
//! 两阶段流程：
//! 1. **提议**（只读）：汇总范围内每道题所有学生的作答，正确率偏离当前难度的
//!    期望区间时生成调整建议
//! 2. **确认**（写入）：逐条执行经教师确认的调整指令，单条失败不影响其他条目
//!
//! 两个阶段之间不保留任何服务端状态，客户端回传完整的指令列表。

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::analytics_config::{AnalyticsConfig, BandPosition, CorrectnessBand};
use crate::answer_stats::{extract_stats, AnswerStat};
use crate::error::{AnalyticsError, AnalyticsResult};
use crate::models::{
    clamp_difficulty, CourseId, KnowledgePointId, QuestionId, QuestionScope, MAX_DIFFICULTY,
    MIN_DIFFICULTY,
};
use crate::store::{AnswerSource, QuestionStore};

// ============================================================================
// 数据类型定义
// ============================================================================

/// 建议的调整方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdjustmentDirection {
    Increase,
    Decrease,
    None,
}

/// 难度调整建议
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DifficultyProposal {
    pub question_id: QuestionId,
    pub current_difficulty: i32,
    pub suggested_difficulty: i32,
    pub suggested_direction: AdjustmentDirection,
    /// 所有学生的平均得分率 [0, 1]
    pub correct_rate: f64,
    pub attempt_count: usize,
    pub wrong_attempts: usize,
    pub knowledge_point_id: KnowledgePointId,
    pub course_id: Option<CourseId>,
    pub reason: String,
}

/// 提议阶段统计
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustmentStatistics {
    /// 参与评估的题目数（作答次数达到下限）
    pub total_questions: usize,
    pub need_adjustment: usize,
    /// 参与评估题目的平均正确率；无题目时为 0
    pub average_correct_rate: f64,
    /// 因作答次数不足而跳过的题目数
    pub insufficient_data: usize,
}

/// 提议阶段结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustableQuestionsResult {
    pub questions: Vec<DifficultyProposal>,
    pub statistics: AdjustmentStatistics,
}

/// 确认阶段的单条指令
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustmentDirective {
    pub question_id: QuestionId,
    pub should_apply: bool,
    #[serde(default)]
    pub new_difficulty: Option<i32>,
}

/// 单条指令的执行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdjustmentStatus {
    Success,
    Skipped,
    Failed,
}

/// 单条指令的执行结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DifficultyAdjustmentResult {
    pub question_id: QuestionId,
    pub old_difficulty: Option<i32>,
    pub new_difficulty: Option<i32>,
    pub status: AdjustmentStatus,
    pub detail: Option<String>,
}

impl DifficultyAdjustmentResult {
    fn skipped(question_id: QuestionId) -> Self {
        Self {
            question_id,
            old_difficulty: None,
            new_difficulty: None,
            status: AdjustmentStatus::Skipped,
            detail: None,
        }
    }

    fn failed(
        question_id: QuestionId,
        old_difficulty: Option<i32>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            question_id,
            old_difficulty,
            new_difficulty: None,
            status: AdjustmentStatus::Failed,
            detail: Some(detail.into()),
        }
    }
}

/// 确认阶段结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmResult {
    pub success_count: usize,
    pub failed_count: usize,
    /// 与输入指令一一对应，顺序一致
    pub details: Vec<DifficultyAdjustmentResult>,
}

impl ConfirmResult {
    pub fn skipped_count(&self) -> usize {
        self.details
            .iter()
            .filter(|d| d.status == AdjustmentStatus::Skipped)
            .count()
    }
}

/// 教师对一批建议的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProposalDecision {
    Accept,
    Reject,
}

// ============================================================================
// 纯函数
// ============================================================================

/// 按正确率与期望区间的关系给出调整方向
pub fn classify(correct_rate: f64, band: &CorrectnessBand) -> AdjustmentDirection {
    match band.position(correct_rate) {
        BandPosition::Above => AdjustmentDirection::Increase,
        BandPosition::Below => AdjustmentDirection::Decrease,
        BandPosition::Within => AdjustmentDirection::None,
    }
}

/// 沿调整方向移动一级（限制在 1-5）
pub fn step_difficulty(current: i32, direction: AdjustmentDirection) -> i32 {
    let current = clamp_difficulty(current);
    match direction {
        AdjustmentDirection::Increase => (current + 1).min(MAX_DIFFICULTY),
        AdjustmentDirection::Decrease => (current - 1).max(MIN_DIFFICULTY),
        AdjustmentDirection::None => current,
    }
}

fn build_reason(
    stat: &AnswerStat,
    band: &CorrectnessBand,
    direction: AdjustmentDirection,
) -> String {
    let verdict = match direction {
        AdjustmentDirection::Increase => "正确率高于当前难度区间，建议提升难度",
        AdjustmentDirection::Decrease => "正确率低于当前难度区间，建议降低难度",
        AdjustmentDirection::None => "正确率处于当前难度区间",
    };
    format!(
        "{}（{} 次作答，正确率 {:.0}%，难度 {} 期望 {}）",
        verdict,
        stat.attempt_count,
        stat.fraction_correct * 100.0,
        stat.difficulty,
        band.describe()
    )
}

/// 将选中的建议转换为确认指令
///
/// 接受：按建议难度写入；拒绝：`should_apply = false`，难度保持当前值。
/// 只为 `selected_ids` 中出现的建议生成指令，顺序与 `proposals` 一致。
pub fn build_directives(
    proposals: &[DifficultyProposal],
    selected_ids: &[QuestionId],
    decision: ProposalDecision,
) -> Vec<AdjustmentDirective> {
    let selected: HashSet<QuestionId> = selected_ids.iter().copied().collect();
    proposals
        .iter()
        .filter(|p| selected.contains(&p.question_id))
        .map(|p| match decision {
            ProposalDecision::Accept => AdjustmentDirective {
                question_id: p.question_id,
                should_apply: true,
                new_difficulty: Some(p.suggested_difficulty),
            },
            ProposalDecision::Reject => AdjustmentDirective {
                question_id: p.question_id,
                should_apply: false,
                new_difficulty: Some(p.current_difficulty),
            },
        })
        .collect()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

// ============================================================================
// 服务结构
// ============================================================================

/// 题目难度调整服务
pub struct DifficultyAdjustService {
    answers: Arc<dyn AnswerSource>,
    questions: Arc<dyn QuestionStore>,
    config: AnalyticsConfig,
}

impl DifficultyAdjustService {
    pub fn new(
        answers: Arc<dyn AnswerSource>,
        questions: Arc<dyn QuestionStore>,
        config: AnalyticsConfig,
    ) -> Self {
        Self {
            answers,
            questions,
            config,
        }
    }

    /// 提议阶段：找出正确率偏离期望区间的题目（只读）
    ///
    /// 数据源出错时整体失败，返回 `AnalyticsError::QueryFailed`。
    pub fn query_adjustable_questions(
        &self,
        scope: &QuestionScope,
    ) -> AnalyticsResult<AdjustableQuestionsResult> {
        let records = self.answers.fetch_answers_by_scope(scope).map_err(|e| {
            warn!("[Analytics::Difficulty] Failed to load answers: {}", e);
            AnalyticsError::QueryFailed(e.to_string())
        })?;
        let stats = extract_stats(&records);

        let mut proposals = Vec::new();
        let mut examined = 0usize;
        let mut insufficient = 0usize;
        let mut rate_sum = 0.0;

        for stat in &stats {
            if stat.attempt_count < self.config.min_attempts {
                insufficient += 1;
                continue;
            }
            examined += 1;
            rate_sum += stat.fraction_correct;

            let band = self.config.band_for(stat.difficulty);
            let direction = classify(stat.fraction_correct, &band);
            if direction == AdjustmentDirection::None {
                continue;
            }

            debug!(
                "[Analytics::Difficulty] Question {} flagged {:?}: rate {:.3}, band {}",
                stat.question_id,
                direction,
                stat.fraction_correct,
                band.describe()
            );
            proposals.push(DifficultyProposal {
                question_id: stat.question_id,
                current_difficulty: stat.difficulty,
                suggested_difficulty: step_difficulty(stat.difficulty, direction),
                suggested_direction: direction,
                correct_rate: stat.fraction_correct,
                attempt_count: stat.attempt_count,
                wrong_attempts: stat.incorrect_count,
                knowledge_point_id: stat.knowledge_point_id,
                course_id: stat.course_id,
                reason: build_reason(stat, &band, direction),
            });
        }

        proposals.sort_by_key(|p| p.question_id);

        let statistics = AdjustmentStatistics {
            total_questions: examined,
            need_adjustment: proposals.len(),
            average_correct_rate: if examined == 0 {
                0.0
            } else {
                rate_sum / examined as f64
            },
            insufficient_data: insufficient,
        };

        info!(
            "[Analytics::Difficulty] Examined {} questions, {} need adjustment, {} below {} attempts",
            statistics.total_questions,
            statistics.need_adjustment,
            statistics.insufficient_data,
            self.config.min_attempts
        );

        Ok(AdjustableQuestionsResult {
            questions: proposals,
            statistics,
        })
    }

    /// 确认阶段：逐条执行调整指令
    ///
    /// 每条指令独立处理，出错或 panic 只影响该条目；整批不具备事务性。
    pub fn confirm_adjustments(&self, directives: &[AdjustmentDirective]) -> ConfirmResult {
        let mut details = Vec::with_capacity(directives.len());

        for directive in directives {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.apply_directive(directive)));
            let result = match outcome {
                Ok(result) => result,
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    warn!(
                        "[Analytics::Difficulty] Adjustment of question {} panicked: {}",
                        directive.question_id, message
                    );
                    DifficultyAdjustmentResult::failed(
                        directive.question_id,
                        None,
                        format!("internal error: {}", message),
                    )
                }
            };
            details.push(result);
        }

        let success_count = details
            .iter()
            .filter(|d| d.status == AdjustmentStatus::Success)
            .count();
        let failed_count = details
            .iter()
            .filter(|d| d.status == AdjustmentStatus::Failed)
            .count();

        info!(
            "[Analytics::Difficulty] Confirmed {} directives: {} success, {} failed",
            directives.len(),
            success_count,
            failed_count
        );

        ConfirmResult {
            success_count,
            failed_count,
            details,
        }
    }

    fn apply_directive(&self, directive: &AdjustmentDirective) -> DifficultyAdjustmentResult {
        let question_id = directive.question_id;
        if !directive.should_apply {
            return DifficultyAdjustmentResult::skipped(question_id);
        }

        let question = match self.questions.fetch_question_by_id(question_id) {
            Ok(Some(q)) => q,
            Ok(None) => {
                return DifficultyAdjustmentResult::failed(question_id, None, "question not found")
            }
            Err(e) => {
                warn!(
                    "[Analytics::Difficulty] Failed to load question {}: {}",
                    question_id, e
                );
                return DifficultyAdjustmentResult::failed(question_id, None, e.to_string());
            }
        };

        let Some(requested) = directive.new_difficulty else {
            return DifficultyAdjustmentResult::failed(
                question_id,
                Some(question.difficulty),
                "new difficulty missing",
            );
        };
        let new_difficulty = clamp_difficulty(requested);

        match self
            .questions
            .persist_question_difficulty(question_id, new_difficulty)
        {
            Ok(()) => {
                debug!(
                    "[Analytics::Difficulty] Question {} difficulty {} -> {}",
                    question_id, question.difficulty, new_difficulty
                );
                DifficultyAdjustmentResult {
                    question_id,
                    old_difficulty: Some(question.difficulty),
                    new_difficulty: Some(new_difficulty),
                    status: AdjustmentStatus::Success,
                    detail: None,
                }
            }
            Err(e) => {
                warn!(
                    "[Analytics::Difficulty] Failed to persist question {}: {}",
                    question_id, e
                );
                let detail = if e.is_not_found() {
                    "question not found".to_string()
                } else {
                    e.to_string()
                };
                DifficultyAdjustmentResult::failed(question_id, Some(question.difficulty), detail)
            }
        }
    }
}

// ============================================================================
// 单元测试
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Answer, AnswerRecord, Question};
    use crate::store::MemoryLearningStore;

    fn service(store: &Arc<MemoryLearningStore>) -> DifficultyAdjustService {
        DifficultyAdjustService::new(store.clone(), store.clone(), AnalyticsConfig::default())
    }

    /// 为题目录入 `attempts` 次作答，其中前 `correct` 次正确
    fn seed_attempts(
        store: &MemoryLearningStore,
        question_id: i64,
        attempts: i64,
        correct: i64,
        next_id: &mut i64,
    ) {
        for i in 0..attempts {
            *next_id += 1;
            store.insert_answer(Answer::flagged(*next_id, 1000 + i, question_id, i < correct));
        }
    }

    fn proposal(question_id: i64, current: i32, suggested: i32) -> DifficultyProposal {
        DifficultyProposal {
            question_id,
            current_difficulty: current,
            suggested_difficulty: suggested,
            suggested_direction: if suggested > current {
                AdjustmentDirection::Increase
            } else {
                AdjustmentDirection::Decrease
            },
            correct_rate: 0.5,
            attempt_count: 10,
            wrong_attempts: 5,
            knowledge_point_id: 1,
            course_id: None,
            reason: String::new(),
        }
    }

    #[test]
    fn test_classify_against_band() {
        let band = CorrectnessBand::new(0.5, 0.7);
        assert_eq!(classify(0.9, &band), AdjustmentDirection::Increase);
        assert_eq!(classify(0.6, &band), AdjustmentDirection::None);
        assert_eq!(classify(0.1, &band), AdjustmentDirection::Decrease);
    }

    #[test]
    fn test_step_difficulty_clamps() {
        assert_eq!(step_difficulty(3, AdjustmentDirection::Increase), 4);
        assert_eq!(step_difficulty(5, AdjustmentDirection::Increase), 5);
        assert_eq!(step_difficulty(1, AdjustmentDirection::Decrease), 1);
        assert_eq!(step_difficulty(9, AdjustmentDirection::None), 5);
    }

    #[test]
    fn test_query_flags_and_floors() {
        let store = Arc::new(MemoryLearningStore::new());
        store.insert_question(Question::new(1, 10, 5));
        store.insert_question(Question::new(2, 10, 1));
        let mut next_id = 0;
        // 12 次作答、正确率 0.9 以上 → 高于难度 5 的区间
        seed_attempts(&store, 1, 12, 11, &mut next_id);
        // 3 次作答 → 低于下限
        seed_attempts(&store, 2, 3, 0, &mut next_id);

        let result = service(&store)
            .query_adjustable_questions(&QuestionScope::AllCourses)
            .unwrap();

        assert_eq!(result.questions.len(), 1);
        let p = &result.questions[0];
        assert_eq!(p.question_id, 1);
        assert_eq!(p.suggested_direction, AdjustmentDirection::Increase);
        assert_eq!(p.attempt_count, 12);
        assert_eq!(p.wrong_attempts, 1);
        assert!(p.reason.contains("建议提升难度"));
        assert_eq!(result.statistics.total_questions, 1);
        assert_eq!(result.statistics.need_adjustment, 1);
        assert_eq!(result.statistics.insufficient_data, 1);
    }

    #[test]
    fn test_query_within_band_not_surfaced() {
        let store = Arc::new(MemoryLearningStore::new());
        store.insert_question(Question::new(1, 10, 3));
        let mut next_id = 0;
        seed_attempts(&store, 1, 10, 6, &mut next_id);

        let result = service(&store)
            .query_adjustable_questions(&QuestionScope::AllCourses)
            .unwrap();
        assert!(result.questions.is_empty());
        assert_eq!(result.statistics.total_questions, 1);
        assert!((result.statistics.average_correct_rate - 0.6).abs() < 1e-9);
    }

    /// 读取必定失败的作答来源
    struct BrokenAnswerSource;

    impl AnswerSource for BrokenAnswerSource {
        fn fetch_answers_for_student(&self, _: i64) -> AnalyticsResult<Vec<AnswerRecord>> {
            Err(AnalyticsError::Database("disk I/O error".to_string()))
        }

        fn fetch_answers_by_scope(&self, _: &QuestionScope) -> AnalyticsResult<Vec<AnswerRecord>> {
            Err(AnalyticsError::Database("disk I/O error".to_string()))
        }
    }

    #[test]
    fn test_query_failure_is_query_failed() {
        let store = Arc::new(MemoryLearningStore::new());
        let svc = DifficultyAdjustService::new(
            Arc::new(BrokenAnswerSource),
            store,
            AnalyticsConfig::default(),
        );
        let err = svc
            .query_adjustable_questions(&QuestionScope::AllCourses)
            .unwrap_err();
        match err {
            AnalyticsError::QueryFailed(msg) => assert!(msg.contains("disk I/O error")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_confirm_missing_new_difficulty_fails() {
        let store = Arc::new(MemoryLearningStore::new());
        store.insert_question(Question::new(1, 10, 3));
        let result = service(&store).confirm_adjustments(&[AdjustmentDirective {
            question_id: 1,
            should_apply: true,
            new_difficulty: None,
        }]);
        assert_eq!(result.failed_count, 1);
        assert_eq!(result.details[0].old_difficulty, Some(3));
        assert_eq!(store.question(1).unwrap().difficulty, 3);
    }

    #[test]
    fn test_confirm_clamps_new_difficulty() {
        let store = Arc::new(MemoryLearningStore::new());
        store.insert_question(Question::new(1, 10, 3));
        let result = service(&store).confirm_adjustments(&[AdjustmentDirective {
            question_id: 1,
            should_apply: true,
            new_difficulty: Some(9),
        }]);
        assert_eq!(result.success_count, 1);
        assert_eq!(result.details[0].new_difficulty, Some(5));
        assert_eq!(store.question(1).unwrap().difficulty, 5);
    }

    #[test]
    fn test_build_directives_accept_and_reject() {
        let proposals = vec![proposal(1, 3, 4), proposal(2, 2, 1), proposal(3, 4, 5)];

        let accepted = build_directives(&proposals, &[3, 1], ProposalDecision::Accept);
        assert_eq!(
            accepted,
            vec![
                AdjustmentDirective {
                    question_id: 1,
                    should_apply: true,
                    new_difficulty: Some(4),
                },
                AdjustmentDirective {
                    question_id: 3,
                    should_apply: true,
                    new_difficulty: Some(5),
                },
            ]
        );

        let rejected = build_directives(&proposals, &[2], ProposalDecision::Reject);
        assert_eq!(rejected.len(), 1);
        assert!(!rejected[0].should_apply);
        assert_eq!(rejected[0].new_difficulty, Some(2));
    }

    #[test]
    fn test_panic_message_extraction() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }

    #[test]
    fn test_wire_format() {
        let json = serde_json::to_value(AdjustmentDirection::Increase).unwrap();
        assert_eq!(json, "increase");
        let directive: AdjustmentDirective =
            serde_json::from_str(r#"{"questionId":5,"shouldApply":false}"#).unwrap();
        assert_eq!(directive.new_difficulty, None);
    }
}
