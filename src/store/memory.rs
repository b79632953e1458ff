//! 内存数据存储
//!
//! 线程安全（RwLock），用于测试与嵌入场景。

use std::collections::{BTreeMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

use super::{AnswerSource, QuestionStore, ResourceCatalog};
use crate::error::{AnalyticsError, AnalyticsResult};
use crate::models::{
    Answer, AnswerRecord, KnowledgePointId, KnowledgePointResource, Question, QuestionId,
    QuestionScope, ResourceId, ResourceType, StudentId,
};

#[derive(Debug, Default)]
struct MemoryState {
    questions: BTreeMap<QuestionId, Question>,
    answers: Vec<Answer>,
    links: Vec<KnowledgePointResource>,
    persist_count: usize,
}

/// 内存实现的学习数据存储
#[derive(Debug, Default)]
pub struct MemoryLearningStore {
    state: RwLock<MemoryState>,
}

impl MemoryLearningStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_state(&self) -> RwLockReadGuard<'_, MemoryState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, MemoryState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ========================================================================
    // 数据录入
    // ========================================================================

    pub fn insert_question(&self, question: Question) {
        self.write_state().questions.insert(question.id, question);
    }

    pub fn insert_answer(&self, answer: Answer) {
        self.write_state().answers.push(answer);
    }

    pub fn link_resource(
        &self,
        knowledge_point_id: KnowledgePointId,
        resource_id: ResourceId,
        resource_type: ResourceType,
    ) {
        self.write_state().links.push(KnowledgePointResource {
            knowledge_point_id,
            resource_id,
            resource_type,
        });
    }

    /// 当前题目快照
    pub fn question(&self, question_id: QuestionId) -> Option<Question> {
        self.read_state().questions.get(&question_id).cloned()
    }

    /// 成功写入难度的次数
    pub fn persist_count(&self) -> usize {
        self.read_state().persist_count
    }

    fn records_where<F>(&self, keep: F) -> Vec<AnswerRecord>
    where
        F: Fn(&Answer, Option<&Question>) -> bool,
    {
        let state = self.read_state();
        let mut answers: Vec<&Answer> = state.answers.iter().collect();
        answers.sort_by_key(|a| a.id);
        answers
            .into_iter()
            .filter_map(|answer| {
                let question = state.questions.get(&answer.question_id);
                keep(answer, question).then(|| AnswerRecord {
                    answer: answer.clone(),
                    question: question.cloned(),
                })
            })
            .collect()
    }
}

impl AnswerSource for MemoryLearningStore {
    fn fetch_answers_for_student(
        &self,
        student_id: StudentId,
    ) -> AnalyticsResult<Vec<AnswerRecord>> {
        Ok(self.records_where(|answer, _| answer.student_id == student_id))
    }

    fn fetch_answers_by_scope(&self, scope: &QuestionScope) -> AnalyticsResult<Vec<AnswerRecord>> {
        Ok(self.records_where(|_, question| match (scope, question) {
            (QuestionScope::AllCourses, _) => true,
            (_, Some(q)) => scope.contains(q),
            (_, None) => false,
        }))
    }
}

impl ResourceCatalog for MemoryLearningStore {
    fn fetch_resources_for_knowledge_points(
        &self,
        knowledge_point_ids: &[KnowledgePointId],
    ) -> AnalyticsResult<Vec<KnowledgePointResource>> {
        let wanted: HashSet<_> = knowledge_point_ids.iter().copied().collect();
        Ok(self
            .read_state()
            .links
            .iter()
            .filter(|link| wanted.contains(&link.knowledge_point_id))
            .cloned()
            .collect())
    }
}

impl QuestionStore for MemoryLearningStore {
    fn fetch_question_by_id(&self, question_id: QuestionId) -> AnalyticsResult<Option<Question>> {
        Ok(self.question(question_id))
    }

    fn persist_question_difficulty(
        &self,
        question_id: QuestionId,
        new_difficulty: i32,
    ) -> AnalyticsResult<()> {
        let mut state = self.write_state();
        let question = state
            .questions
            .get_mut(&question_id)
            .ok_or_else(|| AnalyticsError::question_not_found(question_id))?;
        question.difficulty = new_difficulty;
        state.persist_count += 1;
        debug!(
            "[Analytics::MemoryStore] Question {} difficulty set to {}",
            question_id, new_difficulty
        );
        Ok(())
    }
}

// ============================================================================
// 单元测试
// ============================================================================
