//! 集成测试共用：带故障注入的内存存储

#![allow(dead_code)]

use std::collections::HashSet;
use std::ops::Deref;
use std::sync::Mutex;

use smart_learn_analytics_lib::{
    AnalyticsError, AnalyticsResult, AnswerRecord, AnswerSource, KnowledgePointResource,
    MemoryLearningStore, Question, QuestionScope, QuestionStore, ResourceCatalog,
};

#[derive(Default)]
struct FaultPlan {
    answer_failure: Option<String>,
    catalog_failure: Option<String>,
    failing_persists: HashSet<i64>,
    panicking_lookups: HashSet<i64>,
}

/// 包装 [`MemoryLearningStore`]，按需让读取、写入失败或 panic
#[derive(Default)]
pub struct FaultyStore {
    inner: MemoryLearningStore,
    faults: Mutex<FaultPlan>,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn faults(&self) -> std::sync::MutexGuard<'_, FaultPlan> {
        self.faults.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 作答读取返回数据库错误；传 None 恢复
    pub fn fail_answers(&self, message: Option<&str>) {
        self.faults().answer_failure = message.map(str::to_string);
    }

    /// 资源目录读取返回数据库错误；传 None 恢复
    pub fn fail_catalog(&self, message: Option<&str>) {
        self.faults().catalog_failure = message.map(str::to_string);
    }

    /// 写入该题目难度时返回数据库错误
    pub fn fail_persist_for(&self, question_id: i64) {
        self.faults().failing_persists.insert(question_id);
    }

    /// 查询该题目时 panic
    pub fn panic_on_lookup(&self, question_id: i64) {
        self.faults().panicking_lookups.insert(question_id);
    }
}

impl Deref for FaultyStore {
    type Target = MemoryLearningStore;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl AnswerSource for FaultyStore {
    fn fetch_answers_for_student(&self, student_id: i64) -> AnalyticsResult<Vec<AnswerRecord>> {
        if let Some(msg) = self.faults().answer_failure.clone() {
            return Err(AnalyticsError::Database(msg));
        }
        self.inner.fetch_answers_for_student(student_id)
    }

    fn fetch_answers_by_scope(&self, scope: &QuestionScope) -> AnalyticsResult<Vec<AnswerRecord>> {
        if let Some(msg) = self.faults().answer_failure.clone() {
            return Err(AnalyticsError::Database(msg));
        }
        self.inner.fetch_answers_by_scope(scope)
    }
}

impl ResourceCatalog for FaultyStore {
    fn fetch_resources_for_knowledge_points(
        &self,
        knowledge_point_ids: &[i64],
    ) -> AnalyticsResult<Vec<KnowledgePointResource>> {
        if let Some(msg) = self.faults().catalog_failure.clone() {
            return Err(AnalyticsError::Database(msg));
        }
        self.inner.fetch_resources_for_knowledge_points(knowledge_point_ids)
    }
}

impl QuestionStore for FaultyStore {
    fn fetch_question_by_id(&self, question_id: i64) -> AnalyticsResult<Option<Question>> {
        let should_panic = self.faults().panicking_lookups.contains(&question_id);
        if should_panic {
            panic!("lookup of question {} blew up", question_id);
        }
        self.inner.fetch_question_by_id(question_id)
    }

    fn persist_question_difficulty(
        &self,
        question_id: i64,
        new_difficulty: i32,
    ) -> AnalyticsResult<()> {
        let should_fail = self.faults().failing_persists.contains(&question_id);
        if should_fail {
            return Err(AnalyticsError::Database(format!(
                "write failed for question {}",
                question_id
            )));
        }
        self.inner.persist_question_difficulty(question_id, new_difficulty)
    }
}
