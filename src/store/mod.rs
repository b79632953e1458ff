//! 外部数据协作方接口
//!
//! 课程系统负责作答、题目、资源的持久化；引擎只通过这里的 trait 访问它们。
//!
//! ## 实现
//! - [`MemoryLearningStore`]：内存实现，用于测试与嵌入场景
//! - [`SqliteLearningStore`]：基于 rusqlite + r2d2 连接池的实现

use crate::error::AnalyticsResult;
use crate::models::{
    AnswerRecord, KnowledgePointId, KnowledgePointResource, Question, QuestionId, QuestionScope,
    StudentId,
};

pub mod memory;
pub mod sqlite;

pub use memory::MemoryLearningStore;
pub use sqlite::SqliteLearningStore;

/// 作答记录来源（只读）
pub trait AnswerSource: Send + Sync {
    /// 某学生的全部作答（按作答 ID 升序）
    fn fetch_answers_for_student(&self, student_id: StudentId)
        -> AnalyticsResult<Vec<AnswerRecord>>;

    /// 范围内全部题目的作答（所有学生，按作答 ID 升序）
    fn fetch_answers_by_scope(&self, scope: &QuestionScope) -> AnalyticsResult<Vec<AnswerRecord>>;
}

/// 知识点 → 资源映射（只读）
pub trait ResourceCatalog: Send + Sync {
    fn fetch_resources_for_knowledge_points(
        &self,
        knowledge_point_ids: &[KnowledgePointId],
    ) -> AnalyticsResult<Vec<KnowledgePointResource>>;
}

/// 题目存储（唯一的写入方）
pub trait QuestionStore: Send + Sync {
    fn fetch_question_by_id(&self, question_id: QuestionId) -> AnalyticsResult<Option<Question>>;

    /// 写入新难度；题目不存在时返回 `AnalyticsError::NotFound`
    fn persist_question_difficulty(
        &self,
        question_id: QuestionId,
        new_difficulty: i32,
    ) -> AnalyticsResult<()>;
}
