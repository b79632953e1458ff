// Smart Learn analytics library entry
// 错题资源推荐 + 题目难度动态调整；bin 目标见 main.rs。

pub mod analytics_config;
pub mod answer_stats;
pub mod difficulty_adjust_service;
pub mod engine;
pub mod error;
pub mod logging;
pub mod models;
pub mod ranking;
pub mod recommendation_service;
pub mod store;

pub use analytics_config::{AnalyticsConfig, CorrectnessBand};
pub use answer_stats::{extract_stats, AnswerStat, AnswerStatMap};
pub use difficulty_adjust_service::{
    build_directives, AdjustableQuestionsResult, AdjustmentDirection, AdjustmentDirective,
    AdjustmentStatistics, AdjustmentStatus, ConfirmResult, DifficultyAdjustService,
    DifficultyAdjustmentResult, DifficultyProposal, ProposalDecision,
};
pub use engine::{AnalyticsEngine, EngineRequest, EngineResponse};
pub use error::{AnalyticsError, AnalyticsResult};
pub use models::{
    Answer, AnswerRecord, KnowledgePointResource, Question, QuestionScope, ResourceType,
};
pub use recommendation_service::{KnowledgePointWeight, RecommendationItem, RecommendationService};
pub use store::{
    AnswerSource, MemoryLearningStore, QuestionStore, ResourceCatalog, SqliteLearningStore,
};
