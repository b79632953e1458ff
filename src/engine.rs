//! 引擎入口
//!
//! 把推荐服务和难度调整服务组装在同一组数据协作方之上，并提供 JSON 请求分发，
//! 供命令行（stdin → stdout）使用。
//!
//! ## 请求示例
//! ```json
//! {"command": "recommend", "studentId": 7, "limit": 5}
//! {"command": "queryAdjustable", "scope": {"kind": "courses", "courseIds": [101]}}
//! {"command": "confirmAdjustments", "directives": [{"questionId": 1, "shouldApply": true, "newDifficulty": 4}]}
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::analytics_config::AnalyticsConfig;
use crate::difficulty_adjust_service::{
    AdjustableQuestionsResult, AdjustmentDirective, ConfirmResult, DifficultyAdjustService,
};
use crate::error::AnalyticsResult;
use crate::models::{QuestionScope, StudentId};
use crate::recommendation_service::{RecommendationItem, RecommendationService};
use crate::store::{AnswerSource, QuestionStore, ResourceCatalog};

/// 引擎请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "command",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum EngineRequest {
    /// 错题资源推荐；`limit` 缺省时返回全部
    Recommend {
        student_id: StudentId,
        #[serde(default)]
        limit: Option<usize>,
    },
    /// 难度调整提议
    QueryAdjustable {
        #[serde(default)]
        scope: QuestionScope,
    },
    /// 确认难度调整
    ConfirmAdjustments { directives: Vec<AdjustmentDirective> },
}

/// 引擎响应
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EngineResponse {
    Recommendations(Vec<RecommendationItem>),
    AdjustableQuestions(AdjustableQuestionsResult),
    Confirmed(ConfirmResult),
}

/// 学习分析引擎
pub struct AnalyticsEngine {
    recommendations: RecommendationService,
    difficulty: DifficultyAdjustService,
}

impl AnalyticsEngine {
    pub fn new(
        answers: Arc<dyn AnswerSource>,
        catalog: Arc<dyn ResourceCatalog>,
        questions: Arc<dyn QuestionStore>,
        config: AnalyticsConfig,
    ) -> Self {
        Self {
            recommendations: RecommendationService::new(answers.clone(), catalog),
            difficulty: DifficultyAdjustService::new(answers, questions, config),
        }
    }

    /// 用同一个存储同时充当三个协作方
    pub fn from_store<S>(store: Arc<S>, config: AnalyticsConfig) -> Self
    where
        S: AnswerSource + ResourceCatalog + QuestionStore + 'static,
    {
        Self::new(store.clone(), store.clone(), store, config)
    }

    pub fn recommendations(&self) -> &RecommendationService {
        &self.recommendations
    }

    pub fn difficulty(&self) -> &DifficultyAdjustService {
        &self.difficulty
    }

    /// 分发一条请求
    pub fn handle(&self, request: EngineRequest) -> AnalyticsResult<EngineResponse> {
        debug!("[Analytics::Engine] Handling {:?}", request);
        match request {
            EngineRequest::Recommend { student_id, limit } => {
                let items = match limit {
                    Some(n) => self.recommendations.recommend_top(student_id, n)?,
                    None => self.recommendations.recommend(student_id)?,
                };
                Ok(EngineResponse::Recommendations(items))
            }
            EngineRequest::QueryAdjustable { scope } => Ok(EngineResponse::AdjustableQuestions(
                self.difficulty.query_adjustable_questions(&scope)?,
            )),
            EngineRequest::ConfirmAdjustments { directives } => Ok(EngineResponse::Confirmed(
                self.difficulty.confirm_adjustments(&directives),
            )),
        }
    }

    /// 解析 JSON 请求、分发并序列化响应
    pub fn handle_json(&self, input: &str) -> AnalyticsResult<String> {
        let request: EngineRequest = serde_json::from_str(input)?;
        let response = self.handle(request)?;
        Ok(serde_json::to_string_pretty(&response)?)
    }
}

// ============================================================================
// 单元测试
// ============================================================================
