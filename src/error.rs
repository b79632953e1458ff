//! 学习分析引擎统一错误类型
//!
//! 数据质量问题（缺分数、缺题目）不在这里体现：它们在统计抽取阶段被静默丢弃。
//! 这里只描述真正需要调用方感知的失败。

use serde::Serialize;
use thiserror::Error;

/// 分析操作结果类型别名
pub type AnalyticsResult<T> = Result<T, AnalyticsError>;

/// 学习分析引擎统一错误类型
#[derive(Debug, Error, Serialize)]
pub enum AnalyticsError {
    /// 数据库错误
    #[error("Database error: {0}")]
    Database(String),

    /// 连接池错误
    #[error("Connection pool error: {0}")]
    Pool(String),

    /// 资源未找到
    #[error("{resource_type} not found: {id}")]
    NotFound { resource_type: String, id: i64 },

    /// 查询可调整题目失败（提议阶段整体失败，不做部分返回）
    #[error("Failed to query adjustable questions: {0}")]
    QueryFailed(String),

    /// 配置错误
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// 序列化/反序列化错误
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO 错误
    #[error("IO error: {0}")]
    Io(String),
}

impl AnalyticsError {
    pub fn question_not_found(question_id: i64) -> Self {
        AnalyticsError::NotFound {
            resource_type: "Question".to_string(),
            id: question_id,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AnalyticsError::NotFound { .. })
    }
}

// 从 rusqlite::Error 转换
impl From<rusqlite::Error> for AnalyticsError {
    fn from(e: rusqlite::Error) -> Self {
        AnalyticsError::Database(format!("{:#}", e))
    }
}

// 从 serde_json::Error 转换
impl From<serde_json::Error> for AnalyticsError {
    fn from(e: serde_json::Error) -> Self {
        AnalyticsError::Serialization(e.to_string())
    }
}

impl From<config::ConfigError> for AnalyticsError {
    fn from(e: config::ConfigError) -> Self {
        AnalyticsError::Configuration(e.to_string())
    }
}
