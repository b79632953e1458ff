//! 学习分析引擎数据模型
//!
//! 题目、作答、知识点-资源关联等实体由外部课程系统维护，本引擎只读取
//! （题目难度除外，它由难度调整确认阶段写回）。

use serde::{Deserialize, Serialize};

// ============================================================================
// 标识符与常量
// ============================================================================

pub type QuestionId = i64;
pub type AnswerId = i64;
pub type StudentId = i64;
pub type CourseId = i64;
pub type KnowledgePointId = i64;
pub type ResourceId = i64;

/// 最低难度
pub const MIN_DIFFICULTY: i32 = 1;

/// 最高难度
pub const MAX_DIFFICULTY: i32 = 5;

/// 将任意难度值限制到 [MIN_DIFFICULTY, MAX_DIFFICULTY]
pub fn clamp_difficulty(value: i32) -> i32 {
    value.clamp(MIN_DIFFICULTY, MAX_DIFFICULTY)
}

// ============================================================================
// 实体
// ============================================================================

/// 题目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: QuestionId,
    /// 所属课程（可能缺失）
    pub course_id: Option<CourseId>,
    pub knowledge_point_id: KnowledgePointId,
    /// 难度 1-5（外部数据可能越界，引擎使用前会先 clamp）
    pub difficulty: i32,
}

impl Question {
    pub fn new(id: QuestionId, knowledge_point_id: KnowledgePointId, difficulty: i32) -> Self {
        Self {
            id,
            course_id: None,
            knowledge_point_id,
            difficulty,
        }
    }

    pub fn with_course(mut self, course_id: CourseId) -> Self {
        self.course_id = Some(course_id);
        self
    }
}

/// 学生作答记录（提交后不可变）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub id: AnswerId,
    pub student_id: StudentId,
    pub question_id: QuestionId,
    /// 得分
    pub awarded_score: Option<f64>,
    /// 该题在所属测验中的分值
    pub max_score: Option<f64>,
    /// 是否正确（分数缺失时使用）
    pub correct: Option<bool>,
}

impl Answer {
    /// 按分数构造作答
    pub fn scored(
        id: AnswerId,
        student_id: StudentId,
        question_id: QuestionId,
        awarded_score: f64,
        max_score: f64,
    ) -> Self {
        Self {
            id,
            student_id,
            question_id,
            awarded_score: Some(awarded_score),
            max_score: Some(max_score),
            correct: None,
        }
    }

    /// 按对错标记构造作答
    pub fn flagged(
        id: AnswerId,
        student_id: StudentId,
        question_id: QuestionId,
        correct: bool,
    ) -> Self {
        Self {
            id,
            student_id,
            question_id,
            awarded_score: None,
            max_score: None,
            correct: Some(correct),
        }
    }

    /// 是否带有得分字段
    pub fn has_score(&self) -> bool {
        self.awarded_score.is_some()
    }
}

/// 作答 + 题目（题目可能已被删除）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRecord {
    pub answer: Answer,
    pub question: Option<Question>,
}

impl AnswerRecord {
    pub fn new(answer: Answer, question: Question) -> Self {
        Self {
            answer,
            question: Some(question),
        }
    }

    pub fn orphan(answer: Answer) -> Self {
        Self {
            answer,
            question: None,
        }
    }
}

/// 课程资源类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Ppt,
    Pdf,
    Video,
    Doc,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Ppt => "ppt",
            ResourceType::Pdf => "pdf",
            ResourceType::Video => "video",
            ResourceType::Doc => "doc",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ppt" => Some(ResourceType::Ppt),
            "pdf" => Some(ResourceType::Pdf),
            "video" => Some(ResourceType::Video),
            "doc" => Some(ResourceType::Doc),
            _ => None,
        }
    }
}

/// 知识点与资源的关联（多对多，无额外权重）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgePointResource {
    pub knowledge_point_id: KnowledgePointId,
    pub resource_id: ResourceId,
    pub resource_type: ResourceType,
}

/// 难度调整的题目范围
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "courseIds")]
pub enum QuestionScope {
    /// 全部课程
    #[default]
    AllCourses,
    /// 指定课程
    Courses(Vec<CourseId>),
}

impl QuestionScope {
    /// 题目是否落在范围内
    pub fn contains(&self, question: &Question) -> bool {
        match self {
            QuestionScope::AllCourses => true,
            QuestionScope::Courses(ids) => question
                .course_id
                .map(|course_id| ids.contains(&course_id))
                .unwrap_or(false),
        }
    }
}

// ============================================================================
// 单元测试
// ============================================================================
