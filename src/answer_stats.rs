//! 作答统计抽取
//!
//! 把原始的「作答 + 题目」记录归一化为逐题统计 [`AnswerStat`]，供错题资源推荐
//! 和题目难度调整共用。
//!
//! ## 单次作答得分率
//! - 得分与分值都存在且分值 > 0：`fraction = 得分 / 分值`（限制在 [0, 1]）
//! - 否则按对错标记：正确为 1.0，错误或缺失为 0.0
//!
//! ## 宽松解析
//! 题目缺失、或既无得分又无对错标记的记录直接丢弃，不视为错误。
//!
//! 输出按题目首次出现的顺序迭代，保证下游排序的平局处理可复现。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::trace;

use crate::models::{
    clamp_difficulty, Answer, AnswerRecord, CourseId, KnowledgePointId, QuestionId,
};

// ============================================================================
// 数据类型定义
// ============================================================================

/// 逐题作答统计（每次调用重新计算，不缓存）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerStat {
    pub question_id: QuestionId,
    pub knowledge_point_id: KnowledgePointId,
    pub course_id: Option<CourseId>,
    /// 难度（已 clamp 到 1-5）
    pub difficulty: i32,
    /// 平均得分率 [0, 1]，保留部分得分
    pub fraction_correct: f64,
    pub attempt_count: usize,
    /// 满分作答次数
    pub correct_count: usize,
    /// 非满分作答次数
    pub incorrect_count: usize,
}

impl AnswerStat {
    /// 是否全部满分
    pub fn is_fully_correct(&self) -> bool {
        self.fraction_correct >= 1.0
    }
}

/// 按首次出现顺序排列的逐题统计
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnswerStatMap {
    stats: Vec<AnswerStat>,
    index: HashMap<QuestionId, usize>,
}

impl AnswerStatMap {
    pub fn get(&self, question_id: QuestionId) -> Option<&AnswerStat> {
        self.index.get(&question_id).map(|&idx| &self.stats[idx])
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AnswerStat> {
        self.stats.iter()
    }

    pub fn len(&self) -> usize {
        self.stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }
}

impl<'a> IntoIterator for &'a AnswerStatMap {
    type Item = &'a AnswerStat;
    type IntoIter = std::slice::Iter<'a, AnswerStat>;

    fn into_iter(self) -> Self::IntoIter {
        self.stats.iter()
    }
}

// ============================================================================
// 抽取实现
// ============================================================================

/// 单次作答得分率；记录不可用时返回 None
pub fn answer_fraction(answer: &Answer) -> Option<f64> {
    if !answer.has_score() && answer.correct.is_none() {
        return None;
    }

    if let (Some(awarded), Some(max)) = (answer.awarded_score, answer.max_score) {
        if awarded.is_finite() && max.is_finite() && max > 0.0 {
            return Some((awarded / max).clamp(0.0, 1.0));
        }
    }

    Some(if answer.correct == Some(true) { 1.0 } else { 0.0 })
}

/// 从作答记录抽取逐题统计
pub fn extract_stats<'a, I>(records: I) -> AnswerStatMap
where
    I: IntoIterator<Item = &'a AnswerRecord>,
{
    // (统计, 得分率之和)
    let mut acc: Vec<(AnswerStat, f64)> = Vec::new();
    let mut index: HashMap<QuestionId, usize> = HashMap::new();
    let mut dropped = 0usize;

    for record in records {
        let Some(question) = record.question.as_ref() else {
            trace!(
                "[Analytics::Stats] Dropping answer {}: question missing",
                record.answer.id
            );
            dropped += 1;
            continue;
        };
        let Some(fraction) = answer_fraction(&record.answer) else {
            trace!(
                "[Analytics::Stats] Dropping answer {}: neither score nor correctness flag",
                record.answer.id
            );
            dropped += 1;
            continue;
        };

        let slot = *index.entry(question.id).or_insert_with(|| {
            acc.push((
                AnswerStat {
                    question_id: question.id,
                    knowledge_point_id: question.knowledge_point_id,
                    course_id: question.course_id,
                    difficulty: clamp_difficulty(question.difficulty),
                    fraction_correct: 0.0,
                    attempt_count: 0,
                    correct_count: 0,
                    incorrect_count: 0,
                },
                0.0,
            ));
            acc.len() - 1
        });

        let (stat, sum) = &mut acc[slot];
        *sum += fraction;
        stat.attempt_count += 1;
        if fraction >= 1.0 {
            stat.correct_count += 1;
        } else {
            stat.incorrect_count += 1;
        }
    }

    if dropped > 0 {
        trace!("[Analytics::Stats] Dropped {} malformed records", dropped);
    }

    let stats = acc
        .into_iter()
        .map(|(mut stat, sum)| {
            stat.fraction_correct = (sum / stat.attempt_count as f64).clamp(0.0, 1.0);
            stat
        })
        .collect();

    AnswerStatMap { stats, index }
}

// ============================================================================
// 单元测试
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Question;

    fn record(answer: Answer, question: Question) -> AnswerRecord {
        AnswerRecord::new(answer, question)
    }

    #[test]
    fn test_fraction_from_score() {
        let a = Answer::scored(1, 1, 1, 2.5, 5.0);
        assert_eq!(answer_fraction(&a), Some(0.5));
    }

    #[test]
    fn test_fraction_falls_back_to_flag() {
        let right = Answer::flagged(1, 1, 1, true);
        let wrong = Answer::flagged(2, 1, 1, false);
        assert_eq!(answer_fraction(&right), Some(1.0));
        assert_eq!(answer_fraction(&wrong), Some(0.0));

        // 分值为 0 时按标记处理
        let mut zero_max = Answer::scored(3, 1, 1, 2.0, 0.0);
        zero_max.correct = Some(true);
        assert_eq!(answer_fraction(&zero_max), Some(1.0));
    }

    #[test]
    fn test_fraction_is_clamped() {
        let over = Answer::scored(1, 1, 1, 7.0, 5.0);
        let negative = Answer::scored(2, 1, 1, -1.0, 5.0);
        assert_eq!(answer_fraction(&over), Some(1.0));
        assert_eq!(answer_fraction(&negative), Some(0.0));
    }

    #[test]
    fn test_malformed_answer_has_no_fraction() {
        let a = Answer {
            id: 1,
            student_id: 1,
            question_id: 1,
            awarded_score: None,
            max_score: Some(5.0),
            correct: None,
        };
        assert_eq!(answer_fraction(&a), None);
    }

    #[test]
    fn test_extract_aggregates_per_question() {
        let q1 = Question::new(1, 10, 3);
        let q2 = Question::new(2, 20, 5);
        let records = vec![
            record(Answer::scored(1, 1, 1, 5.0, 5.0), q1.clone()),
            record(Answer::scored(2, 1, 2, 1.0, 4.0), q2.clone()),
            record(Answer::scored(3, 2, 1, 0.0, 5.0), q1.clone()),
            record(Answer::flagged(4, 3, 1, true), q1),
        ];

        let stats = extract_stats(&records);
        assert_eq!(stats.len(), 2);

        let s1 = stats.get(1).unwrap();
        assert_eq!(s1.attempt_count, 3);
        assert!((s1.fraction_correct - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(s1.correct_count, 2);
        assert_eq!(s1.incorrect_count, 1);

        let s2 = stats.get(2).unwrap();
        assert_eq!(s2.attempt_count, 1);
        assert!((s2.fraction_correct - 0.25).abs() < 1e-9);
        assert_eq!(s2.knowledge_point_id, 20);
    }

    #[test]
    fn test_extract_preserves_first_seen_order() {
        let records = vec![
            record(Answer::flagged(1, 1, 9, false), Question::new(9, 1, 1)),
            record(Answer::flagged(2, 1, 3, false), Question::new(3, 1, 1)),
            record(Answer::flagged(3, 1, 9, true), Question::new(9, 1, 1)),
            record(Answer::flagged(4, 1, 5, false), Question::new(5, 1, 1)),
        ];

        let ids: Vec<_> = extract_stats(&records)
            .iter()
            .map(|s| s.question_id)
            .collect();
        assert_eq!(ids, vec![9, 3, 5]);
    }

    #[test]
    fn test_extract_drops_malformed_records() {
        let no_data = Answer {
            id: 2,
            student_id: 1,
            question_id: 1,
            awarded_score: None,
            max_score: None,
            correct: None,
        };
        let records = vec![
            AnswerRecord::orphan(Answer::flagged(1, 1, 7, false)),
            record(no_data, Question::new(1, 1, 2)),
        ];

        let stats = extract_stats(&records);
        assert!(stats.is_empty());
    }

    #[test]
    fn test_extract_clamps_difficulty() {
        let records = vec![record(Answer::flagged(1, 1, 1, false), Question::new(1, 1, 11))];
        let stats = extract_stats(&records);
        assert_eq!(stats.get(1).unwrap().difficulty, 5);
    }

    #[test]
    fn test_extract_is_pure() {
        let records = vec![
            record(Answer::scored(1, 1, 1, 3.0, 5.0), Question::new(1, 1, 2)),
            record(Answer::flagged(2, 1, 2, false), Question::new(2, 2, 4)),
        ];
        assert_eq!(extract_stats(&records), extract_stats(&records));
    }
}
