//! 确定性排序工具
//!
//! 按分值降序、分值相同按标识升序排列。分值比较使用 `f64::total_cmp`，
//! NaN 不会打乱顺序。

use std::cmp::Ordering;

/// 比较两个 (分值, 标识)：分值降序，标识升序
pub fn compare_desc(a_score: f64, a_id: i64, b_score: f64, b_id: i64) -> Ordering {
    b_score.total_cmp(&a_score).then_with(|| a_id.cmp(&b_id))
}

/// 原地排序：分值降序，平局按标识升序（稳定排序）
pub fn rank_desc_by<T, S, K>(items: &mut [T], score: S, id: K)
where
    S: Fn(&T) -> f64,
    K: Fn(&T) -> i64,
{
    items.sort_by(|a, b| compare_desc(score(a), id(a), score(b), id(b)));
}

/// 排序后截取前 n 项
pub fn top_n<T, S, K>(mut items: Vec<T>, n: usize, score: S, id: K) -> Vec<T>
where
    S: Fn(&T) -> f64,
    K: Fn(&T) -> i64,
{
    rank_desc_by(&mut items, score, id);
    items.truncate(n);
    items
}

// ============================================================================
// 单元测试
// ============================================================================
