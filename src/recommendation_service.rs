//! 错题资源推荐服务
//!
//! 根据学生的错题/部分得分题，计算各知识点的薄弱程度，并推荐对应的学习资源。
//!
//! ## 权重计算
//! - 单题严重度：`weight_q = (1 - 得分率) × 难度`，满分题不计入
//! - 知识点权重：`weight_kp = Σ weight_q`
//! - 资源权重：关联的各薄弱知识点权重取**最大值**（不求和，避免一个资源因
//!   覆盖多个知识点而被放大；权重含义为「该资源能弥补的最严重缺口」）
//!
//! 输出按权重降序、资源 ID 升序排列，每个资源最多出现一次。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::answer_stats::{extract_stats, AnswerStat, AnswerStatMap};
use crate::error::AnalyticsResult;
use crate::models::{KnowledgePointId, KnowledgePointResource, ResourceId, ResourceType, StudentId};
use crate::ranking::{rank_desc_by, top_n};
use crate::store::{AnswerSource, ResourceCatalog};

// ============================================================================
// 数据类型定义
// ============================================================================

/// 推荐资源
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationItem {
    pub resource_id: ResourceId,
    pub resource_type: ResourceType,
    /// 非负权重，越大越优先
    pub weight: f64,
    /// 推荐理由
    pub reason: String,
    /// 提供该权重的知识点
    pub knowledge_point_id: KnowledgePointId,
}

/// 知识点薄弱权重
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgePointWeight {
    pub knowledge_point_id: KnowledgePointId,
    pub weight: f64,
    /// 计入权重的题目数
    pub question_count: usize,
}

// ============================================================================
// 权重计算
// ============================================================================

/// 单题严重度；满分题为 0
pub fn severity_weight(stat: &AnswerStat) -> f64 {
    if stat.is_fully_correct() {
        return 0.0;
    }
    (1.0 - stat.fraction_correct) * stat.difficulty as f64
}

/// 按知识点汇总严重度（按知识点首次出现顺序）
pub fn aggregate_knowledge_point_weights(stats: &AnswerStatMap) -> Vec<KnowledgePointWeight> {
    let mut weights: Vec<KnowledgePointWeight> = Vec::new();
    let mut index: HashMap<KnowledgePointId, usize> = HashMap::new();

    for stat in stats.iter().filter(|s| !s.is_fully_correct()) {
        let slot = *index.entry(stat.knowledge_point_id).or_insert_with(|| {
            weights.push(KnowledgePointWeight {
                knowledge_point_id: stat.knowledge_point_id,
                weight: 0.0,
                question_count: 0,
            });
            weights.len() - 1
        });
        weights[slot].weight += severity_weight(stat);
        weights[slot].question_count += 1;
    }

    weights
}

/// 将知识点权重映射到资源：取最大值、去重、排序
pub fn resolve_resources(
    weights: &[KnowledgePointWeight],
    links: &[KnowledgePointResource],
) -> Vec<RecommendationItem> {
    let mut items = collect_resources(weights, links);
    rank_desc_by(&mut items, |item| item.weight, |item| item.resource_id);
    items
}

/// 每个资源取权重最大的知识点（未排序）
fn collect_resources(
    weights: &[KnowledgePointWeight],
    links: &[KnowledgePointResource],
) -> Vec<RecommendationItem> {
    let by_kp: HashMap<KnowledgePointId, &KnowledgePointWeight> = weights
        .iter()
        .map(|w| (w.knowledge_point_id, w))
        .collect();

    let mut best: HashMap<ResourceId, (&KnowledgePointResource, &KnowledgePointWeight)> =
        HashMap::new();

    for link in links {
        let Some(kp_weight) = by_kp.get(&link.knowledge_point_id).copied() else {
            continue;
        };
        best.entry(link.resource_id)
            .and_modify(|current| {
                let (_, held) = *current;
                // 权重更大者胜出；相等时取 ID 较小的知识点，保证结果与关联顺序无关
                if kp_weight.weight > held.weight
                    || (kp_weight.weight == held.weight
                        && kp_weight.knowledge_point_id < held.knowledge_point_id)
                {
                    *current = (link, kp_weight);
                }
            })
            .or_insert((link, kp_weight));
    }

    best.into_values()
        .map(|(link, kp_weight)| RecommendationItem {
            resource_id: link.resource_id,
            resource_type: link.resource_type,
            weight: kp_weight.weight,
            reason: build_reason(kp_weight),
            knowledge_point_id: kp_weight.knowledge_point_id,
        })
        .collect()
}

fn build_reason(kp_weight: &KnowledgePointWeight) -> String {
    format!(
        "知识点 #{} 掌握薄弱：{} 道题未得满分，薄弱权重 {:.2}",
        kp_weight.knowledge_point_id, kp_weight.question_count, kp_weight.weight
    )
}

// ============================================================================
// 服务结构
// ============================================================================

/// 错题资源推荐服务
pub struct RecommendationService {
    answers: Arc<dyn AnswerSource>,
    catalog: Arc<dyn ResourceCatalog>,
}

impl RecommendationService {
    /// 创建服务实例
    pub fn new(answers: Arc<dyn AnswerSource>, catalog: Arc<dyn ResourceCatalog>) -> Self {
        Self { answers, catalog }
    }

    fn student_stats(&self, student_id: StudentId) -> AnalyticsResult<AnswerStatMap> {
        let records = self.answers.fetch_answers_for_student(student_id)?;
        Ok(extract_stats(&records))
    }

    /// 学生各知识点的薄弱权重（诊断用）
    pub fn knowledge_point_weights(
        &self,
        student_id: StudentId,
    ) -> AnalyticsResult<Vec<KnowledgePointWeight>> {
        let stats = self.student_stats(student_id)?;
        Ok(aggregate_knowledge_point_weights(&stats))
    }

    /// 为学生生成完整的推荐资源列表（调用方自行截断）
    pub fn recommend(&self, student_id: StudentId) -> AnalyticsResult<Vec<RecommendationItem>> {
        let mut items = self.candidate_resources(student_id)?;
        rank_desc_by(&mut items, |item| item.weight, |item| item.resource_id);
        Ok(items)
    }

    /// 取前 n 个推荐资源
    pub fn recommend_top(
        &self,
        student_id: StudentId,
        n: usize,
    ) -> AnalyticsResult<Vec<RecommendationItem>> {
        let items = self.candidate_resources(student_id)?;
        Ok(top_n(items, n, |item| item.weight, |item| item.resource_id))
    }

    fn candidate_resources(
        &self,
        student_id: StudentId,
    ) -> AnalyticsResult<Vec<RecommendationItem>> {
        let stats = self.student_stats(student_id)?;
        let weights = aggregate_knowledge_point_weights(&stats);

        if weights.is_empty() {
            debug!(
                "[Analytics::Recommend] Student {} has no incorrect answers ({} questions)",
                student_id,
                stats.len()
            );
            return Ok(Vec::new());
        }

        let kp_ids: Vec<KnowledgePointId> =
            weights.iter().map(|w| w.knowledge_point_id).collect();
        let links = self.catalog.fetch_resources_for_knowledge_points(&kp_ids)?;

        for w in &weights {
            if !links
                .iter()
                .any(|link| link.knowledge_point_id == w.knowledge_point_id)
            {
                debug!(
                    "[Analytics::Recommend] Knowledge point {} (weight {:.2}) has no linked resources",
                    w.knowledge_point_id, w.weight
                );
            }
        }

        let items = collect_resources(&weights, &links);
        info!(
            "[Analytics::Recommend] Student {}: {} weak knowledge points -> {} resources",
            student_id,
            weights.len(),
            items.len()
        );
        Ok(items)
    }
}

// ============================================================================
// 单元测试
// ============================================================================
