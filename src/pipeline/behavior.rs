//! 行为执行器 - 编排层
//!
//! ## 职责
//! - 一次行为执行的完整编排:校验 → 向量化 → 聚类 → 产物构建 → 持久化
//! - Group 行为把簇直接映射成分组;Theme 行为对每个簇做主题标注
//!
//! ## 错误边界
//! 提交数量不足是唯一抛给调用方的输入错误;向量化与标注内部兜底,
//! 聚类的数值退化在引擎内部处理。持久化失败会中止执行并冒泡。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::Utc;
use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::models::{
    AssignmentKind, AssignmentRecord, ClusterAssignment, Group, StudentSubmission, Theme,
};
use crate::providers::{AssignmentStore, ChunkStore};
use crate::services::{ClusterEngine, MemberChunks, ThemeLabeler, Vectorizer};
use crate::utils::logging;

/// 行为执行器
///
/// 依赖全部注入,本身无状态,可跨执行复用。
pub struct BehaviorExecutor {
    vectorizer: Arc<Vectorizer>,
    cluster_engine: ClusterEngine,
    theme_labeler: Arc<ThemeLabeler>,
    chunk_store: Arc<dyn ChunkStore>,
    assignment_store: Arc<dyn AssignmentStore>,
}

impl BehaviorExecutor {
    pub fn new(
        vectorizer: Arc<Vectorizer>,
        cluster_engine: ClusterEngine,
        theme_labeler: Arc<ThemeLabeler>,
        chunk_store: Arc<dyn ChunkStore>,
        assignment_store: Arc<dyn AssignmentStore>,
    ) -> Self {
        Self {
            vectorizer,
            cluster_engine,
            theme_labeler,
            chunk_store,
            assignment_store,
        }
    }

    /// 执行一次行为:聚类提交并产出分配记录
    ///
    /// # 参数
    /// - `deployment_id`: 部署标识
    /// - `submissions`: 学生提交(至少 2 份)
    /// - `k`: 请求的簇数(实际簇数可能更少)
    /// - `kind`: 产物类型(分组或主题)
    /// - `guidance`: 讲师提供的标注润色指引(仅 Theme 行为使用)
    pub async fn execute(
        &self,
        deployment_id: &str,
        submissions: &[StudentSubmission],
        k: usize,
        kind: AssignmentKind,
        guidance: Option<&str>,
    ) -> Result<AssignmentRecord> {
        if submissions.len() < 2 {
            return Err(AppError::insufficient_submissions(submissions.len(), 2).into());
        }
        logging::log_execution_start(deployment_id, submissions.len(), k);
        let start = Instant::now();

        // 向量化(从不失败,缺数据降级为零向量)
        let vectors = self.vectorizer.vectorize_batch(submissions).await;

        // 聚类是纯 CPU 计算,放到阻塞线程池上跑
        let engine = self.cluster_engine;
        let cluster_input = vectors.clone();
        let assignment = tokio::task::spawn_blocking(move || engine.cluster(&cluster_input, k))
            .await
            .context("聚类任务执行失败")??;

        let record = match kind {
            AssignmentKind::Group => {
                let groups = build_groups(&assignment);
                info!("👥 分组构建完成: {} 组", groups.len());
                AssignmentRecord {
                    execution_id: uuid::Uuid::new_v4(),
                    deployment_id: deployment_id.to_string(),
                    kind,
                    groups,
                    themes: Vec::new(),
                    created_at: Utc::now(),
                }
            }
            AssignmentKind::Theme => {
                let themes = self
                    .label_themes(&assignment, submissions, guidance)
                    .await;
                info!("🏷️ 主题标注完成: {} 个", themes.len());
                AssignmentRecord {
                    execution_id: uuid::Uuid::new_v4(),
                    deployment_id: deployment_id.to_string(),
                    kind,
                    groups: Vec::new(),
                    themes,
                    created_at: Utc::now(),
                }
            }
        };

        self.assignment_store
            .save(&record)
            .await
            .context("保存分配记录失败")?;

        logging::log_execution_complete(
            deployment_id,
            assignment.cluster_count,
            start.elapsed().as_millis(),
        );
        Ok(record)
    }

    /// 对每个簇并发做主题标注
    async fn label_themes(
        &self,
        assignment: &ClusterAssignment,
        submissions: &[StudentSubmission],
        guidance: Option<&str>,
    ) -> Vec<Theme> {
        let by_name: HashMap<&str, &StudentSubmission> = submissions
            .iter()
            .map(|s| (s.name.as_str(), s))
            .collect();

        let mut futures = Vec::with_capacity(assignment.cluster_count);
        for cluster_id in 0..assignment.cluster_count {
            let member_names = assignment.members_of(cluster_id);
            let member_texts: Vec<String> = member_names
                .iter()
                .filter_map(|name| by_name.get(name.as_str()))
                .map(|s| s.text.clone())
                .collect();
            let member_chunks = self
                .collect_member_chunks(&member_names, &by_name)
                .await;

            let labeler = self.theme_labeler.clone();
            futures.push(async move {
                labeler
                    .label(
                        cluster_id,
                        &member_names,
                        &member_texts,
                        Some(&member_chunks),
                        guidance,
                    )
                    .await
            });
        }
        join_all(futures).await
    }

    /// 读簇成员的全部 PDF chunk;单个文档读取失败按"未索引"跳过
    async fn collect_member_chunks(
        &self,
        member_names: &[String],
        by_name: &HashMap<&str, &StudentSubmission>,
    ) -> Vec<MemberChunks> {
        let mut result = Vec::with_capacity(member_names.len());
        for name in member_names {
            let Some(submission) = by_name.get(name.as_str()) else {
                continue;
            };
            let mut chunks = Vec::new();
            for doc_ref in &submission.pdf_references {
                match self.chunk_store.get_chunks(name, doc_ref).await {
                    Ok(doc_chunks) => {
                        debug!("读取 chunk: {} / {} ({} 条)", name, doc_ref, doc_chunks.len());
                        chunks.extend(doc_chunks);
                    }
                    Err(e) => {
                        warn!("读取 chunk 失败,跳过 {} / {}: {:#}", name, doc_ref, e);
                    }
                }
            }
            result.push(MemberChunks {
                name: name.clone(),
                chunks,
            });
        }
        result
    }
}

/// 把聚类结果映射成 "Group N" 命名的分组
fn build_groups(assignment: &ClusterAssignment) -> Vec<Group> {
    (0..assignment.cluster_count)
        .filter_map(|cluster_id| {
            let members = assignment.members_of(cluster_id);
            if members.is_empty() {
                return None;
            }
            Some(Group {
                group_name: format!("Group {}", cluster_id + 1),
                group_members: members,
                explanation: None,
            })
        })
        .collect()
}
