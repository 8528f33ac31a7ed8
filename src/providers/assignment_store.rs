//! 分配记录存储接口
//!
//! 聚类流水线每次执行后写入一条 `AssignmentRecord`；
//! 实时会话在冷启动或晚加入、且内存中没有分组数据时，
//! 按部署读取最近一次记录。

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::models::AssignmentRecord;

/// 分配记录的读写能力
#[async_trait]
pub trait AssignmentStore: Send + Sync {
    /// 持久化一次行为执行的产物
    async fn save(&self, record: &AssignmentRecord) -> Result<()>;

    /// 某个部署最近一次的分配记录
    async fn latest_for_deployment(&self, deployment_id: &str)
        -> Result<Option<AssignmentRecord>>;
}

/// 内存分配存储
#[derive(Default)]
pub struct MemoryAssignmentStore {
    records: RwLock<Vec<AssignmentRecord>>,
}

impl MemoryAssignmentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AssignmentStore for MemoryAssignmentStore {
    async fn save(&self, record: &AssignmentRecord) -> Result<()> {
        self.records.write().await.push(record.clone());
        Ok(())
    }

    async fn latest_for_deployment(
        &self,
        deployment_id: &str,
    ) -> Result<Option<AssignmentRecord>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|r| r.deployment_id == deployment_id)
            .max_by_key(|r| r.created_at)
            .cloned())
    }
}
