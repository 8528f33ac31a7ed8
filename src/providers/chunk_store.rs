//! 文档 chunk 存储接口
//!
//! 以不透明的文档引用 + 所有者命名空间寻址，返回文档已索引的
//! chunk 级（文本, 向量）对。生产环境由外部向量库实现，
//! 这里提供一个内存实现供测试和进程内使用。

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// 文档的一个 chunk：文本片段及其嵌入向量
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub text: String,
    pub vector: Vec<f32>,
}

/// chunk 读取能力
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// 读取某个文档引用下的全部 chunk
    ///
    /// 文档未被索引时返回空列表（调用方按"跳过"处理，不视为错误）。
    async fn get_chunks(&self, owner: &str, doc_ref: &str) -> Result<Vec<DocumentChunk>>;
}

/// 内存 chunk 存储
#[derive(Default)]
pub struct MemoryChunkStore {
    inner: RwLock<HashMap<(String, String), Vec<DocumentChunk>>>,
}

impl MemoryChunkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, owner: &str, doc_ref: &str, chunks: Vec<DocumentChunk>) {
        self.inner
            .write()
            .await
            .insert((owner.to_string(), doc_ref.to_string()), chunks);
    }
}

#[async_trait]
impl ChunkStore for MemoryChunkStore {
    async fn get_chunks(&self, owner: &str, doc_ref: &str) -> Result<Vec<DocumentChunk>> {
        Ok(self
            .inner
            .read()
            .await
            .get(&(owner.to_string(), doc_ref.to_string()))
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_roundtrip_and_missing() {
        let store = MemoryChunkStore::new();
        store
            .insert(
                "alice",
                "doc-1",
                vec![DocumentChunk {
                    text: "chunk text".to_string(),
                    vector: vec![0.1, 0.2],
                }],
            )
            .await;

        let found = store.get_chunks("alice", "doc-1").await.unwrap();
        assert_eq!(found.len(), 1);

        // 未索引的文档返回空列表而不是错误
        let missing = store.get_chunks("alice", "doc-unknown").await.unwrap();
        assert!(missing.is_empty());
    }
}
