//! 向量化服务 - 业务能力层
//!
//! 把一个学生的文本提交和/或 PDF 引用变成单个定长向量：
//! 文本向量和所有 PDF chunk 向量做无加权均值。
//!
//! 失败语义：
//! - 单个 PDF 引用取不到向量 → 记日志后跳过（向量质量降级但不失败）
//! - 文本嵌入失败 → 用其余成功的部分构造尽力而为的向量
//! - 什么都没有 → 嵌入空字符串得到确定性的"空"向量，
//!   保证下游聚类永远拿到满额输入

use std::sync::Arc;
use tracing::{debug, warn};

use crate::models::{StudentSubmission, StudentVector};
use crate::providers::{ChunkStore, EmbeddingProvider};
use crate::utils::vecmath;

/// 向量化服务
pub struct Vectorizer {
    embedding: Arc<dyn EmbeddingProvider>,
    chunk_store: Arc<dyn ChunkStore>,
}

impl Vectorizer {
    pub fn new(embedding: Arc<dyn EmbeddingProvider>, chunk_store: Arc<dyn ChunkStore>) -> Self {
        Self {
            embedding,
            chunk_store,
        }
    }

    /// 向量化单个提交
    ///
    /// 本函数从不失败：所有外部调用错误都在内部兜底，
    /// 最坏情况返回空字符串的嵌入（再不行则零向量）。
    pub async fn vectorize(&self, submission: &StudentSubmission) -> StudentVector {
        let mut collected: Vec<Vec<f32>> = Vec::new();

        // 文本部分
        let text = submission.text.trim();
        if !text.is_empty() {
            match self.embedding.embed_text(text).await {
                Ok(v) => collected.push(v),
                Err(e) => {
                    warn!("学生 {} 的文本嵌入失败，继续使用 PDF 部分: {}", submission.name, e);
                }
            }
        }

        // PDF 部分：每个引用读取全部已索引 chunk 的向量
        for doc_ref in &submission.pdf_references {
            match self.chunk_store.get_chunks(&submission.name, doc_ref).await {
                Ok(chunks) => {
                    if chunks.is_empty() {
                        debug!("学生 {} 的 PDF {} 没有可用向量，跳过", submission.name, doc_ref);
                        continue;
                    }
                    collected.extend(
                        chunks
                            .into_iter()
                            .map(|c| c.vector)
                            .filter(|v| !v.is_empty()),
                    );
                }
                Err(e) => {
                    warn!(
                        "学生 {} 的 PDF {} 读取失败，跳过该引用: {}",
                        submission.name, doc_ref, e
                    );
                }
            }
        }

        // 兜底：完全没有内容时嵌入空字符串
        if collected.is_empty() {
            debug!("学生 {} 没有任何可用内容，使用空字符串嵌入", submission.name);
            match self.embedding.embed_text("").await {
                Ok(v) => collected.push(v),
                Err(e) => {
                    warn!("学生 {} 的空字符串嵌入也失败，使用零向量: {}", submission.name, e);
                    collected.push(vec![0.0; self.embedding.dim()]);
                }
            }
        }

        let vector = vecmath::mean_vector(&collected)
            .unwrap_or_else(|| vec![0.0; self.embedding.dim()]);

        StudentVector {
            name: submission.name.clone(),
            vector,
        }
    }

    /// 批量向量化
    ///
    /// 每个学生独立兜底，单个学生的失败不会影响批次。
    pub async fn vectorize_batch(&self, submissions: &[StudentSubmission]) -> Vec<StudentVector> {
        let mut vectors = Vec::with_capacity(submissions.len());
        for submission in submissions {
            vectors.push(self.vectorize(submission).await);
        }
        vectors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{DocumentChunk, HashEmbedding, MemoryChunkStore};
    use anyhow::Result;
    use async_trait::async_trait;

    /// 永远失败的 chunk 存储，用于验证错误被吸收
    struct FailingChunkStore;

    #[async_trait]
    impl ChunkStore for FailingChunkStore {
        async fn get_chunks(&self, _owner: &str, _doc_ref: &str) -> Result<Vec<DocumentChunk>> {
            anyhow::bail!("向量库不可用")
        }
    }

    fn submission_with_pdf(name: &str, text: &str, refs: &[&str]) -> StudentSubmission {
        StudentSubmission {
            name: name.to_string(),
            text: text.to_string(),
            pdf_references: refs.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_text_and_pdf_chunks_are_averaged() {
        let embedding = Arc::new(HashEmbedding::new(4));
        let store = Arc::new(MemoryChunkStore::new());
        store
            .insert(
                "alice",
                "doc-1",
                vec![
                    DocumentChunk {
                        text: "a".to_string(),
                        vector: vec![1.0, 0.0, 0.0, 0.0],
                    },
                    DocumentChunk {
                        text: "b".to_string(),
                        vector: vec![0.0, 1.0, 0.0, 0.0],
                    },
                ],
            )
            .await;

        let vectorizer = Vectorizer::new(embedding.clone(), store);
        let text_vec = embedding.embed_text("climate change").await.unwrap();
        let result = vectorizer
            .vectorize(&submission_with_pdf("alice", "climate change", &["doc-1"]))
            .await;

        // 均值 = (text + chunk1 + chunk2) / 3
        for i in 0..4 {
            let expected =
                (text_vec[i] + [1.0, 0.0, 0.0, 0.0][i] + [0.0, 1.0, 0.0, 0.0][i]) / 3.0;
            assert!((result.vector[i] - expected).abs() < 1e-6);
        }
    }

    #[tokio::test]
    async fn test_missing_pdf_is_skipped_silently() {
        let embedding = Arc::new(HashEmbedding::new(4));
        let store = Arc::new(MemoryChunkStore::new());

        let vectorizer = Vectorizer::new(embedding.clone(), store);
        let result = vectorizer
            .vectorize(&submission_with_pdf("bob", "some text", &["missing-doc"]))
            .await;

        // 缺失 PDF 不影响文本向量
        let text_vec = embedding.embed_text("some text").await.unwrap();
        assert_eq!(result.vector, text_vec);
    }

    #[tokio::test]
    async fn test_chunk_store_failure_degrades_but_never_aborts() {
        let embedding = Arc::new(HashEmbedding::new(4));
        let vectorizer = Vectorizer::new(embedding.clone(), Arc::new(FailingChunkStore));

        let result = vectorizer
            .vectorize(&submission_with_pdf("carol", "essay text", &["doc-x"]))
            .await;

        let text_vec = embedding.embed_text("essay text").await.unwrap();
        assert_eq!(result.vector, text_vec);
    }

    #[tokio::test]
    async fn test_empty_submission_yields_deterministic_null_vector() {
        let embedding = Arc::new(HashEmbedding::new(4));
        let vectorizer = Vectorizer::new(embedding, Arc::new(MemoryChunkStore::new()));

        let a = vectorizer
            .vectorize(&StudentSubmission::text_only("dave", ""))
            .await;
        let b = vectorizer
            .vectorize(&StudentSubmission::text_only("erin", "   "))
            .await;

        assert_eq!(a.vector.len(), 4);
        // 两个空提交得到同一个确定性向量
        assert_eq!(a.vector, b.vector);
    }
}
