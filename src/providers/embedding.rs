//! 文本嵌入接口
//!
//! `EmbeddingProvider` 是 Vectorizer 消费的唯一嵌入入口。
//! 提供两个实现：
//! - `HttpEmbedding` - 调用 OpenAI 兼容的 /embeddings 端点
//! - `HashEmbedding` - 确定性哈希嵌入，离线和测试场景使用

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::config::Config;

/// 文本嵌入能力
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// 将一段文本嵌入为定长向量
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>>;

    /// 嵌入向量的维度（全失败兜底时构造零向量用）
    fn dim(&self) -> usize;
}

/// OpenAI 兼容端点的嵌入实现
pub struct HttpEmbedding {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model_name: String,
    dim: usize,
}

impl HttpEmbedding {
    pub fn new(config: &Config) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.llm_timeout_secs))
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: config.embedding_api_base_url.clone(),
            api_key: config.llm_api_key.clone(),
            model_name: config.embedding_model_name.clone(),
            dim: config.embedding_dim,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbedding {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let endpoint = format!("{}/embeddings", self.base_url.trim_end_matches('/'));
        debug!("调用嵌入 API，模型: {}, 文本长度: {}", self.model_name, text.len());

        let body = serde_json::json!({
            "model": self.model_name,
            "input": text,
        });

        let response: Value = self
            .client
            .post(&endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("嵌入API请求失败: {}", endpoint))?
            .error_for_status()
            .with_context(|| format!("嵌入API返回错误状态: {}", endpoint))?
            .json()
            .await
            .context("嵌入API响应解析失败")?;

        let embedding = response
            .get("data")
            .and_then(|d| d.as_array())
            .and_then(|arr| arr.first())
            .and_then(|item| item.get("embedding"))
            .and_then(|e| e.as_array())
            .context("嵌入API响应缺少 data[0].embedding 字段")?
            .iter()
            .filter_map(|v| v.as_f64())
            .map(|v| v as f32)
            .collect::<Vec<f32>>();

        if embedding.is_empty() {
            anyhow::bail!("嵌入API返回空向量 (模型: {})", self.model_name);
        }

        Ok(embedding)
    }

    fn dim(&self) -> usize {
        self.dim
    }
}

/// 确定性哈希嵌入
///
/// 把文本按空白分词后，每个 token 的 FNV-1a 哈希落到固定维度的桶上，
/// 最后做 L2 归一化。同一文本永远得到同一向量，空文本得到零向量。
/// 没有语义，但足以支撑离线开发和可复现测试。
pub struct HashEmbedding {
    dim: usize,
}

impl HashEmbedding {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }

    fn fnv1a(token: &str) -> u64 {
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in token.bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        }
        hash
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedding {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dim];
        for token in text.to_lowercase().split_whitespace() {
            let h = Self::fnv1a(token);
            vector[(h % self.dim as u64) as usize] += 1.0;
        }
        Ok(crate::utils::vecmath::normalize(&vector))
    }

    fn dim(&self) -> usize {
        self.dim
    }
}
