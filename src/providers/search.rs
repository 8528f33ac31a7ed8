//! 网络搜索服务
//!
//! 主题富化用的轻量外部搜索：给定查询词，返回一段相关摘要文本
//! （可能为空）。调用失败、超时、返回为空都由调用方按"无结果"
//! 降级处理，绝不致命。

use anyhow::{Context, Result};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::Config;

/// 网络搜索服务
pub struct SearchService {
    client: reqwest::Client,
    base_url: String,
}

impl SearchService {
    pub fn new(config: &Config) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.search_timeout_secs))
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: config.search_api_base_url.clone(),
        }
    }

    /// 仅当配置了搜索端点时构造服务
    pub fn from_config(config: &Config) -> Option<Self> {
        if config.search_api_base_url.is_empty() {
            warn!("未配置搜索端点，主题的近期背景富化将跳过");
            return None;
        }
        Some(Self::new(config))
    }

    /// 执行搜索，返回第一条相关摘要
    ///
    /// # 参数
    /// - `query`: 查询词
    ///
    /// # 返回
    /// 找到相关摘要返回 `Some(text)`，没有结果返回 `None`。
    pub async fn search(&self, query: &str) -> Result<Option<String>> {
        debug!("网络搜索: {}", query);

        let response: Value = self
            .client
            .get(self.base_url.trim_end_matches('/'))
            .query(&[("q", query), ("format", "json"), ("no_html", "1")])
            .send()
            .await
            .with_context(|| format!("搜索请求失败: {}", self.base_url))?
            .error_for_status()
            .context("搜索API返回错误状态")?
            .json()
            .await
            .context("搜索API响应解析失败")?;

        // 优先取摘要字段，其次取第一条相关主题的文本
        let snippet = response
            .get("AbstractText")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .or_else(|| {
                response
                    .get("RelatedTopics")
                    .and_then(|v| v.as_array())
                    .and_then(|arr| arr.first())
                    .and_then(|item| item.get("Text"))
                    .and_then(|v| v.as_str())
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
            });

        if snippet.is_none() {
            debug!("搜索无相关结果: {}", query);
        }

        Ok(snippet)
    }
}
