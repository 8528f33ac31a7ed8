use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// 程序配置文件
///
/// 所有可调参数集中在这里；对外承诺的契约默认值
/// （10 分钟提示新鲜度窗口、每人 8 个 chunk 上限等）也作为字段暴露。
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    /// 单次 LLM 调用的超时时间（秒）
    pub llm_timeout_secs: u64,
    // --- Embedding 配置 ---
    pub embedding_api_base_url: String,
    pub embedding_model_name: String,
    /// 嵌入向量维度（所有向量为空时的兜底零向量使用）
    pub embedding_dim: usize,
    // --- 网络搜索配置 ---
    pub search_api_base_url: String,
    /// 单次搜索调用的超时时间（秒）
    pub search_timeout_secs: u64,
    // --- 聚类配置 ---
    /// k-means 固定随机种子（保证测试可复现）
    pub kmeans_seed: u64,
    /// k-means 最大迭代次数
    pub kmeans_max_iters: usize,
    /// k-means 重启次数
    pub kmeans_restarts: usize,
    // --- 主题提取配置 ---
    /// 每个学生最多保留的 PDF chunk 数量
    pub chunks_per_student: usize,
    /// 每个主题最多保留的关键词数量
    pub max_keywords: usize,
    /// 每个主题最多保留的代表性片段数量
    pub max_snippets: usize,
    // --- 实时会话配置 ---
    /// 提示的新鲜度窗口（秒）：晚加入者在此窗口内仍会收到当前提示
    pub prompt_freshness_secs: i64,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-4o-mini".to_string(),
            llm_timeout_secs: 15,
            embedding_api_base_url: "https://api.openai.com/v1".to_string(),
            embedding_model_name: "text-embedding-3-small".to_string(),
            embedding_dim: 1536,
            search_api_base_url: "https://api.duckduckgo.com".to_string(),
            search_timeout_secs: 8,
            kmeans_seed: 42,
            kmeans_max_iters: 100,
            kmeans_restarts: 3,
            chunks_per_student: 8,
            max_keywords: 8,
            max_snippets: 4,
            prompt_freshness_secs: 600,
            verbose_logging: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            llm_api_key: std::env::var("LLM_API_KEY").unwrap_or(default.llm_api_key),
            llm_api_base_url: std::env::var("LLM_API_BASE_URL").unwrap_or(default.llm_api_base_url),
            llm_model_name: std::env::var("LLM_MODEL_NAME").unwrap_or(default.llm_model_name),
            llm_timeout_secs: std::env::var("LLM_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.llm_timeout_secs),
            embedding_api_base_url: std::env::var("EMBEDDING_API_BASE_URL").unwrap_or(default.embedding_api_base_url),
            embedding_model_name: std::env::var("EMBEDDING_MODEL_NAME").unwrap_or(default.embedding_model_name),
            embedding_dim: std::env::var("EMBEDDING_DIM").ok().and_then(|v| v.parse().ok()).unwrap_or(default.embedding_dim),
            search_api_base_url: std::env::var("SEARCH_API_BASE_URL").unwrap_or(default.search_api_base_url),
            search_timeout_secs: std::env::var("SEARCH_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.search_timeout_secs),
            kmeans_seed: std::env::var("KMEANS_SEED").ok().and_then(|v| v.parse().ok()).unwrap_or(default.kmeans_seed),
            kmeans_max_iters: std::env::var("KMEANS_MAX_ITERS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.kmeans_max_iters),
            kmeans_restarts: std::env::var("KMEANS_RESTARTS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.kmeans_restarts),
            chunks_per_student: std::env::var("CHUNKS_PER_STUDENT").ok().and_then(|v| v.parse().ok()).unwrap_or(default.chunks_per_student),
            max_keywords: std::env::var("MAX_KEYWORDS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_keywords),
            max_snippets: std::env::var("MAX_SNIPPETS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_snippets),
            prompt_freshness_secs: std::env::var("PROMPT_FRESHNESS_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.prompt_freshness_secs),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
        }
    }

    /// 从 TOML 配置文件加载
    pub async fn from_toml_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("无法读取配置文件: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("无法解析配置文件: {}", path.display()))?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_contract_values() {
        let config = Config::default();

        // 对外承诺的契约默认值
        assert_eq!(config.prompt_freshness_secs, 600);
        assert_eq!(config.chunks_per_student, 8);
        assert_eq!(config.max_keywords, 8);
        assert_eq!(config.max_snippets, 4);
    }

    #[tokio::test]
    async fn test_from_toml_partial_override() {
        let dir = std::env::temp_dir().join("live_group_engine_config_test");
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let path = dir.join("config.toml");
        tokio::fs::write(&path, "kmeans_seed = 7\nprompt_freshness_secs = 120\n")
            .await
            .unwrap();

        let config = Config::from_toml_file(&path).await.unwrap();
        assert_eq!(config.kmeans_seed, 7);
        assert_eq!(config.prompt_freshness_secs, 120);
        // 未覆盖的字段保持默认值
        assert_eq!(config.chunks_per_student, 8);
    }
}
