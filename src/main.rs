use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;

use live_group_engine::models::AssignmentKind;
use live_group_engine::providers::{
    HttpEmbedding, LlmService, MemoryAssignmentStore, MemoryChunkStore, SearchService,
};
use live_group_engine::services::ClusterOptions;
use live_group_engine::utils::logging;
use live_group_engine::{
    BehaviorExecutor, ClusterEngine, Config, StudentSubmission, ThemeLabeler, Vectorizer,
};

/// 一次行为执行的输入文件
#[derive(Deserialize)]
struct ExecutionFile {
    #[serde(default = "default_deployment_id")]
    deployment_id: String,
    #[serde(default = "default_k")]
    k: usize,
    #[serde(default = "default_kind")]
    kind: AssignmentKind,
    #[serde(default)]
    guidance: Option<String>,
    submissions: Vec<StudentSubmission>,
}

fn default_deployment_id() -> String {
    "local".to_string()
}

fn default_k() -> usize {
    3
}

fn default_kind() -> AssignmentKind {
    AssignmentKind::Group
}

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    logging::init();

    // 加载配置
    let config = Config::from_env();

    // 加载提交文件
    let path = std::env::args()
        .nth(1)
        .context("用法: live_group_engine <submissions.toml>")?;
    let content = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("读取提交文件失败: {}", path))?;
    let input: ExecutionFile = toml::from_str(&content).context("解析提交文件失败")?;

    // 组装执行器(进程内存储;生产部署注入外部实现)
    let chunk_store = Arc::new(MemoryChunkStore::new());
    let assignment_store = Arc::new(MemoryAssignmentStore::new());
    let embedding = Arc::new(HttpEmbedding::new(&config));
    let llm = LlmService::from_config(&config).map(Arc::new);
    let search = SearchService::from_config(&config).map(Arc::new);
    let executor = BehaviorExecutor::new(
        Arc::new(Vectorizer::new(embedding, chunk_store.clone())),
        ClusterEngine::new(ClusterOptions::from(&config)),
        Arc::new(ThemeLabeler::new(&config, llm, search)),
        chunk_store,
        assignment_store,
    );

    // 执行并输出分配记录
    let record = executor
        .execute(
            &input.deployment_id,
            &input.submissions,
            input.k,
            input.kind,
            input.guidance.as_deref(),
        )
        .await?;
    println!("{}", serde_json::to_string_pretty(&record)?);

    Ok(())
}
