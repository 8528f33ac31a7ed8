/// 日志工具模块
///
/// 提供日志初始化和格式化输出的辅助函数
use tracing::info;
use tracing_subscriber::EnvFilter;

/// 初始化 tracing 订阅器
///
/// 重复调用是安全的（测试中每个用例都可能调用）。
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

/// 记录行为执行开始信息
///
/// # 参数
/// - `deployment_id`: 部署标识
/// - `submission_count`: 提交数量
/// - `k`: 请求的簇数量
pub fn log_execution_start(deployment_id: &str, submission_count: usize, k: usize) {
    info!("{}", "=".repeat(60));
    info!("🚀 行为执行开始 - 部署: {}", deployment_id);
    info!("📊 提交数量: {}, 请求簇数: {}", submission_count, k);
    info!("{}", "=".repeat(60));
}

/// 记录行为执行完成信息
///
/// # 参数
/// - `deployment_id`: 部署标识
/// - `cluster_count`: 实际产出的簇数量
/// - `elapsed_ms`: 耗时（毫秒）
pub fn log_execution_complete(deployment_id: &str, cluster_count: usize, elapsed_ms: u128) {
    info!("\n{}", "─".repeat(60));
    info!(
        "✓ 行为执行完成 - 部署: {}, 产出 {} 个簇, 耗时 {}ms",
        deployment_id, cluster_count, elapsed_ms
    );
    info!("{}", "─".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("hello", 10), "hello");
        assert_eq!(truncate_text("hello world", 5), "hello...");
        // 按字符截断而不是字节，避免多字节字符被切断
        assert_eq!(truncate_text("数据聚类引擎", 2), "数据...");
    }
}
