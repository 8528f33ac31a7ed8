//! 业务能力层（Services）
//!
//! 每个服务描述"我能做什么"，不关心流程顺序：
//! - `Vectorizer` - 提交 → 定长向量
//! - `ClusterEngine` - 向量集合 → 平衡的 k 簇划分
//! - `ThemeLabeler` - 簇 → 带关键词/片段/标题的主题
//! - `Summarizer` - 分组响应 → 总结文本
//! - `dispatcher` - 列表项 → 分组的循环分配
//! - `keywords` - TF-IDF、chunk 过滤、多样性采样等纯函数

pub mod cluster;
pub mod dispatcher;
pub mod keywords;
pub mod summarizer;
pub mod theme_labeler;
pub mod vectorizer;

pub use cluster::{ClusterEngine, ClusterOptions};
pub use dispatcher::{assign_list_items, DispatchOutcome};
pub use summarizer::Summarizer;
pub use theme_labeler::{MemberChunks, ThemeLabeler};
pub use vectorizer::Vectorizer;
