//! # Live Group Engine
//!
//! 从学生提交中自动形成分组/主题,并驱动实时演示会话的核心引擎
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构:
//!
//! ### ① 基础设施层(Providers)
//! - `providers/` - 外部能力的接口与实现,只暴露能力
//! - `EmbeddingProvider` - 文本嵌入能力
//! - `ChunkStore` / `AssignmentStore` - 外部存储能力
//! - `LlmService` / `SearchService` - LLM 与网络搜索能力
//!
//! ### ② 业务能力层(Services)
//! - `services/` - 描述"我能做什么",每个服务只管一件事
//! - `Vectorizer` - 提交 → 向量
//! - `ClusterEngine` - 向量 → 平衡的簇分配
//! - `ThemeLabeler` - 簇 → 带标题/关键词/片段的主题
//! - `Summarizer` - 分组响应 → 总结
//! - `assign_list_items` - 列表项 → 分组的分配
//!
//! ### ③ 流水线层(Pipeline)
//! - `pipeline/behavior` - 一次行为执行的完整编排
//!   (校验 → 向量化 → 聚类 → 产物构建 → 持久化)
//!
//! ### ④ 实时会话层(Live)
//! - `live/coordinator` - 每部署一个 actor 的会话协调器
//! - `live/registry` - 加入码 → 会话的显式注册表
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod live;
pub mod models;
pub mod pipeline;
pub mod providers;
pub mod services;
pub mod utils;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult};
pub use live::{
    ChannelTransport, ConnectionRole, ConnectionTransport, LiveSessionCoordinator, ServerMessage,
    SessionEvent, SessionHandle, SessionRegistry,
};
pub use models::{
    AssignmentKind, AssignmentRecord, ClusterAssignment, Group, StudentSubmission, StudentVector,
    Theme,
};
pub use pipeline::BehaviorExecutor;
pub use providers::{
    AssignmentStore, ChunkStore, DocumentChunk, EmbeddingProvider, LlmService, SearchService,
};
pub use services::{ClusterEngine, ClusterOptions, Summarizer, ThemeLabeler, Vectorizer};
