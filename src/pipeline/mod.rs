//! 聚类流水线 - 编排层
//!
//! ## 职责
//!
//! ### `behavior` - 行为执行器
//! - 把向量化 → 聚类 → 产物构建 → 持久化串成一次原子执行
//! - Group 行为产出分组,Theme 行为产出带标签的主题
//!
//! ## 执行模型
//! 每次行为执行独立运行:向量化按提交并发,聚类在阻塞线程池上跑,
//! 主题标注按簇并发。执行之间不共享可变状态。

pub mod behavior;

pub use behavior::BehaviorExecutor;
