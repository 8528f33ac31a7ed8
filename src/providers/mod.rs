//! 外部协作者接口层
//!
//! 核心只通过这里的窄接口与被排除在外的周边系统交互：
//! - `EmbeddingProvider` - 文本嵌入
//! - `ChunkStore` - 按文档引用读取已索引的 chunk（文本+向量）
//! - `AssignmentStore` - 分配记录的写入与"最近一次"读取
//! - `LlmService` - 语言模型补全（可整体缺席，功能优雅降级）
//! - `SearchService` - 网络搜索（同样允许缺席）

pub mod assignment_store;
pub mod chunk_store;
pub mod embedding;
pub mod llm;
pub mod search;

pub use assignment_store::{AssignmentStore, MemoryAssignmentStore};
pub use chunk_store::{ChunkStore, DocumentChunk, MemoryChunkStore};
pub use embedding::{EmbeddingProvider, HashEmbedding, HttpEmbedding};
pub use llm::LlmService;
pub use search::SearchService;
