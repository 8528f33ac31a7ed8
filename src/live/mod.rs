//! 实时会话层（Live）
//!
//! ## 职责
//!
//! 本层管理"实时演示"的全部在线状态：
//!
//! ### `transport` - 连接抽象
//! - `ConnectionTransport` - 每条连接的出站通道（具体技术无关）
//! - `SessionEvent` - 入站事件（连接、断开、响应、广播指令）
//!
//! ### `messages` - 线上消息类型
//! - `ServerMessage` - 服务端下发的全部消息（serde 标签枚举）
//!
//! ### `coordinator` - 每部署的会话协调器
//! - 单 actor 持有全部会话状态：事件循环内串行处理，无锁
//! - 广播、按组个性化、ready check、完成检测与一次性总结
//!
//! ### `registry` - 显式的会话注册表
//! - 加入码 → 运行中会话的可注入注册表（创建/查找/关闭/过期清理）
//!
//! ## 并发模型
//!
//! 一个部署一个 actor：所有状态只在该 actor 的事件回调里变更，
//! 回调跑完才处理下一条消息。不同部署完全独立并行。

pub mod coordinator;
pub mod messages;
pub mod registry;
pub mod transport;

pub use coordinator::LiveSessionCoordinator;
pub use messages::ServerMessage;
pub use registry::{SessionHandle, SessionRegistry};
pub use transport::{ChannelTransport, ConnectionRole, ConnectionTransport, SessionEvent};
