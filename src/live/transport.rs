//! 连接传输抽象
//!
//! ## 职责
//! - `ConnectionTransport` - 每条连接的出站侧,隔离具体传输技术
//! - `ChannelTransport` - 基于 tokio mpsc 的进程内实现(测试与嵌入场景)
//! - `SessionEvent` - 投递给会话协调器的入站事件
//!
//! ## 设计说明
//! 协调器只认识 trait 对象,WebSocket / SSE 等真实传输在外层适配;
//! 发送失败被视为该连接已失效,由协调器标记断开,绝不冒泡中断广播。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::error::{AppError, AppResult};
use crate::models::{
    AssignmentRecord, LivePresentationPrompt, ParticipantIdentity, SessionStats,
};

use super::messages::ServerMessage;

/// 连接角色:参与者提交响应,演示端接收全量观察消息。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionRole {
    Participant,
    Presenter,
}

/// 一条连接的出站通道。
#[async_trait]
pub trait ConnectionTransport: Send + Sync {
    /// 向对端发送一条消息。失败表示连接已不可用。
    async fn send(&self, message: &ServerMessage) -> AppResult<()>;
}

/// 进程内传输:消息进入无界通道,接收端由调用方持有。
pub struct ChannelTransport {
    user_id: String,
    tx: mpsc::UnboundedSender<ServerMessage>,
}

impl ChannelTransport {
    pub fn new(user_id: &str) -> (Self, mpsc::UnboundedReceiver<ServerMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                user_id: user_id.to_string(),
                tx,
            },
            rx,
        )
    }
}

#[async_trait]
impl ConnectionTransport for ChannelTransport {
    async fn send(&self, message: &ServerMessage) -> AppResult<()> {
        self.tx
            .send(message.clone())
            .map_err(|_| AppError::send_failed(&self.user_id))
    }
}

/// 投递给会话协调器 actor 的入站事件。
///
/// 所有状态变更都经由事件进入单一循环,串行处理。
pub enum SessionEvent {
    /// 新连接(或同一用户重连)
    Connect {
        identity: ParticipantIdentity,
        role: ConnectionRole,
        transport: Arc<dyn ConnectionTransport>,
    },
    /// 连接断开
    Disconnect { user_id: String },
    /// 演示端广播一道提示
    ///
    /// `list_items` 为调用方解析好的列表项来源;为 `None` 时协调器
    /// 退而使用最近一次分配记录里的主题列表。
    BroadcastPrompt {
        prompt: LivePresentationPrompt,
        list_items: Option<Vec<Value>>,
    },
    /// 参与者提交响应
    Response {
        user_id: String,
        prompt_id: String,
        response: String,
    },
    /// 演示端发起就绪检查
    StartReadyCheck,
    /// 参与者确认就绪
    Ready { user_id: String },
    /// 分组数据已更新(流水线完成后推送)
    GroupDataUpdated { record: AssignmentRecord },
    /// 查询会话统计
    GetStats {
        reply: oneshot::Sender<SessionStats>,
    },
    /// 关闭会话
    Shutdown,
}
