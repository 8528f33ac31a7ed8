use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::assignment::Group;

/// 参与者身份
///
/// 由外部认证层在连接时提供，核心本身不做鉴权。
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParticipantIdentity {
    pub id: String,
    pub display_name: String,
}

/// 连接状态
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Connected,
    Ready,
    Disconnected,
}

/// 提示的输入类型
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptInputType {
    None,
    Text,
    Textarea,
}

impl Default for PromptInputType {
    fn default() -> Self {
        PromptInputType::None
    }
}

/// 实时演示提示
///
/// 发送后不可变；"当前提示"是最近一次广播的那条，
/// 在新鲜度窗口（默认 10 分钟）内晚加入者仍会收到。
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LivePresentationPrompt {
    pub id: String,
    pub statement: String,
    #[serde(default)]
    pub has_input: bool,
    #[serde(default)]
    pub input_type: PromptInputType,
    /// 是否按分组个性化列表项
    #[serde(default)]
    pub use_random_list_item: bool,
    /// 列表项来源（为空则不做个性化）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_variable_id: Option<String>,
    #[serde(default)]
    pub is_system_prompt: bool,
}

/// 参与者连接记录
///
/// 生命周期：连接时创建 → ready-check/响应/断开事件驱动状态迁移 →
/// 断开后从活跃集合移除（保留断开时间戳用于持久化归档）。
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParticipantConnection {
    pub user_id: String,
    pub user_name: String,
    pub status: ConnectionStatus,
    /// 连接时快照的分组信息（可能在分组数据更新后刷新）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_info: Option<Group>,
    /// prompt_id → 响应内容
    #[serde(default)]
    pub responses: HashMap<String, String>,
    pub connected_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disconnected_at: Option<DateTime<Utc>>,
}

impl ParticipantConnection {
    pub fn new(identity: &ParticipantIdentity) -> Self {
        Self {
            user_id: identity.id.clone(),
            user_name: identity.display_name.clone(),
            status: ConnectionStatus::Connected,
            group_info: None,
            responses: HashMap::new(),
            connected_at: Utc::now(),
            disconnected_at: None,
        }
    }

    pub fn is_live(&self) -> bool {
        self.status != ConnectionStatus::Disconnected
    }
}

/// 分组完成状态
///
/// 以 (prompt_id, group_name) 为键，保证每组每提示
/// 最多触发一次总结生成。
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct GroupCompletionStatus {
    pub completed: bool,
    pub summary_sent: bool,
}

/// 单个分组的连接统计
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GroupStats {
    pub connected: usize,
    pub ready: usize,
    pub responded_current_prompt: usize,
}

/// 会话统计快照
///
/// `get_stats` 返回值；只读，不改变会话状态。
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SessionStats {
    pub deployment_id: String,
    pub connected_participants: usize,
    pub ready_participants: usize,
    pub presenter_connections: usize,
    pub ready_check_active: bool,
    pub session_active: bool,
    pub current_prompt_id: Option<String>,
    /// group_name → 组内统计
    pub groups: HashMap<String, GroupStats>,
}
