//! 服务端下发消息
//!
//! ## 职责
//! - 定义实时会话中服务端 → 连接的全部消息类型
//! - serde 标签枚举,序列化后即为线上负载

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{Group, LivePresentationPrompt, SessionStats};

/// 服务端 → 连接的消息。
///
/// `type` 字段区分消息种类,负载字段全部内联。
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// 连接建立后的首条消息,携带身份与(可能的)分组信息
    Welcome {
        user_id: String,
        user_name: String,
        group: Option<Group>,
        session_active: bool,
    },
    /// 分组数据更新后下发的新分组(可能变为无分组)
    GroupUpdate { group: Option<Group> },
    /// 演示提示,`assigned_item` 为按组分配的列表项(可能为空)
    Prompt {
        prompt: LivePresentationPrompt,
        assigned_item: Option<Value>,
    },
    /// 就绪检查开始
    ReadyCheck,
    /// 某参与者已就绪(发给演示端)
    ReadyAck { user_id: String, user_name: String },
    /// 会话统计快照(发给演示端)
    RosterUpdate { stats: SessionStats },
    /// 某参与者提交了响应(发给演示端)
    ResponseReceived {
        user_id: String,
        user_name: String,
        prompt_id: String,
        response: String,
    },
    /// 某小组全员响应完毕后的一次性总结
    GroupSummary {
        group_name: String,
        prompt_id: String,
        summary: String,
    },
    /// 会话关闭
    SessionClosed,
    /// 面向参与者的通用错误(不携带诊断细节)
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_serialize_with_type_tag() {
        let msg = ServerMessage::ReadyAck {
            user_id: "u1".to_string(),
            user_name: "Alice".to_string(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "ready_ack");
        assert_eq!(json["user_id"], "u1");
    }

    #[test]
    fn test_prompt_message_carries_assigned_item() {
        let msg = ServerMessage::Prompt {
            prompt: LivePresentationPrompt {
                id: "p1".to_string(),
                statement: "Discuss".to_string(),
                has_input: true,
                input_type: crate::models::PromptInputType::Text,
                use_random_list_item: true,
                list_variable_id: Some("themes".to_string()),
                is_system_prompt: false,
            },
            assigned_item: Some(serde_json::json!({"title": "Theme 1"})),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "prompt");
        assert_eq!(json["assigned_item"]["title"], "Theme 1");
    }
}
