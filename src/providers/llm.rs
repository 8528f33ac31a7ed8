//! LLM 补全服务
//!
//! 主题标题润色、近期背景补充、分组总结共用的唯一 LLM 入口。
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点和模型
//! - 兼容 OpenAI API 的服务（如 Azure, Gemini, Doubao 等）
//!
//! 所有依赖本服务的功能都持有 `Option<Arc<LlmService>>`：
//! 服务整体缺席（没有凭证）时相关功能降级，绝不报错。

use anyhow::Result;
use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{AppError, LlmError};

/// LLM 补全服务
///
/// 职责：
/// - 提供通用的带超时补全接口
/// - 不关心提示词属于哪个业务场景
pub struct LlmService {
    client: Client<OpenAIConfig>,
    model_name: String,
    timeout: Duration,
}

impl LlmService {
    /// 创建新的 LLM 服务
    pub fn new(config: &Config) -> Self {
        // 配置 OpenAI 客户端（兼容 OpenAI API 的服务）
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        let client = Client::with_config(openai_config);

        Self {
            client,
            model_name: config.llm_model_name.clone(),
            timeout: Duration::from_secs(config.llm_timeout_secs),
        }
    }

    /// 仅当配置了 API key 时构造服务
    ///
    /// 调用方把返回值当作"LLM 是否可用"的开关。
    pub fn from_config(config: &Config) -> Option<Self> {
        if config.llm_api_key.is_empty() {
            warn!("未配置 LLM API key，标题润色/背景补充/分组总结将降级");
            return None;
        }
        Some(Self::new(config))
    }

    /// 通用的补全调用
    ///
    /// # 参数
    /// - `system_prompt`: 系统消息（可选）
    /// - `user_prompt`: 用户消息内容
    ///
    /// # 返回
    /// 返回 LLM 的响应内容（去除首尾空白）；超时或调用失败返回错误，
    /// 由调用方决定如何降级。
    pub async fn complete(
        &self,
        system_prompt: Option<&str>,
        user_prompt: &str,
    ) -> Result<String> {
        debug!("调用 LLM API，模型: {}", self.model_name);
        debug!("用户消息长度: {} 字符", user_prompt.len());

        // 构建消息列表
        let mut messages = Vec::new();

        if let Some(sys_msg) = system_prompt {
            let system_msg = ChatCompletionRequestSystemMessageArgs::default()
                .content(sys_msg)
                .build()?;
            messages.push(ChatCompletionRequestMessage::System(system_msg));
        }

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(user_prompt)
            .build()?;
        messages.push(ChatCompletionRequestMessage::User(user_msg));

        // 构建请求
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(messages)
            .temperature(0.3)
            .max_tokens(1024u32)
            .build()?;

        // 调用 API（带超时；润色/总结都是尽力而为，不允许长时间阻塞流水线）
        let response = tokio::time::timeout(self.timeout, self.client.chat().create(request))
            .await
            .map_err(|_| {
                warn!(
                    "LLM 调用超时 (模型: {}, {}秒)",
                    self.model_name,
                    self.timeout.as_secs()
                );
                AppError::Llm(LlmError::Timeout {
                    model: self.model_name.clone(),
                    timeout_secs: self.timeout.as_secs(),
                })
            })?
            .map_err(|e| {
                warn!("LLM API 调用失败: {}", e);
                AppError::llm_api_failed(&self.model_name, e)
            })?;

        debug!("LLM API 调用成功");

        // 提取响应内容
        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| {
                AppError::Llm(LlmError::EmptyContent {
                    model: self.model_name.clone(),
                })
            })?;

        Ok(content.trim().to_string())
    }
}
