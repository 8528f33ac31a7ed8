//! 分组总结服务 - 业务能力层
//!
//! 一个分组的全部成员都回答完当前提示后，协调器调用这里
//! 生成一段组内总结并广播。LLM 可用时让它压缩；不可用或失败时
//! 用抽取式兜底（每人取第一句），保证"每组每提示恰好一次"的
//! 总结广播总有内容可发。

use std::sync::Arc;
use tracing::{debug, warn};

use crate::providers::LlmService;
use crate::services::keywords::split_sentences;

/// 分组总结服务
#[derive(Clone)]
pub struct Summarizer {
    llm: Option<Arc<LlmService>>,
}

impl Summarizer {
    pub fn new(llm: Option<Arc<LlmService>>) -> Self {
        Self { llm }
    }

    /// 为一个分组生成总结
    ///
    /// # 参数
    /// - `group_name`: 分组名
    /// - `prompt_statement`: 当前提示的内容
    /// - `responses`: (成员显示名, 响应文本) 列表
    ///
    /// 本函数从不失败：LLM 路径的任何错误都会落到抽取式兜底。
    pub async fn summarize_group(
        &self,
        group_name: &str,
        prompt_statement: &str,
        responses: &[(String, String)],
    ) -> String {
        if responses.is_empty() {
            return format!("No responses were collected for {}.", group_name);
        }

        if let Some(llm) = &self.llm {
            let mut transcript = String::new();
            for (name, response) in responses {
                transcript.push_str(&format!("{}: {}\n", name, response));
            }

            let user_prompt = format!(
                "Prompt: {}\n\nGroup {} responses:\n{}\nSummarize the group's thinking in \
                 2-3 sentences, noting agreements and disagreements. Reply with the summary only.",
                prompt_statement, group_name, transcript
            );

            match llm
                .complete(
                    Some("You summarize small-group classroom discussion responses."),
                    &user_prompt,
                )
                .await
            {
                Ok(summary) if !summary.trim().is_empty() => return summary.trim().to_string(),
                Ok(_) => debug!("分组 {} 的 LLM 总结为空，使用抽取式兜底", group_name),
                Err(e) => warn!("分组 {} 的 LLM 总结失败，使用抽取式兜底: {}", group_name, e),
            }
        }

        extractive_summary(group_name, responses)
    }
}

/// 抽取式兜底：每个成员取第一句，拼成总结
fn extractive_summary(group_name: &str, responses: &[(String, String)]) -> String {
    let mut parts = Vec::new();
    for (name, response) in responses.iter().take(6) {
        let first = split_sentences(response)
            .into_iter()
            .next()
            .unwrap_or_else(|| crate::utils::logging::truncate_text(response.trim(), 120));
        if !first.is_empty() {
            parts.push(format!("{}: {}", name, first));
        }
    }
    format!("Summary for {} — {}", group_name, parts.join(" / "))
}
