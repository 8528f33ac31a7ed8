//! 主题标注服务 - 业务能力层
//!
//! 为一个簇生成主题：关键词、代表性片段、标题、描述。
//!
//! ## 提取阶梯（逐级兜底）
//! 1. 优先：成员的 PDF chunk（文本+向量）→ 内容过滤 → 每人限量的
//!    多样性采样 → chunk 级 TF-IDF
//! 2. 其次：整簇原始提交文本的 TF-IDF（宽松阈值）
//! 3. 最后：停用词表过滤的简单词频
//!
//! 标题 = 前 2 个关键词 Title Case 后用 " & " 连接；
//! 一个关键词都没有时用通用的 "Theme N"。
//!
//! LLM 标题润色和网络搜索背景富化都是尽力而为：
//! 缺凭证、超时、输出不合格都只是留用自动结果，绝不致命。

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::models::Theme;
use crate::providers::{DocumentChunk, LlmService, SearchService};
use crate::services::keywords::{
    self, diversity_sample, frequency_keywords, is_content_chunk, split_sentences,
    tfidf_keywords, TfIdfOptions,
};

/// 一个簇成员的 PDF chunk 数据
#[derive(Clone, Debug)]
pub struct MemberChunks {
    pub name: String,
    pub chunks: Vec<DocumentChunk>,
}

/// 主题标注服务
pub struct ThemeLabeler {
    llm: Option<Arc<LlmService>>,
    search: Option<Arc<SearchService>>,
    chunks_per_student: usize,
    max_keywords: usize,
    max_snippets: usize,
}

impl ThemeLabeler {
    pub fn new(
        config: &Config,
        llm: Option<Arc<LlmService>>,
        search: Option<Arc<SearchService>>,
    ) -> Self {
        Self {
            llm,
            search,
            chunks_per_student: config.chunks_per_student,
            max_keywords: config.max_keywords,
            max_snippets: config.max_snippets,
        }
    }

    /// 为一个簇生成主题
    ///
    /// # 参数
    /// - `cluster_id`: 簇索引
    /// - `member_names`: 簇成员
    /// - `member_texts`: 成员的原始提交文本（与成员同序）
    /// - `member_chunks`: 可选的成员 PDF chunk 数据
    /// - `guidance`: 讲师提供的润色指引（可选）
    pub async fn label(
        &self,
        cluster_id: usize,
        member_names: &[String],
        member_texts: &[String],
        member_chunks: Option<&[MemberChunks]>,
        guidance: Option<&str>,
    ) -> Theme {
        if member_names.is_empty() {
            return Theme::placeholder(cluster_id);
        }

        // ========== 阶梯 1: chunk 级 TF-IDF ==========
        let retained = member_chunks
            .map(|mc| self.filter_and_sample_chunks(mc))
            .unwrap_or_default();

        let mut keywords = if retained.is_empty() {
            Vec::new()
        } else {
            let docs: Vec<String> = retained.iter().map(|c| c.text.clone()).collect();
            tfidf_keywords(&docs, TfIdfOptions::default(), self.max_keywords)
        };

        // ========== 阶梯 2: 原始文本 TF-IDF（宽松阈值） ==========
        if keywords.is_empty() {
            debug!("簇 {} 的 chunk 路径无关键词，回退到原始文本", cluster_id);
            keywords = tfidf_keywords(member_texts, TfIdfOptions::lenient(), self.max_keywords);
        }

        // ========== 阶梯 3: 词频兜底 ==========
        if keywords.is_empty() {
            keywords = frequency_keywords(member_texts, self.max_keywords);
        }

        // 代表性片段
        let snippets = self.select_snippets(&retained, member_texts);

        // 标题与描述
        let mut title = compose_title(&keywords, cluster_id);
        let mut description = compose_description(member_names.len(), &keywords);

        // 尽力而为的 LLM 润色
        if let Some(polished) = self.polish_title(&title, &keywords, &snippets, guidance).await {
            info!("簇 {} 标题润色: '{}' → '{}'", cluster_id, title, polished);
            title = polished;
        }

        // 尽力而为的近期背景富化
        if let Some(context) = self.recent_context(&title, &keywords).await {
            description.push(' ');
            description.push_str(&context);
        }

        let mut student_names = member_names.to_vec();
        student_names.sort();

        Theme {
            title,
            description,
            keywords,
            snippets,
            cluster_id,
            student_count: student_names.len(),
            student_names,
        }
    }

    /// 内容过滤 + 每人限量的多样性采样
    ///
    /// 先按相关性启发式剔除导航/广告/样板 chunk，再在嵌入空间
    /// 对每个学生贪心采样至多 `chunks_per_student` 个，防止一份
    /// 长文档垄断整个簇的信号。
    fn filter_and_sample_chunks(&self, member_chunks: &[MemberChunks]) -> Vec<DocumentChunk> {
        let mut retained = Vec::new();
        for member in member_chunks {
            let content: Vec<&DocumentChunk> = member
                .chunks
                .iter()
                .filter(|c| is_content_chunk(&c.text))
                .collect();
            if content.is_empty() {
                continue;
            }

            let vectors: Vec<Vec<f32>> = content.iter().map(|c| c.vector.clone()).collect();
            for idx in diversity_sample(&vectors, self.chunks_per_student) {
                retained.push(content[idx].clone());
            }
        }
        retained
    }

    /// 选择至多 `max_snippets` 个代表性片段
    ///
    /// chunk 可用时在 chunk 向量空间做多样性采样；否则在句子级
    /// 用词法向量做同样的采样；一个干净句子都没有时取全文中段。
    fn select_snippets(&self, retained: &[DocumentChunk], member_texts: &[String]) -> Vec<String> {
        if !retained.is_empty() {
            let vectors: Vec<Vec<f32>> = retained.iter().map(|c| c.vector.clone()).collect();
            return diversity_sample(&vectors, self.max_snippets)
                .into_iter()
                .map(|i| clip_snippet(&retained[i].text))
                .collect();
        }

        // 句子级：先过滤明显的样板句
        let sentences: Vec<String> = member_texts
            .iter()
            .flat_map(|t| split_sentences(t))
            .filter(|s| !is_boilerplate_sentence(s))
            .collect();

        if !sentences.is_empty() {
            let vectors: Vec<Vec<f32>> = sentences
                .iter()
                .map(|s| keywords::lexical_vector(s, 64))
                .collect();
            return diversity_sample(&vectors, self.max_snippets)
                .into_iter()
                .map(|i| clip_snippet(&sentences[i]))
                .collect();
        }

        // 兜底：全文中段
        let combined = member_texts.join(" ");
        let chars: Vec<char> = combined.chars().collect();
        if chars.len() < 30 {
            return Vec::new();
        }
        let start = chars.len() / 4;
        let end = (start + 200).min(chars.len());
        vec![chars[start..end].iter().collect::<String>().trim().to_string()]
    }

    /// LLM 标题润色
    ///
    /// 只有结果非空、短于 50 字符、且与现标题不同才采纳；
    /// 其他任何情况（无凭证、超时、输出不合格）都返回 None。
    async fn polish_title(
        &self,
        title: &str,
        keywords: &[String],
        snippets: &[String],
        guidance: Option<&str>,
    ) -> Option<String> {
        let llm = self.llm.as_ref()?;

        let mut user_prompt = format!(
            "Current theme title: {}\nKeywords: {}\n",
            title,
            keywords.join(", ")
        );
        for snippet in snippets.iter().take(2) {
            user_prompt.push_str(&format!("Sample snippet: {}\n", snippet));
        }
        if let Some(g) = guidance {
            user_prompt.push_str(&format!("Instructor guidance: {}\n", g));
        }
        user_prompt.push_str(
            "Suggest a better, concise title of 2-4 words for this discussion theme. \
             Reply with the title only, no quotes and no explanation.",
        );

        let response = match llm
            .complete(
                Some("You are naming discussion themes for a classroom activity."),
                &user_prompt,
            )
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!("标题润色失败，保留自动标题: {}", e);
                return None;
            }
        };

        let candidate = response
            .trim()
            .trim_matches(|c| c == '"' || c == '\'')
            .trim()
            .to_string();
        if candidate.is_empty() || candidate.chars().count() >= 50 || candidate == title {
            debug!("润色结果不合格，弃用: '{}'", candidate);
            return None;
        }
        Some(candidate)
    }

    /// 近期背景富化
    ///
    /// 标题 + 前 3 个关键词拼查询词 → 搜索 → 找到摘要时让 LLM
    /// 压缩成 1-2 句"近期背景"；任何一步失败都返回 None，
    /// 描述保持原样。
    async fn recent_context(&self, title: &str, keywords: &[String]) -> Option<String> {
        let search = self.search.as_ref()?;
        let llm = self.llm.as_ref()?;

        let query = {
            let terms: Vec<&str> = keywords.iter().take(3).map(String::as_str).collect();
            format!("{} {}", title, terms.join(" "))
        };

        let snippet = match search.search(query.trim()).await {
            Ok(Some(s)) => s,
            Ok(None) => return None,
            Err(e) => {
                warn!("背景搜索失败，跳过富化: {}", e);
                return None;
            }
        };

        let user_prompt = format!(
            "Theme: {}\nSearch result: {}\n\nWrite one or two sentences of recent real-world \
             context connecting this theme to current events. Reply with the sentences only.",
            title, snippet
        );

        match llm
            .complete(
                Some("You add brief recent-events context to classroom discussion themes."),
                &user_prompt,
            )
            .await
        {
            Ok(context) if !context.trim().is_empty() => Some(context.trim().to_string()),
            Ok(_) => None,
            Err(e) => {
                warn!("背景富化 LLM 调用失败，描述保持原样: {}", e);
                None
            }
        }
    }
}

/// 标题生成：前 2 个关键词 Title Case 后用 " & " 连接
fn compose_title(keywords: &[String], cluster_id: usize) -> String {
    let top: Vec<String> = keywords.iter().take(2).map(|k| title_case(k)).collect();
    if top.is_empty() {
        format!("Theme {}", cluster_id + 1)
    } else {
        top.join(" & ")
    }
}

fn compose_description(member_count: usize, keywords: &[String]) -> String {
    if keywords.is_empty() {
        format!("A group of {} submissions.", member_count)
    } else {
        let listed: Vec<&str> = keywords.iter().take(4).map(String::as_str).collect();
        format!(
            "A group of {} submissions centered on {}.",
            member_count,
            listed.join(", ")
        )
    }
}

fn title_case(term: &str) -> String {
    term.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// 句子级样板过滤（比 chunk 过滤宽松，只看样板词占比）
fn is_boilerplate_sentence(sentence: &str) -> bool {
    let words: Vec<String> = sentence
        .to_lowercase()
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
        .filter(|w| !w.is_empty())
        .collect();
    if words.is_empty() {
        return true;
    }
    let hits = words
        .iter()
        .filter(|w| {
            matches!(
                w.as_str(),
                "click" | "subscribe" | "newsletter" | "advertisement" | "cookie" | "cookies"
                    | "login" | "signup" | "register" | "download" | "unsubscribe"
            )
        })
        .count();
    hits as f64 / words.len() as f64 > 0.1
}

fn clip_snippet(text: &str) -> String {
    crate::utils::logging::truncate_text(text.trim(), 300)
}
