//! 关键词与文本过滤工具 - 业务能力层
//!
//! Theme Labeler 依赖的纯函数集合：
//! - chunk 内容相关性过滤（长度、样板词汇、大写比例、特殊字符密度）
//! - TF-IDF 关键词提取（unigram + bigram，文档频率约束，排除表）
//! - 词频兜底提取
//! - 多样性采样（嵌入空间的贪心最大距离选择）
//! - 句子切分与词法向量
//!
//! 全部为同步纯函数，无外部依赖，便于单测。

use regex::Regex;
use std::collections::{HashMap, HashSet};

use crate::utils::vecmath;

/// 导航/广告/样板词汇：chunk 中此类词占比过高则视为非内容
const BOILERPLATE_VOCAB: &[&str] = &[
    "click", "subscribe", "newsletter", "advertisement", "sponsored", "cookie", "cookies",
    "login", "signup", "menu", "homepage", "copyright", "privacy", "terms", "buy", "shop",
    "sale", "discount", "offer", "download", "share", "follow", "register", "trending",
    "related", "navigation", "footer", "header", "sidebar", "accept", "browser", "javascript",
    "password", "unsubscribe", "checkout", "cart",
];

/// 学术/新闻实质词汇：出现即认为 chunk 具有内容价值
const SUBSTANCE_VOCAB: &[&str] = &[
    "research", "study", "analysis", "according", "report", "data", "evidence", "university",
    "professor", "published", "journal", "experiment", "theory", "method", "results",
    "findings", "announced", "government", "policy", "economy", "science", "technology",
    "history", "development", "significant", "percent", "increase", "decrease", "impact",
    "climate", "health", "education", "society", "argued", "demonstrates",
];

/// 通用停用词
const STOPWORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "but", "if", "then", "else", "for", "of", "on", "in", "to",
    "from", "by", "with", "at", "as", "is", "are", "was", "were", "be", "been", "being", "it",
    "its", "this", "that", "these", "those", "i", "you", "he", "she", "we", "they", "them",
    "his", "her", "our", "your", "their", "my", "me", "us", "not", "no", "yes", "do", "does",
    "did", "done", "can", "could", "will", "would", "should", "shall", "may", "might", "must",
    "have", "has", "had", "having", "there", "here", "where", "when", "why", "how", "what",
    "which", "who", "whom", "also", "very", "just", "about", "into", "over", "under", "again",
    "further", "once", "because", "while", "during", "before", "after", "above", "below",
    "up", "down", "out", "off", "so", "than", "too", "now", "today", "tomorrow", "yesterday",
    "s", "t", "d", "ll", "m", "re", "ve",
];

/// 主题关键词排除表：站点导航词、泛词、过细的日期/序数词
const KEYWORD_EXCLUDE: &[&str] = &[
    "home", "page", "site", "website", "article", "articles", "news", "click", "subscribe",
    "newsletter", "advertisement", "buy", "free", "best", "top", "new", "latest", "update",
    "updates", "january", "february", "march", "april", "june", "july", "august", "september",
    "october", "november", "december", "monday", "tuesday", "wednesday", "thursday", "friday",
    "saturday", "sunday", "com", "www", "http", "https", "html", "pdf", "link", "links",
    "video", "image", "photo", "said", "says", "one", "two", "three", "first", "second",
    "third", "year", "years", "day", "days", "time", "times", "people", "thing", "things",
    "way", "good", "great", "really", "lot", "make", "made", "get", "got", "use", "used",
    "using",
];

/// TF-IDF 参数
///
/// chunk 路径用默认值（词至少出现在 2 个 chunk、至多 70%）；
/// 原始文本兜底路径用更宽松的阈值。
#[derive(Clone, Copy, Debug)]
pub struct TfIdfOptions {
    /// 词的最小文档频率
    pub min_df: usize,
    /// 词的最大文档频率占比（超过视为过于常见）
    pub max_df_ratio: f64,
}

impl Default for TfIdfOptions {
    fn default() -> Self {
        Self {
            min_df: 2,
            max_df_ratio: 0.7,
        }
    }
}

impl TfIdfOptions {
    /// 原始文本兜底路径的宽松阈值
    pub fn lenient() -> Self {
        Self {
            min_df: 1,
            max_df_ratio: 0.9,
        }
    }
}

/// 判断一个 chunk 是否是"内容"而不是导航/广告/样板
///
/// 拒绝：过短/过长、样板词占比过高、大写比例过高、特殊字符密度过高。
/// 接受：含实质词汇，或长度足以像正文的散文。
pub fn is_content_chunk(text: &str) -> bool {
    let trimmed = text.trim();
    let char_count = trimmed.chars().count();
    if char_count < 40 || char_count > 2500 {
        return false;
    }

    let words: Vec<String> = trimmed
        .to_lowercase()
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
        .filter(|w| !w.is_empty())
        .collect();
    if words.is_empty() {
        return false;
    }

    let boilerplate_hits = words
        .iter()
        .filter(|w| BOILERPLATE_VOCAB.contains(&w.as_str()))
        .count();
    if boilerplate_hits as f64 / words.len() as f64 > 0.15 {
        return false;
    }

    let alphabetic: Vec<char> = trimmed.chars().filter(|c| c.is_alphabetic()).collect();
    if !alphabetic.is_empty() {
        let uppercase = alphabetic.iter().filter(|c| c.is_uppercase()).count();
        if uppercase as f64 / alphabetic.len() as f64 > 0.3 {
            return false;
        }
    }

    let special = trimmed
        .chars()
        .filter(|c| !c.is_alphanumeric() && !c.is_whitespace() && !".,;:'\"()-?!".contains(*c))
        .count();
    if special as f64 / char_count as f64 > 0.2 {
        return false;
    }

    let has_substance = words
        .iter()
        .any(|w| SUBSTANCE_VOCAB.contains(&w.as_str()));

    has_substance || char_count >= 200
}

/// 分词（小写、去首尾标点、丢弃空串）
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_string()
        })
        .filter(|w| !w.is_empty())
        .collect()
}

/// 关键词候选的 token 合法性
///
/// 任一 token 落在停用词/排除表、过短、或含数字（过细的日期/编号）
/// 都会让整个候选出局。
fn is_candidate_token(token: &str) -> bool {
    token.chars().count() >= 3
        && !token.chars().any(|c| c.is_numeric())
        && !STOPWORDS.contains(&token)
        && !KEYWORD_EXCLUDE.contains(&token)
}

/// 从一个文档提取候选词（unigram + bigram）
fn candidate_terms(text: &str) -> Vec<String> {
    let tokens = tokenize(text);
    let mut terms = Vec::new();

    for token in &tokens {
        if is_candidate_token(token) {
            terms.push(token.clone());
        }
    }
    for pair in tokens.windows(2) {
        if is_candidate_token(&pair[0]) && is_candidate_token(&pair[1]) {
            terms.push(format!("{} {}", pair[0], pair[1]));
        }
    }
    terms
}

/// TF-IDF 关键词提取
///
/// # 参数
/// - `docs`: 文档（chunk 或提交全文）列表
/// - `options`: 文档频率约束
/// - `max_terms`: 最多保留的词数
///
/// # 返回
/// 按显著性从高到低排序的关键词；候选全部被过滤时返回空列表
/// （调用方据此落到通用标题）。
pub fn tfidf_keywords(docs: &[String], options: TfIdfOptions, max_terms: usize) -> Vec<String> {
    let n_docs = docs.len();
    if n_docs == 0 || max_terms == 0 {
        return Vec::new();
    }

    // 词频与文档频率
    let mut term_freq: HashMap<String, usize> = HashMap::new();
    let mut doc_freq: HashMap<String, usize> = HashMap::new();
    for doc in docs {
        let terms = candidate_terms(doc);
        let unique: HashSet<&String> = terms.iter().collect();
        for term in &terms {
            *term_freq.entry(term.clone()).or_insert(0) += 1;
        }
        for term in unique {
            *doc_freq.entry(term.clone()).or_insert(0) += 1;
        }
    }

    // 文档频率约束：过稀和过常见的词都丢弃
    let mut scored: Vec<(String, f64)> = term_freq
        .into_iter()
        .filter_map(|(term, tf)| {
            let df = *doc_freq.get(&term).unwrap_or(&0);
            if df < options.min_df {
                return None;
            }
            if df as f64 / n_docs as f64 > options.max_df_ratio {
                return None;
            }
            let idf = ((1.0 + n_docs as f64) / (1.0 + df as f64)).ln() + 1.0;
            Some((term, tf as f64 * idf))
        })
        .collect();

    if scored.is_empty() {
        return Vec::new();
    }

    // 排序：分数降序，平手按字典序保证确定性
    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });

    // 中间分数带：优先保留 [0.1*max, 0.9*max] 的词（极端高分往往是
    // 某单一文档的专名刷分，极端低分则无区分度）；不足时从头部回填
    let max_score = scored[0].1;
    let lo = 0.1 * max_score;
    let hi = 0.9 * max_score;
    let mut kept: Vec<String> = scored
        .iter()
        .filter(|(_, s)| *s >= lo && *s <= hi)
        .take(max_terms)
        .map(|(t, _)| t.clone())
        .collect();
    if kept.len() < max_terms {
        for (term, _) in &scored {
            if kept.len() >= max_terms {
                break;
            }
            if !kept.contains(term) {
                kept.push(term.clone());
            }
        }
    }
    kept.truncate(max_terms);
    kept
}

/// 词频兜底提取
///
/// TF-IDF 完全失败（例如全部文档为空）时的最后手段：
/// 停用词表过滤后的简单词频排序。
pub fn frequency_keywords(texts: &[String], max_terms: usize) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for text in texts {
        for token in tokenize(text) {
            if is_candidate_token(&token) {
                *counts.entry(token).or_insert(0) += 1;
            }
        }
    }

    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.into_iter().take(max_terms).map(|(t, _)| t).collect()
}

/// 句子切分
///
/// 返回长度足够像句子的片段（≥ 20 字符），保留原有顺序。
pub fn split_sentences(text: &str) -> Vec<String> {
    // 简单的句末标点切分；缩写误切对片段选择无大碍
    let splitter = Regex::new(r"[.!?。！？]+\s*").expect("句子切分正则非法");
    splitter
        .split(text)
        .map(str::trim)
        .filter(|s| s.chars().count() >= 20)
        .map(str::to_string)
        .collect()
}

/// 词法向量：把文本散列为固定维度的词袋向量
///
/// 句子级多样性采样在没有真实嵌入时使用；只需保证
/// "内容相近 → 向量相近"即可，无语义要求。
pub fn lexical_vector(text: &str, dim: usize) -> Vec<f32> {
    let mut vector = vec![0.0f32; dim.max(1)];
    for token in tokenize(text) {
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in token.bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        }
        let idx = (hash % vector.len() as u64) as usize;
        vector[idx] += 1.0;
    }
    vecmath::normalize(&vector)
}

/// 多样性采样：贪心最大最小距离选择
///
/// 从候选向量中选出至多 `cap` 个相互尽量远的索引，
/// 防止单个长文档的大量相似 chunk 垄断簇的信号。
/// 起点是离均值最远的向量，之后每步取"到已选集合的
/// 最小余弦距离"最大的候选；平手取索引小者，保证确定性。
pub fn diversity_sample(vectors: &[Vec<f32>], cap: usize) -> Vec<usize> {
    let n = vectors.len();
    if n == 0 || cap == 0 {
        return Vec::new();
    }
    if n <= cap {
        return (0..n).collect();
    }

    let mean = vecmath::mean_vector(vectors).unwrap_or_default();
    let mut selected: Vec<usize> = Vec::with_capacity(cap);

    let first = (0..n)
        .max_by(|&a, &b| {
            vecmath::cosine_distance(&vectors[a], &mean)
                .partial_cmp(&vecmath::cosine_distance(&vectors[b], &mean))
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(b.cmp(&a))
        })
        .unwrap_or(0);
    selected.push(first);

    while selected.len() < cap {
        let next = (0..n)
            .filter(|i| !selected.contains(i))
            .max_by(|&a, &b| {
                let da = min_distance(vectors, &selected, a);
                let db = min_distance(vectors, &selected, b);
                da.partial_cmp(&db)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(b.cmp(&a))
            });
        match next {
            Some(i) => selected.push(i),
            None => break,
        }
    }

    selected.sort_unstable();
    selected
}

fn min_distance(vectors: &[Vec<f32>], selected: &[usize], i: usize) -> f32 {
    selected
        .iter()
        .map(|&s| vecmath::cosine_distance(&vectors[i], &vectors[s]))
        .fold(f32::INFINITY, f32::min)
}
