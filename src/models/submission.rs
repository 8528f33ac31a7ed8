use serde::{Deserialize, Serialize};

/// 学生提交
///
/// 聚类流水线的瞬态输入，核心不负责持久化。
/// `name` 在一次行为执行内唯一标识一个学生。
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StudentSubmission {
    /// 学生标识（一次执行内唯一）
    pub name: String,
    /// 文本提交内容（可为空）
    #[serde(default)]
    pub text: String,
    /// PDF 文档引用（不透明 id，指向外部向量库中已索引的文档）
    #[serde(default)]
    pub pdf_references: Vec<String>,
}

impl StudentSubmission {
    pub fn text_only(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
            pdf_references: Vec::new(),
        }
    }
}

/// 学生向量
///
/// 由 Vectorizer 从提交导出，每个学生恰好一个。
#[derive(Clone, Debug)]
pub struct StudentVector {
    pub name: String,
    pub vector: Vec<f32>,
}
