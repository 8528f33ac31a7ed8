use std::fmt;

/// 应用程序错误类型
#[derive(Debug)]
pub enum AppError {
    /// 聚类相关错误
    Clustering(ClusteringError),
    /// LLM 服务错误
    Llm(LlmError),
    /// 连接/传输错误
    Transport(TransportError),
    /// 实时会话错误
    Session(SessionError),
    /// 配置错误
    Config(ConfigError),
    /// 其他错误（用于包装第三方库错误）
    Other(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Clustering(e) => write!(f, "聚类错误: {}", e),
            AppError::Llm(e) => write!(f, "LLM错误: {}", e),
            AppError::Transport(e) => write!(f, "传输错误: {}", e),
            AppError::Session(e) => write!(f, "会话错误: {}", e),
            AppError::Config(e) => write!(f, "配置错误: {}", e),
            AppError::Other(msg) => write!(f, "错误: {}", msg),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Clustering(e) => Some(e),
            AppError::Llm(e) => Some(e),
            AppError::Transport(e) => Some(e),
            AppError::Session(e) => Some(e),
            AppError::Config(e) => Some(e),
            AppError::Other(_) => None,
        }
    }
}

/// 聚类相关错误
///
/// 只有"输入错误"会以此形式抛给调用方；算法内部的退化情况
/// （空 PDF、数值异常等）在组件内部兜底，不会出现在这里。
#[derive(Debug)]
pub enum ClusteringError {
    /// 提交数量不足（至少需要 2 份）
    InsufficientSubmissions {
        got: usize,
        need: usize,
    },
    /// 提交记录格式非法（例如名字为空）
    MalformedSubmission {
        name: String,
        reason: String,
    },
    /// 向量维度不一致
    DimensionMismatch {
        expected: usize,
        got: usize,
    },
}

impl fmt::Display for ClusteringError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClusteringError::InsufficientSubmissions { got, need } => {
                write!(f, "提交数量不足: 只有 {} 份，至少需要 {} 份", got, need)
            }
            ClusteringError::MalformedSubmission { name, reason } => {
                write!(f, "提交记录非法 ({}): {}", name, reason)
            }
            ClusteringError::DimensionMismatch { expected, got } => {
                write!(f, "向量维度不一致: 期望 {}，实际 {}", expected, got)
            }
        }
    }
}

impl std::error::Error for ClusteringError {}

/// LLM 服务错误
#[derive(Debug)]
pub enum LlmError {
    /// API 调用失败
    ApiCallFailed {
        model: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 调用超时
    Timeout {
        model: String,
        timeout_secs: u64,
    },
    /// 返回内容为空
    EmptyContent {
        model: String,
    },
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmError::ApiCallFailed { model, source } => {
                write!(f, "LLM API调用失败 (模型: {}): {}", model, source)
            }
            LlmError::Timeout {
                model,
                timeout_secs,
            } => {
                write!(f, "LLM调用超时 (模型: {}, {}秒)", model, timeout_secs)
            }
            LlmError::EmptyContent { model } => {
                write!(f, "LLM返回内容为空 (模型: {})", model)
            }
        }
    }
}

impl std::error::Error for LlmError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LlmError::ApiCallFailed { source, .. } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            _ => None,
        }
    }
}

/// 连接/传输错误
///
/// 单条连接的发送失败只影响该连接（下一轮广播时按断开处理），
/// 绝不会让整个广播循环中断。
#[derive(Debug)]
pub enum TransportError {
    /// 发送失败（对端已断开或通道已关闭）
    SendFailed {
        user_id: String,
    },
    /// 消息序列化失败
    SerializeFailed {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::SendFailed { user_id } => {
                write!(f, "向连接 {} 发送消息失败", user_id)
            }
            TransportError::SerializeFailed { source } => {
                write!(f, "消息序列化失败: {}", source)
            }
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransportError::SendFailed { .. } => None,
            TransportError::SerializeFailed { source } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
        }
    }
}

/// 实时会话错误
#[derive(Debug)]
pub enum SessionError {
    /// 会话不存在
    SessionNotFound {
        join_code: String,
    },
    /// 会话已关闭
    SessionClosed {
        deployment_id: String,
    },
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::SessionNotFound { join_code } => {
                write!(f, "会话不存在 (加入码: {})", join_code)
            }
            SessionError::SessionClosed { deployment_id } => {
                write!(f, "会话已关闭 (部署: {})", deployment_id)
            }
        }
    }
}

impl std::error::Error for SessionError {}

/// 配置错误
#[derive(Debug)]
pub enum ConfigError {
    /// 环境变量解析失败
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 配置文件解析失败
    FileParseFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::EnvVarParseFailed {
                var_name,
                value,
                expected_type,
            } => {
                write!(
                    f,
                    "环境变量 {} 解析失败: 值 '{}' 无法转换为 {}",
                    var_name, value, expected_type
                )
            }
            ConfigError::FileParseFailed { path, source } => {
                write!(f, "配置文件解析失败 ({}): {}", path, source)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::FileParseFailed { source, .. } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            _ => None,
        }
    }
}

// ========== 从常见错误类型转换 ==========
// 注意：不需要手动实现 From<AppError> for anyhow::Error，
// 因为 anyhow 已经为所有实现了 std::error::Error 的类型提供了自动实现

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Transport(TransportError::SerializeFailed {
            source: Box::new(err),
        })
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        AppError::Config(ConfigError::FileParseFailed {
            path: String::new(), // TOML错误通常不包含路径信息
            source: Box::new(err),
        })
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建"提交数量不足"错误
    pub fn insufficient_submissions(got: usize, need: usize) -> Self {
        AppError::Clustering(ClusteringError::InsufficientSubmissions { got, need })
    }

    /// 创建LLM API调用错误
    pub fn llm_api_failed(
        model: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Llm(LlmError::ApiCallFailed {
            model: model.into(),
            source: Box::new(source),
        })
    }

    /// 创建发送失败错误
    pub fn send_failed(user_id: impl Into<String>) -> Self {
        AppError::Transport(TransportError::SendFailed {
            user_id: user_id.into(),
        })
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_llm_error_display_carries_model() {
        let err = AppError::Llm(LlmError::Timeout {
            model: "gpt-4o-mini".to_string(),
            timeout_secs: 15,
        });
        let text = err.to_string();
        assert!(text.contains("gpt-4o-mini"));
        assert!(text.contains("15"));

        let err = AppError::Llm(LlmError::EmptyContent {
            model: "gpt-4o-mini".to_string(),
        });
        assert!(err.to_string().contains("内容为空"));
    }

    #[test]
    fn test_llm_api_failed_keeps_source_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "connection reset");
        let err = AppError::llm_api_failed("gpt-4o-mini", io);
        assert!(err.to_string().contains("gpt-4o-mini"));
        // 底层错误可沿 source 链取回
        let source = err.source().and_then(|e| e.source());
        assert!(source.is_some());
        assert!(source.unwrap().to_string().contains("connection reset"));
    }

    #[test]
    fn test_insufficient_submissions_constructor() {
        let err = AppError::insufficient_submissions(1, 2);
        assert!(matches!(
            err,
            AppError::Clustering(ClusteringError::InsufficientSubmissions { got: 1, need: 2 })
        ));
    }
}
