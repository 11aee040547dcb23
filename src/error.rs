use thiserror::Error;

use crate::models::ExamType;

/// 流水线错误
///
/// 所有变体对单次提交都是终态：流水线内部不做任何重试
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    /// 不支持的提交格式
    #[error("不支持的提交格式 ({file_name}): {reason}")]
    Format { file_name: String, reason: String },

    /// 分类置信度不足
    #[error("无法确定考试类型: 置信度 {confidence:.2} 低于阈值 {threshold:.2}")]
    ClassificationAmbiguous { confidence: f64, threshold: f64 },

    /// 护栏检查未通过
    #[error("护栏检查未通过: {}", violations.join(", "))]
    GuardrailRejected { violations: Vec<String> },

    /// 未注册处理器（配置缺陷）
    #[error("未注册考试类型 {exam_type} 的评分处理器")]
    HandlerUnavailable { exam_type: ExamType },

    /// 下游评分失败
    #[error("评分失败: {cause}")]
    GradingFailed { cause: GradingFailure },
}

/// 评分失败原因
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GradingFailure {
    /// 在阻塞边界上超时
    #[error("{stage} 阶段超时")]
    Timeout { stage: String },

    /// 预处理后端失败（PDF 解析、转写等）
    #[error("预处理失败: {message}")]
    Preprocessing { message: String },

    /// 上游 API 调用失败
    #[error("上游调用失败: {message}")]
    Upstream { message: String },

    /// 上游返回内容无法解析
    #[error("无法解析评分响应: {message}")]
    InvalidResponse { message: String },
}

impl GradingFailure {
    /// 是否值得由调用方整体重试
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GradingFailure::Timeout { .. } | GradingFailure::Upstream { .. }
        )
    }
}

impl PipelineError {
    /// 错误类别标识（用于报告和日志）
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Format { .. } => "format_error",
            PipelineError::ClassificationAmbiguous { .. } => "classification_ambiguous",
            PipelineError::GuardrailRejected { .. } => "guardrail_rejected",
            PipelineError::HandlerUnavailable { .. } => "handler_unavailable",
            PipelineError::GradingFailed { .. } => "grading_failed",
        }
    }

    /// 调用方是否可以整体重试
    pub fn is_transient(&self) -> bool {
        match self {
            PipelineError::GradingFailed { cause } => cause.is_transient(),
            _ => false,
        }
    }

    // ========== 便捷构造函数 ==========

    pub fn format(file_name: impl Into<String>, reason: impl Into<String>) -> Self {
        PipelineError::Format {
            file_name: file_name.into(),
            reason: reason.into(),
        }
    }

    pub fn timeout(stage: impl Into<String>) -> Self {
        PipelineError::GradingFailed {
            cause: GradingFailure::Timeout {
                stage: stage.into(),
            },
        }
    }

    /// 预处理后端错误，保留完整的错误链
    pub fn preprocessing(err: &anyhow::Error) -> Self {
        PipelineError::GradingFailed {
            cause: GradingFailure::Preprocessing {
                message: format!("{:#}", err),
            },
        }
    }
}

impl From<GradingFailure> for PipelineError {
    fn from(cause: GradingFailure) -> Self {
        PipelineError::GradingFailed { cause }
    }
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("无法读取配置文件 {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("无法解析配置文件 {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },

    #[error("配置项 {field} 无效: {message}")]
    Invalid { field: String, message: String },
}

/// 流水线结果类型
pub type PipelineResult<T> = Result<T, PipelineError>;
