//! 程序配置
//!
//! 从 TOML 文件加载，再用环境变量覆盖密钥和端点。
//! `confidence_threshold` 与 `guardrails.min_length` 没有默认值，必须显式配置。

use std::collections::HashMap;
use std::path::Path;

use regex::Regex;
use serde::Deserialize;

use crate::error::ConfigError;
use crate::models::ExamType;

/// 配置文件路径环境变量
pub const CONFIG_PATH_ENV: &str = "GRADER_CONFIG";
/// 默认配置文件路径
pub const DEFAULT_CONFIG_PATH: &str = "grader.toml";

/// 程序配置
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    /// 同时处理的提交数量
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_submissions: usize,
    /// 是否显示详细日志
    #[serde(default)]
    pub verbose_logging: bool,
    /// 提交清单目录
    #[serde(default = "default_submissions_dir")]
    pub submissions_dir: String,
    /// 评分结果输出目录
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    /// 输出日志文件
    #[serde(default = "default_output_log_file")]
    pub output_log_file: String,
    /// 人工复核队列文件
    #[serde(default = "default_manual_review_file")]
    pub manual_review_file: String,
    /// 转写缓存目录（不配置则不缓存）
    #[serde(default)]
    pub transcript_cache_dir: Option<String>,
    /// 单个提交的请求超时（秒）
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    /// 调用方整体重试次数（0 表示不重试）
    #[serde(default)]
    pub retry_attempts: u32,
    /// 首次重试等待（秒），之后指数递增
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_secs: f64,
    /// 分类置信度阈值（0..=1）
    pub confidence_threshold: f64,
    // --- LLM 配置 ---
    #[serde(default)]
    pub llm: LlmConfig,
    // --- 护栏配置 ---
    pub guardrails: GuardrailConfig,
    // --- 处理器注册表 ---
    #[serde(default)]
    pub handlers: HashMap<ExamType, HandlerConfig>,
}

/// LLM 配置
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub api_key: String,
    pub api_base_url: String,
    pub model_name: String,
    pub transcription_model: String,
    pub temperature: f32,
    pub seed: Option<i64>,
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base_url: "https://api.openai.com/v1".to_string(),
            model_name: "gpt-4o".to_string(),
            transcription_model: "whisper-1".to_string(),
            temperature: 0.0,
            seed: Some(42),
            max_tokens: 2048,
        }
    }
}

/// 护栏配置
#[derive(Clone, Debug, Deserialize)]
pub struct GuardrailConfig {
    /// 内容最少字符数
    pub min_length: usize,
    /// 内容最多字符数
    #[serde(default)]
    pub max_length: Option<usize>,
    /// 禁止内容（正则）
    #[serde(default)]
    pub disallowed_patterns: Vec<String>,
    /// 各类型必须出现的段落标记
    #[serde(default)]
    pub required_sections: HashMap<ExamType, Vec<String>>,
}

/// 单个处理器配置
///
/// 出现在 `[handlers]` 中即表示该类型已注册
#[derive(Clone, Debug, Default, Deserialize)]
pub struct HandlerConfig {
    /// 覆盖默认模型
    #[serde(default)]
    pub model: Option<String>,
    /// 覆盖默认温度
    #[serde(default)]
    pub temperature: Option<f32>,
}

fn default_max_concurrent() -> usize {
    4
}

fn default_submissions_dir() -> String {
    "submissions".to_string()
}

fn default_output_dir() -> String {
    "graded".to_string()
}

fn default_output_log_file() -> String {
    "output.txt".to_string()
}

fn default_manual_review_file() -> String {
    "manual_review.txt".to_string()
}

/// 首次重试等待上限（秒）
const MAX_RETRY_BACKOFF_SECS: f64 = 3600.0;

fn default_retry_backoff() -> f64 {
    2.0
}

impl Config {
    /// 从环境变量指定的文件加载配置，并应用环境变量覆盖
    pub fn from_env() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load(Path::new(&path))?.apply_env()
    }

    /// 从 TOML 文件加载配置
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&content, &path.display().to_string())
    }

    /// 从 TOML 字符串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Self::parse(content, "<inline>")
    }

    fn parse(content: &str, origin: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: origin.to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// 应用环境变量覆盖
    pub fn apply_env(mut self) -> Result<Self, ConfigError> {
        if let Ok(v) = std::env::var("LLM_API_KEY") {
            self.llm.api_key = v;
        }
        if let Ok(v) = std::env::var("LLM_API_BASE_URL") {
            self.llm.api_base_url = v;
        }
        if let Ok(v) = std::env::var("LLM_MODEL_NAME") {
            self.llm.model_name = v;
        }
        if let Some(v) = parse_env::<usize>("MAX_CONCURRENT_SUBMISSIONS", "usize")? {
            self.max_concurrent_submissions = v;
        }
        if let Some(v) = parse_env::<bool>("VERBOSE_LOGGING", "bool")? {
            self.verbose_logging = v;
        }
        self.validate()?;
        Ok(self)
    }

    /// 校验配置
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(invalid(
                "confidence_threshold",
                format!("必须在 0 到 1 之间，当前为 {}", self.confidence_threshold),
            ));
        }
        if self.max_concurrent_submissions == 0 {
            return Err(invalid("max_concurrent_submissions", "必须大于 0"));
        }
        if !self.retry_backoff_secs.is_finite()
            || !(0.0..=MAX_RETRY_BACKOFF_SECS).contains(&self.retry_backoff_secs)
        {
            return Err(invalid(
                "retry_backoff_secs",
                format!(
                    "必须在 0 到 {} 秒之间，当前为 {}",
                    MAX_RETRY_BACKOFF_SECS, self.retry_backoff_secs
                ),
            ));
        }
        if let Some(max) = self.guardrails.max_length {
            if max < self.guardrails.min_length {
                return Err(invalid(
                    "guardrails.max_length",
                    format!("不能小于 min_length ({})", self.guardrails.min_length),
                ));
            }
        }
        for pattern in &self.guardrails.disallowed_patterns {
            Regex::new(pattern).map_err(|e| {
                invalid(
                    "guardrails.disallowed_patterns",
                    format!("正则 '{}' 无效: {}", pattern, e),
                )
            })?;
        }
        Ok(())
    }

    /// 未注册处理器的考试类型
    pub fn missing_handlers(&self) -> Vec<ExamType> {
        ExamType::ALL
            .into_iter()
            .filter(|t| !self.handlers.contains_key(t))
            .collect()
    }
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_string(),
        message: message.into(),
    }
}

fn parse_env<T: std::str::FromStr>(
    var_name: &str,
    expected_type: &str,
) -> Result<Option<T>, ConfigError> {
    match std::env::var(var_name) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::EnvVarParseFailed {
                var_name: var_name.to_string(),
                value,
                expected_type: expected_type.to_string(),
            }),
        Err(_) => Ok(None),
    }
}
