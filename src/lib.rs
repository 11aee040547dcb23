//! # Exam Grader
//!
//! 考试提交的分类与分发路由：把一个原始提交规范化、分类、做护栏检查，
//! 然后交给唯一对应的专项评分处理器
//!
//! ## 架构设计
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有外部资源，只暴露能力
//! - `PdfExtractBackend` - PDF 每页文本
//! - `WhisperBackend` / `CachedAudioBackend` - 录音转写与缓存
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单个提交
//! - `Preprocessor` - 原始附件 → 规范化文本
//! - `Classifier` - 关键词规则分类
//! - `GuardrailChecker` - 有序的硬/软规则
//! - `Router` - 按考试类型分发
//! - `ReportWriter` / `ReviewWriter` - 报告导出与人工复核队列
//!
//! ### ③ 专项处理器（Handlers）
//! - `handlers/` - `GradingHandler` trait 与只读的 `HandlerRegistry`
//! - `LlmGrader` - 每种考试类型一个 LLM 评分实例
//!
//! ### ④ 流程层（Workflow）
//! - `SubmissionFlow` - 预处理 → 分类 → 护栏 → 路由
//! - `SubmissionCtx` / `SubmissionState` - 上下文与状态机
//!
//! ### ⑤ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 批量评分，管理并发、重试与落盘

pub mod config;
pub mod error;
pub mod handlers;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{ConfigError, GradingFailure, PipelineError, PipelineResult};
pub use handlers::{GradingHandler, HandlerRegistry};
pub use models::{ExamType, GradingResult, GuardrailVerdict, NormalizedSubmission, Submission};
pub use orchestrator::App;
pub use workflow::{Outcome, SubmissionCtx, SubmissionFlow, SubmissionReport};
