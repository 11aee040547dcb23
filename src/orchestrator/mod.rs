//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批量处理和流程调度，是整个系统的"指挥中心"。
//!
//! ### `batch_processor` - 批量评分处理器
//! - 管理应用生命周期（初始化、运行）
//! - 批量加载提交清单（Vec<Submission>）
//! - 控制并发数量（Semaphore）
//! - 对瞬时失败整体重试
//! - 写出报告与人工复核队列，输出全局统计
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理 Vec<Submission>)
//!     ↓
//! workflow::SubmissionFlow (处理单个 Submission)
//!     ↓
//! services (能力层：preprocess / classify / guardrail / route)
//!     ↓
//! handlers (专项评分) + infrastructure (PDF / 转写 / 缓存)
//! ```

pub mod batch_processor;

pub use batch_processor::{run_with_retry, App, ProcessingStats, RetryPolicy};
