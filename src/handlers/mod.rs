//! 专项评分处理器
//!
//! 每种考试类型对应一个 `GradingHandler`。类型集合是封闭的
//! （技术 / 叙述 / 演讲），由 `HandlerRegistry` 在启动时一次性建立。

pub mod llm_grader;
pub mod prompts;
pub mod registry;
pub mod response_parser;

use async_trait::async_trait;

use crate::error::GradingFailure;
use crate::models::{GradingResult, NormalizedSubmission};

pub use llm_grader::LlmGrader;
pub use registry::{HandlerRegistry, HandlerRegistryBuilder};

/// 专项评分能力
#[async_trait]
pub trait GradingHandler: Send + Sync {
    /// 处理器名称（写入评分结果）
    fn name(&self) -> &str;

    /// 对一个已通过护栏的提交评分
    async fn grade(&self, ns: &NormalizedSubmission) -> Result<GradingResult, GradingFailure>;
}
