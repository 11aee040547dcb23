//! 提交处理上下文
//!
//! 封装"我正在处理第几个提交、第几次尝试"这一信息

use std::fmt::Display;

/// 提交处理上下文
#[derive(Debug, Clone)]
pub struct SubmissionCtx {
    /// 提交ID
    pub submission_id: String,

    /// 提交在本次运行中的序号（从1开始，仅用于日志显示）
    pub index: usize,

    /// 当前尝试次数（从1开始）
    pub attempt: u32,
}

impl SubmissionCtx {
    pub fn new(submission_id: impl Into<String>, index: usize) -> Self {
        Self {
            submission_id: submission_id.into(),
            index,
            attempt: 1,
        }
    }

    /// 下一次重试的上下文
    pub fn next_attempt(&self) -> Self {
        Self {
            attempt: self.attempt + 1,
            ..self.clone()
        }
    }
}

impl Display for SubmissionCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.attempt > 1 {
            write!(
                f,
                "[提交 #{} {} 第{}次]",
                self.index, self.submission_id, self.attempt
            )
        } else {
            write!(f, "[提交 #{} {}]", self.index, self.submission_id)
        }
    }
}
