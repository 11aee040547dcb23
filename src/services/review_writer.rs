//! 人工复核写入服务 - 业务能力层
//!
//! 只负责"追加写复核清单"能力，不关心流程

use anyhow::{Context, Result};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// 人工复核写入服务
///
/// 职责：
/// - 将无法自动评分的提交追加写入复核文件
/// - 每次只写一个提交
pub struct ReviewWriter {
    review_file_path: String,
}

impl ReviewWriter {
    /// 使用自定义文件路径创建
    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            review_file_path: path.into(),
        }
    }

    pub fn path(&self) -> &str {
        &self.review_file_path
    }

    /// 写入一条复核记录
    ///
    /// # 参数
    /// - `submission_id`: 提交ID
    /// - `reason`: 错误类别（如 `classification_ambiguous`）
    /// - `detail`: 错误详情
    pub async fn write(&self, submission_id: &str, reason: &str, detail: &str) -> Result<()> {
        debug!("写入复核记录: 提交 {} | 原因 {}", submission_id, reason);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.review_file_path)
            .await
            .with_context(|| format!("无法打开复核文件 {}", self.review_file_path))?;

        let line = format!(
            "{} | 提交 {} | 原因 {} | {}\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            submission_id,
            reason,
            detail.replace('\n', " ")
        );

        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        Ok(())
    }
}

impl Default for ReviewWriter {
    fn default() -> Self {
        Self::with_path("manual_review.txt")
    }
}
