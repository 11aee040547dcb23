//! 结果导出服务 - 业务能力层
//!
//! 只负责把单个提交的报告写到输出目录：
//! - `<提交ID>.json`：完整报告
//! - `<提交ID>.csv`：评分细项（仅评分成功时）

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::models::GradingResult;

/// CSV 行
#[derive(Debug, Serialize)]
struct CsvRow {
    #[serde(rename = "Part")]
    part: String,
    #[serde(rename = "Score")]
    score: String,
    #[serde(rename = "Max Score")]
    max_score: String,
    #[serde(rename = "Feedback")]
    feedback: String,
}

/// 结果导出服务
pub struct ReportWriter {
    output_dir: PathBuf,
}

impl ReportWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// 写入 JSON 报告，返回文件路径
    pub async fn write_json(&self, submission_id: &str, report: &JsonValue) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .with_context(|| format!("无法创建输出目录 {}", self.output_dir.display()))?;

        let path = self.output_dir.join(format!("{}.json", file_stem(submission_id)));
        let body = serde_json::to_string_pretty(report)?;
        tokio::fs::write(&path, body)
            .await
            .with_context(|| format!("无法写入 {}", path.display()))?;

        debug!("JSON 报告已写入: {}", path.display());
        Ok(path)
    }

    /// 写入评分细项 CSV，返回文件路径
    pub async fn write_csv(&self, result: &GradingResult) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .with_context(|| format!("无法创建输出目录 {}", self.output_dir.display()))?;

        let path = self
            .output_dir
            .join(format!("{}.csv", file_stem(&result.submission_id)));
        tokio::fs::write(&path, render_csv(result)?)
            .await
            .with_context(|| format!("无法写入 {}", path.display()))?;

        debug!("CSV 报告已写入: {}", path.display());
        Ok(path)
    }
}

/// 渲染 CSV：每个评分细项一行，录音提交追加一行 "Audio Metrics"
pub fn render_csv(result: &GradingResult) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    for item in &result.items {
        writer.serialize(CsvRow {
            part: item.name.clone(),
            score: item.score.to_string(),
            max_score: item.max_score.to_string(),
            feedback: item.feedback.clone(),
        })?;
    }

    if let Some(metrics) = &result.audio_metrics {
        writer.serialize(CsvRow {
            part: "Audio Metrics".to_string(),
            score: String::new(),
            max_score: String::new(),
            feedback: format!(
                "duration={:.1}s wpm={:.1} silence_ratio={:.2}",
                metrics.duration_secs, metrics.words_per_minute, metrics.silence_ratio
            ),
        })?;
    }

    writer.into_inner().context("CSV 缓冲区写入失败")
}

/// 提交ID中的路径分隔符替换掉，避免写出输出目录
fn file_stem(submission_id: &str) -> String {
    submission_id
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            c => c,
        })
        .collect()
}
