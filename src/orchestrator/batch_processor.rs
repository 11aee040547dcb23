//! 批量评分处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责批量提交的评分和资源管理。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：运行日志、处理器注册表、预处理后端
//! 2. **批量加载**：扫描提交清单（`Vec<Submission>`）
//! 3. **并发控制**：使用 Semaphore 限制并发数量
//! 4. **分批处理**：每批完成后再开始下一批
//! 5. **调用方重试**：仅对瞬时失败整体重试，指数退避
//! 6. **结果落盘**：JSON / CSV 报告、人工复核队列、全局统计

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use futures::future::join_all;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::handlers::HandlerRegistry;
use crate::infrastructure::{
    AudioBackend, CachedAudioBackend, DocumentBackend, PdfExtractBackend, WhisperBackend,
};
use crate::models::Submission;
use crate::services::{ReportWriter, ReviewWriter};
use crate::utils::logging::{
    init_log_file, log_batch_complete, log_batch_start, log_startup, log_submissions_loaded,
    print_final_stats,
};
use crate::workflow::{Outcome, SubmissionCtx, SubmissionFlow, SubmissionReport};

/// 应用主结构
pub struct App {
    config: Config,
    flow: Arc<SubmissionFlow>,
    reports: Arc<ReportWriter>,
    review: Arc<ReviewWriter>,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        init_log_file(&config.output_log_file)
            .with_context(|| format!("无法创建日志文件 {}", config.output_log_file))?;

        let missing = config.missing_handlers();
        if !missing.is_empty() {
            let names: Vec<&str> = missing.iter().map(|t| t.as_str()).collect();
            bail!("以下考试类型没有配置处理器: {}", names.join(", "));
        }

        let registry = HandlerRegistry::from_config(&config);
        log_startup(config.max_concurrent_submissions, registry.len());

        let documents: Arc<dyn DocumentBackend> = Arc::new(PdfExtractBackend::new());
        let whisper = WhisperBackend::new(&config.llm)?;
        let audio: Arc<dyn AudioBackend> = match &config.transcript_cache_dir {
            Some(dir) => {
                info!("🗂️ 转写缓存目录: {}", dir);
                Arc::new(CachedAudioBackend::new(whisper, dir))
            }
            None => Arc::new(whisper),
        };

        let flow = SubmissionFlow::from_config(&config, Arc::new(registry), documents, audio);
        Ok(Self::with_flow(config, flow))
    }

    /// 使用已组装好的流程创建（测试或自定义后端时使用）
    pub fn with_flow(config: Config, flow: SubmissionFlow) -> Self {
        Self {
            reports: Arc::new(ReportWriter::new(&config.output_dir)),
            review: Arc::new(ReviewWriter::with_path(&config.manual_review_file)),
            flow: Arc::new(flow),
            config,
        }
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<ProcessingStats> {
        let submissions = self.load_submissions().await?;

        if submissions.is_empty() {
            warn!("⚠️ 没有找到待处理的提交清单，程序结束");
            return Ok(ProcessingStats::default());
        }

        log_submissions_loaded(submissions.len(), self.config.max_concurrent_submissions);

        let stats = self.process_all(submissions).await?;

        print_final_stats(
            stats.graded,
            stats.rejected,
            stats.failed,
            stats.total,
            &self.config.output_log_file,
        );

        Ok(stats)
    }

    /// 加载提交清单
    async fn load_submissions(&self) -> Result<Vec<Submission>> {
        info!("📁 正在扫描待评分的提交...");
        crate::models::load_all_manifests(Path::new(&self.config.submissions_dir)).await
    }

    /// 分批处理所有提交
    pub async fn process_all(&self, submissions: Vec<Submission>) -> Result<ProcessingStats> {
        let batch_size = self.config.max_concurrent_submissions.max(1);
        let semaphore = Arc::new(Semaphore::new(batch_size));
        let total = submissions.len();
        let total_batches = total.div_ceil(batch_size);
        let mut stats = ProcessingStats {
            total,
            ..Default::default()
        };

        for (batch_idx, batch) in submissions.chunks(batch_size).enumerate() {
            let batch_start = batch_idx * batch_size;
            log_batch_start(
                batch_idx + 1,
                total_batches,
                batch_start + 1,
                batch_start + batch.len(),
                total,
            );

            let batch_stats = self
                .process_batch(batch, batch_start, semaphore.clone())
                .await?;

            log_batch_complete(
                batch_idx + 1,
                batch_stats.graded,
                batch_stats.rejected,
                batch_stats.failed,
            );
            stats.merge(&batch_stats);
        }

        Ok(stats)
    }

    /// 处理单个批次
    async fn process_batch(
        &self,
        batch: &[Submission],
        batch_start: usize,
        semaphore: Arc<Semaphore>,
    ) -> Result<ProcessingStats> {
        let mut handles = Vec::with_capacity(batch.len());

        for (idx, submission) in batch.iter().enumerate() {
            let permit = semaphore.clone().acquire_owned().await?;
            let label = submission.id.clone();
            let ctx = SubmissionCtx::new(&submission.id, batch_start + idx + 1);
            let submission = submission.clone();
            let flow = self.flow.clone();
            let retry = RetryPolicy::from_config(&self.config);

            let handle = tokio::spawn(async move {
                let _permit = permit;
                run_with_retry(&flow, &submission, ctx, retry).await
            });
            handles.push((label, handle));
        }

        let mut stats = ProcessingStats {
            total: batch.len(),
            ..Default::default()
        };

        let (labels, handles): (Vec<String>, Vec<_>) = handles.into_iter().unzip();
        let joined = join_all(handles).await;

        for (label, joined) in labels.into_iter().zip(joined) {
            match joined {
                Ok(report) => {
                    stats.record(&report);
                    self.persist(&report).await;
                }
                Err(e) => {
                    error!("[提交 {}] 任务执行失败: {}", label, e);
                    stats.failed += 1;
                }
            }
        }

        Ok(stats)
    }

    /// 写出报告；失败和分类不确定的提交进入人工复核
    async fn persist(&self, report: &SubmissionReport) {
        if let Err(e) = self
            .reports
            .write_json(&report.submission_id, &report.to_json())
            .await
        {
            warn!("{} JSON 报告写入失败: {:#}", report.submission_id, e);
        }

        if let Some(result) = report.result() {
            if let Err(e) = self.reports.write_csv(result).await {
                warn!("{} CSV 报告写入失败: {:#}", report.submission_id, e);
            }
        }

        if let Outcome::Failed(err) = &report.outcome {
            if let Err(e) = self
                .review
                .write(&report.submission_id, err.kind(), &err.to_string())
                .await
            {
                warn!("{} 写入复核队列失败: {:#}", report.submission_id, e);
            }
        }

        if let Err(e) = self.append_run_log(report).await {
            warn!("写入运行日志失败: {:#}", e);
        }
    }

    async fn append_run_log(&self, report: &SubmissionReport) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.config.output_log_file)
            .await?;

        let line = match &report.outcome {
            Outcome::Graded(result) => format!(
                "✅ {} | {} | {:.1}/{:.1}\n",
                report.submission_id, result.exam_type, result.score, result.max_score
            ),
            Outcome::Rejected(violations) => format!(
                "🚫 {} | 拒绝 | {}\n",
                report.submission_id,
                violations.join(", ")
            ),
            Outcome::Failed(err) => {
                format!("❌ {} | {} | {}\n", report.submission_id, err.kind(), err)
            }
        };

        file.write_all(line.as_bytes()).await?;
        Ok(())
    }
}

/// 调用方重试策略
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// 额外重试次数（0 表示只跑一次）
    pub attempts: u32,
    /// 首次重试等待
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            attempts: config.retry_attempts,
            backoff: Duration::try_from_secs_f64(config.retry_backoff_secs).unwrap_or_default(),
        }
    }

    /// 第 n 次重试（从0开始）前的等待时间：backoff × 2^n
    pub fn delay(&self, retry: u32) -> Duration {
        self.backoff.saturating_mul(2u32.saturating_pow(retry))
    }
}

/// 运行流程，只对瞬时失败整体重试
pub async fn run_with_retry(
    flow: &SubmissionFlow,
    submission: &Submission,
    mut ctx: SubmissionCtx,
    policy: RetryPolicy,
) -> SubmissionReport {
    let mut retry = 0;
    loop {
        let report = flow.run(submission, &ctx).await;
        if !report.is_transient() || retry >= policy.attempts {
            return report;
        }

        let delay = policy.delay(retry);
        warn!("{} 🔁 瞬时失败，{:.1} 秒后重试", ctx, delay.as_secs_f64());
        tokio::time::sleep(delay).await;
        retry += 1;
        ctx = ctx.next_attempt();
    }
}

/// 处理统计
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProcessingStats {
    pub graded: usize,
    pub rejected: usize,
    pub failed: usize,
    pub total: usize,
}

impl ProcessingStats {
    fn record(&mut self, report: &SubmissionReport) {
        match report.outcome {
            Outcome::Graded(_) => self.graded += 1,
            Outcome::Rejected(_) => self.rejected += 1,
            Outcome::Failed(_) => self.failed += 1,
        }
    }

    fn merge(&mut self, other: &ProcessingStats) {
        self.graded += other.graded;
        self.rejected += other.rejected;
        self.failed += other.failed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_delay_doubles() {
        let policy = RetryPolicy {
            attempts: 3,
            backoff: Duration::from_secs(2),
        };
        assert_eq!(policy.delay(0), Duration::from_secs(2));
        assert_eq!(policy.delay(1), Duration::from_secs(4));
        assert_eq!(policy.delay(2), Duration::from_secs(8));
    }

    #[test]
    fn test_retry_policy_from_config() {
        let mut config = Config::from_toml_str(
            "confidence_threshold = 0.5\nretry_attempts = 2\nretry_backoff_secs = 1.5\n[guardrails]\nmin_length = 1\n",
        )
        .unwrap();
        let policy = RetryPolicy::from_config(&config);
        assert_eq!(policy.attempts, 2);
        assert_eq!(policy.backoff, Duration::from_millis(1500));

        // 绕过校验直接改字段也不会 panic
        config.retry_backoff_secs = f64::INFINITY;
        assert_eq!(RetryPolicy::from_config(&config).backoff, Duration::ZERO);
        config.retry_backoff_secs = -3.0;
        assert_eq!(RetryPolicy::from_config(&config).backoff, Duration::ZERO);
    }
}
