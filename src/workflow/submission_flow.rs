//! 提交处理流程 - 流程层
//!
//! 核心职责：定义"一个提交"的完整处理流程
//!
//! 流程顺序：
//! 1. 预处理（原始附件 → 规范化文本）
//! 2. 分类（确定考试类型）
//! 3. 护栏检查
//! 4. 路由到专项处理器评分
//!
//! 流程内部不重试，任何错误都是本次运行的终态

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value as JsonValue};
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{PipelineError, PipelineResult};
use crate::handlers::HandlerRegistry;
use crate::infrastructure::{AudioBackend, DocumentBackend};
use crate::models::{ExamType, GradingResult, GuardrailVerdict, NormalizedSubmission, Submission};
use crate::services::{Classifier, GuardrailChecker, Preprocessor, Router};
use crate::utils::logging::truncate_text;
use crate::workflow::state::{StateTracker, SubmissionState};
use crate::workflow::submission_ctx::SubmissionCtx;

/// 单个提交的终态
#[derive(Debug, Clone)]
pub enum Outcome {
    /// 评分完成
    Graded(GradingResult),
    /// 护栏拒绝（违规规则ID，按检查顺序）
    Rejected(Vec<String>),
    /// 其他失败
    Failed(PipelineError),
}

/// 单个提交的处理报告
#[derive(Debug, Clone)]
pub struct SubmissionReport {
    pub submission_id: String,
    pub exam_type: Option<ExamType>,
    pub verdict: Option<GuardrailVerdict>,
    pub history: Vec<SubmissionState>,
    pub outcome: Outcome,
}

impl SubmissionReport {
    pub fn result(&self) -> Option<&GradingResult> {
        match &self.outcome {
            Outcome::Graded(result) => Some(result),
            _ => None,
        }
    }

    /// 以流水线错误的形式返回非成功终态
    pub fn error(&self) -> Option<PipelineError> {
        match &self.outcome {
            Outcome::Graded(_) => None,
            Outcome::Rejected(violations) => Some(PipelineError::GuardrailRejected {
                violations: violations.clone(),
            }),
            Outcome::Failed(err) => Some(err.clone()),
        }
    }

    pub fn is_graded(&self) -> bool {
        matches!(self.outcome, Outcome::Graded(_))
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self.outcome, Outcome::Rejected(_))
    }

    /// 调用方是否可以整体重试
    pub fn is_transient(&self) -> bool {
        matches!(&self.outcome, Outcome::Failed(err) if err.is_transient())
    }

    pub fn final_state(&self) -> SubmissionState {
        self.history.last().copied().unwrap_or(SubmissionState::Raw)
    }

    /// 导出为 JSON 报告
    pub fn to_json(&self) -> JsonValue {
        let mut report = json!({
            "submission_id": self.submission_id,
            "exam_type": self.exam_type,
            "state": self.final_state(),
            "history": self.history,
            "verdict": self.verdict,
        });

        match &self.outcome {
            Outcome::Graded(result) => {
                report["status"] = json!("graded");
                report["result"] = json!(result);
            }
            Outcome::Rejected(violations) => {
                report["status"] = json!("rejected");
                report["violations"] = json!(violations);
            }
            Outcome::Failed(err) => {
                report["status"] = json!("failed");
                report["error"] = json!({
                    "kind": err.kind(),
                    "message": err.to_string(),
                    "transient": err.is_transient(),
                });
            }
        }

        report
    }
}

/// 提交处理流程
///
/// - 编排预处理、分类、护栏、路由
/// - 记录状态轨迹
/// - 在阻塞边界上执行请求截止时间
pub struct SubmissionFlow {
    preprocessor: Preprocessor,
    classifier: Classifier,
    guardrails: GuardrailChecker,
    router: Router,
    request_timeout: Option<Duration>,
    verbose_logging: bool,
}

impl SubmissionFlow {
    pub fn new(
        preprocessor: Preprocessor,
        classifier: Classifier,
        guardrails: GuardrailChecker,
        router: Router,
    ) -> Self {
        Self {
            preprocessor,
            classifier,
            guardrails,
            router,
            request_timeout: None,
            verbose_logging: false,
        }
    }

    /// 按配置组装流程
    pub fn from_config(
        config: &Config,
        registry: Arc<HandlerRegistry>,
        documents: Arc<dyn DocumentBackend>,
        audio: Arc<dyn AudioBackend>,
    ) -> Self {
        let mut flow = Self::new(
            Preprocessor::new(documents, audio),
            Classifier::new(config.confidence_threshold),
            GuardrailChecker::from_config(&config.guardrails),
            Router::new(registry),
        );
        flow.request_timeout = config.request_timeout_secs.map(Duration::from_secs);
        flow.verbose_logging = config.verbose_logging;
        flow
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn with_verbose_logging(mut self, verbose: bool) -> Self {
        self.verbose_logging = verbose;
        self
    }

    /// 处理一个提交，总是返回报告
    pub async fn run(&self, submission: &Submission, ctx: &SubmissionCtx) -> SubmissionReport {
        let deadline = self.request_timeout.map(|t| Instant::now() + t);
        let mut tracker = StateTracker::new();
        let mut exam_type = None;
        let mut verdict = None;

        let outcome = match self
            .execute(submission, ctx, deadline, &mut tracker, &mut exam_type, &mut verdict)
            .await
        {
            Ok(result) => {
                tracker.advance(SubmissionState::Graded);
                info!(
                    "{} ✅ 评分完成: {:.1}/{:.1} ({})",
                    ctx, result.score, result.max_score, result.handler
                );
                Outcome::Graded(result)
            }
            Err(PipelineError::GuardrailRejected { violations }) => {
                tracker.advance(SubmissionState::Rejected);
                warn!("{} 🚫 护栏拒绝: {}", ctx, violations.join(", "));
                Outcome::Rejected(violations)
            }
            Err(err) => {
                tracker.advance(SubmissionState::Failed);
                error!("{} ❌ 处理失败 [{}]: {}", ctx, err.kind(), err);
                Outcome::Failed(err)
            }
        };

        SubmissionReport {
            submission_id: submission.id.clone(),
            exam_type,
            verdict,
            history: tracker.into_history(),
            outcome,
        }
    }

    async fn execute(
        &self,
        submission: &Submission,
        ctx: &SubmissionCtx,
        deadline: Option<Instant>,
        tracker: &mut StateTracker,
        exam_type_slot: &mut Option<ExamType>,
        verdict_slot: &mut Option<GuardrailVerdict>,
    ) -> PipelineResult<GradingResult> {
        // ========== 1. 预处理 ==========
        info!("{} 📄 预处理 {}", ctx, submission.artifact.file_name);
        let ns = self.normalize_until(submission, deadline).await?;
        tracker.advance(SubmissionState::Normalized);
        self.log_content(ctx, &ns);

        // ========== 2. 分类 ==========
        let exam_type = self.classifier.classify(&ns)?;
        tracker.advance(SubmissionState::Classified);
        *exam_type_slot = Some(exam_type);
        info!("{} 🏷️ 分类为 {}", ctx, exam_type.display_name());

        // ========== 3. 护栏检查 ==========
        let verdict = self.guardrails.check(&ns, exam_type);
        tracker.advance(SubmissionState::GuardrailChecked);
        *verdict_slot = Some(verdict.clone());

        // ========== 4. 路由评分 ==========
        self.router
            .dispatch_until(&ns, exam_type, &verdict, deadline)
            .await
    }

    async fn normalize_until(
        &self,
        submission: &Submission,
        deadline: Option<Instant>,
    ) -> PipelineResult<NormalizedSubmission> {
        match deadline {
            Some(deadline) => {
                tokio::time::timeout_at(deadline, self.preprocessor.normalize(submission))
                    .await
                    .map_err(|_| PipelineError::timeout("preprocess"))?
            }
            None => self.preprocessor.normalize(submission).await,
        }
    }

    fn log_content(&self, ctx: &SubmissionCtx, ns: &NormalizedSubmission) {
        if self.verbose_logging {
            info!(
                "{} 内容 ({} 字符): {}",
                ctx,
                ns.content_len(),
                truncate_text(ns.content.trim(), 80)
            );
        }
    }
}
