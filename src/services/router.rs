//! 路由分发 - 业务能力层
//!
//! 只负责"把已通过护栏的提交交给对应的专项处理器"，每次最多调用一次处理器

use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{GradingFailure, PipelineError, PipelineResult};
use crate::handlers::HandlerRegistry;
use crate::models::{ExamType, GradingResult, GuardrailVerdict, NormalizedSubmission};

/// 路由器
pub struct Router {
    registry: Arc<HandlerRegistry>,
}

impl Router {
    pub fn new(registry: Arc<HandlerRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// 无截止时间的分发
    pub async fn dispatch(
        &self,
        ns: &NormalizedSubmission,
        exam_type: ExamType,
        verdict: &GuardrailVerdict,
    ) -> PipelineResult<GradingResult> {
        self.dispatch_until(ns, exam_type, verdict, None).await
    }

    /// 分发到专项处理器
    ///
    /// - 护栏未通过：直接拒绝，不调用处理器
    /// - 未注册处理器：`HandlerUnavailable`
    /// - 超过截止时间：`GradingFailed{Timeout}`
    pub async fn dispatch_until(
        &self,
        ns: &NormalizedSubmission,
        exam_type: ExamType,
        verdict: &GuardrailVerdict,
        deadline: Option<Instant>,
    ) -> PipelineResult<GradingResult> {
        if verdict.failed() {
            return Err(PipelineError::GuardrailRejected {
                violations: verdict.violated_rules(),
            });
        }

        let handler = self
            .registry
            .get(exam_type)
            .ok_or(PipelineError::HandlerUnavailable { exam_type })?;

        debug!("{} 分发到处理器 {}", ns.submission_id, handler.name());

        let graded = match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, handler.grade(ns))
                .await
                .map_err(|_| PipelineError::timeout("handler"))?,
            None => handler.grade(ns).await,
        };

        let result = graded?;

        // 处理器返回的结果必须属于本次提交
        if result.submission_id != ns.submission_id || result.exam_type != exam_type {
            warn!(
                "处理器 {} 返回了不匹配的结果: {} / {}",
                handler.name(),
                result.submission_id,
                result.exam_type
            );
            return Err(GradingFailure::InvalidResponse {
                message: format!(
                    "结果 {}/{} 与请求 {}/{} 不匹配",
                    result.submission_id, result.exam_type, ns.submission_id, exam_type
                ),
            }
            .into());
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::GradingHandler;
    use crate::models::{Modality, RuleCategory, RuleViolation};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingHandler {
        calls: AtomicUsize,
        delay: Duration,
    }

    impl CountingHandler {
        fn new(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                delay,
            })
        }
    }

    #[async_trait]
    impl GradingHandler for CountingHandler {
        fn name(&self) -> &str {
            "counting"
        }

        async fn grade(&self, ns: &NormalizedSubmission) -> Result<GradingResult, GradingFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(GradingResult {
                submission_id: ns.submission_id.clone(),
                exam_type: ExamType::Technical,
                handler: self.name().to_string(),
                score: 8.0,
                max_score: 10.0,
                rationale: "ok".to_string(),
                items: Vec::new(),
                audio_metrics: None,
                graded_at: Utc::now(),
            })
        }
    }

    fn ns() -> NormalizedSubmission {
        NormalizedSubmission {
            submission_id: "sub-1".to_string(),
            exam_id: "exam".to_string(),
            student_id: "stu".to_string(),
            modality: Modality::Text,
            content: "derivative of x^2 is 2x".to_string(),
            questions: None,
            rubric: None,
            declared_type: None,
            audio: None,
        }
    }

    fn router_with(handler: Arc<CountingHandler>) -> Router {
        let registry = HandlerRegistry::builder()
            .register(ExamType::Technical, handler)
            .build();
        Router::new(Arc::new(registry))
    }

    #[tokio::test]
    async fn test_dispatch_invokes_handler_once() {
        let handler = CountingHandler::new(Duration::ZERO);
        let router = router_with(handler.clone());

        let result = router
            .dispatch(&ns(), ExamType::Technical, &GuardrailVerdict::default())
            .await
            .unwrap();

        assert_eq!(result.score, 8.0);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rejected_verdict_skips_handler() {
        let handler = CountingHandler::new(Duration::ZERO);
        let router = router_with(handler.clone());
        let verdict = GuardrailVerdict {
            violations: vec![RuleViolation {
                rule: "min_length".to_string(),
                category: RuleCategory::Soft,
                message: "too short".to_string(),
            }],
        };

        let err = router
            .dispatch(&ns(), ExamType::Technical, &verdict)
            .await
            .unwrap_err();

        match err {
            PipelineError::GuardrailRejected { violations } => {
                assert_eq!(violations, vec!["min_length".to_string()])
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_handler_is_unavailable() {
        let router = router_with(CountingHandler::new(Duration::ZERO));

        let err = router
            .dispatch(&ns(), ExamType::Narrative, &GuardrailVerdict::default())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PipelineError::HandlerUnavailable {
                exam_type: ExamType::Narrative
            }
        ));
    }

    #[tokio::test]
    async fn test_mismatched_result_is_invalid() {
        let handler = CountingHandler::new(Duration::ZERO);
        let registry = HandlerRegistry::builder()
            .register(ExamType::Narrative, handler)
            .build();
        let router = Router::new(Arc::new(registry));

        let err = router
            .dispatch(&ns(), ExamType::Narrative, &GuardrailVerdict::default())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PipelineError::GradingFailed {
                cause: GradingFailure::InvalidResponse { .. }
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_times_out_handler() {
        let handler = CountingHandler::new(Duration::from_secs(30));
        let router = router_with(handler);
        let deadline = Instant::now() + Duration::from_secs(1);

        let err = router
            .dispatch_until(
                &ns(),
                ExamType::Technical,
                &GuardrailVerdict::default(),
                Some(deadline),
            )
            .await
            .unwrap_err();

        assert!(err.is_transient());
        assert!(matches!(
            err,
            PipelineError::GradingFailed {
                cause: GradingFailure::Timeout { .. }
            }
        ));
    }
}
