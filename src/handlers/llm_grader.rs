use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::error::GradingFailure;
use crate::handlers::prompts::build_messages;
use crate::handlers::response_parser::{parse_exam_response, parse_pitch_response, ParsedGrade};
use crate::handlers::GradingHandler;
use crate::models::{ExamType, GradingResult, NormalizedSubmission};
use crate::services::LlmService;

/// 基于 LLM 的专项评分处理器
///
/// 每种考试类型一个实例，提示词与响应格式按类型区分
pub struct LlmGrader {
    exam_type: ExamType,
    name: String,
    llm: LlmService,
}

impl LlmGrader {
    pub fn new(exam_type: ExamType, llm: LlmService) -> Self {
        Self {
            exam_type,
            name: format!("llm:{}", exam_type.as_str()),
            llm,
        }
    }

    fn parse(&self, raw: &str) -> Result<ParsedGrade, String> {
        match self.exam_type {
            ExamType::Presentation => parse_pitch_response(raw),
            ExamType::Technical | ExamType::Narrative => parse_exam_response(raw),
        }
    }

    /// 把 LLM 原始响应转换为评分结果
    fn to_result(
        &self,
        ns: &NormalizedSubmission,
        raw: &str,
    ) -> Result<GradingResult, GradingFailure> {
        let grade = self.parse(raw).map_err(|message| {
            warn!("{} 响应解析失败: {}", self.name, message);
            GradingFailure::InvalidResponse { message }
        })?;

        Ok(GradingResult {
            submission_id: ns.submission_id.clone(),
            exam_type: self.exam_type,
            handler: self.name.clone(),
            score: grade.score,
            max_score: grade.max_score,
            rationale: grade.rationale,
            items: grade.items,
            audio_metrics: ns.audio,
            graded_at: Utc::now(),
        })
    }
}

#[async_trait]
impl GradingHandler for LlmGrader {
    fn name(&self) -> &str {
        &self.name
    }

    async fn grade(&self, ns: &NormalizedSubmission) -> Result<GradingResult, GradingFailure> {
        let (system, user) = build_messages(self.exam_type, ns);
        debug!("{} 提示词长度: {} 字符", self.name, user.len());

        let raw = self
            .llm
            .send_to_llm(&user, Some(&system))
            .await
            .map_err(|e| GradingFailure::Upstream {
                message: format!("{:#}", e),
            })?;

        let result = self.to_result(ns, &raw)?;
        info!(
            "✅ {} 评分完成: {:.1}/{:.1}",
            ns.submission_id, result.score, result.max_score
        );
        Ok(result)
    }
}
