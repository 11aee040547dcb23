//! 预处理服务 - 业务能力层
//!
//! 只负责"原始附件 → 规范化文本"，不关心分类和评分

use std::sync::Arc;

use tracing::debug;

use crate::error::{PipelineError, PipelineResult};
use crate::infrastructure::{AudioBackend, AudioTranscript, DocumentBackend};
use crate::models::{
    Artifact, ArtifactFormat, AudioMetrics, Modality, NormalizedSubmission, Submission,
};

/// 行首这些符号统一转成 Markdown 列表
const BULLET_MARKERS: [char; 4] = ['*', '•', '·', '-'];

/// 预处理器
///
/// 职责：
/// - 校验附件格式（不支持的格式在调用任何后端之前就失败）
/// - PDF → Markdown，文本直接解码，录音 → 转写 + 语速指标
/// - 不修改原始提交
pub struct Preprocessor {
    documents: Arc<dyn DocumentBackend>,
    audio: Arc<dyn AudioBackend>,
}

impl Preprocessor {
    pub fn new(documents: Arc<dyn DocumentBackend>, audio: Arc<dyn AudioBackend>) -> Self {
        Self { documents, audio }
    }

    /// 规范化一个提交
    pub async fn normalize(&self, submission: &Submission) -> PipelineResult<NormalizedSubmission> {
        let response_format = detect(&submission.artifact)?;
        for extra in [&submission.questions, &submission.rubric].into_iter().flatten() {
            let format = detect(extra)?;
            if !format.is_document() {
                return Err(PipelineError::format(
                    &extra.file_name,
                    "试题和评分标准只能是文档",
                ));
            }
        }

        let (modality, content, audio) = match response_format {
            ArtifactFormat::Audio => {
                let transcript = self.transcribe(&submission.artifact).await?;
                let metrics = AudioMetrics::compute(
                    &transcript.text,
                    transcript.duration_secs,
                    transcript.voiced_secs,
                );
                debug!(
                    "录音 {} 转写完成: {:.1} 秒, {:.1} WPM, 静音占比 {:.1}%",
                    submission.artifact.file_name,
                    metrics.duration_secs,
                    metrics.words_per_minute,
                    metrics.silence_ratio * 100.0
                );
                (Modality::Audio, transcript.text, Some(metrics))
            }
            ArtifactFormat::Pdf => (
                Modality::Document,
                self.pdf_to_markdown(&submission.artifact).await?,
                None,
            ),
            ArtifactFormat::Text => (Modality::Text, decode_text(&submission.artifact)?, None),
        };

        let questions = match &submission.questions {
            Some(artifact) => Some(self.document_text(artifact).await?),
            None => None,
        };
        let rubric = match &submission.rubric {
            Some(artifact) => Some(self.document_text(artifact).await?),
            None => None,
        };

        Ok(NormalizedSubmission {
            submission_id: submission.id.clone(),
            exam_id: submission.exam_id.clone(),
            student_id: submission.student_id.clone(),
            modality,
            content,
            questions,
            rubric,
            declared_type: submission.declared_type,
            audio,
        })
    }

    /// 空录音直接得到空转写，不调用后端
    async fn transcribe(&self, artifact: &Artifact) -> PipelineResult<AudioTranscript> {
        if artifact.is_empty() {
            debug!("录音 {} 为空，跳过转写", artifact.file_name);
            return Ok(AudioTranscript::default());
        }
        self.audio
            .transcribe(artifact)
            .await
            .map_err(|e| PipelineError::preprocessing(&e))
    }

    async fn document_text(&self, artifact: &Artifact) -> PipelineResult<String> {
        match detect(artifact)? {
            ArtifactFormat::Pdf => self.pdf_to_markdown(artifact).await,
            ArtifactFormat::Text => decode_text(artifact),
            ArtifactFormat::Audio => Err(PipelineError::format(&artifact.file_name, "需要文档")),
        }
    }

    async fn pdf_to_markdown(&self, artifact: &Artifact) -> PipelineResult<String> {
        let pages = self
            .documents
            .extract_pages(artifact)
            .await
            .map_err(|e| PipelineError::preprocessing(&e))?;
        Ok(pages_to_markdown(&pages))
    }
}

fn detect(artifact: &Artifact) -> PipelineResult<ArtifactFormat> {
    artifact.format().ok_or_else(|| {
        PipelineError::format(&artifact.file_name, "仅支持 pdf / md / txt / 常见音频格式")
    })
}

fn decode_text(artifact: &Artifact) -> PipelineResult<String> {
    String::from_utf8(artifact.data.clone())
        .map_err(|_| PipelineError::format(&artifact.file_name, "不是有效的 UTF-8 文本"))
}

/// 把 PDF 每页文本渲染为 Markdown
pub fn pages_to_markdown(pages: &[String]) -> String {
    let mut out = String::new();
    for (i, page) in pages.iter().enumerate() {
        out.push_str(&format!("\n\n## Page {}\n", i + 1));
        out.push_str(&clean_text_formatting(page));
    }
    out.trim_start().to_string()
}

fn clean_text_formatting(text: &str) -> String {
    let cleaned: Vec<String> = text
        .split('\n')
        .map(|line| {
            let s = line.trim();
            if s.starts_with(BULLET_MARKERS) {
                format!("- {}", s.trim_start_matches(BULLET_MARKERS).trim())
            } else {
                s.to_string()
            }
        })
        .collect();

    cleaned.join("\n") + "\n"
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeDocs {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl DocumentBackend for FakeDocs {
        async fn extract_pages(&self, artifact: &Artifact) -> Result<Vec<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![String::from_utf8_lossy(&artifact.data).to_string()])
        }
    }

    struct FakeAudio;

    #[async_trait]
    impl AudioBackend for FakeAudio {
        async fn transcribe(&self, _artifact: &Artifact) -> Result<AudioTranscript> {
            Ok(AudioTranscript {
                text: "we help teams ship faster".to_string(),
                duration_secs: 3.0,
                voiced_secs: 3.0,
            })
        }
    }

    struct BrokenDocs;

    #[async_trait]
    impl DocumentBackend for BrokenDocs {
        async fn extract_pages(&self, _artifact: &Artifact) -> Result<Vec<String>> {
            anyhow::bail!("corrupted xref table")
        }
    }

    fn preprocessor(docs: Arc<dyn DocumentBackend>) -> Preprocessor {
        Preprocessor::new(docs, Arc::new(FakeAudio))
    }

    #[test]
    fn test_markdown_bullets_and_pages() {
        let pages = vec![
            "  Question 1  \n• first point\n* second point\n\n-third".to_string(),
            "Answer".to_string(),
        ];
        let md = pages_to_markdown(&pages);
        assert_eq!(
            md,
            "## Page 1\nQuestion 1\n- first point\n- second point\n\n- third\n\n\n## Page 2\nAnswer\n"
        );
    }

    #[tokio::test]
    async fn test_pdf_keeps_submission_id() {
        let docs = Arc::new(FakeDocs::default());
        let p = preprocessor(docs.clone());
        let submission = Submission::new(
            "sub-1",
            "exam",
            "stu",
            Artifact::new("answer.pdf", b"derivative of x^2 is 2x".to_vec()),
        );

        let ns = p.normalize(&submission).await.unwrap();
        assert_eq!(ns.submission_id, "sub-1");
        assert_eq!(ns.modality, Modality::Document);
        assert!(ns.content.contains("derivative of x^2 is 2x"));
        assert_eq!(docs.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unsupported_format_fails_before_backend() {
        let docs = Arc::new(FakeDocs::default());
        let p = preprocessor(docs.clone());
        let submission = Submission::new("s", "e", "u", Artifact::new("slides.pptx", vec![1, 2]));

        let err = p.normalize(&submission).await.unwrap_err();
        assert!(matches!(err, PipelineError::Format { .. }));
        assert_eq!(docs.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unsupported_rubric_fails_before_backend() {
        let docs = Arc::new(FakeDocs::default());
        let p = preprocessor(docs.clone());
        let submission = Submission::new("s", "e", "u", Artifact::new("a.pdf", b"x".to_vec()))
            .with_rubric(Artifact::new("rubric.mp3", vec![0]));

        let err = p.normalize(&submission).await.unwrap_err();
        assert!(matches!(err, PipelineError::Format { .. }));
        assert_eq!(docs.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invalid_utf8_text() {
        let p = preprocessor(Arc::new(FakeDocs::default()));
        let submission = Submission::new("s", "e", "u", Artifact::new("a.txt", vec![0xff, 0xfe]));
        let err = p.normalize(&submission).await.unwrap_err();
        assert!(matches!(err, PipelineError::Format { .. }));
    }

    /// 任何调用都记数并失败
    #[derive(Default)]
    struct UnreachableAudio {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AudioBackend for UnreachableAudio {
        async fn transcribe(&self, _artifact: &Artifact) -> Result<AudioTranscript> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("connection refused")
        }
    }

    #[tokio::test]
    async fn test_empty_audio_clip_skips_backend() {
        let audio = Arc::new(UnreachableAudio::default());
        let p = Preprocessor::new(Arc::new(FakeDocs::default()), audio.clone());
        let submission = Submission::new("s", "e", "u", Artifact::new("pitch.mp3", Vec::new()));

        let ns = p.normalize(&submission).await.unwrap();
        assert_eq!(ns.modality, Modality::Audio);
        assert_eq!(ns.content, "");
        assert_eq!(ns.audio.unwrap().words_per_minute, 0.0);
        assert_eq!(audio.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_non_empty_audio_uses_backend() {
        let audio = Arc::new(UnreachableAudio::default());
        let p = Preprocessor::new(Arc::new(FakeDocs::default()), audio.clone());
        let submission = Submission::new("s", "e", "u", Artifact::new("pitch.mp3", vec![1, 2, 3]));

        let err = p.normalize(&submission).await.unwrap_err();
        assert!(matches!(err, PipelineError::GradingFailed { .. }));
        assert_eq!(audio.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_backend_failure_is_preprocessing_error() {
        let p = preprocessor(Arc::new(BrokenDocs));
        let submission = Submission::new("s", "e", "u", Artifact::new("a.pdf", b"x".to_vec()));

        let err = p.normalize(&submission).await.unwrap_err();
        match err {
            PipelineError::GradingFailed {
                cause: crate::error::GradingFailure::Preprocessing { message },
            } => assert!(message.contains("corrupted xref table")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_questions_and_rubric_are_normalized() {
        let p = preprocessor(Arc::new(FakeDocs::default()));
        let submission = Submission::new("s", "e", "u", Artifact::text("my essay"))
            .with_questions(Artifact::new("q.pdf", b"Q1. Discuss".to_vec()))
            .with_rubric(Artifact::new("r.md", b"* clarity".to_vec()));

        let ns = p.normalize(&submission).await.unwrap();
        assert_eq!(ns.modality, Modality::Text);
        assert_eq!(ns.questions.as_deref(), Some("## Page 1\nQ1. Discuss\n"));
        assert_eq!(ns.rubric.as_deref(), Some("* clarity"));
    }
}
