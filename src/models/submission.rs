use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::exam_type::ExamType;

/// 附件格式（由文件扩展名决定）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactFormat {
    /// PDF 文档
    Pdf,
    /// 纯文本 / Markdown
    Text,
    /// 音频录音
    Audio,
}

impl ArtifactFormat {
    /// 根据文件名识别格式，不支持的扩展名返回 None
    pub fn detect(file_name: &str) -> Option<Self> {
        let ext = Path::new(file_name)
            .extension()
            .and_then(|s| s.to_str())?
            .to_lowercase();

        match ext.as_str() {
            "pdf" => Some(ArtifactFormat::Pdf),
            "md" | "markdown" | "txt" => Some(ArtifactFormat::Text),
            "mp3" | "wav" | "m4a" | "ogg" | "webm" | "flac" => Some(ArtifactFormat::Audio),
            _ => None,
        }
    }

    pub fn is_document(self) -> bool {
        matches!(self, ArtifactFormat::Pdf | ArtifactFormat::Text)
    }
}

/// 原始附件：文件名 + 字节内容
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub file_name: String,
    pub data: Vec<u8>,
}

impl Artifact {
    pub fn new(file_name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            data: data.into(),
        }
    }

    /// 直接以文本作为附件（按 Markdown 处理）
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            file_name: "inline.md".to_string(),
            data: content.into().into_bytes(),
        }
    }

    /// 从磁盘读取附件
    pub async fn from_path(path: &Path) -> Result<Self> {
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("无法读取附件: {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self { file_name, data })
    }

    /// 识别附件格式
    pub fn format(&self) -> Option<ArtifactFormat> {
        ArtifactFormat::detect(&self.file_name)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// 学生提交
///
/// 创建后不可变：预处理只会派生新的对象，不会修改原提交
#[derive(Debug, Clone)]
pub struct Submission {
    /// 提交ID
    pub id: String,
    /// 考试ID
    pub exam_id: String,
    /// 学生ID
    pub student_id: String,
    /// 提交时间
    pub submitted_at: DateTime<Utc>,
    /// 学生作答（文档或录音）
    pub artifact: Artifact,
    /// 试题（可选）
    pub questions: Option<Artifact>,
    /// 评分标准（可选）
    pub rubric: Option<Artifact>,
    /// 提交方声明的考试类型（可选）
    pub declared_type: Option<ExamType>,
}

impl Submission {
    /// 创建新的提交，提交时间取当前时间
    pub fn new(
        id: impl Into<String>,
        exam_id: impl Into<String>,
        student_id: impl Into<String>,
        artifact: Artifact,
    ) -> Self {
        Self {
            id: id.into(),
            exam_id: exam_id.into(),
            student_id: student_id.into(),
            submitted_at: Utc::now(),
            artifact,
            questions: None,
            rubric: None,
            declared_type: None,
        }
    }

    pub fn with_questions(mut self, questions: Artifact) -> Self {
        self.questions = Some(questions);
        self
    }

    pub fn with_rubric(mut self, rubric: Artifact) -> Self {
        self.rubric = Some(rubric);
        self
    }

    pub fn with_declared_type(mut self, exam_type: ExamType) -> Self {
        self.declared_type = Some(exam_type);
        self
    }

    pub fn with_submitted_at(mut self, submitted_at: DateTime<Utc>) -> Self {
        self.submitted_at = submitted_at;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_format() {
        assert_eq!(ArtifactFormat::detect("exam.PDF"), Some(ArtifactFormat::Pdf));
        assert_eq!(ArtifactFormat::detect("answers.md"), Some(ArtifactFormat::Text));
        assert_eq!(ArtifactFormat::detect("pitch.mp3"), Some(ArtifactFormat::Audio));
        assert_eq!(ArtifactFormat::detect("slides.pptx"), None);
        assert_eq!(ArtifactFormat::detect("no_extension"), None);
    }

    #[test]
    fn test_inline_text_is_document() {
        let artifact = Artifact::text("hello");
        assert_eq!(artifact.format(), Some(ArtifactFormat::Text));
        assert!(artifact.format().unwrap().is_document());
    }
}
