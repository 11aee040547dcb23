use crate::models::exam_type::ExamType;
use crate::models::submission::{Artifact, Submission};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::fs;

/// 提交清单（TOML）
///
/// 路径相对于清单文件所在目录
#[derive(Debug, Clone, Deserialize)]
pub struct SubmissionManifest {
    pub id: String,
    pub exam_id: String,
    pub student_id: String,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
    /// 学生作答文件
    pub response: PathBuf,
    #[serde(default)]
    pub questions: Option<PathBuf>,
    #[serde(default)]
    pub rubric: Option<PathBuf>,
    /// 声明的考试类型（可选）
    #[serde(default)]
    pub exam_type: Option<String>,
}

impl SubmissionManifest {
    /// 读取清单引用的所有文件，构造 `Submission`
    pub async fn into_submission(self, base_dir: &Path) -> Result<Submission> {
        let artifact = Artifact::from_path(&base_dir.join(&self.response)).await?;

        let mut submission = Submission::new(self.id, self.exam_id, self.student_id, artifact);

        if let Some(at) = self.submitted_at {
            submission = submission.with_submitted_at(at);
        }
        if let Some(path) = &self.questions {
            submission = submission.with_questions(Artifact::from_path(&base_dir.join(path)).await?);
        }
        if let Some(path) = &self.rubric {
            submission = submission.with_rubric(Artifact::from_path(&base_dir.join(path)).await?);
        }
        if let Some(raw) = &self.exam_type {
            let exam_type = ExamType::parse(raw)
                .with_context(|| format!("无法解析考试类型: {}", raw))?;
            submission = submission.with_declared_type(exam_type);
        }

        Ok(submission)
    }
}

/// 从 TOML 清单加载单个提交
pub async fn load_submission_manifest(manifest_path: &Path) -> Result<Submission> {
    let content = fs::read_to_string(manifest_path)
        .await
        .with_context(|| format!("无法读取清单文件: {}", manifest_path.display()))?;

    let manifest: SubmissionManifest = toml::from_str(&content)
        .with_context(|| format!("无法解析清单文件: {}", manifest_path.display()))?;

    let base_dir = manifest_path.parent().unwrap_or_else(|| Path::new("."));

    manifest
        .into_submission(base_dir)
        .await
        .with_context(|| format!("无法加载清单引用的文件: {}", manifest_path.display()))
}

/// 从文件夹中加载所有 TOML 清单
///
/// 单个清单失败只记录警告并跳过；结果按文件名排序
pub async fn load_all_manifests(folder_path: &Path) -> Result<Vec<Submission>> {
    if !folder_path.exists() {
        anyhow::bail!("文件夹不存在: {}", folder_path.display());
    }

    let mut manifest_paths = Vec::new();
    let mut entries = fs::read_dir(folder_path)
        .await
        .with_context(|| format!("无法读取文件夹: {}", folder_path.display()))?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            manifest_paths.push(path);
        }
    }
    manifest_paths.sort();

    let mut submissions = Vec::new();
    for path in manifest_paths {
        tracing::info!(
            "正在加载: {}",
            path.file_name().unwrap_or_default().to_string_lossy()
        );

        match load_submission_manifest(&path).await {
            Ok(submission) => submissions.push(submission),
            Err(e) => {
                tracing::warn!("加载清单失败 {}: {:#}", path.display(), e);
            }
        }
    }

    Ok(submissions)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let dir = std::env::temp_dir().join(format!(
            "exam_grader_{}_{}_{}",
            name,
            std::process::id(),
            nanos
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn test_load_manifest_resolves_relative_paths() {
        let dir = scratch_dir("manifest");
        std::fs::write(dir.join("answer.md"), "derivative of x^2 is 2x").unwrap();
        std::fs::write(dir.join("rubric.txt"), "full marks for 2x").unwrap();
        std::fs::write(
            dir.join("s1.toml"),
            r#"
id = "s1"
exam_id = "calc"
student_id = "stu-1"
submitted_at = "2025-01-10T09:00:00Z"
response = "answer.md"
rubric = "rubric.txt"
exam_type = "tech"
"#,
        )
        .unwrap();

        let submission = load_submission_manifest(&dir.join("s1.toml")).await.unwrap();
        assert_eq!(submission.id, "s1");
        assert_eq!(submission.artifact.file_name, "answer.md");
        assert_eq!(submission.rubric.unwrap().data, b"full marks for 2x".to_vec());
        assert_eq!(submission.declared_type, Some(ExamType::Technical));
        assert_eq!(submission.submitted_at.to_rfc3339(), "2025-01-10T09:00:00+00:00");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_load_all_skips_broken_manifests() {
        let dir = scratch_dir("batch");
        std::fs::write(dir.join("answer.txt"), "an essay").unwrap();
        std::fs::write(
            dir.join("a.toml"),
            "id = \"a\"\nexam_id = \"e\"\nstudent_id = \"s\"\nresponse = \"answer.txt\"\n",
        )
        .unwrap();
        std::fs::write(
            dir.join("b.toml"),
            "id = \"b\"\nexam_id = \"e\"\nstudent_id = \"s\"\nresponse = \"missing.txt\"\n",
        )
        .unwrap();
        std::fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let submissions = load_all_manifests(&dir).await.unwrap();
        assert_eq!(submissions.len(), 1);
        assert_eq!(submissions[0].id, "a");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_missing_folder_is_error() {
        let result = load_all_manifests(Path::new("/definitely/not/here")).await;
        tokio_test::assert_err!(result);
    }
}
