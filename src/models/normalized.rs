use serde::{Deserialize, Serialize};

use crate::models::exam_type::ExamType;

/// 内容来源形态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    /// PDF 转换得到的 Markdown
    Document,
    /// 直接提交的文本
    Text,
    /// 录音转写
    Audio,
}

/// 录音的语速与停顿指标
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AudioMetrics {
    /// 时长（秒）
    pub duration_secs: f64,
    /// 每分钟词数
    pub words_per_minute: f64,
    /// 静音占比（0..=1）
    pub silence_ratio: f64,
}

impl AudioMetrics {
    /// 由转写文本和时长计算指标，零时长时各项为 0
    pub fn compute(transcript: &str, duration_secs: f64, voiced_secs: f64) -> Self {
        if duration_secs <= 0.0 {
            return Self {
                duration_secs: 0.0,
                words_per_minute: 0.0,
                silence_ratio: 0.0,
            };
        }

        let word_count = transcript.split_whitespace().count() as f64;
        let voiced = voiced_secs.clamp(0.0, duration_secs);

        Self {
            duration_secs,
            words_per_minute: word_count / (duration_secs / 60.0),
            silence_ratio: (duration_secs - voiced) / duration_secs,
        }
    }
}

/// 规范化后的提交
///
/// 由预处理器从 `Submission` 派生，`submission_id` 只是回指原提交
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedSubmission {
    pub submission_id: String,
    pub exam_id: String,
    pub student_id: String,
    pub modality: Modality,
    /// 作答内容（Markdown / 转写文本）
    pub content: String,
    pub questions: Option<String>,
    pub rubric: Option<String>,
    pub declared_type: Option<ExamType>,
    pub audio: Option<AudioMetrics>,
}

impl NormalizedSubmission {
    /// 内容字符数（去除首尾空白）
    pub fn content_len(&self) -> usize {
        self.content.trim().chars().count()
    }

    pub fn is_audio(&self) -> bool {
        self.modality == Modality::Audio
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_metrics_for_empty_clip() {
        let metrics = AudioMetrics::compute("", 0.0, 0.0);
        assert_eq!(metrics.words_per_minute, 0.0);
        assert_eq!(metrics.silence_ratio, 0.0);
    }

    #[test]
    fn test_audio_metrics_pacing() {
        // 30 秒内 60 个词，其中 24 秒有声
        let transcript = vec!["word"; 60].join(" ");
        let metrics = AudioMetrics::compute(&transcript, 30.0, 24.0);
        assert!((metrics.words_per_minute - 120.0).abs() < 1e-9);
        assert!((metrics.silence_ratio - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_voiced_longer_than_clip_is_clamped() {
        let metrics = AudioMetrics::compute("a b", 10.0, 12.0);
        assert_eq!(metrics.silence_ratio, 0.0);
    }
}
