//! 录音转写（OpenAI 兼容的 `audio/transcriptions` 接口）
//!
//! 使用 `verbose_json` 格式，从分段时间戳计算有声时长

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::LlmConfig;
use crate::infrastructure::{AudioBackend, AudioTranscript};
use crate::models::Artifact;

/// 无语音概率超过该值的分段不计入有声时长
const NO_SPEECH_CUTOFF: f64 = 0.6;

#[derive(Debug, Deserialize)]
struct VerboseTranscription {
    #[serde(default)]
    text: String,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    segments: Vec<TranscriptSegment>,
}

#[derive(Debug, Deserialize)]
struct TranscriptSegment {
    start: f64,
    end: f64,
    #[serde(default)]
    no_speech_prob: Option<f64>,
}

/// Whisper 转写后端
pub struct WhisperBackend {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl WhisperBackend {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .context("无法创建 HTTP 客户端")?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            model: config.transcription_model.clone(),
        })
    }
}

#[async_trait]
impl AudioBackend for WhisperBackend {
    async fn transcribe(&self, artifact: &Artifact) -> Result<AudioTranscript> {
        debug!(
            "调用转写 API，模型: {}，文件: {} ({} 字节)",
            self.model,
            artifact.file_name,
            artifact.data.len()
        );

        let part = Part::bytes(artifact.data.clone()).file_name(artifact.file_name.clone());
        let form = Form::new()
            .text("model", self.model.clone())
            .text("response_format", "verbose_json")
            .part("file", part);

        let url = format!("{}/audio/transcriptions", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .context("转写 API 请求失败")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("转写 API 返回错误: {} {}", status, body);
            anyhow::bail!("转写 API 返回错误 ({}): {}", status, body);
        }

        let body: VerboseTranscription = response
            .json()
            .await
            .context("无法解析转写 API 响应")?;

        Ok(into_transcript(body))
    }
}

fn into_transcript(body: VerboseTranscription) -> AudioTranscript {
    let voiced_secs: f64 = body
        .segments
        .iter()
        .filter(|s| s.no_speech_prob.unwrap_or(0.0) <= NO_SPEECH_CUTOFF)
        .map(|s| (s.end - s.start).max(0.0))
        .sum();

    // 没有 duration 时用最后一个分段的结束时间
    let duration_secs = body
        .duration
        .or_else(|| body.segments.last().map(|s| s.end))
        .unwrap_or(0.0);

    AudioTranscript {
        text: body.text.trim().to_string(),
        duration_secs,
        voiced_secs: voiced_secs.min(duration_secs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voiced_time_from_segments() {
        let body: VerboseTranscription = serde_json::from_str(
            r#"{
                "text": " We solve onboarding. ",
                "duration": 20.0,
                "segments": [
                    {"start": 0.5, "end": 6.5, "no_speech_prob": 0.01},
                    {"start": 8.0, "end": 14.0, "no_speech_prob": 0.9},
                    {"start": 15.0, "end": 19.0}
                ]
            }"#,
        )
        .unwrap();

        let transcript = into_transcript(body);
        assert_eq!(transcript.text, "We solve onboarding.");
        assert_eq!(transcript.duration_secs, 20.0);
        assert_eq!(transcript.voiced_secs, 10.0);
    }

    #[test]
    fn test_empty_response() {
        let body: VerboseTranscription = serde_json::from_str("{}").unwrap();
        let transcript = into_transcript(body);
        assert_eq!(transcript, AudioTranscript::default());
    }
}
