//! 基础设施层
//!
//! 持有外部资源（PDF 解析器、转写 API、磁盘缓存），只向上暴露能力。
//! 上层只依赖这里的 trait，不关心具体后端。

pub mod pdf_backend;
pub mod transcript_cache;
pub mod whisper_backend;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::Artifact;

pub use pdf_backend::PdfExtractBackend;
pub use transcript_cache::CachedAudioBackend;
pub use whisper_backend::WhisperBackend;

/// 文档转换后端：附件 → 每页文本
#[async_trait]
pub trait DocumentBackend: Send + Sync {
    async fn extract_pages(&self, artifact: &Artifact) -> Result<Vec<String>>;
}

/// 录音转写结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioTranscript {
    pub text: String,
    /// 录音总时长（秒）
    pub duration_secs: f64,
    /// 有声时长（秒）
    pub voiced_secs: f64,
}

/// 录音转写后端
#[async_trait]
pub trait AudioBackend: Send + Sync {
    async fn transcribe(&self, artifact: &Artifact) -> Result<AudioTranscript>;
}
