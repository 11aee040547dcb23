//! 转写缓存
//!
//! 以录音内容的 SHA-256 为键，把转写结果存成 JSON 文件

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::infrastructure::{AudioBackend, AudioTranscript};
use crate::models::Artifact;

/// 带磁盘缓存的转写后端
pub struct CachedAudioBackend<B> {
    inner: B,
    cache_dir: PathBuf,
}

impl<B: AudioBackend> CachedAudioBackend<B> {
    pub fn new(inner: B, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            inner,
            cache_dir: cache_dir.into(),
        }
    }

    fn cache_path(&self, artifact: &Artifact) -> PathBuf {
        let digest = Sha256::digest(&artifact.data);
        self.cache_dir.join(format!("{}.json", hex::encode(digest)))
    }

    async fn read_cached(path: &Path) -> Option<AudioTranscript> {
        let content = tokio::fs::read_to_string(path).await.ok()?;
        match serde_json::from_str(&content) {
            Ok(transcript) => Some(transcript),
            Err(e) => {
                warn!("转写缓存已损坏，忽略 {}: {}", path.display(), e);
                None
            }
        }
    }

    async fn write_cached(&self, path: &Path, transcript: &AudioTranscript) -> Result<()> {
        tokio::fs::create_dir_all(&self.cache_dir)
            .await
            .with_context(|| format!("无法创建缓存目录: {}", self.cache_dir.display()))?;
        let json = serde_json::to_string_pretty(transcript)?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("无法写入转写缓存: {}", path.display()))?;
        Ok(())
    }
}

#[async_trait]
impl<B: AudioBackend> AudioBackend for CachedAudioBackend<B> {
    async fn transcribe(&self, artifact: &Artifact) -> Result<AudioTranscript> {
        let path = self.cache_path(artifact);

        if let Some(cached) = Self::read_cached(&path).await {
            debug!("命中转写缓存: {}", artifact.file_name);
            return Ok(cached);
        }

        let transcript = self.inner.transcribe(artifact).await?;

        // 写缓存失败不影响本次结果
        if let Err(e) = self.write_cached(&path, &transcript).await {
            warn!("{:#}", e);
        }

        Ok(transcript)
    }
}
