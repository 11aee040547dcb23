//! PDF 文本提取
//!
//! 基于 `pdf-extract` 逐页提取，解析在阻塞线程中执行

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

use crate::infrastructure::DocumentBackend;
use crate::models::Artifact;

pub struct PdfExtractBackend;

impl PdfExtractBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PdfExtractBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentBackend for PdfExtractBackend {
    async fn extract_pages(&self, artifact: &Artifact) -> Result<Vec<String>> {
        let data = artifact.data.clone();
        let file_name = artifact.file_name.clone();

        let pages = tokio::task::spawn_blocking(move || {
            pdf_extract::extract_text_from_mem_by_pages(&data)
        })
        .await
        .context("PDF 解析任务异常退出")?
        .map_err(|e| anyhow::anyhow!("PDF 解析失败 ({}): {}", file_name, e))?;

        debug!("PDF {} 提取完成，共 {} 页", artifact.file_name, pages.len());

        Ok(pages)
    }
}
