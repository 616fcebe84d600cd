use crate::utils::error::{IngestError, Result};
use crate::utils::validation::validate_url;
use reqwest::Client;
use std::time::Duration;

/// Downloads documents that are uploaded by URL.
#[derive(Debug, Clone)]
pub struct DocumentFetcher {
    client: Client,
    max_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct FetchedDocument {
    pub file_name: String,
    pub data: Vec<u8>,
}

impl DocumentFetcher {
    pub fn new(timeout: Duration, max_bytes: usize) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, max_bytes })
    }

    pub async fn fetch(&self, url_str: &str) -> Result<FetchedDocument> {
        let url = validate_url("url", url_str)?;

        // 從 URL 最後一段推斷檔名
        let file_name = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .ok_or_else(|| IngestError::ValidationError {
                message: format!("Cannot infer a file name from URL: {}", url_str),
            })?;

        tracing::debug!("Fetching document from: {}", url);
        let mut response = self.client.get(url).send().await?.error_for_status()?;

        if let Some(length) = response.content_length() {
            if length > self.max_bytes as u64 {
                return Err(self.too_large(length));
            }
        }

        // 分段讀取，超過上限立即中止
        let mut data = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if data.len() + chunk.len() > self.max_bytes {
                return Err(self.too_large((data.len() + chunk.len()) as u64));
            }
            data.extend_from_slice(&chunk);
        }

        Ok(FetchedDocument { file_name, data })
    }

    fn too_large(&self, bytes: u64) -> IngestError {
        IngestError::ValidationError {
            message: format!(
                "Document is at least {} bytes, larger than the {} byte limit",
                bytes, self.max_bytes
            ),
        }
    }
}
