use sha1::Sha1;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::config::{Config, USER_AGENT};
use crate::error::{AppError, Result};
use crate::normalize::normalize_document;
use crate::types::{ContentId, SnapshotDescriptor};

/// Result of one poll against the remote source.
#[derive(Debug)]
pub enum PollOutcome {
    /// Content identifier matches the previous snapshot; keep using it.
    Unchanged,
    /// New content was downloaded and normalized.
    Updated(SnapshotDescriptor),
}

/// Fetches the guess dataset and its content identifier.
///
/// Never touches shared state: callers get a [`PollOutcome`] and decide what to publish.
pub struct SnapshotFetcher {
    client: reqwest::Client,
    cfg: Config,
}

impl SnapshotFetcher {
    pub fn new(cfg: Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(cfg.fetch_timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client, cfg })
    }

    /// Check the content identifier and download the dataset only if it changed.
    ///
    /// Without a metadata endpoint the body is always downloaded and its SHA-256
    /// digest is the identifier; an unchanged digest still skips normalization.
    pub async fn poll(&self, previous: Option<&SnapshotDescriptor>) -> Result<PollOutcome> {
        let previous_id = previous.map(|p| &p.content_id);

        let (content_id, body) = match &self.cfg.meta_url {
            Some(meta_url) => {
                let id = self.fetch_content_id(meta_url).await?;
                if previous_id == Some(&id) {
                    debug!(content_id = %id, "Snapshot unchanged, skipping download");
                    return Ok(PollOutcome::Unchanged);
                }
                let body = self.get_bytes(&self.cfg.data_url).await?;
                if self.cfg.verify_blob_sha {
                    // Keep the previous id on a mismatch so the next poll downloads again.
                    let actual = git_blob_sha(&body);
                    if actual != id {
                        return Err(AppError::ContentMismatch {
                            url: self.cfg.data_url.clone(),
                            expected: id.0,
                            actual: actual.0,
                        });
                    }
                }
                (id, body)
            }
            None => {
                let body = self.get_bytes(&self.cfg.data_url).await?;
                let id = body_digest(&body);
                if previous_id == Some(&id) {
                    debug!(content_id = %id, "Snapshot digest unchanged, skipping normalization");
                    return Ok(PollOutcome::Unchanged);
                }
                (id, body)
            }
        };

        let doc: serde_json::Value = serde_json::from_slice(&body)?;
        let table = normalize_document(&doc, &self.cfg.table_key)?;
        Ok(PollOutcome::Updated(SnapshotDescriptor { content_id, table }))
    }

    /// Read the content identifier from the metadata endpoint.
    pub async fn fetch_content_id(&self, meta_url: &str) -> Result<ContentId> {
        let body = self.get_bytes(meta_url).await?;
        let meta: serde_json::Value = serde_json::from_slice(&body)?;
        let field = &self.cfg.meta_hash_field;
        meta.get(field)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(|s| ContentId(s.to_string()))
            .ok_or_else(|| AppError::Metadata(format!("{meta_url} has no string field {field:?}")))
    }

    /// GET with the configured retry schedule. Only transient failures are retried.
    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let mut delays = self.cfg.retry_backoff.iter();
        let mut attempt = 1usize;
        loop {
            match self.get_bytes_once(url).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_transient() => {
                    let Some(delay) = delays.next() else {
                        return Err(e);
                    };
                    warn!(url, attempt, "Fetch failed ({e}), retrying in {delay:?}");
                    tokio::time::sleep(*delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn get_bytes_once(&self, url: &str) -> Result<Vec<u8>> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(AppError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(resp.bytes().await?.to_vec())
    }
}

/// Hex SHA-256 of a response body.
pub fn body_digest(body: &[u8]) -> ContentId {
    ContentId(hex::encode(Sha256::digest(body)))
}

/// Git blob object id of a body: SHA-1 over `blob <len>\0` plus the bytes.
/// This is the `sha` the GitHub contents API reports for a file.
pub fn git_blob_sha(body: &[u8]) -> ContentId {
    let mut hasher = Sha1::new();
    hasher.update(format!("blob {}\0", body.len()).as_bytes());
    hasher.update(body);
    ContentId(hex::encode(hasher.finalize()))
}
