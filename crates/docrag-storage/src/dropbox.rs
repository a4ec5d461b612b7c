//! Dropbox storage over the HTTP API.
//!
//! Listing uses `files/list_folder` and follows the cursor while more entries
//! remain. Downloads use `files/download` on the content host, with the path
//! in the `Dropbox-API-Arg` header.

use async_trait::async_trait;
use docrag_core::{Backoff, FileStorage, StorageError};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

/// Default RPC endpoint host.
pub const API_URL: &str = "https://api.dropboxapi.com/2";

/// Default content endpoint host.
pub const CONTENT_URL: &str = "https://content.dropboxapi.com/2";

/// Documents stored in one Dropbox folder.
pub struct DropboxStorage {
    client: Client,
    token: String,
    folder: String,
    api_url: String,
    content_url: String,
    backoff: Backoff,
}

impl DropboxStorage {
    /// Create storage for `folder` ("" is the app root).
    pub fn new(token: &str, folder: &str) -> Result<Self, StorageError> {
        if token.trim().is_empty() {
            return Err(StorageError::Request(
                "missing Dropbox access token".to_string(),
            ));
        }

        let client = Client::builder()
            .build()
            .map_err(|e| StorageError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            token: token.trim().to_string(),
            folder: normalize_folder(folder),
            api_url: API_URL.to_string(),
            content_url: CONTENT_URL.to_string(),
            backoff: Backoff::default(),
        })
    }

    /// Use different API hosts.
    #[must_use]
    pub fn with_urls(mut self, api_url: &str, content_url: &str) -> Self {
        self.api_url = api_url.trim_end_matches('/').to_string();
        self.content_url = content_url.trim_end_matches('/').to_string();
        self
    }

    /// Use a different retry schedule.
    #[must_use]
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// The listed folder path.
    #[must_use]
    pub fn folder(&self) -> &str {
        &self.folder
    }

    fn path_of(&self, name: &str) -> String {
        format!("{}/{}", self.folder, name)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, StorageError> {
        let request = request.bearer_auth(&self.token);
        let mut attempt = 0u32;
        loop {
            let attempt_request = request
                .try_clone()
                .ok_or_else(|| StorageError::Request("request cannot be retried".to_string()))?;

            let reason = match attempt_request.send().await {
                Ok(resp)
                    if Backoff::is_transient(resp.status().as_u16())
                        && attempt < self.backoff.max_retries =>
                {
                    format!("status {}", resp.status())
                }
                Ok(resp) => return Ok(resp),
                Err(e) if e.is_timeout() && attempt >= self.backoff.max_retries => {
                    return Err(StorageError::Timeout(e.to_string()));
                }
                Err(e) if (e.is_connect() || e.is_timeout()) && attempt < self.backoff.max_retries => {
                    e.to_string()
                }
                Err(e) => return Err(StorageError::Request(e.to_string())),
            };

            attempt += 1;
            let delay = self.backoff.delay(attempt);
            warn!(
                "Dropbox request failed ({}), retrying in {:?} ({}/{})",
                reason, delay, attempt, self.backoff.max_retries
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn list_page(&self, url: &str, body: serde_json::Value) -> Result<ListFolder, StorageError> {
        let resp = self.send(self.client.post(url).json(&body)).await?;
        if !resp.status().is_success() {
            return Err(StorageError::Request(failure(resp).await));
        }
        resp.json()
            .await
            .map_err(|e| StorageError::Request(format!("invalid list_folder response: {e}")))
    }
}

/// Dropbox wants "" for the root and "/path" without a trailing slash otherwise.
fn normalize_folder(folder: &str) -> String {
    let trimmed = folder.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

/// Serialize a `Dropbox-API-Arg` value. Header values must be ASCII, so
/// DEL and everything above it is written as `\uXXXX` escapes.
fn header_arg(arg: &serde_json::Value) -> String {
    let mut out = String::new();
    for c in arg.to_string().chars() {
        if c.is_ascii() && c != '\u{7f}' {
            out.push(c);
        } else {
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units).iter() {
                out.push_str(&format!("\\u{unit:04x}"));
            }
        }
    }
    out
}

async fn failure(resp: Response) -> String {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    format!("Dropbox request failed ({status}): {body}")
}

#[async_trait]
impl FileStorage for DropboxStorage {
    fn name(&self) -> &str {
        "dropbox"
    }

    async fn list(&self) -> Result<Vec<String>, StorageError> {
        let mut page = self
            .list_page(
                &format!("{}/files/list_folder", self.api_url),
                json!({ "path": self.folder }),
            )
            .await?;
        let mut names: Vec<String> = Vec::new();

        loop {
            names.extend(
                page.entries
                    .into_iter()
                    .filter(|entry| entry.tag == "file")
                    .map(|entry| entry.name),
            );
            if !page.has_more {
                break;
            }
            page = self
                .list_page(
                    &format!("{}/files/list_folder/continue", self.api_url),
                    json!({ "cursor": page.cursor }),
                )
                .await?;
        }

        debug!("Listed {} files in Dropbox folder {:?}", names.len(), self.folder);
        Ok(names)
    }

    async fn fetch(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        let arg = header_arg(&json!({ "path": self.path_of(name) }));
        let request = self
            .client
            .post(format!("{}/files/download", self.content_url))
            .header("Dropbox-API-Arg", arg);
        let resp = self.send(request).await?;

        match resp.status() {
            StatusCode::CONFLICT => {
                let body = resp.text().await.unwrap_or_default();
                if body.contains("not_found") {
                    Err(StorageError::NotFound(name.to_string()))
                } else {
                    Err(StorageError::Request(format!(
                        "Dropbox download of {name} failed: {body}"
                    )))
                }
            }
            status if status.is_success() => {
                let bytes = resp
                    .bytes()
                    .await
                    .map_err(|e| StorageError::Request(e.to_string()))?;
                debug!("Downloaded {} ({} bytes)", name, bytes.len());
                Ok(bytes.to_vec())
            }
            _ => Err(StorageError::Request(failure(resp).await)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ListFolder {
    #[serde(default)]
    entries: Vec<Entry>,
    #[serde(default)]
    cursor: String,
    #[serde(default)]
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct Entry {
    #[serde(rename = ".tag")]
    tag: String,
    name: String,
}
