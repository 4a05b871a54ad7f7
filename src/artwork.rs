//! Cover art upload with per-track deduplication. Uploads are expensive and
//! the hosting endpoint keeps content forever, so each distinct track is
//! uploaded at most once per process and never blocks a presence update:
//! while an upload is pending the presence goes out with no image and is
//! recomputed once the hosted URL lands in the cache.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::media_events::EngineEvent;

pub const UPLOAD_ENDPOINT: &str = "https://catbox.moe/user/api.php";

const UPLOAD_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("upload request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("upload rejected with status {0}")]
    Status(reqwest::StatusCode),
    #[error("upload returned an empty body")]
    EmptyBody,
}

/// Transport that turns raw image bytes into a hosted URL.
#[async_trait]
pub trait ArtworkUploader: Send + Sync {
    async fn upload(&self, bytes: Vec<u8>) -> Result<String, UploadError>;
}

/// Multipart uploader against the fixed catbox.moe endpoint.
pub struct CatboxUploader {
    client: reqwest::Client,
}

impl CatboxUploader {
    pub fn new() -> Result<Self, UploadError> {
        let client = reqwest::Client::builder()
            .connect_timeout(UPLOAD_TIMEOUT)
            .timeout(UPLOAD_TIMEOUT)
            .build()?;

        Ok(CatboxUploader { client })
    }
}

#[async_trait]
impl ArtworkUploader for CatboxUploader {
    async fn upload(&self, bytes: Vec<u8>) -> Result<String, UploadError> {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name("cover_art.png")
            .mime_str("image/png")?;
        let form = reqwest::multipart::Form::new()
            .text("reqtype", "fileupload")
            .part("fileToUpload", part);

        let response = self.client.post(UPLOAD_ENDPOINT).multipart(form).send().await?;

        if !response.status().is_success() {
            return Err(UploadError::Status(response.status()));
        }

        let url = response.text().await?.trim().to_string();
        if url.is_empty() {
            return Err(UploadError::EmptyBody);
        }

        Ok(url)
    }
}

/// Cache key treating two events as "the same track".
pub fn track_fingerprint(details: &str, state: &str, source_id: &str) -> String {
    format!("{details}|{state}|{source_id}")
}

/// Fingerprint → hosted URL cache plus the in-flight upload set. Only ever
/// touched from the engine loop; upload tasks report back through the event
/// channel instead of mutating this directly.
pub struct ArtworkStore {
    cache: HashMap<String, String>,
    in_flight: HashSet<String>,
    uploader: Arc<dyn ArtworkUploader>,
    events_tx: mpsc::Sender<EngineEvent>,
}

impl ArtworkStore {
    pub fn new(uploader: Arc<dyn ArtworkUploader>, events_tx: mpsc::Sender<EngineEvent>) -> Self {
        ArtworkStore {
            cache: HashMap::new(),
            in_flight: HashSet::new(),
            uploader,
            events_tx,
        }
    }

    /// Returns the hosted URL for `fingerprint`, or an empty string when
    /// there is none yet. Kicks off a background upload the first time a
    /// track with art bytes is seen; while that upload runs (or when there
    /// are no bytes at all) the presence simply has no image.
    pub fn resolve(&mut self, fingerprint: &str, art_bytes: &[u8]) -> String {
        if let Some(url) = self.cache.get(fingerprint) {
            return url.clone();
        }

        if art_bytes.is_empty() {
            return String::new();
        }

        if self.in_flight.contains(fingerprint) {
            return String::new();
        }

        self.in_flight.insert(fingerprint.to_string());
        self.spawn_upload(fingerprint.to_string(), art_bytes.to_vec());

        String::new()
    }

    /// Applies an upload result. The in-flight marker is cleared on both
    /// outcomes so a failed track is retried on its next event; the cache is
    /// only written on success. Returns true when a new URL was cached.
    pub fn complete_upload(&mut self, fingerprint: &str, url: Option<String>) -> bool {
        self.in_flight.remove(fingerprint);

        match url {
            Some(url) => {
                self.cache.insert(fingerprint.to_string(), url);
                true
            }
            None => false,
        }
    }

    fn spawn_upload(&self, fingerprint: String, bytes: Vec<u8>) {
        let uploader = Arc::clone(&self.uploader);
        let events_tx = self.events_tx.clone();

        tokio::spawn(async move {
            let url = match uploader.upload(bytes).await {
                Ok(url) => {
                    log::debug!("artwork upload finished: {url}");
                    Some(url)
                }
                Err(e) => {
                    log::warn!("artwork upload failed for {fingerprint}: {e}");
                    None
                }
            };

            let event = EngineEvent::ArtworkUploaded { fingerprint, url };
            if events_tx.send(event).await.is_err() {
                log::debug!("engine loop gone, dropping upload result");
            }
        });
    }
}
