// src/service.rs
// =============================================================================
// Replacing a record's image, start to finish.
//
// Both entry points run the same sequence:
//
//   bytes (given, or downloaded)
//     -> optimize (optional; on failure keep the original bytes)
//     -> storage key  {id}_{title}{ext}
//     -> upload with upsert
//     -> signed URL
//     -> write the signed URL into the record's image column
//
// Each step waits for the previous one. There is no rollback: if the upload
// works but signing or the database update fails, the blob stays in storage
// and the record keeps its old URL.
//
// Instead of popping up notifications, every call returns its messages in
// UploadOutcome::notices and lets the caller decide how to show them.
// =============================================================================

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::Serialize;
use tokio::sync::OwnedMutexGuard;

use crate::backend::{BlobStore, RecordId, RecordStore};
use crate::config::{Schema, UploadConfig};
use crate::error::{LinkerError, Result};
use crate::naming;
use crate::optimizer::{self, OptimizedImage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Warning,
}

/// A human-readable message produced while handling an upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    fn info(message: String) -> Notice {
        Notice {
            level: NoticeLevel::Info,
            message,
        }
    }

    fn warning(message: String) -> Notice {
        Notice {
            level: NoticeLevel::Warning,
            message,
        }
    }
}

/// What a successful upload produced.
#[derive(Debug, Clone, Serialize)]
pub struct UploadOutcome {
    pub storage_key: String,
    pub signed_url: String,
    pub content_type: String,
    /// True when the optimized JPEG was uploaded, false for the original bytes
    pub optimized: bool,
    pub original_size: usize,
    pub uploaded_size: usize,
    pub notices: Vec<Notice>,
}

/// Result of a downloaded source image.
#[derive(Debug, Clone)]
pub struct Download {
    pub bytes: Vec<u8>,
    /// The server's Content-Type header, if it sent one
    pub content_type: Option<String>,
}

// Bytes ready to upload, with the extension and content type that go with them
struct Prepared {
    bytes: Vec<u8>,
    extension: String,
    content_type: String,
    optimized: bool,
    original_size: usize,
    notices: Vec<Notice>,
}

/// Percentage saved going from `before` to `after` bytes.
pub fn reduction_percent(before: usize, after: usize) -> f64 {
    if before == 0 {
        return 0.0;
    }
    (1.0 - after as f64 / before as f64) * 100.0
}

/// Fetches `url` with a plain GET.
///
/// Network failures and non-2xx answers become LinkerError::Download.
pub async fn download(client: &Client, url: &str, timeout: Option<Duration>) -> Result<Download> {
    let download_error = |reason: String| LinkerError::Download {
        url: url.to_string(),
        reason,
    };

    let mut request = client.get(url);
    if let Some(timeout) = timeout {
        request = request.timeout(timeout);
    }

    let response = request.send().await.map_err(|e| download_error(e.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        return Err(download_error(format!("HTTP {}", status.as_u16())));
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let bytes = response
        .bytes()
        .await
        .map_err(|e| download_error(e.to_string()))?
        .to_vec();

    tracing::debug!(url, size = bytes.len(), "source image downloaded");
    Ok(Download {
        bytes,
        content_type,
    })
}

// One async mutex per record id, so two uploads for the same record cannot
// interleave their upload / sign / update steps. An entry lives only while
// someone holds or waits for it.
#[derive(Debug, Default)]
struct RecordLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl RecordLocks {
    async fn acquire(&self, id: &RecordId) -> RecordGuard<'_> {
        let key = id.to_string();
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(key.clone()).or_default())
        };
        RecordGuard {
            owner: self,
            key,
            guard: Some(lock.lock_owned().await),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

// Releases the record lock and forgets the map entry once no other task
// holds a clone of it.
struct RecordGuard<'a> {
    owner: &'a RecordLocks,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for RecordGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());

        // Waiters clone the Arc under the map lock, so a count of one means
        // only the map itself still refers to this mutex
        let mut locks = self.owner.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks.get(&self.key).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(&self.key);
        }
    }
}

/// Uploads replacement images for records.
pub struct ImageService {
    records: Arc<dyn RecordStore>,
    blobs: Arc<dyn BlobStore>,
    image_url_column: String,
    config: UploadConfig,
    http: Client,
    locks: RecordLocks,
}

impl ImageService {
    pub fn new(
        records: Arc<dyn RecordStore>,
        blobs: Arc<dyn BlobStore>,
        schema: &Schema,
        config: UploadConfig,
    ) -> Result<Self> {
        let http = Client::builder()
            .build()
            .map_err(|e| LinkerError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(ImageService {
            records,
            blobs,
            image_url_column: schema.image_url_column.clone(),
            config,
            http,
            locks: RecordLocks::default(),
        })
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// HTTP client used for source downloads.
    pub fn http(&self) -> &Client {
        &self.http
    }

    /// Replaces the record's image with a file the operator supplied.
    ///
    /// `source_filename` only matters when the bytes are uploaded as-is: its
    /// extension then picks the storage key suffix and the content type.
    pub async fn upload_from_bytes(
        &self,
        id: &RecordId,
        title: &str,
        bytes: Vec<u8>,
        source_filename: &str,
    ) -> Result<UploadOutcome> {
        let _guard = self.locks.acquire(id).await;

        let extension = naming::extension_from_filename(source_filename);
        let content_type = naming::content_type(&extension).to_string();

        let prepared = self.prepare(bytes, extension, content_type).await;
        self.publish(id, title, prepared).await
    }

    /// Downloads `source_url` and replaces the record's image with it.
    ///
    /// Fails with LinkerError::Download before anything is written if the
    /// source cannot be fetched.
    pub async fn upload_from_url(&self, id: &RecordId, title: &str, source_url: &str) -> Result<UploadOutcome> {
        let _guard = self.locks.acquire(id).await;

        let source = download(&self.http, source_url, self.config.download_timeout).await?;

        let extension = naming::extension_from_url(source_url);
        let content_type = source
            .content_type
            .unwrap_or_else(|| naming::content_type(&extension).to_string());

        let prepared = self.prepare(source.bytes, extension, content_type).await;
        self.publish(id, title, prepared).await
    }

    /// Upload, sign and persist already-final bytes. Returns (key, signed URL).
    ///
    /// This is the tail of both upload paths; the batch optimizer calls it
    /// directly because it optimizes on its own.
    pub async fn store(
        &self,
        id: &RecordId,
        title: &str,
        bytes: Vec<u8>,
        extension: &str,
        content_type: &str,
    ) -> Result<(String, String)> {
        let key = naming::storage_key(&id.to_string(), title, extension);

        self.blobs.upload(&key, bytes, content_type, true).await?;
        let signed_url = self.blobs.sign(&key, self.config.signed_url_expiry_secs()).await?;
        self.records
            .update_field(id, &self.image_url_column, &signed_url)
            .await?;

        tracing::info!(%id, key = %key, "image replaced");
        Ok((key, signed_url))
    }

    // Runs the optimizer on a blocking thread. Never fails: any problem
    // falls back to the original bytes with a warning notice.
    async fn prepare(&self, bytes: Vec<u8>, extension: String, content_type: String) -> Prepared {
        let original_size = bytes.len();
        let original = Prepared {
            bytes: Vec::new(),
            extension,
            content_type,
            optimized: false,
            original_size,
            notices: Vec::new(),
        };

        if !self.config.optimize {
            return Prepared { bytes, ..original };
        }

        let shared = Arc::new(bytes);
        let input = Arc::clone(&shared);
        let bounds = self.config.image;
        let result = tokio::task::spawn_blocking(move || optimizer::optimize(&input, bounds))
            .await
            .map_err(LinkerError::from)
            .and_then(|inner| inner);

        match result {
            Ok(OptimizedImage { bytes: optimized, .. }) => {
                let message = format!(
                    "Image optimized: {:.1}KB → {:.1}KB ({:.1}% reduction)",
                    original_size as f64 / 1024.0,
                    optimized.len() as f64 / 1024.0,
                    reduction_percent(original_size, optimized.len()),
                );
                tracing::info!("{}", message);

                Prepared {
                    bytes: optimized,
                    extension: ".jpg".to_string(),
                    content_type: "image/jpeg".to_string(),
                    optimized: true,
                    original_size,
                    notices: vec![Notice::info(message)],
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "image optimization failed, using original");
                let bytes = Arc::try_unwrap(shared).unwrap_or_else(|shared| (*shared).clone());
                Prepared {
                    bytes,
                    notices: vec![Notice::warning(format!(
                        "Image optimization failed, using original: {}",
                        e
                    ))],
                    ..original
                }
            }
        }
    }

    async fn publish(&self, id: &RecordId, title: &str, prepared: Prepared) -> Result<UploadOutcome> {
        let uploaded_size = prepared.bytes.len();
        let (storage_key, signed_url) = self
            .store(id, title, prepared.bytes, &prepared.extension, &prepared.content_type)
            .await?;

        Ok(UploadOutcome {
            storage_key,
            signed_url,
            content_type: prepared.content_type,
            optimized: prepared.optimized,
            original_size: prepared.original_size,
            uploaded_size,
            notices: prepared.notices,
        })
    }
}
