// tests/common/mod.rs
// =============================================================================
// Shared test helpers:
// - a local HTTP fixture server (axum) standing in for image hosts
// - MemoryBackend, an in-memory RecordStore + BlobStore
// - small image generators
// =============================================================================

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::Path;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::Router;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};

use image_linker::backend::{BlobStore, Record, RecordId, RecordStore};
use image_linker::{LinkerError, Result};

// ----------------------------------------------------------------------------
// Images
// ----------------------------------------------------------------------------

pub fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 255 / width.max(1)) as u8, (y * 255 / height.max(1)) as u8, 96])
    })
}

fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, format).unwrap();
    out.into_inner()
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(DynamicImage::ImageRgb8(gradient(width, height)), ImageFormat::Png)
}

pub fn transparent_png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = RgbaImage::from_pixel(width, height, Rgba([10, 20, 30, 0]));
    encode(DynamicImage::ImageRgba8(image), ImageFormat::Png)
}

/// Uncompressed, so optimizing it always saves a lot
pub fn bmp_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(DynamicImage::ImageRgb8(gradient(width, height)), ImageFormat::Bmp)
}

/// Already small, re-encoding at quality 85 will not save 10%
pub fn low_quality_jpeg(width: u32, height: u32) -> Vec<u8> {
    let mut out = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut out, 30);
    gradient(width, height).write_with_encoder(encoder).unwrap();
    out
}

// ----------------------------------------------------------------------------
// Fixture server
// ----------------------------------------------------------------------------

async fn png_response() -> Response {
    ([(header::CONTENT_TYPE, "image/png")], png_bytes(64, 48)).into_response()
}

async fn delayed(Path((ms, kind)): Path<(u64, String)>) -> Response {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    if kind == "ok" {
        png_response().await
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

/// Starts the fixture server on a random port and returns its base URL.
///
/// Routes:
///   /ok.png           200, small PNG
///   /big.bmp          200, 800x600 BMP
///   /small.jpg        200, low quality JPEG
///   /garbage.png      200, bytes that are not an image
///   /missing.png      404
///   /redirect         307 -> /ok.png
///   /slow             200 after 3 seconds
///   /delay/{ms}/{ok|missing}
pub async fn spawn_fixture() -> String {
    let app = Router::new()
        .route("/ok.png", get(png_response))
        .route(
            "/big.bmp",
            get(|| async { ([(header::CONTENT_TYPE, "image/bmp")], bmp_bytes(800, 600)) }),
        )
        .route(
            "/small.jpg",
            get(|| async { ([(header::CONTENT_TYPE, "image/jpeg")], low_quality_jpeg(320, 240)) }),
        )
        .route(
            "/garbage.png",
            get(|| async { ([(header::CONTENT_TYPE, "image/png")], b"not really a png".to_vec()) }),
        )
        .route("/missing.png", get(|| async { StatusCode::NOT_FOUND }))
        .route("/redirect", get(|| async { Redirect::temporary("/ok.png") }))
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(3)).await;
                "late"
            }),
        )
        .route("/delay/{ms}/{kind}", get(delayed));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}

// ----------------------------------------------------------------------------
// In-memory backend
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct StoredBlob {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub upsert: bool,
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    pub records: Mutex<Vec<Record>>,
    pub blobs: Mutex<HashMap<String, StoredBlob>>,
    /// (id, field, value) for every update_field call
    pub updates: Mutex<Vec<(RecordId, String, String)>>,
    pub fail_sign: bool,
}

impl MemoryBackend {
    pub fn with_records(records: Vec<Record>) -> MemoryBackend {
        MemoryBackend {
            records: Mutex::new(records),
            ..MemoryBackend::default()
        }
    }

    pub fn blob(&self, key: &str) -> Option<StoredBlob> {
        self.blobs.lock().unwrap().get(key).cloned()
    }

    pub fn blob_count(&self) -> usize {
        self.blobs.lock().unwrap().len()
    }

    pub fn update_count(&self) -> usize {
        self.updates.lock().unwrap().len()
    }

    pub fn image_url_of(&self, id: &RecordId) -> Option<String> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id.same_as(id))
            .and_then(|r| r.image_url.clone())
    }
}

pub fn record(id: i64, title: &str, image_url: Option<String>) -> Record {
    Record {
        id: RecordId::Int(id),
        title: title.to_string(),
        image_url,
        extra: Vec::new(),
    }
}

#[async_trait]
impl RecordStore for MemoryBackend {
    async fn fetch_all(&self) -> Result<Vec<Record>> {
        Ok(self.records.lock().unwrap().clone())
    }

    async fn update_field(&self, id: &RecordId, field: &str, value: &str) -> Result<()> {
        let mut records = self.records.lock().unwrap();
        let record = records
            .iter_mut()
            .find(|r| r.id.same_as(id))
            .ok_or_else(|| LinkerError::Persist(format!("no row {}", id)))?;
        if field == "image_url" {
            record.image_url = Some(value.to_string());
        }
        self.updates
            .lock()
            .unwrap()
            .push((id.clone(), field.to_string(), value.to_string()));
        Ok(())
    }
}

#[async_trait]
impl BlobStore for MemoryBackend {
    async fn upload(&self, key: &str, bytes: Vec<u8>, content_type: &str, upsert: bool) -> Result<()> {
        let mut blobs = self.blobs.lock().unwrap();
        if blobs.contains_key(key) && !upsert {
            return Err(LinkerError::Upload {
                key: key.to_string(),
                reason: "already exists".to_string(),
            });
        }
        blobs.insert(
            key.to_string(),
            StoredBlob {
                bytes,
                content_type: content_type.to_string(),
                upsert,
            },
        );
        Ok(())
    }

    async fn sign(&self, key: &str, expiry_secs: u64) -> Result<String> {
        if self.fail_sign {
            return Err(LinkerError::Sign {
                key: key.to_string(),
                reason: "HTTP 500".to_string(),
            });
        }
        Ok(format!("https://storage.test/sign/{}?expires={}", key, expiry_secs))
    }
}
