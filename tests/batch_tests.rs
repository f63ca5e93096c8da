// Batch re-optimization of already linked images.

mod common;

use std::sync::Arc;

use common::{record, MemoryBackend};
use image_linker::backend::RecordId;
use image_linker::batch::{optimize_existing, BatchOptions};
use image_linker::config::{Schema, UploadConfig};
use image_linker::service::ImageService;

fn setup(base: &str) -> (Arc<MemoryBackend>, ImageService) {
    let backend = Arc::new(MemoryBackend::with_records(vec![
        record(1, "Big Barn", Some(format!("{}/big.bmp", base))),
        record(2, "No Image", None),
        record(3, "Small Shed", Some(format!("{}/small.jpg", base))),
        record(4, "Gone", Some(format!("{}/missing.png", base))),
    ]));
    let service = ImageService::new(
        backend.clone(),
        backend.clone(),
        &Schema::default(),
        UploadConfig::default(),
    )
    .unwrap();
    (backend, service)
}

#[tokio::test]
async fn test_batch_uploads_only_worthwhile_images() {
    let base = common::spawn_fixture().await;
    let (backend, service) = setup(&base);

    let summary = optimize_existing(backend.as_ref(), &service, BatchOptions::default())
        .await
        .unwrap();

    assert_eq!(summary.total, 3);
    assert_eq!(summary.optimized, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.failed, 1);
    assert!(summary.compression_percent() > 10.0);

    let blob = backend.blob("1_Big_Barn.jpg").unwrap();
    assert_eq!(blob.content_type, "image/jpeg");
    assert_eq!(backend.update_count(), 1);
    assert!(backend
        .image_url_of(&RecordId::Int(1))
        .unwrap()
        .starts_with("https://storage.test/sign/1_Big_Barn.jpg"));

    // The skipped record keeps its original URL
    assert_eq!(
        backend.image_url_of(&RecordId::Int(3)),
        Some(format!("{}/small.jpg", base))
    );
}

#[tokio::test]
async fn test_dry_run_changes_nothing() {
    let base = common::spawn_fixture().await;
    let (backend, service) = setup(&base);

    let options = BatchOptions {
        dry_run: true,
        limit: None,
    };
    let summary = optimize_existing(backend.as_ref(), &service, options).await.unwrap();

    assert_eq!(summary.optimized, 1);
    assert_eq!(backend.blob_count(), 0);
    assert_eq!(backend.update_count(), 0);
}

#[tokio::test]
async fn test_limit_caps_processed_records() {
    let base = common::spawn_fixture().await;
    let (backend, service) = setup(&base);

    let options = BatchOptions {
        dry_run: true,
        limit: Some(1),
    };
    let summary = optimize_existing(backend.as_ref(), &service, options).await.unwrap();

    assert_eq!(summary.total, 1);
    assert_eq!(summary.optimized + summary.skipped + summary.failed, 1);
}
