// Loading records and attaching image statuses.

mod common;

use std::time::Duration;

use common::{record, MemoryBackend};
use image_linker::backend::RecordId;
use image_linker::checker::StatusChecker;
use image_linker::config::ProbeConfig;
use image_linker::records::{RecordSet, StatusFilter};

fn checker() -> StatusChecker {
    StatusChecker::new(ProbeConfig {
        timeout: Duration::from_secs(3),
        max_workers: 4,
    })
    .unwrap()
}

#[tokio::test]
async fn test_load_attaches_statuses_in_record_order() {
    let base = common::spawn_fixture().await;
    let store = MemoryBackend::with_records(vec![
        record(3, "Cliff House", Some(format!("{}/delay/200/ok", base))),
        record(1, "Attic", Some(format!("{}/missing.png", base))),
        record(2, "Barn", None),
        record(4, "Dock", Some(format!("{}/ok.png", base))),
    ]);

    let set = RecordSet::load(&store, &checker()).await.unwrap();
    assert_eq!(set.len(), 4);
    assert_eq!(set.counts(), (2, 2));

    assert!(set.get(&RecordId::Int(3)).unwrap().ok);
    assert!(!set.get(&RecordId::Int(1)).unwrap().ok);
    assert!(!set.get(&RecordId::Int(2)).unwrap().ok);
    assert!(set.get(&RecordId::Int(4)).unwrap().ok);

    let broken: Vec<String> = set
        .display_rows(StatusFilter::Error)
        .iter()
        .map(|row| row.record.title.clone())
        .collect();
    assert_eq!(broken, vec!["Attic", "Barn"]);
}

#[tokio::test]
async fn test_refresh_status_after_new_url() {
    let base = common::spawn_fixture().await;
    let store = MemoryBackend::with_records(vec![record(7, "Loft", Some(format!("{}/missing.png", base)))]);
    let checker = checker();

    let mut set = RecordSet::load(&store, &checker).await.unwrap();
    let id = RecordId::Int(7);
    assert!(!set.get(&id).unwrap().ok);

    set.set_image_url(&id, &format!("{}/ok.png", base)).unwrap();
    assert!(set.refresh_status(&id, &checker).await.unwrap());
    assert!(set.get(&id).unwrap().ok);
}

#[tokio::test]
async fn test_load_empty_table() {
    let store = MemoryBackend::default();
    let set = RecordSet::load(&store, &checker()).await.unwrap();
    assert!(set.is_empty());
    assert!(set.display_rows(StatusFilter::All).is_empty());
}
