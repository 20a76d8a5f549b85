mod common;

use assert_matches::assert_matches;
use rust_decimal::Decimal;

use stocktake_api::errors::ServiceError;
use stocktake_api::store::ScanFilter;

#[tokio::test]
async fn upsert_then_lookup_by_barcode() {
    let ctx = common::setup().await;

    let rows = ctx.store.upsert_chunk(&common::records(3)).await.unwrap();
    assert_eq!(rows, 3);

    let found = ctx.store.get_by_barcode("BC-0001").await.unwrap().unwrap();
    assert_eq!(found.item_name, "Item 1");
    assert!(!found.is_scanned);
    assert!(found.scan_timestamp.is_none());

    let missing = ctx.store.get_by_barcode("nope").await.unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn counts_split_by_scan_state() {
    let ctx = common::setup().await;
    ctx.store.upsert_chunk(&common::records(4)).await.unwrap();

    let first = ctx.store.get_by_barcode("BC-0000").await.unwrap().unwrap();
    ctx.store
        .conditional_mark_scanned(first.id, false)
        .await
        .unwrap()
        .expect("first scan should win");

    assert_eq!(ctx.store.count(ScanFilter::All).await.unwrap(), 4);
    assert_eq!(ctx.store.count(ScanFilter::Scanned).await.unwrap(), 1);
    assert_eq!(ctx.store.count(ScanFilter::Pending).await.unwrap(), 3);
}

#[tokio::test]
async fn reimport_is_idempotent_and_preserves_scan_state() {
    let ctx = common::setup().await;
    let batch = common::records(3);

    ctx.store.upsert_chunk(&batch).await.unwrap();

    // Scan one record, then re-import the same sheet.
    let scanned = ctx.store.get_by_barcode("BC-0002").await.unwrap().unwrap();
    let scanned = ctx
        .store
        .conditional_mark_scanned(scanned.id, false)
        .await
        .unwrap()
        .unwrap();

    let mut updated = batch.clone();
    updated[2].item_name = "Renamed".to_string();
    updated[2].price = Decimal::from(99);
    ctx.store.upsert_chunk(&updated).await.unwrap();

    // Same row count: upsert-by-barcode overwrites, never duplicates.
    assert_eq!(ctx.store.count(ScanFilter::All).await.unwrap(), 3);

    // Descriptive fields overwritten, audit fields untouched.
    let after = ctx.store.get_by_barcode("BC-0002").await.unwrap().unwrap();
    assert_eq!(after.id, scanned.id);
    assert_eq!(after.item_name, "Renamed");
    assert_eq!(after.price, Decimal::from(99));
    assert!(after.is_scanned);
    assert_eq!(after.scan_timestamp, scanned.scan_timestamp);
}

#[tokio::test]
async fn read_range_pages_deterministically_by_id() {
    let ctx = common::setup().await;
    ctx.store.upsert_chunk(&common::records(5)).await.unwrap();

    let page1 = ctx.store.read_range(ScanFilter::All, 0, 2).await.unwrap();
    let page2 = ctx.store.read_range(ScanFilter::All, 2, 2).await.unwrap();
    let page3 = ctx.store.read_range(ScanFilter::All, 4, 2).await.unwrap();

    assert_eq!(page1.len(), 2);
    assert_eq!(page2.len(), 2);
    assert_eq!(page3.len(), 1);

    let ids: Vec<i64> = page1
        .iter()
        .chain(&page2)
        .chain(&page3)
        .map(|r| r.id)
        .collect();
    let mut sorted = ids.clone();
    sorted.sort_unstable();
    sorted.dedup();
    assert_eq!(ids, sorted, "pages must not skip or duplicate rows");
    assert_eq!(ids.len(), 5);
}

#[tokio::test]
async fn chunk_ceiling_is_a_hard_bound() {
    let ctx = common::setup_with_ceiling(2).await;

    let result = ctx.store.upsert_chunk(&common::records(3)).await;
    assert_matches!(result, Err(ServiceError::InvalidInput(_)));

    let result = ctx.store.read_range(ScanFilter::All, 0, 3).await;
    assert_matches!(result, Err(ServiceError::InvalidInput(_)));
}

#[tokio::test]
async fn delete_all_wipes_the_stock_list() {
    let ctx = common::setup().await;
    ctx.store.upsert_chunk(&common::records(3)).await.unwrap();

    let deleted = ctx.store.delete_all().await.unwrap();
    assert_eq!(deleted, 3);
    assert_eq!(ctx.store.count(ScanFilter::All).await.unwrap(), 0);
}

#[tokio::test]
async fn reset_scans_is_the_only_path_back_to_pending() {
    let ctx = common::setup().await;
    ctx.store.upsert_chunk(&common::records(2)).await.unwrap();

    for barcode in ["BC-0000", "BC-0001"] {
        let row = ctx.store.get_by_barcode(barcode).await.unwrap().unwrap();
        ctx.store
            .conditional_mark_scanned(row.id, false)
            .await
            .unwrap()
            .unwrap();
    }
    assert_eq!(ctx.store.count(ScanFilter::Scanned).await.unwrap(), 2);

    let reset = ctx.store.reset_scans().await.unwrap();
    assert_eq!(reset, 2);
    assert_eq!(ctx.store.count(ScanFilter::Scanned).await.unwrap(), 0);

    let row = ctx.store.get_by_barcode("BC-0000").await.unwrap().unwrap();
    assert!(!row.is_scanned);
    assert!(row.scan_timestamp.is_none());
}

#[tokio::test]
async fn recent_window_is_bounded_and_searchable() {
    let ctx = common::setup().await;
    ctx.store.upsert_chunk(&common::records(10)).await.unwrap();

    let window = ctx.store.recent(None, 4).await.unwrap();
    assert_eq!(window.len(), 4);

    let hits = ctx.store.recent(Some("BC-0007"), 50).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].barcode, "BC-0007");

    let hits = ctx.store.recent(Some("Item"), 50).await.unwrap();
    assert_eq!(hits.len(), 10);
}

#[tokio::test]
async fn mutations_publish_change_notifications() {
    let ctx = common::setup().await;
    let mut changes = ctx.store.subscribe();

    ctx.store.upsert_chunk(&common::records(2)).await.unwrap();

    use stocktake_api::events::ChangeEvent;
    match changes.recv().await {
        Ok(ChangeEvent::RecordsUpserted { rows }) => assert_eq!(rows, 2),
        other => panic!("unexpected notification: {:?}", other),
    }
}
