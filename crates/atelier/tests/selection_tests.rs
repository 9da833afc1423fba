//! Selection session behavior against a scripted backend.

mod common;

use std::sync::Arc;

use tokio::sync::Notify;

use atelier::api::SelectionBackend;
use atelier::catalog::{CollectionId, ImageType, OrnamentType, ProductUpload};
use atelier::credits::{fetch_credit_settings, spawn_credit_estimator, CreditSettings};
use atelier::error::ApiError;
use atelier::selection::{SelectionEntry, SelectionSession, SelectionSource};

use common::{pid, products, MockStudio, ProductBuilder};

fn collection() -> CollectionId {
    CollectionId::new("col-1")
}

fn session_over(mock: &Arc<MockStudio>) -> SelectionSession {
    let backend: Arc<dyn SelectionBackend> = mock.clone();
    SelectionSession::new(collection(), backend, mock.products.lock().unwrap().clone())
}

#[tokio::test]
async fn test_toggle_column_fills_partial_column() {
    let mock = MockStudio::with_products(vec![
        ProductBuilder::new("p1").ordinal(1).selected(&[ImageType::Campaign]).build(),
        ProductBuilder::new("p2").ordinal(2).build(),
    ]);
    let session = session_over(&mock);
    assert!(!session.column_state().campaign);

    session.toggle_column(ImageType::Campaign);

    let grid = session.grid();
    assert!(grid.entry(&pid("p1")).unwrap().campaign);
    assert!(grid.entry(&pid("p2")).unwrap().campaign);
    assert!(session.column_state().campaign);

    session.toggle_column(ImageType::Campaign);
    assert_eq!(session.total_selected_images(), 0);
}

#[tokio::test]
async fn test_subscribers_see_every_change() {
    let mock = MockStudio::with_products(products(2));
    let session = session_over(&mock);
    let mut rx = session.subscribe();

    session.toggle_cell(&pid("p2"), ImageType::Model);
    rx.changed().await.unwrap();
    assert_eq!(rx.borrow_and_update().total_selected_images(), 1);

    session.select_all();
    rx.changed().await.unwrap();
    assert_eq!(rx.borrow_and_update().total_selected_images(), 8);

    session.clear_all();
    rx.changed().await.unwrap();
    assert_eq!(rx.borrow_and_update().total_selected_images(), 0);
}

#[tokio::test]
async fn test_toggle_unknown_product_is_ignored() {
    let mock = MockStudio::with_products(products(1));
    let session = session_over(&mock);

    session.toggle_cell(&pid("ghost"), ImageType::PlainBg);

    assert_eq!(session.grid().len(), 1);
    assert!(session.grid().entry(&pid("ghost")).is_none());
}

#[tokio::test]
async fn test_upload_hydrates_default_entries() {
    let mock = MockStudio::with_products(products(1));
    let session = session_over(&mock);

    let uploaded = session
        .upload_products(vec![
            ProductUpload::new("a.jpg", vec![1, 2, 3], OrnamentType::Necklace),
            ProductUpload::new("b.png", vec![4], OrnamentType::Earrings),
        ])
        .await
        .unwrap();

    assert_eq!(uploaded.len(), 2);
    let grid = session.grid();
    assert_eq!(grid.len(), 3);
    for product in &uploaded {
        assert_eq!(grid.entry(&product.id), Some(&SelectionEntry::default()));
    }
}

#[tokio::test]
async fn test_delete_keeps_other_entries_attached() {
    let mock = MockStudio::with_products(vec![
        ProductBuilder::new("p1").ordinal(1).selected(&[ImageType::PlainBg]).build(),
        ProductBuilder::new("p2").ordinal(2).selected(&[ImageType::Model]).build(),
        ProductBuilder::new("p3").ordinal(3).selected(&[ImageType::Campaign]).build(),
    ]);
    let session = session_over(&mock);

    session.delete_product(&pid("p2")).await.unwrap();

    let grid = session.grid();
    assert_eq!(grid.len(), 2);
    assert!(grid.entry(&pid("p2")).is_none());
    assert_eq!(grid.entry(&pid("p1")), Some(&SelectionEntry::with(&[ImageType::PlainBg])));
    assert_eq!(grid.entry(&pid("p3")), Some(&SelectionEntry::with(&[ImageType::Campaign])));
}

#[tokio::test]
async fn test_failed_delete_leaves_product() {
    let mock = MockStudio::with_products(products(1));
    let session = session_over(&mock);

    let result = session.delete_product(&pid("nope")).await;
    assert!(result.is_err());
    assert_eq!(session.grid().len(), 1);
}

#[tokio::test]
async fn test_save_persists_and_reloads() {
    let mock = MockStudio::with_products(products(2));
    let session = session_over(&mock);
    session.toggle_cell(&pid("p1"), ImageType::BgReplace);

    let outcome = session.save().await;
    assert!(outcome.success);
    assert!(outcome.error.is_none());
    assert_eq!(mock.saved_grids.lock().unwrap().len(), 1);

    let backend: Arc<dyn SelectionBackend> = mock.clone();
    let reloaded = SelectionSession::load(collection(), backend).await.unwrap();
    assert!(reloaded.grid().entry(&pid("p1")).unwrap().bg_replace);
    assert_eq!(reloaded.total_selected_images(), 1);
}

#[tokio::test]
async fn test_save_failure_is_reported_not_raised() {
    let mock = MockStudio::with_products(products(1));
    *mock.save_error.lock().unwrap() = Some(ApiError::Rejected("Collection is locked".to_string()));
    let session = session_over(&mock);
    session.toggle_cell(&pid("p1"), ImageType::Model);

    let outcome = session.save().await;

    assert!(!outcome.success);
    assert_eq!(outcome.error.as_deref(), Some("Collection is locked"));
    assert!(session.grid().entry(&pid("p1")).unwrap().model);
}

#[tokio::test]
async fn test_save_error_page_is_summarized() {
    let mock = MockStudio::with_products(products(1));
    *mock.save_error.lock().unwrap() = Some(ApiError::Status {
        status: 502,
        body: "<html><body>Bad Gateway</body></html>".to_string(),
    });
    let session = session_over(&mock);
    session.toggle_cell(&pid("p1"), ImageType::Model);

    let outcome = session.save().await;

    assert!(!outcome.success);
    assert_eq!(
        outcome.error.as_deref(),
        Some("Failed to save selections (HTTP 502)")
    );
}

#[tokio::test]
async fn test_changes_during_save_survive_refresh() {
    let mock = MockStudio::with_products(products(2));
    let gate = Arc::new(Notify::new());
    *mock.save_gate.lock().unwrap() = Some(gate.clone());
    let session = Arc::new(session_over(&mock));
    session.toggle_cell(&pid("p1"), ImageType::PlainBg);

    let saving = {
        let session = session.clone();
        tokio::spawn(async move { session.save().await })
    };
    while !session.is_saving() {
        tokio::task::yield_now().await;
    }

    session.toggle_cell(&pid("p2"), ImageType::Campaign);
    gate.notify_one();
    let outcome = saving.await.unwrap();

    assert!(outcome.success);
    let grid = session.grid();
    assert!(grid.entry(&pid("p1")).unwrap().plain_bg);
    assert!(grid.entry(&pid("p2")).unwrap().campaign);
    assert!(!session.is_saving());
}

#[tokio::test]
async fn test_session_as_selection_source() {
    let mock = MockStudio::with_products(products(3));
    let session = session_over(&mock);
    session.select_all();

    let source: &dyn SelectionSource = &session;
    assert_eq!(source.product_count(), 3);
    assert_eq!(source.selections().unwrap().total_selected_images(), 12);
    assert!(source.save_selections().await.success);
}

#[tokio::test]
async fn test_credit_estimate_tracks_session() {
    let mock = MockStudio::with_products(vec![
        ProductBuilder::new("p1").ordinal(1).selected(&[ImageType::PlainBg]).build(),
        ProductBuilder::new("p2")
            .ordinal(2)
            .selected(&[ImageType::Model, ImageType::Campaign])
            .build(),
        ProductBuilder::new("p3").ordinal(3).build(),
    ]);
    mock.credits_per_image(2);
    let session = session_over(&mock);

    let settings = fetch_credit_settings(&*mock, CreditSettings::default()).await;
    let (_settings_tx, settings_rx) = tokio::sync::watch::channel(settings);
    let (mut estimate, _task) = spawn_credit_estimator(session.subscribe(), settings_rx);

    assert_eq!(estimate.borrow().total_selected_images(), 3);
    assert_eq!(estimate.borrow().total_credits(), 6);

    session.toggle_cell(&pid("p3"), ImageType::BgReplace);
    estimate.changed().await.unwrap();
    assert_eq!(estimate.borrow().total_credits(), 8);

    session.clear_all();
    estimate.changed().await.unwrap();
    assert!(estimate.borrow().is_nothing_selected());
}

#[tokio::test]
async fn test_credit_settings_fall_back_on_error() {
    let mock = MockStudio::new();
    let settings = fetch_credit_settings(&*mock, CreditSettings::new(3)).await;
    assert_eq!(settings, CreditSettings::new(3));
}
