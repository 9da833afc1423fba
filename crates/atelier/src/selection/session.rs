//! The upload screen's selection state, owned by a single session.
//!
//! The session applies every mutation in dispatch order under one lock and
//! pushes the resulting grid to subscribers through a `watch` channel.
//! Consumers that only need a snapshot at a given moment (the generation
//! step) read it through the [`SelectionSource`] interface instead.

use std::sync::{Arc, RwLock, RwLockWriteGuard};

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::watch;

use crate::api::SelectionBackend;
use crate::catalog::{CollectionId, ImageType, Product, ProductId, ProductUpload};
use crate::error::ApiError;

use super::entry::{ColumnState, SelectionGrid};
use super::matrix::{SelectionMatrix, SelectionOp};

/// Result of persisting the grid. Never an error: the caller decides whether a
/// failed save blocks navigation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SaveOutcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// What the generation step needs from whoever owns the selection state.
#[async_trait]
pub trait SelectionSource: Send + Sync {
    /// Number of products currently uploaded.
    fn product_count(&self) -> usize;

    /// Current grid, or `None` when no selection state is available.
    fn selections(&self) -> Option<SelectionGrid>;

    /// Persists the current grid.
    async fn save_selections(&self) -> SaveOutcome;
}

struct SessionState {
    matrix: SelectionMatrix,
    revision: u64,
    /// Ops applied while at least one save was in flight, tagged with the
    /// revision they produced.
    journal: Vec<(u64, SelectionOp)>,
    /// Snapshot revisions of saves still in flight.
    pending_saves: Vec<u64>,
}

pub struct SelectionSession {
    collection_id: CollectionId,
    backend: Arc<dyn SelectionBackend>,
    state: RwLock<SessionState>,
    changes: watch::Sender<SelectionGrid>,
}

impl SelectionSession {
    /// Creates a session over an already fetched product list.
    pub fn new(
        collection_id: CollectionId,
        backend: Arc<dyn SelectionBackend>,
        products: Vec<Product>,
    ) -> Self {
        let matrix = SelectionMatrix::from_products(products);
        let (changes, _) = watch::channel(matrix.grid());
        Self {
            collection_id,
            backend,
            state: RwLock::new(SessionState {
                matrix,
                revision: 0,
                journal: Vec::new(),
                pending_saves: Vec::new(),
            }),
            changes,
        }
    }

    /// Fetches the collection's products and builds a session from them.
    pub async fn load(
        collection_id: CollectionId,
        backend: Arc<dyn SelectionBackend>,
    ) -> Result<Self, ApiError> {
        let products = backend.fetch_products(&collection_id).await?;
        log::info!(
            "Loaded {} products for collection {}",
            products.len(),
            collection_id
        );
        Ok(Self::new(collection_id, backend, products))
    }

    pub fn collection_id(&self) -> &CollectionId {
        &self.collection_id
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(|poisoned| {
            log::warn!("Selection state lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn read_matrix<T>(&self, f: impl FnOnce(&SelectionMatrix) -> T) -> T {
        match self.state.read() {
            Ok(state) => f(&state.matrix),
            Err(poisoned) => f(&poisoned.into_inner().matrix),
        }
    }

    fn dispatch(&self, op: SelectionOp) {
        let grid = {
            let mut state = self.write_state();
            state.matrix.apply(&op);
            state.revision += 1;
            if !state.pending_saves.is_empty() {
                let revision = state.revision;
                state.journal.push((revision, op));
            }
            state.matrix.grid()
        };
        self.changes.send_replace(grid);
    }

    /// Receives every grid change.
    pub fn subscribe(&self) -> watch::Receiver<SelectionGrid> {
        self.changes.subscribe()
    }

    pub fn toggle_cell(&self, product_id: &ProductId, image_type: ImageType) {
        self.dispatch(SelectionOp::ToggleCell(product_id.clone(), image_type));
    }

    pub fn toggle_column(&self, image_type: ImageType) {
        self.dispatch(SelectionOp::ToggleColumn(image_type));
    }

    pub fn select_all(&self) {
        self.dispatch(SelectionOp::SelectAll);
    }

    pub fn clear_all(&self) {
        self.dispatch(SelectionOp::ClearAll);
    }

    /// Adds products that finished uploading server-side.
    pub fn add_products(&self, products: Vec<Product>) {
        self.dispatch(SelectionOp::AddProducts(products));
    }

    pub fn remove_product(&self, product_id: &ProductId) {
        self.dispatch(SelectionOp::RemoveProduct(product_id.clone()));
    }

    /// Uploads files and adds the resulting products to the grid.
    pub async fn upload_products(
        &self,
        uploads: Vec<ProductUpload>,
    ) -> Result<Vec<Product>, ApiError> {
        if uploads.is_empty() {
            return Ok(Vec::new());
        }
        let count = uploads.len();
        let products = self
            .backend
            .upload_products(&self.collection_id, uploads)
            .await?;
        log::info!(
            "Uploaded {} files to collection {} ({} products returned)",
            count,
            self.collection_id,
            products.len()
        );
        self.add_products(products.clone());
        Ok(products)
    }

    /// Deletes a product on the backend, then drops it and its entry locally.
    pub async fn delete_product(&self, product_id: &ProductId) -> Result<(), ApiError> {
        self.backend
            .delete_product(&self.collection_id, product_id)
            .await?;
        self.remove_product(product_id);
        Ok(())
    }

    pub fn grid(&self) -> SelectionGrid {
        self.read_matrix(|m| m.grid())
    }

    pub fn products(&self) -> Vec<Product> {
        self.read_matrix(|m| m.products().to_vec())
    }

    pub fn column_state(&self) -> ColumnState {
        self.read_matrix(|m| m.column_state())
    }

    pub fn total_selected_images(&self) -> u32 {
        self.read_matrix(|m| m.total_selected_images())
    }

    pub fn is_saving(&self) -> bool {
        match self.state.read() {
            Ok(state) => !state.pending_saves.is_empty(),
            Err(poisoned) => !poisoned.into_inner().pending_saves.is_empty(),
        }
    }

    async fn persist(&self, grid: &SelectionGrid) -> Result<Vec<Product>, ApiError> {
        self.backend
            .save_selections(&self.collection_id, grid)
            .await?;
        self.backend.fetch_products(&self.collection_id).await
    }

    /// Saves the grid, then rebuilds local state from the refreshed server
    /// payload. Changes made locally while the save was in flight are replayed
    /// on top, so they are not lost. On failure local state is left as is.
    pub async fn save(&self) -> SaveOutcome {
        let (grid, snapshot) = {
            let mut state = self.write_state();
            let revision = state.revision;
            state.pending_saves.push(revision);
            (state.matrix.grid(), revision)
        };

        let result = self.persist(&grid).await;

        let (outcome, grid) = {
            let mut state = self.write_state();
            if let Some(pos) = state.pending_saves.iter().position(|r| *r == snapshot) {
                state.pending_saves.remove(pos);
            }

            let outcome = match result {
                Ok(products) => {
                    let mut rebuilt = SelectionMatrix::from_products(products);
                    let mut replayed = 0;
                    for (_, op) in state.journal.iter().filter(|(r, _)| *r > snapshot) {
                        rebuilt.apply(op);
                        replayed += 1;
                    }
                    if replayed > 0 {
                        log::debug!("Replayed {} local changes made during save", replayed);
                    }
                    state.matrix = rebuilt;
                    log::info!("Saved selections for collection {}", self.collection_id);
                    SaveOutcome::ok()
                }
                Err(e) => {
                    log::warn!(
                        "Failed to save selections for collection {}: {}",
                        self.collection_id,
                        e
                    );
                    let message = match (&e, e.server_message()) {
                        (_, Some(text)) => text.to_string(),
                        (ApiError::Status { status, .. }, None) => {
                            format!("Failed to save selections (HTTP {})", status)
                        }
                        _ => format!("Failed to save selections: {}", e),
                    };
                    SaveOutcome::failed(message)
                }
            };

            match state.pending_saves.iter().min().copied() {
                Some(floor) => state.journal.retain(|(r, _)| *r > floor),
                None => state.journal.clear(),
            }
            (outcome, state.matrix.grid())
        };

        self.changes.send_replace(grid);
        outcome
    }
}

#[async_trait]
impl SelectionSource for SelectionSession {
    fn product_count(&self) -> usize {
        self.read_matrix(|m| m.product_count())
    }

    fn selections(&self) -> Option<SelectionGrid> {
        Some(self.grid())
    }

    async fn save_selections(&self) -> SaveOutcome {
        self.save().await
    }
}
