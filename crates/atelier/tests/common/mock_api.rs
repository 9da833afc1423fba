//! Scripted in-memory collaborators.

#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Notify;

use atelier::api::types::{CreditSettingsPayload, GenerationSubmission};
use atelier::api::{
    CreditSettingsResponse, GenerationBackend, ImageFetcher, JobStatusResponse, ResultsBackend,
    SelectionBackend, SubmitAck,
};
use atelier::catalog::{CollectionId, Product, ProductId, ProductUpload};
use atelier::download::SaveTarget;
use atelier::error::{ApiError, DownloadError};
use atelier::selection::SelectionGrid;

pub fn job_status(status: &str, completed: u32, total: u32) -> JobStatusResponse {
    JobStatusResponse {
        status: status.to_string(),
        completed_images: completed,
        total_images: total,
        error: None,
    }
}

/// In-memory studio backend. Every field is a script or a recorder.
#[derive(Default)]
pub struct MockStudio {
    pub products: Mutex<Vec<Product>>,
    pub saved_grids: Mutex<Vec<SelectionGrid>>,
    pub save_error: Mutex<Option<ApiError>>,
    /// When set, `save_selections` waits for a notification before returning.
    pub save_gate: Mutex<Option<Arc<Notify>>>,
    pub submissions: Mutex<Vec<GenerationSubmission>>,
    pub submit_result: Mutex<Option<Result<SubmitAck, ApiError>>>,
    /// Consumed front to back; the last entry repeats forever.
    pub statuses: Mutex<VecDeque<Result<JobStatusResponse, ApiError>>>,
    pub credit_response: Mutex<Option<Result<CreditSettingsResponse, ApiError>>>,
    pub failing_images: Mutex<HashSet<String>>,
    /// When set, `fetch_collection` sleeps this long before answering.
    pub results_delay: Mutex<Option<Duration>>,
    pub submit_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
    pub results_calls: AtomicUsize,
    pub image_calls: AtomicUsize,
    next_upload: AtomicUsize,
}

impl MockStudio {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_products(products: Vec<Product>) -> Arc<Self> {
        let mock = Self::default();
        *mock.products.lock().unwrap() = products;
        Arc::new(mock)
    }

    pub fn accept_job(&self, job_id: &str) {
        *self.submit_result.lock().unwrap() = Some(Ok(SubmitAck {
            job_id: job_id.to_string(),
            status: Some("queued".to_string()),
        }));
    }

    pub fn reject_submission(&self, error: ApiError) {
        *self.submit_result.lock().unwrap() = Some(Err(error));
    }

    pub fn script_statuses(&self, statuses: Vec<Result<JobStatusResponse, ApiError>>) {
        *self.statuses.lock().unwrap() = statuses.into();
    }

    pub fn fail_image(&self, url: &str) {
        self.failing_images.lock().unwrap().insert(url.to_string());
    }

    pub fn credits_per_image(&self, credits: u32) {
        *self.credit_response.lock().unwrap() = Some(Ok(CreditSettingsResponse {
            success: true,
            settings: Some(CreditSettingsPayload {
                credits_per_image_generation: Some(credits),
            }),
        }));
    }

    pub fn slow_results(&self, delay: Duration) {
        *self.results_delay.lock().unwrap() = Some(delay);
    }

    pub fn network_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst) + self.status_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SelectionBackend for MockStudio {
    async fn upload_products(
        &self,
        _collection: &CollectionId,
        uploads: Vec<ProductUpload>,
    ) -> Result<Vec<Product>, ApiError> {
        let mut products = self.products.lock().unwrap();
        let mut created = Vec::new();
        for upload in uploads {
            let n = self.next_upload.fetch_add(1, Ordering::SeqCst) + 1;
            let ordinal = products.len() as u32 + 1;
            let product = Product::new(
                format!("up{}", n),
                ordinal,
                &format!("https://cdn.example.com/uploads/{}", upload.filename),
                upload.ornament_type,
            );
            products.push(product.clone());
            created.push(product);
        }
        Ok(created)
    }

    async fn delete_product(
        &self,
        _collection: &CollectionId,
        product: &ProductId,
    ) -> Result<(), ApiError> {
        let mut products = self.products.lock().unwrap();
        let before = products.len();
        products.retain(|p| &p.id != product);
        if products.len() == before {
            return Err(ApiError::Status {
                status: 404,
                body: String::new(),
            });
        }
        Ok(())
    }

    async fn fetch_products(&self, _collection: &CollectionId) -> Result<Vec<Product>, ApiError> {
        Ok(self.products.lock().unwrap().clone())
    }

    async fn save_selections(
        &self,
        _collection: &CollectionId,
        grid: &SelectionGrid,
    ) -> Result<(), ApiError> {
        let gate = self.save_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if let Some(error) = self.save_error.lock().unwrap().clone() {
            return Err(error);
        }

        self.saved_grids.lock().unwrap().push(grid.clone());
        let mut products = self.products.lock().unwrap();
        for product in products.iter_mut() {
            if let Some(entry) = grid.entry(&product.id) {
                product.generation_selections = Some(*entry);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl GenerationBackend for MockStudio {
    async fn submit_generation(
        &self,
        request: &GenerationSubmission,
    ) -> Result<SubmitAck, ApiError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        self.submissions.lock().unwrap().push(request.clone());
        self.submit_result
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Err(ApiError::Transport("no submission scripted".to_string())))
    }

    async fn job_status(&self, _job_id: &str) -> Result<JobStatusResponse, ApiError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let mut statuses = self.statuses.lock().unwrap();
        match statuses.len() {
            0 => Err(ApiError::Transport("no status scripted".to_string())),
            1 => statuses[0].clone(),
            _ => statuses
                .pop_front()
                .unwrap_or_else(|| Err(ApiError::Transport("no status".to_string()))),
        }
    }

    async fn credit_settings(&self) -> Result<CreditSettingsResponse, ApiError> {
        self.credit_response
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Err(ApiError::Transport("no credit settings scripted".to_string())))
    }
}

#[async_trait]
impl ResultsBackend for MockStudio {
    async fn fetch_collection(&self, collection: &CollectionId) -> Result<Value, ApiError> {
        let n = self.results_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.results_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(json!({ "id": collection.as_str(), "fetch": n }))
    }

    async fn fetch_model_stats(&self, _collection: &CollectionId) -> Result<Value, ApiError> {
        self.results_calls.fetch_add(1, Ordering::SeqCst);
        Ok(json!({ "models": [] }))
    }

    async fn fetch_history(&self, _collection: &CollectionId) -> Result<Value, ApiError> {
        self.results_calls.fetch_add(1, Ordering::SeqCst);
        Ok(json!([]))
    }
}

#[async_trait]
impl ImageFetcher for MockStudio {
    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>, ApiError> {
        self.image_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_images.lock().unwrap().contains(url) {
            return Err(ApiError::Status {
                status: 403,
                body: "CORS".to_string(),
            });
        }
        Ok(url.as_bytes().to_vec())
    }
}

/// Which tier was attempted for which file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TierCall {
    Blob(String),
    Link(String),
    External(String),
}

/// Save target that records calls and fails tiers for chosen file names.
#[derive(Default)]
pub struct RecordingTarget {
    pub calls: Mutex<Vec<TierCall>>,
    pub fail_link: Mutex<HashSet<String>>,
    pub fail_external: Mutex<HashSet<String>>,
}

impl RecordingTarget {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_all_tiers_for(&self, filename: &str) {
        self.fail_link.lock().unwrap().insert(filename.to_string());
        self.fail_external.lock().unwrap().insert(filename.to_string());
    }

    pub fn calls(&self) -> Vec<TierCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SaveTarget for RecordingTarget {
    async fn save_blob(&self, filename: &str, _bytes: &[u8]) -> Result<PathBuf, DownloadError> {
        self.calls
            .lock()
            .unwrap()
            .push(TierCall::Blob(filename.to_string()));
        Ok(PathBuf::from(filename))
    }

    async fn save_link(&self, filename: &str, url: &str) -> Result<PathBuf, DownloadError> {
        self.calls
            .lock()
            .unwrap()
            .push(TierCall::Link(filename.to_string()));
        if self.fail_link.lock().unwrap().contains(filename) {
            return Err(DownloadError::Fetch {
                url: url.to_string(),
                reason: "HTTP 403".to_string(),
            });
        }
        Ok(PathBuf::from(filename))
    }

    async fn open_external(&self, filename: &str, url: &str) -> Result<(), DownloadError> {
        self.calls
            .lock()
            .unwrap()
            .push(TierCall::External(filename.to_string()));
        if self.fail_external.lock().unwrap().contains(filename) {
            return Err(DownloadError::Handoff {
                url: url.to_string(),
                reason: "blocked".to_string(),
            });
        }
        Ok(())
    }
}
