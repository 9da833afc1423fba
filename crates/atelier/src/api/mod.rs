//! Seams to the studio backend.
//!
//! Each consumer depends on the narrowest trait it needs; [`StudioClient`]
//! implements all of them over HTTP.

pub mod client;
pub mod types;

use async_trait::async_trait;
use serde_json::Value;

use crate::catalog::{CollectionId, Product, ProductId, ProductUpload};
use crate::error::ApiError;
use crate::selection::SelectionGrid;

pub use client::StudioClient;
pub use types::{
    CreditSettingsResponse, GenerationSubmission, JobStatusResponse, SubmitAck, SubmitPayload,
};

/// Product upload and selection persistence.
#[async_trait]
pub trait SelectionBackend: Send + Sync {
    async fn upload_products(
        &self,
        collection: &CollectionId,
        uploads: Vec<ProductUpload>,
    ) -> Result<Vec<Product>, ApiError>;

    async fn delete_product(
        &self,
        collection: &CollectionId,
        product: &ProductId,
    ) -> Result<(), ApiError>;

    async fn fetch_products(&self, collection: &CollectionId) -> Result<Vec<Product>, ApiError>;

    async fn save_selections(
        &self,
        collection: &CollectionId,
        grid: &SelectionGrid,
    ) -> Result<(), ApiError>;
}

/// Generation submission, job status and pricing.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn submit_generation(&self, request: &GenerationSubmission)
        -> Result<SubmitAck, ApiError>;

    async fn job_status(&self, job_id: &str) -> Result<JobStatusResponse, ApiError>;

    async fn credit_settings(&self) -> Result<CreditSettingsResponse, ApiError>;
}

/// Opaque read endpoints backing the results view.
#[async_trait]
pub trait ResultsBackend: Send + Sync {
    async fn fetch_collection(&self, collection: &CollectionId) -> Result<Value, ApiError>;

    async fn fetch_model_stats(&self, collection: &CollectionId) -> Result<Value, ApiError>;

    async fn fetch_history(&self, collection: &CollectionId) -> Result<Value, ApiError>;
}

/// Fetches a produced image as raw bytes.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>, ApiError>;
}
