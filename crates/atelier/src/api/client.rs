//! HTTP client for the studio backend.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::types::{
    CreditSettingsResponse, ErrorBody, GenerationSubmission, JobStatusResponse, ProductsResponse,
    SaveSelectionsRequest, SubmitAck, SubmitPayload,
};
use super::{GenerationBackend, ImageFetcher, ResultsBackend, SelectionBackend};
use crate::catalog::{CollectionId, Product, ProductId, ProductUpload};
use crate::config::ApiConfig;
use crate::error::{ApiError, AtelierError, ConfigError};
use crate::sanitize::{redact_url, truncate_for_log};
use crate::selection::SelectionGrid;

/// Creates an HTTP client with the configured timeouts.
pub(crate) fn create_http_client(
    connect_timeout: Duration,
    request_timeout: Duration,
) -> Result<Client, ApiError> {
    Client::builder()
        .connect_timeout(connect_timeout)
        .timeout(request_timeout)
        .build()
        .map_err(|e| ApiError::Transport(format!("Failed to create HTTP client: {}", e)))
}

/// Reads a non-success response into an `ApiError`, preferring the server's
/// own `{ error }` / `{ message }` text.
async fn error_from_response(response: Response) -> ApiError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(&body) {
        if let Some(message) = parsed.into_message() {
            return ApiError::Rejected(message);
        }
    }
    ApiError::Status {
        status: status.as_u16(),
        body: truncate_for_log(&body),
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    if !response.status().is_success() {
        return Err(error_from_response(response).await);
    }
    response
        .json::<T>()
        .await
        .map_err(|e| ApiError::Decode(e.to_string()))
}

async fn expect_success(response: Response) -> Result<(), ApiError> {
    if response.status().is_success() {
        Ok(())
    } else {
        Err(error_from_response(response).await)
    }
}

/// Studio backend client. Implements every backend trait in this crate.
#[derive(Clone)]
pub struct StudioClient {
    client: Client,
    base_url: Url,
    token: Option<SecretString>,
}

impl StudioClient {
    /// Creates a client from the `api` config section, resolving the token
    /// from the configured sources.
    pub fn from_config(config: &ApiConfig) -> Result<Self, AtelierError> {
        let base_url = Url::parse(&config.base_url).map_err(|e| ConfigError::InvalidBaseUrl {
            url: config.base_url.clone(),
            reason: e.to_string(),
        })?;
        let token = config.token_sources().resolve_optional()?;
        let client = create_http_client(
            Duration::from_secs(config.connect_timeout_secs),
            Duration::from_secs(config.request_timeout_secs),
        )?;

        info!(
            "Studio client targeting {} ({})",
            redact_url(base_url.as_str()),
            if token.is_some() { "authenticated" } else { "anonymous" }
        );

        Ok(Self::with_client(client, base_url, token))
    }

    pub fn with_client(client: Client, base_url: Url, token: Option<SecretString>) -> Self {
        Self {
            client,
            base_url,
            token,
        }
    }

    /// The underlying HTTP client, shared with download targets.
    pub fn http(&self) -> &Client {
        &self.client
    }

    /// Builds `base/<segments..>` with each segment percent-encoded.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                ApiError::Transport(format!("Base URL cannot be a base: {}", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token.expose_secret()),
            None => builder,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, ApiError> {
        let url = self.endpoint(segments)?;
        debug!("GET {}", url.path());
        let response = self.authorized(self.client.get(url)).send().await?;
        decode(response).await
    }
}

#[async_trait]
impl SelectionBackend for StudioClient {
    async fn upload_products(
        &self,
        collection: &CollectionId,
        uploads: Vec<ProductUpload>,
    ) -> Result<Vec<Product>, ApiError> {
        let url = self.endpoint(&["collections", collection.as_str(), "products"])?;

        let mut form = Form::new();
        for upload in uploads {
            let mime = upload.mime_type();
            let part = Part::bytes(upload.bytes)
                .file_name(upload.filename)
                .mime_str(&mime)
                .map_err(|e| ApiError::Transport(format!("Invalid MIME type '{}': {}", mime, e)))?;
            form = form
                .part("files[]", part)
                .text("ornament_types[]", upload.ornament_type.as_str());
        }

        let response = self
            .authorized(self.client.post(url))
            .multipart(form)
            .send()
            .await?;
        let body: ProductsResponse = decode(response).await?;
        Ok(body.products)
    }

    async fn delete_product(
        &self,
        collection: &CollectionId,
        product: &ProductId,
    ) -> Result<(), ApiError> {
        let url = self.endpoint(&[
            "collections",
            collection.as_str(),
            "products",
            product.as_str(),
        ])?;
        let response = self.authorized(self.client.delete(url)).send().await?;
        expect_success(response).await
    }

    async fn fetch_products(&self, collection: &CollectionId) -> Result<Vec<Product>, ApiError> {
        let body: ProductsResponse = self
            .get_json(&["collections", collection.as_str(), "products"])
            .await?;
        Ok(body.products)
    }

    async fn save_selections(
        &self,
        collection: &CollectionId,
        grid: &SelectionGrid,
    ) -> Result<(), ApiError> {
        let url = self.endpoint(&["collections", collection.as_str(), "selections"])?;
        let response = self
            .authorized(self.client.put(url))
            .json(&SaveSelectionsRequest { selections: grid })
            .send()
            .await?;
        expect_success(response).await
    }
}

#[async_trait]
impl GenerationBackend for StudioClient {
    async fn submit_generation(
        &self,
        request: &GenerationSubmission,
    ) -> Result<SubmitAck, ApiError> {
        let url = self.endpoint(&["collections", request.collection_id.as_str(), "generate"])?;
        let response = self
            .authorized(self.client.post(url))
            .json(request)
            .send()
            .await?;
        let payload: SubmitPayload = decode(response).await?;
        payload.into_result()
    }

    async fn job_status(&self, job_id: &str) -> Result<JobStatusResponse, ApiError> {
        self.get_json(&["generation-jobs", job_id]).await
    }

    async fn credit_settings(&self) -> Result<CreditSettingsResponse, ApiError> {
        self.get_json(&["credit-settings"]).await
    }
}

#[async_trait]
impl ResultsBackend for StudioClient {
    async fn fetch_collection(&self, collection: &CollectionId) -> Result<Value, ApiError> {
        self.get_json(&["collections", collection.as_str()]).await
    }

    async fn fetch_model_stats(&self, collection: &CollectionId) -> Result<Value, ApiError> {
        self.get_json(&["collections", collection.as_str(), "model-stats"])
            .await
    }

    async fn fetch_history(&self, collection: &CollectionId) -> Result<Value, ApiError> {
        self.get_json(&["collections", collection.as_str(), "history"])
            .await
    }
}

#[async_trait]
impl ImageFetcher for StudioClient {
    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>, ApiError> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }
}
