//! Submits generation requests and follows their jobs to a terminal status.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, info, warn};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info_span, Instrument};

use super::job::{
    success_message, GenerationState, JobReport, JobStatus, ValidationError,
    GENERIC_FAILURE_MESSAGE,
};
use super::progress::{GenerationProgressBroadcaster, GenerationProgressEvent};
use crate::api::{GenerationBackend, GenerationSubmission};
use crate::cache::ResultsCache;
use crate::catalog::CollectionId;
use crate::config::GenerationConfig;
use crate::error::ApiError;
use crate::selection::{SelectionGrid, SelectionSource};

type StateSender = Arc<watch::Sender<GenerationState>>;

/// Everything needed to start one generation.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub collection_id: CollectionId,
    /// Chosen in an earlier workflow step.
    pub model_id: Option<String>,
    pub product_count: usize,
    pub selected_images: u32,
    /// Sent as `null` when absent.
    pub selections: Option<SelectionGrid>,
}

impl GenerationRequest {
    /// Snapshots the current selection from its owner.
    pub fn from_source(
        collection_id: CollectionId,
        model_id: Option<String>,
        source: &dyn SelectionSource,
    ) -> Self {
        let selections = source.selections();
        Self {
            collection_id,
            model_id,
            product_count: source.product_count(),
            selected_images: selections
                .as_ref()
                .map_or(0, SelectionGrid::total_selected_images),
            selections,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.product_count == 0 {
            return Err(ValidationError::NoProducts);
        }
        if self.model_id.as_deref().map_or(true, |m| m.trim().is_empty()) {
            return Err(ValidationError::NoModelSelected);
        }
        if self.selected_images == 0 {
            return Err(ValidationError::NothingSelected);
        }
        Ok(())
    }
}

/// How a call to [`GenerationOrchestrator::generate`] ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    /// Blocked before any network call.
    Rejected(ValidationError),
    /// Another generation for the collection is still in flight.
    AlreadyRunning,
    Succeeded {
        job_id: String,
        images: u32,
        message: String,
    },
    Failed {
        job_id: Option<String>,
        message: String,
    },
    /// Polling stopped by the caller. The job itself may still finish.
    Cancelled { job_id: Option<String> },
}

impl GenerationOutcome {
    pub fn message(&self) -> Option<String> {
        match self {
            GenerationOutcome::Rejected(e) => Some(e.to_string()),
            GenerationOutcome::AlreadyRunning => None,
            GenerationOutcome::Succeeded { message, .. } => Some(message.clone()),
            GenerationOutcome::Failed { message, .. } => Some(message.clone()),
            GenerationOutcome::Cancelled { .. } => None,
        }
    }
}

fn failure_message(error: &ApiError) -> String {
    error
        .server_message()
        .map(str::to_string)
        .unwrap_or_else(|| GENERIC_FAILURE_MESSAGE.to_string())
}

pub struct GenerationOrchestrator {
    backend: Arc<dyn GenerationBackend>,
    config: GenerationConfig,
    states: Mutex<HashMap<CollectionId, StateSender>>,
    progress: GenerationProgressBroadcaster,
    results: Option<Arc<ResultsCache>>,
}

impl GenerationOrchestrator {
    pub fn new(backend: Arc<dyn GenerationBackend>, config: GenerationConfig) -> Self {
        Self {
            backend,
            config,
            states: Mutex::new(HashMap::new()),
            progress: GenerationProgressBroadcaster::default(),
            results: None,
        }
    }

    /// Revalidates this cache for the collection after every success.
    pub fn with_results_cache(mut self, results: Arc<ResultsCache>) -> Self {
        self.results = Some(results);
        self
    }

    pub fn with_progress(mut self, progress: GenerationProgressBroadcaster) -> Self {
        self.progress = progress;
        self
    }

    pub fn progress(&self) -> &GenerationProgressBroadcaster {
        &self.progress
    }

    fn lock_states(&self) -> MutexGuard<'_, HashMap<CollectionId, StateSender>> {
        self.states.lock().unwrap_or_else(|poisoned| {
            log::warn!("Generation state lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn state_sender(&self, collection: &CollectionId) -> StateSender {
        let mut states = self.lock_states();
        Arc::clone(
            states
                .entry(collection.clone())
                .or_insert_with(|| Arc::new(watch::channel(GenerationState::Idle).0)),
        )
    }

    /// Watches the collection's state. Starts at `Idle` for an unseen collection.
    pub fn subscribe(&self, collection: &CollectionId) -> watch::Receiver<GenerationState> {
        self.state_sender(collection).subscribe()
    }

    pub fn state(&self, collection: &CollectionId) -> GenerationState {
        let sender = self.state_sender(collection);
        let current = sender.borrow().clone();
        current
    }

    /// False while a generation for the collection is validating, submitting
    /// or polling.
    pub fn can_generate(&self, collection: &CollectionId) -> bool {
        !self.state(collection).is_busy()
    }

    /// Moves the collection to `Validating` unless it is already busy. Check
    /// and transition happen under one lock.
    fn claim(&self, collection: &CollectionId) -> Option<StateSender> {
        let mut states = self.lock_states();
        let sender = Arc::clone(
            states
                .entry(collection.clone())
                .or_insert_with(|| Arc::new(watch::channel(GenerationState::Idle).0)),
        );
        if sender.borrow().is_busy() {
            return None;
        }
        sender.send_replace(GenerationState::Validating);
        Some(sender)
    }

    /// Validates, submits and polls until the job is terminal, the caller
    /// cancels, or a request fails.
    pub async fn generate(
        &self,
        request: GenerationRequest,
        cancel: CancellationToken,
    ) -> GenerationOutcome {
        let span = info_span!(
            "generation",
            collection = %request.collection_id,
            images = request.selected_images
        );
        self.run(request, cancel).instrument(span).await
    }

    async fn run(
        &self,
        request: GenerationRequest,
        cancel: CancellationToken,
    ) -> GenerationOutcome {
        let collection = request.collection_id.clone();
        let Some(state) = self.claim(&collection) else {
            info!("Generation for {} already in progress", collection);
            return GenerationOutcome::AlreadyRunning;
        };

        if let Err(e) = request.validate() {
            debug!("Generation rejected: {}", e);
            state.send_replace(GenerationState::Idle);
            return GenerationOutcome::Rejected(e);
        }

        state.send_replace(GenerationState::Submitting);
        let submission = GenerationSubmission {
            collection_id: collection.clone(),
            model_id: request.model_id,
            selections: request.selections,
        };

        let ack = match self.backend.submit_generation(&submission).await {
            Ok(ack) => ack,
            Err(e) => {
                warn!("Generation submission failed: {}", e);
                let message = failure_message(&e);
                state.send_replace(GenerationState::Failed {
                    message: message.clone(),
                });
                return GenerationOutcome::Failed {
                    job_id: None,
                    message,
                };
            }
        };

        info!("Generation job {} accepted", ack.job_id);
        self.progress
            .send(GenerationProgressEvent::submitted(&ack.job_id, &collection));

        if cancel.is_cancelled() {
            return self.cancelled(&state, &collection, &ack.job_id);
        }

        state.send_replace(GenerationState::Polling {
            job_id: ack.job_id.clone(),
            completed: 0,
            total: 0,
        });
        self.poll(&state, &collection, &ack.job_id, &cancel).await
    }

    /// One status request at a time; responses are applied in order and a
    /// report whose completed count went backwards is ignored.
    async fn poll(
        &self,
        state: &StateSender,
        collection: &CollectionId,
        job_id: &str,
        cancel: &CancellationToken,
    ) -> GenerationOutcome {
        let mut last_completed = 0u32;

        loop {
            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => return self.cancelled(state, collection, job_id),
                response = self.backend.job_status(job_id) => response,
            };

            let report = match response {
                Ok(response) => JobReport::from(response),
                Err(e) => {
                    warn!("Status check for job {} failed: {}", job_id, e);
                    return self.failed(state, collection, job_id, failure_message(&e));
                }
            };

            match report.status {
                JobStatus::Completed => {
                    return self.succeeded(state, collection, job_id, &report).await;
                }
                JobStatus::Failed => {
                    let message = report
                        .error
                        .unwrap_or_else(|| GENERIC_FAILURE_MESSAGE.to_string());
                    return self.failed(state, collection, job_id, message);
                }
                JobStatus::Queued | JobStatus::Running | JobStatus::Other(_) => {}
            }

            if report.completed_images < last_completed {
                debug!(
                    "Ignoring stale report for job {} ({} < {})",
                    job_id, report.completed_images, last_completed
                );
            } else {
                last_completed = report.completed_images;
                state.send_replace(GenerationState::Polling {
                    job_id: job_id.to_string(),
                    completed: report.completed_images,
                    total: report.total_images,
                });
                self.progress.send(GenerationProgressEvent::progress(
                    job_id,
                    collection,
                    report.completed_images,
                    report.total_images,
                ));
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return self.cancelled(state, collection, job_id),
                _ = tokio::time::sleep(self.config.poll_interval()) => {}
            }
        }
    }

    async fn succeeded(
        &self,
        state: &StateSender,
        collection: &CollectionId,
        job_id: &str,
        report: &JobReport,
    ) -> GenerationOutcome {
        let images = report.generated_images();
        info!("Generation job {} completed with {} images", job_id, images);

        state.send_replace(GenerationState::Succeeded {
            job_id: job_id.to_string(),
            images,
        });
        self.progress
            .send(GenerationProgressEvent::completed(job_id, collection, images));
        // The banner timer starts with the banner, not after the refresh.
        self.schedule_banner_clear(state, job_id);

        if let Some(results) = &self.results {
            results.invalidate(collection);
            results.refresh(collection).await;
        }

        GenerationOutcome::Succeeded {
            job_id: job_id.to_string(),
            images,
            message: success_message(images),
        }
    }

    /// Returns the collection to `Idle` once the success banner has shown for
    /// the configured time, unless a newer run replaced it.
    fn schedule_banner_clear(&self, state: &StateSender, job_id: &str) {
        let state = Arc::clone(state);
        let job = job_id.to_string();
        let delay = self.config.success_banner();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            state.send_if_modified(|current| match current {
                GenerationState::Succeeded { job_id, .. } if *job_id == job => {
                    *current = GenerationState::Idle;
                    true
                }
                _ => false,
            });
        });
    }

    fn failed(
        &self,
        state: &StateSender,
        collection: &CollectionId,
        job_id: &str,
        message: String,
    ) -> GenerationOutcome {
        warn!("Generation job {} failed: {}", job_id, message);
        state.send_replace(GenerationState::Failed {
            message: message.clone(),
        });
        self.progress
            .send(GenerationProgressEvent::failed(job_id, collection, &message));
        GenerationOutcome::Failed {
            job_id: Some(job_id.to_string()),
            message,
        }
    }

    fn cancelled(
        &self,
        state: &StateSender,
        collection: &CollectionId,
        job_id: &str,
    ) -> GenerationOutcome {
        info!("Stopped polling job {}", job_id);
        state.send_replace(GenerationState::Idle);
        self.progress
            .send(GenerationProgressEvent::cancelled(job_id, collection));
        GenerationOutcome::Cancelled {
            job_id: Some(job_id.to_string()),
        }
    }
}
