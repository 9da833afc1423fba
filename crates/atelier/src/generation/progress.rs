//! Generation progress broadcaster for streaming job updates to any number of
//! listeners (a desktop shell, a CLI progress bar, tests).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::catalog::CollectionId;

use super::job::{progress_message, success_message};

/// Phase of a generation run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GenerationPhase {
    Submitted,
    Progress,
    Completed,
    Failed,
    Cancelled,
}

impl std::fmt::Display for GenerationPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GenerationPhase::Submitted => write!(f, "Submitted"),
            GenerationPhase::Progress => write!(f, "In progress"),
            GenerationPhase::Completed => write!(f, "Completed"),
            GenerationPhase::Failed => write!(f, "Failed"),
            GenerationPhase::Cancelled => write!(f, "Cancelled"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationProgressEvent {
    pub job_id: String,
    pub collection_id: CollectionId,
    pub phase: GenerationPhase,
    pub completed: u32,
    pub total: u32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl GenerationProgressEvent {
    fn new(
        job_id: &str,
        collection_id: &CollectionId,
        phase: GenerationPhase,
        completed: u32,
        total: u32,
        message: String,
    ) -> Self {
        Self {
            job_id: job_id.to_string(),
            collection_id: collection_id.clone(),
            phase,
            completed,
            total,
            message,
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn submitted(job_id: &str, collection_id: &CollectionId) -> Self {
        Self::new(
            job_id,
            collection_id,
            GenerationPhase::Submitted,
            0,
            0,
            "Generation request accepted".to_string(),
        )
    }

    pub fn progress(
        job_id: &str,
        collection_id: &CollectionId,
        completed: u32,
        total: u32,
    ) -> Self {
        Self::new(
            job_id,
            collection_id,
            GenerationPhase::Progress,
            completed,
            total,
            progress_message(completed, total),
        )
    }

    pub fn completed(job_id: &str, collection_id: &CollectionId, images: u32) -> Self {
        Self::new(
            job_id,
            collection_id,
            GenerationPhase::Completed,
            images,
            images,
            success_message(images),
        )
    }

    pub fn failed(job_id: &str, collection_id: &CollectionId, error: &str) -> Self {
        let mut event = Self::new(
            job_id,
            collection_id,
            GenerationPhase::Failed,
            0,
            0,
            "Generation failed".to_string(),
        );
        event.error = Some(error.to_string());
        event
    }

    pub fn cancelled(job_id: &str, collection_id: &CollectionId) -> Self {
        Self::new(
            job_id,
            collection_id,
            GenerationPhase::Cancelled,
            0,
            0,
            "Stopped tracking generation".to_string(),
        )
    }
}

/// Broadcasts generation progress events.
#[derive(Clone)]
pub struct GenerationProgressBroadcaster {
    sender: Arc<broadcast::Sender<GenerationProgressEvent>>,
}

impl GenerationProgressBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn send(&self, event: GenerationProgressEvent) {
        // No receivers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GenerationProgressEvent> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for GenerationProgressBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}
