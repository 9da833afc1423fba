//! Job status, generation state and user-facing messages.

use serde::Serialize;

use crate::api::JobStatusResponse;

/// Shown when a failure carries no server message.
pub const GENERIC_FAILURE_MESSAGE: &str = "Image generation failed. Please try again.";

pub const WAITING_MESSAGE: &str = "Waiting for job to start...";

pub fn progress_message(completed: u32, total: u32) -> String {
    format!("Processing product {} of {}", completed, total)
}

pub fn success_message(images: u32) -> String {
    let noun = if images == 1 { "image" } else { "images" };
    format!("Generated {} {} successfully.", images, noun)
}

/// Preconditions checked before anything is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Please upload at least one product image before generating.")]
    NoProducts,

    #[error("Please select a model before generating.")]
    NoModelSelected,

    #[error("Please select at least one image type to generate.")]
    NothingSelected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
    /// Anything else the server reports. Treated as still in progress.
    Other(String),
}

impl JobStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "queued" | "pending" => JobStatus::Queued,
            "running" | "processing" => JobStatus::Running,
            "completed" | "succeeded" => JobStatus::Completed,
            "failed" | "error" => JobStatus::Failed,
            _ => JobStatus::Other(raw.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// One parsed job-status response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub status: JobStatus,
    pub completed_images: u32,
    pub total_images: u32,
    pub error: Option<String>,
}

impl From<JobStatusResponse> for JobReport {
    fn from(response: JobStatusResponse) -> Self {
        Self {
            status: JobStatus::parse(&response.status),
            completed_images: response.completed_images,
            total_images: response.total_images,
            error: response.error.filter(|e| !e.trim().is_empty()),
        }
    }
}

impl JobReport {
    /// Images to report on success. Falls back to the total when the server
    /// left the completed count at zero.
    pub fn generated_images(&self) -> u32 {
        if self.completed_images > 0 {
            self.completed_images
        } else {
            self.total_images
        }
    }
}

/// Lifecycle of one generation, per collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GenerationState {
    Idle,
    Validating,
    Submitting,
    Polling {
        job_id: String,
        completed: u32,
        total: u32,
    },
    Succeeded {
        job_id: String,
        images: u32,
    },
    Failed {
        message: String,
    },
}

impl GenerationState {
    /// True while a generation occupies the collection.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            GenerationState::Validating
                | GenerationState::Submitting
                | GenerationState::Polling { .. }
        )
    }

    /// Banner text for the state, if any.
    pub fn message(&self) -> Option<String> {
        match self {
            GenerationState::Idle | GenerationState::Validating => None,
            GenerationState::Submitting => Some("Submitting generation request...".to_string()),
            GenerationState::Polling { total: 0, .. } => Some(WAITING_MESSAGE.to_string()),
            GenerationState::Polling {
                completed, total, ..
            } => Some(progress_message(*completed, *total)),
            GenerationState::Succeeded { images, .. } => Some(success_message(*images)),
            GenerationState::Failed { message } => Some(message.clone()),
        }
    }
}
