//! Generation orchestration: validate, submit, poll, report.

pub mod job;
pub mod orchestrator;
pub mod progress;

pub use job::{
    progress_message, success_message, GenerationState, JobReport, JobStatus, ValidationError,
    GENERIC_FAILURE_MESSAGE, WAITING_MESSAGE,
};
pub use orchestrator::{GenerationOrchestrator, GenerationOutcome, GenerationRequest};
pub use progress::{GenerationPhase, GenerationProgressBroadcaster, GenerationProgressEvent};
