//! Wire shapes of the studio backend endpoints used by this crate.

use serde::{Deserialize, Serialize};

use crate::catalog::{CollectionId, Product};
use crate::credits::CreditSettings;
use crate::error::ApiError;
use crate::selection::SelectionGrid;

#[derive(Debug, Clone, Deserialize)]
pub struct ProductsResponse {
    #[serde(default)]
    pub products: Vec<Product>,
}

#[derive(Debug, Serialize)]
pub struct SaveSelectionsRequest<'a> {
    pub selections: &'a SelectionGrid,
}

/// Body of a generation request.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationSubmission {
    pub collection_id: CollectionId,
    pub model_id: Option<String>,
    /// `null` when no selection state was available.
    pub selections: Option<SelectionGrid>,
}

/// Raw submission response: either an acknowledgment or `{ error }`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmitPayload {
    #[serde(default, alias = "jobId")]
    pub job_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Accepted generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitAck {
    pub job_id: String,
    pub status: Option<String>,
}

impl SubmitPayload {
    pub fn into_result(self) -> Result<SubmitAck, ApiError> {
        if let Some(error) = self.error.filter(|e| !e.trim().is_empty()) {
            return Err(ApiError::Rejected(error));
        }
        match self.job_id.filter(|id| !id.is_empty()) {
            Some(job_id) => Ok(SubmitAck {
                job_id,
                status: self.status,
            }),
            None => Err(ApiError::Decode(
                "generation response carried neither a job id nor an error".to_string(),
            )),
        }
    }
}

/// Job-status response, snake_case on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct JobStatusResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub completed_images: u32,
    #[serde(default)]
    pub total_images: u32,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreditSettingsPayload {
    #[serde(default)]
    pub credits_per_image_generation: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreditSettingsResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub settings: Option<CreditSettingsPayload>,
}

impl CreditSettingsResponse {
    /// Settings if the server reported them successfully.
    pub fn into_settings(self) -> Option<CreditSettings> {
        if !self.success {
            return None;
        }
        self.settings
            .and_then(|s| s.credits_per_image_generation)
            .map(CreditSettings::new)
    }
}

/// Error body shapes the backend uses.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorBody {
    pub(crate) fn into_message(self) -> Option<String> {
        self.error
            .or(self.message)
            .filter(|m| !m.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submit_error_payload_is_rejection() {
        let payload: SubmitPayload =
            serde_json::from_str(r#"{"error": "Insufficient credits"}"#).unwrap();
        assert_eq!(
            payload.into_result(),
            Err(ApiError::Rejected("Insufficient credits".to_string()))
        );
    }

    #[test]
    fn test_submit_ack() {
        let payload: SubmitPayload =
            serde_json::from_str(r#"{"job_id": "job-9", "status": "queued"}"#).unwrap();
        let ack = payload.into_result().unwrap();
        assert_eq!(ack.job_id, "job-9");
        assert_eq!(ack.status.as_deref(), Some("queued"));
    }

    #[test]
    fn test_submit_without_job_id_or_error() {
        let payload: SubmitPayload = serde_json::from_str("{}").unwrap();
        assert!(matches!(payload.into_result(), Err(ApiError::Decode(_))));
    }

    #[test]
    fn test_job_status_snake_case() {
        let status: JobStatusResponse = serde_json::from_str(
            r#"{"status": "running", "completed_images": 3, "total_images": 5}"#,
        )
        .unwrap();
        assert_eq!(status.completed_images, 3);
        assert_eq!(status.total_images, 5);
        assert!(status.error.is_none());
    }

    #[test]
    fn test_credit_settings_requires_success() {
        let ok: CreditSettingsResponse = serde_json::from_str(
            r#"{"success": true, "settings": {"credits_per_image_generation": 4}}"#,
        )
        .unwrap();
        assert_eq!(ok.into_settings(), Some(CreditSettings::new(4)));

        let failed: CreditSettingsResponse = serde_json::from_str(
            r#"{"success": false, "settings": {"credits_per_image_generation": 4}}"#,
        )
        .unwrap();
        assert_eq!(failed.into_settings(), None);
    }
}
