pub mod api;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod credits;
pub mod download;
pub mod error;
pub mod generation;
pub mod logging;
pub mod sanitize;
pub mod secrets;
pub mod selection;

pub use api::{GenerationBackend, ImageFetcher, ResultsBackend, SelectionBackend, StudioClient};
pub use cache::{ResultsCache, ResultsSnapshot, SwrCache};
pub use catalog::{CollectionId, ImageType, OrnamentType, Product, ProductId, ProductUpload};
pub use config::{load_config, load_config_from_str, Config};
pub use credits::{fetch_credit_settings, spawn_credit_estimator, CreditEstimate, CreditSettings};
pub use download::{DownloadItem, DownloadReport, FsSaveTarget, SaveTarget, SequentialDownloader};
pub use error::{ApiError, AtelierError, ConfigError, DownloadError, Result};
pub use generation::{
    GenerationOrchestrator, GenerationOutcome, GenerationProgressBroadcaster, GenerationRequest,
    GenerationState, ValidationError,
};
pub use secrets::{SecretError, SecretSources};
pub use selection::{
    SaveOutcome, SelectionEntry, SelectionGrid, SelectionMatrix, SelectionSession, SelectionSource,
};
