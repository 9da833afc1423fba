//! Sequential batch downloads with a per-item fallback ladder.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{info_span, Instrument};
use uuid::Uuid;

use super::naming::download_filename;
use super::target::SaveTarget;
use crate::api::ImageFetcher;
use crate::catalog::ImageType;
use crate::config::DownloadConfig;
use crate::error::DownloadError;
use crate::sanitize::redact_url;

/// One produced image to save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadItem {
    pub url: String,
    /// Product position, 1-based.
    pub ordinal: u32,
    pub image_type: ImageType,
    pub variant: Option<String>,
}

impl DownloadItem {
    pub fn new(url: impl Into<String>, ordinal: u32, image_type: ImageType) -> Self {
        Self {
            url: url.into(),
            ordinal,
            image_type,
            variant: None,
        }
    }

    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = Some(variant.into());
        self
    }

    pub fn filename(&self) -> String {
        download_filename(
            self.ordinal,
            self.image_type,
            self.variant.as_deref(),
            &self.url,
        )
    }
}

/// Which rung of the ladder saved an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadMethod {
    Blob,
    DirectLink,
    External,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemResult {
    Saved {
        method: DownloadMethod,
        /// `None` for external hand-offs.
        path: Option<PathBuf>,
    },
    Failed {
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemReport {
    pub filename: String,
    pub url: String,
    pub result: ItemResult,
}

impl ItemReport {
    pub fn method(&self) -> Option<DownloadMethod> {
        match &self.result {
            ItemResult::Saved { method, .. } => Some(*method),
            ItemResult::Failed { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadReport {
    pub batch_id: String,
    pub items: Vec<ItemReport>,
}

impl DownloadReport {
    pub fn succeeded(&self) -> usize {
        self.items.iter().filter(|i| i.method().is_some()).count()
    }

    pub fn failed(&self) -> usize {
        self.items.len() - self.succeeded()
    }
}

/// Live batch counters. `settled` counts items that reached any final result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DownloadState {
    pub running: bool,
    pub total: usize,
    pub settled: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Clears `running` when a batch ends, including when its future is dropped.
struct RunningGuard<'a> {
    state: &'a watch::Sender<DownloadState>,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.state.send_modify(|s| s.running = false);
    }
}

pub struct SequentialDownloader {
    fetcher: Arc<dyn ImageFetcher>,
    target: Arc<dyn SaveTarget>,
    item_delay: Duration,
    state: watch::Sender<DownloadState>,
}

impl SequentialDownloader {
    pub fn new(
        fetcher: Arc<dyn ImageFetcher>,
        target: Arc<dyn SaveTarget>,
        item_delay: Duration,
    ) -> Self {
        Self {
            fetcher,
            target,
            item_delay,
            state: watch::channel(DownloadState::default()).0,
        }
    }

    pub fn from_config(
        fetcher: Arc<dyn ImageFetcher>,
        target: Arc<dyn SaveTarget>,
        config: &DownloadConfig,
    ) -> Self {
        Self::new(fetcher, target, config.item_delay())
    }

    pub fn subscribe(&self) -> watch::Receiver<DownloadState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> DownloadState {
        self.state.borrow().clone()
    }

    /// False from the start of a batch until every item has settled.
    pub fn download_all_enabled(&self) -> bool {
        !self.state.borrow().running
    }

    /// Saves every item in order, pausing between items. A failed item never
    /// stops the batch. Rejected while another batch is running.
    pub async fn download_all(
        &self,
        items: Vec<DownloadItem>,
    ) -> Result<DownloadReport, DownloadError> {
        let total = items.len();
        let mut claimed = false;
        self.state.send_if_modified(|s| {
            if s.running {
                return false;
            }
            *s = DownloadState {
                running: true,
                total,
                ..DownloadState::default()
            };
            claimed = true;
            true
        });
        if !claimed {
            return Err(DownloadError::AlreadyRunning);
        }
        let _guard = RunningGuard { state: &self.state };

        let batch_id = Uuid::new_v4().to_string();
        let span = info_span!("download_batch", batch = %batch_id, items = total);
        let reports = self.run_batch(items).instrument(span).await;

        let report = DownloadReport { batch_id, items: reports };
        info!(
            "Download batch {} finished: {} saved, {} failed",
            report.batch_id,
            report.succeeded(),
            report.failed()
        );
        Ok(report)
    }

    async fn run_batch(&self, items: Vec<DownloadItem>) -> Vec<ItemReport> {
        let mut reports = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            if index > 0 && !self.item_delay.is_zero() {
                tokio::time::sleep(self.item_delay).await;
            }

            let report = self.download_one(&item).await;
            let saved = report.method().is_some();
            self.state.send_modify(|s| {
                s.settled += 1;
                if saved {
                    s.succeeded += 1;
                } else {
                    s.failed += 1;
                }
            });
            reports.push(report);
        }
        reports
    }

    /// Blob, then direct link, then external hand-off.
    async fn download_one(&self, item: &DownloadItem) -> ItemReport {
        let filename = item.filename();
        let url = redact_url(&item.url);
        let mut reasons = Vec::with_capacity(3);

        match self.save_as_blob(&filename, &item.url).await {
            Ok(path) => {
                return saved(item, filename, DownloadMethod::Blob, Some(path));
            }
            Err(e) => {
                debug!("Blob download of {} failed: {}", url, e);
                reasons.push(format!("blob: {}", e));
            }
        }

        match self.target.save_link(&filename, &item.url).await {
            Ok(path) => {
                return saved(item, filename, DownloadMethod::DirectLink, Some(path));
            }
            Err(e) => {
                debug!("Direct download of {} failed: {}", url, e);
                reasons.push(format!("direct link: {}", e));
            }
        }

        match self.target.open_external(&filename, &item.url).await {
            Ok(()) => saved(item, filename, DownloadMethod::External, None),
            Err(e) => {
                reasons.push(format!("external: {}", e));
                warn!("Could not save {}: {}", url, reasons.join("; "));
                ItemReport {
                    filename,
                    url: item.url.clone(),
                    result: ItemResult::Failed {
                        reason: reasons.join("; "),
                    },
                }
            }
        }
    }

    async fn save_as_blob(&self, filename: &str, url: &str) -> Result<PathBuf, DownloadError> {
        let bytes = self
            .fetcher
            .fetch_image(url)
            .await
            .map_err(|e| DownloadError::Fetch {
                url: redact_url(url),
                reason: e.to_string(),
            })?;
        self.target.save_blob(filename, &bytes).await
    }
}

fn saved(
    item: &DownloadItem,
    filename: String,
    method: DownloadMethod,
    path: Option<PathBuf>,
) -> ItemReport {
    ItemReport {
        filename,
        url: item.url.clone(),
        result: ItemResult::Saved { method, path },
    }
}
