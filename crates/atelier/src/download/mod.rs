//! Saving produced images one at a time.

pub mod downloader;
pub mod naming;
pub mod target;

pub use downloader::{
    DownloadItem, DownloadMethod, DownloadReport, DownloadState, ItemReport, ItemResult,
    SequentialDownloader,
};
pub use naming::{download_filename, extension_from_url};
pub use target::{FsSaveTarget, SaveTarget, MANUAL_DOWNLOADS_FILE};
