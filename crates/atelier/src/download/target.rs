//! Where downloaded images end up.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::config::DownloadConfig;
use crate::error::DownloadError;
use crate::sanitize::{redact_url, truncate_for_log};

/// File that collects URLs that could not be saved automatically.
pub const MANUAL_DOWNLOADS_FILE: &str = "manual-downloads.txt";

const MAX_NAME_ATTEMPTS: u32 = 1000;

/// The three ways an image can be saved, tried in declaration order.
#[async_trait]
pub trait SaveTarget: Send + Sync {
    /// Saves already-fetched bytes.
    async fn save_blob(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf, DownloadError>;

    /// Saves by pulling the remote URL directly.
    async fn save_link(&self, filename: &str, url: &str) -> Result<PathBuf, DownloadError>;

    /// Hands the URL to something outside the process for the user to save.
    async fn open_external(&self, filename: &str, url: &str) -> Result<(), DownloadError>;
}

/// Saves into a local directory. Files are written under a hidden `.part`
/// name and renamed into place, and never overwrite an existing file: a
/// taken name gets a `_2`, `_3`, ... suffix.
pub struct FsSaveTarget {
    directory: PathBuf,
    client: Client,
}

/// A reserved destination plus the partial file being written for it.
struct PendingFile {
    final_path: PathBuf,
    part_path: PathBuf,
    file: File,
}

impl PendingFile {
    async fn commit(mut self) -> Result<PathBuf, DownloadError> {
        let write_error = |path: &Path, source| DownloadError::WriteFile {
            path: path.to_path_buf(),
            source,
        };
        if let Err(e) = self.file.flush().await {
            self.abort().await;
            return Err(write_error(&self.final_path, e));
        }
        drop(self.file);
        if let Err(e) = fs::rename(&self.part_path, &self.final_path).await {
            let _ = fs::remove_file(&self.part_path).await;
            let _ = fs::remove_file(&self.final_path).await;
            return Err(write_error(&self.final_path, e));
        }
        Ok(self.final_path)
    }

    async fn abort(&self) {
        let _ = fs::remove_file(&self.part_path).await;
        let _ = fs::remove_file(&self.final_path).await;
    }
}

impl FsSaveTarget {
    pub fn new<P: AsRef<Path>>(directory: P, client: Client) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
            client,
        }
    }

    pub fn from_config(config: &DownloadConfig, client: Client) -> Self {
        Self::new(config.resolved_directory(), client)
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.directory.join(MANUAL_DOWNLOADS_FILE)
    }

    async fn ensure_directory(&self) -> Result<(), DownloadError> {
        fs::create_dir_all(&self.directory)
            .await
            .map_err(|e| DownloadError::CreateDirectory {
                path: self.directory.clone(),
                source: e,
            })
    }

    /// Claims a free name with an exclusive create, then opens the partial
    /// file next to it.
    async fn begin(&self, filename: &str) -> Result<PendingFile, DownloadError> {
        self.ensure_directory().await?;

        let (base, ext) = match filename.rfind('.') {
            Some(dot) if dot > 0 => (&filename[..dot], Some(&filename[dot..])),
            _ => (filename, None),
        };

        for counter in 1..=MAX_NAME_ATTEMPTS {
            let candidate = match (counter, ext) {
                (1, _) => filename.to_string(),
                (n, Some(ext)) => format!("{}_{}{}", base, n, ext),
                (n, None) => format!("{}_{}", base, n),
            };
            let final_path = self.directory.join(&candidate);

            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&final_path)
                .await
            {
                Ok(_) => {
                    let part_path = self.directory.join(format!(".{}.part", candidate));
                    let file = match File::create(&part_path).await {
                        Ok(file) => file,
                        Err(e) => {
                            let _ = fs::remove_file(&final_path).await;
                            return Err(DownloadError::WriteFile {
                                path: part_path,
                                source: e,
                            });
                        }
                    };
                    return Ok(PendingFile {
                        final_path,
                        part_path,
                        file,
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(DownloadError::WriteFile {
                        path: final_path,
                        source: e,
                    })
                }
            }
        }

        Err(DownloadError::WriteFile {
            path: self.directory.join(filename),
            source: std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("no free name after {} attempts", MAX_NAME_ATTEMPTS),
            ),
        })
    }
}

#[async_trait]
impl SaveTarget for FsSaveTarget {
    async fn save_blob(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf, DownloadError> {
        let mut pending = self.begin(filename).await?;
        if let Err(e) = pending.file.write_all(bytes).await {
            pending.abort().await;
            return Err(DownloadError::WriteFile {
                path: pending.final_path,
                source: e,
            });
        }
        let path = pending.commit().await?;
        log::debug!("Saved {} ({} bytes)", path.display(), bytes.len());
        Ok(path)
    }

    async fn save_link(&self, filename: &str, url: &str) -> Result<PathBuf, DownloadError> {
        let fetch_error = |reason: String| DownloadError::Fetch {
            url: redact_url(url),
            reason,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| fetch_error(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(fetch_error(format!(
                "HTTP {}: {}",
                status.as_u16(),
                truncate_for_log(&body)
            )));
        }

        let mut pending = self.begin(filename).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0usize;
        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    pending.abort().await;
                    return Err(fetch_error(e.to_string()));
                }
            };
            if let Err(e) = pending.file.write_all(&chunk).await {
                pending.abort().await;
                return Err(DownloadError::WriteFile {
                    path: pending.final_path,
                    source: e,
                });
            }
            written += chunk.len();
        }

        let path = pending.commit().await?;
        log::debug!("Streamed {} ({} bytes)", path.display(), written);
        Ok(path)
    }

    async fn open_external(&self, filename: &str, url: &str) -> Result<(), DownloadError> {
        let handoff_error = |reason: String| DownloadError::Handoff {
            url: redact_url(url),
            reason,
        };

        self.ensure_directory()
            .await
            .map_err(|e| handoff_error(e.to_string()))?;

        let mut manifest = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.manifest_path())
            .await
            .map_err(|e| handoff_error(e.to_string()))?;
        manifest
            .write_all(format!("{}\t{}\n", filename, url).as_bytes())
            .await
            .map_err(|e| handoff_error(e.to_string()))?;
        manifest
            .flush()
            .await
            .map_err(|e| handoff_error(e.to_string()))?;

        log::info!(
            "Listed {} for manual download in {}",
            filename,
            self.manifest_path().display()
        );
        Ok(())
    }
}
