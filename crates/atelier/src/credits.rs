//! Credit cost of the current selection.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::api::GenerationBackend;
use crate::selection::SelectionGrid;

/// Credits charged per image when the server does not say otherwise.
pub const DEFAULT_CREDITS_PER_IMAGE: u32 = 1;

/// Server-supplied pricing, read once per screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditSettings {
    pub credits_per_image_generation: u32,
}

impl CreditSettings {
    pub fn new(credits_per_image_generation: u32) -> Self {
        Self {
            credits_per_image_generation,
        }
    }
}

impl Default for CreditSettings {
    fn default() -> Self {
        Self::new(DEFAULT_CREDITS_PER_IMAGE)
    }
}

/// Cost of a grid. `NothingSelected` is deliberately distinct from a zero
/// cost so it can block generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CreditEstimate {
    NothingSelected,
    Estimated { images: u32, credits: u64 },
}

impl CreditEstimate {
    pub fn compute(grid: &SelectionGrid, settings: &CreditSettings) -> Self {
        let images = grid.total_selected_images();
        if images == 0 {
            return CreditEstimate::NothingSelected;
        }
        CreditEstimate::Estimated {
            images,
            credits: u64::from(images) * u64::from(settings.credits_per_image_generation),
        }
    }

    pub fn total_selected_images(&self) -> u32 {
        match self {
            CreditEstimate::NothingSelected => 0,
            CreditEstimate::Estimated { images, .. } => *images,
        }
    }

    pub fn total_credits(&self) -> u64 {
        match self {
            CreditEstimate::NothingSelected => 0,
            CreditEstimate::Estimated { credits, .. } => *credits,
        }
    }

    pub fn is_nothing_selected(&self) -> bool {
        matches!(self, CreditEstimate::NothingSelected)
    }
}

impl std::fmt::Display for CreditEstimate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CreditEstimate::NothingSelected => write!(f, "No images selected"),
            CreditEstimate::Estimated { images, credits } => {
                let noun = if *images == 1 { "image" } else { "images" };
                write!(f, "{} {} \u{b7} {} credits", images, noun, credits)
            }
        }
    }
}

/// Fetches pricing, falling back to `fallback` rather than blocking the UI
/// when the endpoint fails or reports `success: false`.
pub async fn fetch_credit_settings(
    backend: &dyn GenerationBackend,
    fallback: CreditSettings,
) -> CreditSettings {
    match backend.credit_settings().await {
        Ok(response) => match response.into_settings() {
            Some(settings) => {
                log::debug!(
                    "Credit settings: {} per image",
                    settings.credits_per_image_generation
                );
                settings
            }
            None => {
                log::warn!(
                    "Credit settings endpoint reported no settings, using {} per image",
                    fallback.credits_per_image_generation
                );
                fallback
            }
        },
        Err(e) => {
            log::warn!(
                "Failed to fetch credit settings ({}), using {} per image",
                e,
                fallback.credits_per_image_generation
            );
            fallback
        }
    }
}

/// Recomputes the estimate whenever the grid or the settings change.
///
/// The task ends when the grid channel closes or every estimate receiver is
/// dropped. A closed settings channel just freezes the settings.
pub fn spawn_credit_estimator(
    mut grid_rx: watch::Receiver<SelectionGrid>,
    mut settings_rx: watch::Receiver<CreditSettings>,
) -> (watch::Receiver<CreditEstimate>, JoinHandle<()>) {
    let initial = CreditEstimate::compute(
        &grid_rx.borrow_and_update(),
        &settings_rx.borrow_and_update(),
    );
    let (tx, rx) = watch::channel(initial);

    let handle = tokio::spawn(async move {
        let mut settings_open = true;
        loop {
            tokio::select! {
                changed = grid_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                changed = settings_rx.changed(), if settings_open => {
                    if changed.is_err() {
                        settings_open = false;
                        continue;
                    }
                }
                _ = tx.closed() => break,
            }

            let settings = *settings_rx.borrow_and_update();
            let estimate = CreditEstimate::compute(&grid_rx.borrow_and_update(), &settings);
            tx.send_replace(estimate);
        }
        log::debug!("Credit estimator stopped");
    });

    (rx, handle)
}
