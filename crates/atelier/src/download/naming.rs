//! Deterministic file names for produced images.

use reqwest::Url;

use crate::catalog::ImageType;
use crate::sanitize::sanitize_filename_component;

const DEFAULT_EXTENSION: &str = "png";
const MAX_EXTENSION_LEN: usize = 5;

/// `product-{ordinal:02}_{type}[_{variant}].{ext}`
///
/// The variant is dropped when nothing file-name-safe is left of it. The
/// extension comes from the URL path and defaults to `png`.
pub fn download_filename(
    ordinal: u32,
    image_type: ImageType,
    variant: Option<&str>,
    url: &str,
) -> String {
    let mut name = format!("product-{:02}_{}", ordinal, image_type.key());
    if let Some(variant) = variant.and_then(sanitize_filename_component) {
        name.push('_');
        name.push_str(&variant);
    }
    name.push('.');
    name.push_str(&extension_from_url(url));
    name
}

/// Lowercased extension of the URL's last path segment, or `png`.
pub fn extension_from_url(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return DEFAULT_EXTENSION.to_string();
    };
    parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back().map(str::to_string))
        .and_then(|last| {
            let (stem, ext) = last.rsplit_once('.')?;
            let valid = !stem.is_empty()
                && !ext.is_empty()
                && ext.len() <= MAX_EXTENSION_LEN
                && ext.chars().all(|c| c.is_ascii_alphanumeric());
            valid.then(|| ext.to_ascii_lowercase())
        })
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}
