//! Products uploaded into a collection and the image types that can be
//! generated from them.

use serde::{Deserialize, Serialize};

use crate::selection::SelectionEntry;

/// Identifier of a collection (project) on the studio backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionId(pub String);

impl CollectionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CollectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Durable, server-issued product identifier.
///
/// Selections are keyed by this id rather than by upload position, so
/// deleting a product never shifts the entries of the products after it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub String);

impl ProductId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ornament classification attached to every upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrnamentType {
    Ring,
    Necklace,
    Earrings,
    Bracelet,
    Bangle,
    Pendant,
    Anklet,
    Brooch,
    Set,
    Other,
}

impl OrnamentType {
    pub const ALL: [OrnamentType; 10] = [
        OrnamentType::Ring,
        OrnamentType::Necklace,
        OrnamentType::Earrings,
        OrnamentType::Bracelet,
        OrnamentType::Bangle,
        OrnamentType::Pendant,
        OrnamentType::Anklet,
        OrnamentType::Brooch,
        OrnamentType::Set,
        OrnamentType::Other,
    ];

    /// Wire tag used by the backend.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrnamentType::Ring => "ring",
            OrnamentType::Necklace => "necklace",
            OrnamentType::Earrings => "earrings",
            OrnamentType::Bracelet => "bracelet",
            OrnamentType::Bangle => "bangle",
            OrnamentType::Pendant => "pendant",
            OrnamentType::Anklet => "anklet",
            OrnamentType::Brooch => "brooch",
            OrnamentType::Set => "set",
            OrnamentType::Other => "other",
        }
    }

    /// Parses a wire tag, folding unknown tags into `Other`.
    pub fn from_tag(tag: &str) -> Self {
        let normalized = tag.trim().to_ascii_lowercase();
        match Self::ALL.iter().find(|t| t.as_str() == normalized) {
            Some(t) => *t,
            None => {
                log::warn!("Unknown ornament type '{}', treating as 'other'", tag);
                OrnamentType::Other
            }
        }
    }
}

impl<'de> Deserialize<'de> for OrnamentType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let tag = String::deserialize(deserializer)?;
        Ok(OrnamentType::from_tag(&tag))
    }
}

impl std::fmt::Display for OrnamentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The four kinds of image the generator can produce per product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageType {
    PlainBg,
    BgReplace,
    Model,
    Campaign,
}

impl ImageType {
    pub const ALL: [ImageType; 4] = [
        ImageType::PlainBg,
        ImageType::BgReplace,
        ImageType::Model,
        ImageType::Campaign,
    ];

    /// Snake-case key used on the wire and in filenames.
    pub fn key(&self) -> &'static str {
        match self {
            ImageType::PlainBg => "plain_bg",
            ImageType::BgReplace => "bg_replace",
            ImageType::Model => "model",
            ImageType::Campaign => "campaign",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.key() == key)
    }
}

impl std::fmt::Display for ImageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageType::PlainBg => write!(f, "Plain background"),
            ImageType::BgReplace => write!(f, "Background replace"),
            ImageType::Model => write!(f, "Model shot"),
            ImageType::Campaign => write!(f, "Campaign"),
        }
    }
}

/// One uploaded source image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    /// Position in upload order. Display only; never used as a key.
    #[serde(rename = "index")]
    pub ordinal: u32,
    pub image_url: String,
    pub ornament_type: OrnamentType,
    /// Selection persisted by an earlier save, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_selections: Option<SelectionEntry>,
}

impl Product {
    pub fn new(
        id: impl Into<String>,
        ordinal: u32,
        image_url: &str,
        ornament: OrnamentType,
    ) -> Self {
        Self {
            id: ProductId::new(id),
            ordinal,
            image_url: image_url.to_string(),
            ornament_type: ornament,
            generation_selections: None,
        }
    }

    pub fn with_selections(mut self, entry: SelectionEntry) -> Self {
        self.generation_selections = Some(entry);
        self
    }
}

/// A file queued for upload along with its required ornament tag.
#[derive(Debug, Clone)]
pub struct ProductUpload {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub ornament_type: OrnamentType,
}

impl ProductUpload {
    pub fn new(filename: &str, bytes: Vec<u8>, ornament_type: OrnamentType) -> Self {
        Self {
            filename: filename.to_string(),
            bytes,
            ornament_type,
        }
    }

    /// MIME type guessed from the filename, defaulting to octet-stream.
    pub fn mime_type(&self) -> String {
        mime_guess::from_path(&self.filename)
            .first_or_octet_stream()
            .essence_str()
            .to_string()
    }
}
