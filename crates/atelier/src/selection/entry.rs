use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::catalog::{ImageType, ProductId};

/// Which image types to generate for a single product.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SelectionEntry {
    #[serde(default)]
    pub plain_bg: bool,
    #[serde(default)]
    pub bg_replace: bool,
    #[serde(default)]
    pub model: bool,
    #[serde(default)]
    pub campaign: bool,
}

impl SelectionEntry {
    /// All four types selected.
    pub fn all() -> Self {
        Self {
            plain_bg: true,
            bg_replace: true,
            model: true,
            campaign: true,
        }
    }

    /// Builds an entry with exactly the given types selected.
    pub fn with(types: &[ImageType]) -> Self {
        let mut entry = Self::default();
        for t in types {
            entry.set(*t, true);
        }
        entry
    }

    pub fn get(&self, image_type: ImageType) -> bool {
        match image_type {
            ImageType::PlainBg => self.plain_bg,
            ImageType::BgReplace => self.bg_replace,
            ImageType::Model => self.model,
            ImageType::Campaign => self.campaign,
        }
    }

    pub fn set(&mut self, image_type: ImageType, value: bool) {
        match image_type {
            ImageType::PlainBg => self.plain_bg = value,
            ImageType::BgReplace => self.bg_replace = value,
            ImageType::Model => self.model = value,
            ImageType::Campaign => self.campaign = value,
        }
    }

    pub fn toggle(&mut self, image_type: ImageType) {
        let current = self.get(image_type);
        self.set(image_type, !current);
    }

    /// Number of image types selected for this product (0..=4).
    pub fn selected_count(&self) -> u32 {
        ImageType::ALL.iter().filter(|t| self.get(**t)).count() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.selected_count() == 0
    }
}

/// Aggregate "whole column selected" flags, derived from a grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ColumnState {
    pub plain_bg: bool,
    pub bg_replace: bool,
    pub model: bool,
    pub campaign: bool,
}

impl ColumnState {
    pub fn get(&self, image_type: ImageType) -> bool {
        match image_type {
            ImageType::PlainBg => self.plain_bg,
            ImageType::BgReplace => self.bg_replace,
            ImageType::Model => self.model,
            ImageType::Campaign => self.campaign,
        }
    }

    fn set(&mut self, image_type: ImageType, value: bool) {
        match image_type {
            ImageType::PlainBg => self.plain_bg = value,
            ImageType::BgReplace => self.bg_replace = value,
            ImageType::Model => self.model = value,
            ImageType::Campaign => self.campaign = value,
        }
    }
}

/// One row of a grid snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridRow {
    pub product_id: ProductId,
    pub entry: SelectionEntry,
}

/// Snapshot of the full selection matrix, in product upload order.
///
/// Serializes as a JSON object `{ "<product_id>": { "plain_bg": .. } }`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionGrid {
    rows: Vec<GridRow>,
}

impl SelectionGrid {
    pub fn new(rows: Vec<GridRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[GridRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn entry(&self, product_id: &ProductId) -> Option<&SelectionEntry> {
        self.rows
            .iter()
            .find(|row| &row.product_id == product_id)
            .map(|row| &row.entry)
    }

    /// Total number of images this grid asks for.
    pub fn total_selected_images(&self) -> u32 {
        self.rows.iter().map(|row| row.entry.selected_count()).sum()
    }

    /// Column flags: true iff every product has the type selected.
    /// A grid without products has no selected columns.
    pub fn column_state(&self) -> ColumnState {
        let mut state = ColumnState::default();
        if self.rows.is_empty() {
            return state;
        }
        for t in ImageType::ALL {
            state.set(t, self.rows.iter().all(|row| row.entry.get(t)));
        }
        state
    }
}

impl Serialize for SelectionGrid {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.rows.len()))?;
        for row in &self.rows {
            map.serialize_entry(row.product_id.as_str(), &row.entry)?;
        }
        map.end()
    }
}
