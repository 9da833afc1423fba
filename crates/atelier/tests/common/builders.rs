//! Builders for creating test data without repetitive boilerplate.

#![allow(dead_code)]

use atelier::catalog::{ImageType, OrnamentType, Product, ProductId};
use atelier::selection::{GridRow, SelectionEntry, SelectionGrid};

/// Builder for creating `Product` instances.
pub struct ProductBuilder {
    id: String,
    ordinal: u32,
    image_url: String,
    ornament_type: OrnamentType,
    selections: Option<SelectionEntry>,
}

impl ProductBuilder {
    /// A ring with no persisted selection.
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ordinal: 1,
            image_url: format!("https://cdn.example.com/uploads/{}.jpg", id),
            ornament_type: OrnamentType::Ring,
            selections: None,
        }
    }

    pub fn ordinal(mut self, ordinal: u32) -> Self {
        self.ordinal = ordinal;
        self
    }

    pub fn ornament(mut self, ornament: OrnamentType) -> Self {
        self.ornament_type = ornament;
        self
    }

    pub fn image_url(mut self, url: &str) -> Self {
        self.image_url = url.to_string();
        self
    }

    /// Persisted selection with the given types set.
    pub fn selected(mut self, types: &[ImageType]) -> Self {
        self.selections = Some(SelectionEntry::with(types));
        self
    }

    pub fn build(self) -> Product {
        let product = Product::new(self.id, self.ordinal, &self.image_url, self.ornament_type);
        match self.selections {
            Some(entry) => product.with_selections(entry),
            None => product,
        }
    }
}

/// `n` products with ids `p1..=pn` and matching ordinals.
pub fn products(n: u32) -> Vec<Product> {
    (1..=n)
        .map(|i| ProductBuilder::new(&format!("p{}", i)).ordinal(i).build())
        .collect()
}

pub fn pid(id: &str) -> ProductId {
    ProductId::new(id)
}

/// A grid with one row per entry, ids `p1..`.
pub fn grid_of(entries: &[&[ImageType]]) -> SelectionGrid {
    SelectionGrid::new(
        entries
            .iter()
            .enumerate()
            .map(|(i, types)| GridRow {
                product_id: ProductId::new(format!("p{}", i + 1)),
                entry: SelectionEntry::with(types),
            })
            .collect(),
    )
}
