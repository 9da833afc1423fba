//! Per-product, per-image-type selection state.

use std::collections::HashMap;

use crate::catalog::{ImageType, Product, ProductId};

use super::entry::{ColumnState, GridRow, SelectionEntry, SelectionGrid};

/// A mutation of the matrix. Recorded so that changes made while a save is
/// in flight can be replayed on top of the refreshed server state.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionOp {
    ToggleCell(ProductId, ImageType),
    ToggleColumn(ImageType),
    SelectAll,
    ClearAll,
    AddProducts(Vec<Product>),
    RemoveProduct(ProductId),
}

/// Selection grid over the currently uploaded products.
///
/// Invariant: every product in `products` has exactly one entry, and there
/// are no entries for products that are not in `products`.
#[derive(Debug, Clone, Default)]
pub struct SelectionMatrix {
    products: Vec<Product>,
    entries: HashMap<ProductId, SelectionEntry>,
}

impl SelectionMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a matrix from a server payload, hydrating persisted selections.
    pub fn from_products(products: Vec<Product>) -> Self {
        let mut matrix = Self::new();
        matrix.add_products(products);
        matrix
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn product_count(&self) -> usize {
        self.products.len()
    }

    pub fn contains(&self, product_id: &ProductId) -> bool {
        self.products.iter().any(|p| &p.id == product_id)
    }

    /// Adds products in order. A missing `generation_selections` hydrates to
    /// the all-false entry. Products already present are skipped.
    /// Returns the number of products added.
    pub fn add_products(&mut self, products: impl IntoIterator<Item = Product>) -> usize {
        let mut added = 0;
        for product in products {
            if self.contains(&product.id) {
                log::debug!("Product {} already present, skipping", product.id);
                continue;
            }
            let entry = product.generation_selections.unwrap_or_default();
            self.entries.insert(product.id.clone(), entry);
            self.products.push(product);
            added += 1;
        }
        added
    }

    /// Removes a product together with its entry. Other entries are untouched.
    pub fn remove_product(&mut self, product_id: &ProductId) -> bool {
        let before = self.products.len();
        self.products.retain(|p| &p.id != product_id);
        self.entries.remove(product_id);
        self.products.len() != before
    }

    /// Entry for a product; the all-false default when none exists yet.
    pub fn entry(&self, product_id: &ProductId) -> SelectionEntry {
        self.entries.get(product_id).copied().unwrap_or_default()
    }

    fn entry_mut(&mut self, product_id: &ProductId) -> &mut SelectionEntry {
        self.entries.entry(product_id.clone()).or_default()
    }

    /// Flips a single cell. Unknown products are ignored so that no orphan
    /// entry is ever created. Returns whether the cell was changed.
    pub fn toggle_cell(&mut self, product_id: &ProductId, image_type: ImageType) -> bool {
        if !self.contains(product_id) {
            log::warn!(
                "Ignoring toggle of {} for unknown product {}",
                image_type.key(),
                product_id
            );
            return false;
        }
        self.entry_mut(product_id).toggle(image_type);
        true
    }

    /// Sets the type on every product to the opposite of its column state:
    /// not all selected -> select all, all selected -> clear all.
    /// Returns the value written.
    pub fn toggle_column(&mut self, image_type: ImageType) -> bool {
        let target = !self.column_state().get(image_type);
        let ids: Vec<ProductId> = self.products.iter().map(|p| p.id.clone()).collect();
        for id in &ids {
            self.entry_mut(id).set(image_type, target);
        }
        target
    }

    pub fn select_all(&mut self) {
        self.fill(true);
    }

    pub fn clear_all(&mut self) {
        self.fill(false);
    }

    fn fill(&mut self, value: bool) {
        let ids: Vec<ProductId> = self.products.iter().map(|p| p.id.clone()).collect();
        for id in &ids {
            let entry = self.entry_mut(id);
            for t in ImageType::ALL {
                entry.set(t, value);
            }
        }
    }

    /// Snapshot of every product's entry, in upload order.
    pub fn grid(&self) -> SelectionGrid {
        SelectionGrid::new(
            self.products
                .iter()
                .map(|p| GridRow {
                    product_id: p.id.clone(),
                    entry: self.entry(&p.id),
                })
                .collect(),
        )
    }

    pub fn column_state(&self) -> ColumnState {
        self.grid().column_state()
    }

    pub fn total_selected_images(&self) -> u32 {
        self.products
            .iter()
            .map(|p| self.entry(&p.id).selected_count())
            .sum()
    }

    /// Applies a recorded operation.
    pub fn apply(&mut self, op: &SelectionOp) {
        match op {
            SelectionOp::ToggleCell(id, t) => {
                self.toggle_cell(id, *t);
            }
            SelectionOp::ToggleColumn(t) => {
                self.toggle_column(*t);
            }
            SelectionOp::SelectAll => self.select_all(),
            SelectionOp::ClearAll => self.clear_all(),
            SelectionOp::AddProducts(products) => {
                self.add_products(products.iter().cloned());
            }
            SelectionOp::RemoveProduct(id) => {
                self.remove_product(id);
            }
        }
    }
}
