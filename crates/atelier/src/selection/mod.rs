//! Per-product image-type selection for the upload screen.

pub mod entry;
pub mod matrix;
pub mod session;

pub use entry::{ColumnState, GridRow, SelectionEntry, SelectionGrid};
pub use matrix::{SelectionMatrix, SelectionOp};
pub use session::{SaveOutcome, SelectionSession, SelectionSource};
