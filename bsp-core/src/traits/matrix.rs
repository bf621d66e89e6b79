//! Format-agnostic access to canonical matrix views

use alloc::vec;
use alloc::vec::Vec;

use super::backend::NamedArray;
use super::element::Element;
use crate::format::{DataType, MatrixFormat, Structure};
use crate::Result;

/// Core matrix trait shared by every canonical view
///
/// The codec and both backend adapters work against this trait only, so a
/// view borrowed from a `Vec`, a memory-mapped file or a persistent heap is
/// encoded the same way.
pub trait MatrixView {
    /// The value type stored in this matrix
    type Value: Element;

    /// Canonical format tag of this view
    fn format(&self) -> MatrixFormat;

    /// Get matrix dimensions as (rows, cols)
    fn dimensions(&self) -> (usize, usize);

    /// Shape as written to metadata
    fn shape(&self) -> Vec<u64> {
        let (rows, cols) = self.dimensions();
        vec![rows as u64, cols as u64]
    }

    /// Number of logically stored entries
    fn nnz(&self) -> usize;

    fn structure(&self) -> Structure {
        Structure::General
    }

    fn is_iso(&self) -> bool;

    /// Get an element at the specified position
    ///
    /// Returns `None` if the element is not stored or the position is out of
    /// bounds. Iso views return the broadcast value.
    fn get_element(&self, row: usize, col: usize) -> Option<Self::Value>;

    /// Check the structural invariants of the view
    fn validate(&self) -> Result<()>;

    /// Arrays to persist, keyed by dataset name
    fn arrays(&self) -> Vec<NamedArray<'_>>;

    fn value_type(&self) -> DataType {
        Self::Value::DATA_TYPE
    }

    /// Element type of the index arrays, `None` for dense formats
    fn index_type(&self) -> Option<DataType>;
}
