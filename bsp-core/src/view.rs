//! Canonical matrix views
//!
//! Non-owning descriptions of CSR, CSC, COO, dense matrix and dense vector
//! data. A view borrows its buffers; whether they come from a `Vec`, a
//! memory-mapped file or a persistent heap is invisible to the codec.

use alloc::vec;
use alloc::vec::Vec;

use crate::format::constants::arrays;
use crate::format::{MatrixFormat, Order, Structure};
use crate::traits::{Element, Index, MatrixView, NamedArray};
use crate::validation::{validate_compressed_pointers, validate_value_count};
use crate::{BinsparseError, DataType, Result};

fn check_square(structure: Structure, nrows: usize, ncols: usize) -> Result<()> {
    if !structure.is_general() && nrows != ncols {
        return Err(BinsparseError::invalid_argument(alloc::format!(
            "structure {} requires a square matrix, shape is {nrows}x{ncols}",
            structure.name().unwrap_or("general")
        )));
    }
    Ok(())
}

fn check_indices<I: Index>(array: &str, indices: &[I], nnz: usize) -> Result<()> {
    if indices.len() != nnz {
        return Err(BinsparseError::invalid_argument(alloc::format!(
            "{array} has {} entries, expected {nnz}",
            indices.len()
        )));
    }
    Ok(())
}

fn value_at<T: Element>(values: &[T], k: usize, is_iso: bool) -> Option<T> {
    if is_iso {
        values.first().copied()
    } else {
        values.get(k).copied()
    }
}

/// Position of `minor` within `pointers[major]..pointers[major + 1]`
fn find_compressed<I: Index>(
    pointers: &[I],
    indices: &[I],
    major: usize,
    minor: usize,
) -> Option<usize> {
    let start = pointers.get(major)?.to_usize()?;
    let end = pointers.get(major + 1)?.to_usize()?;
    let run = indices.get(start..end)?;
    run.iter()
        .position(|i| i.to_usize() == Some(minor))
        .map(|offset| start + offset)
}

/// Compressed Sparse Row view
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CsrView<'a, T, I> {
    pub nrows: usize,
    pub ncols: usize,
    pub nnz: usize,
    pub values: &'a [T],
    pub col_indices: &'a [I],
    pub row_ptr: &'a [I],
    pub structure: Structure,
    pub is_iso: bool,
}

impl<'a, T: Element, I: Index> CsrView<'a, T, I> {
    /// General, non-iso view; `nnz` is taken from `col_indices`
    pub fn new(
        nrows: usize,
        ncols: usize,
        values: &'a [T],
        col_indices: &'a [I],
        row_ptr: &'a [I],
    ) -> Self {
        Self {
            nrows,
            ncols,
            nnz: col_indices.len(),
            values,
            col_indices,
            row_ptr,
            structure: Structure::General,
            is_iso: false,
        }
    }

    pub fn with_structure(mut self, structure: Structure) -> Self {
        self.structure = structure;
        self
    }

    /// Mark `values` as a single broadcast value
    pub fn with_iso(mut self, is_iso: bool) -> Self {
        self.is_iso = is_iso;
        self
    }

    pub fn get(&self, row: usize, col: usize) -> Option<T> {
        let k = find_compressed(self.row_ptr, self.col_indices, row, col)?;
        value_at(self.values, k, self.is_iso)
    }
}

impl<T: Element, I: Index> MatrixView for CsrView<'_, T, I> {
    type Value = T;

    fn format(&self) -> MatrixFormat {
        MatrixFormat::Csr
    }

    fn dimensions(&self) -> (usize, usize) {
        (self.nrows, self.ncols)
    }

    fn nnz(&self) -> usize {
        self.nnz
    }

    fn structure(&self) -> Structure {
        self.structure
    }

    fn is_iso(&self) -> bool {
        self.is_iso
    }

    fn get_element(&self, row: usize, col: usize) -> Option<T> {
        self.get(row, col)
    }

    fn validate(&self) -> Result<()> {
        check_square(self.structure, self.nrows, self.ncols)?;
        validate_compressed_pointers("row_ptr", self.row_ptr, self.nrows, self.nnz)?;
        check_indices("col_indices", self.col_indices, self.nnz)?;
        validate_value_count("values", self.values.len(), self.nnz, self.is_iso)
    }

    fn arrays(&self) -> Vec<NamedArray<'_>> {
        vec![
            NamedArray::new(arrays::VALUES, T::slice_of(self.values)),
            NamedArray::new(arrays::INDICES_1, I::slice_of(self.col_indices)),
            NamedArray::new(arrays::POINTERS_TO_1, I::slice_of(self.row_ptr)),
        ]
    }

    fn index_type(&self) -> Option<DataType> {
        Some(I::DATA_TYPE)
    }
}

/// Compressed Sparse Column view
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CscView<'a, T, I> {
    pub nrows: usize,
    pub ncols: usize,
    pub nnz: usize,
    pub values: &'a [T],
    pub row_indices: &'a [I],
    pub col_ptr: &'a [I],
    pub structure: Structure,
    pub is_iso: bool,
}

impl<'a, T: Element, I: Index> CscView<'a, T, I> {
    /// General, non-iso view; `nnz` is taken from `row_indices`
    pub fn new(
        nrows: usize,
        ncols: usize,
        values: &'a [T],
        row_indices: &'a [I],
        col_ptr: &'a [I],
    ) -> Self {
        Self {
            nrows,
            ncols,
            nnz: row_indices.len(),
            values,
            row_indices,
            col_ptr,
            structure: Structure::General,
            is_iso: false,
        }
    }

    pub fn with_structure(mut self, structure: Structure) -> Self {
        self.structure = structure;
        self
    }

    pub fn with_iso(mut self, is_iso: bool) -> Self {
        self.is_iso = is_iso;
        self
    }

    pub fn get(&self, row: usize, col: usize) -> Option<T> {
        let k = find_compressed(self.col_ptr, self.row_indices, col, row)?;
        value_at(self.values, k, self.is_iso)
    }
}

impl<T: Element, I: Index> MatrixView for CscView<'_, T, I> {
    type Value = T;

    fn format(&self) -> MatrixFormat {
        MatrixFormat::Csc
    }

    fn dimensions(&self) -> (usize, usize) {
        (self.nrows, self.ncols)
    }

    fn nnz(&self) -> usize {
        self.nnz
    }

    fn structure(&self) -> Structure {
        self.structure
    }

    fn is_iso(&self) -> bool {
        self.is_iso
    }

    fn get_element(&self, row: usize, col: usize) -> Option<T> {
        self.get(row, col)
    }

    fn validate(&self) -> Result<()> {
        check_square(self.structure, self.nrows, self.ncols)?;
        validate_compressed_pointers("col_ptr", self.col_ptr, self.ncols, self.nnz)?;
        check_indices("row_indices", self.row_indices, self.nnz)?;
        validate_value_count("values", self.values.len(), self.nnz, self.is_iso)
    }

    fn arrays(&self) -> Vec<NamedArray<'_>> {
        vec![
            NamedArray::new(arrays::VALUES, T::slice_of(self.values)),
            NamedArray::new(arrays::INDICES_1, I::slice_of(self.row_indices)),
            NamedArray::new(arrays::POINTERS_TO_1, I::slice_of(self.col_ptr)),
        ]
    }

    fn index_type(&self) -> Option<DataType> {
        Some(I::DATA_TYPE)
    }
}

/// Coordinate view; entry order is preserved exactly as given
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CooView<'a, T, I> {
    pub nrows: usize,
    pub ncols: usize,
    pub nnz: usize,
    pub values: &'a [T],
    pub row_indices: &'a [I],
    pub col_indices: &'a [I],
    pub structure: Structure,
    pub is_iso: bool,
    /// Emit `COOC` instead of `COOR`
    pub column_oriented: bool,
}

impl<'a, T: Element, I: Index> CooView<'a, T, I> {
    pub fn new(
        nrows: usize,
        ncols: usize,
        values: &'a [T],
        row_indices: &'a [I],
        col_indices: &'a [I],
    ) -> Self {
        Self {
            nrows,
            ncols,
            nnz: row_indices.len(),
            values,
            row_indices,
            col_indices,
            structure: Structure::General,
            is_iso: false,
            column_oriented: false,
        }
    }

    pub fn with_structure(mut self, structure: Structure) -> Self {
        self.structure = structure;
        self
    }

    pub fn with_iso(mut self, is_iso: bool) -> Self {
        self.is_iso = is_iso;
        self
    }

    pub fn with_column_orientation(mut self, column_oriented: bool) -> Self {
        self.column_oriented = column_oriented;
        self
    }

    /// Linear scan; the last matching entry wins
    pub fn get(&self, row: usize, col: usize) -> Option<T> {
        let k = self
            .row_indices
            .iter()
            .zip(self.col_indices)
            .rposition(|(r, c)| r.to_usize() == Some(row) && c.to_usize() == Some(col))?;
        value_at(self.values, k, self.is_iso)
    }
}

impl<T: Element, I: Index> MatrixView for CooView<'_, T, I> {
    type Value = T;

    fn format(&self) -> MatrixFormat {
        if self.column_oriented {
            MatrixFormat::Cooc
        } else {
            MatrixFormat::Coor
        }
    }

    fn dimensions(&self) -> (usize, usize) {
        (self.nrows, self.ncols)
    }

    fn nnz(&self) -> usize {
        self.nnz
    }

    fn structure(&self) -> Structure {
        self.structure
    }

    fn is_iso(&self) -> bool {
        self.is_iso
    }

    fn get_element(&self, row: usize, col: usize) -> Option<T> {
        self.get(row, col)
    }

    fn validate(&self) -> Result<()> {
        check_square(self.structure, self.nrows, self.ncols)?;
        check_indices("row_indices", self.row_indices, self.nnz)?;
        check_indices("col_indices", self.col_indices, self.nnz)?;
        validate_value_count("values", self.values.len(), self.nnz, self.is_iso)
    }

    fn arrays(&self) -> Vec<NamedArray<'_>> {
        vec![
            NamedArray::new(arrays::VALUES, T::slice_of(self.values)),
            NamedArray::new(arrays::INDICES_0, I::slice_of(self.row_indices)),
            NamedArray::new(arrays::INDICES_1, I::slice_of(self.col_indices)),
        ]
    }

    fn index_type(&self) -> Option<DataType> {
        Some(I::DATA_TYPE)
    }
}

/// Dense matrix view
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DenseView<'a, T> {
    pub nrows: usize,
    pub ncols: usize,
    pub values: &'a [T],
    pub order: Order,
    pub structure: Structure,
    pub is_iso: bool,
}

impl<'a, T: Element> DenseView<'a, T> {
    pub fn new(nrows: usize, ncols: usize, values: &'a [T], order: Order) -> Self {
        Self {
            nrows,
            ncols,
            values,
            order,
            structure: Structure::General,
            is_iso: false,
        }
    }

    pub fn with_structure(mut self, structure: Structure) -> Self {
        self.structure = structure;
        self
    }

    pub fn with_iso(mut self, is_iso: bool) -> Self {
        self.is_iso = is_iso;
        self
    }

    pub fn get(&self, row: usize, col: usize) -> Option<T> {
        if row >= self.nrows || col >= self.ncols {
            return None;
        }
        let k = self.order.linear_index(row, col, self.nrows, self.ncols);
        value_at(self.values, k, self.is_iso)
    }
}

impl<T: Element> MatrixView for DenseView<'_, T> {
    type Value = T;

    fn format(&self) -> MatrixFormat {
        match self.order {
            Order::RowMajor => MatrixFormat::Dmatr,
            Order::ColumnMajor => MatrixFormat::Dmatc,
        }
    }

    fn dimensions(&self) -> (usize, usize) {
        (self.nrows, self.ncols)
    }

    fn nnz(&self) -> usize {
        self.nrows.saturating_mul(self.ncols)
    }

    fn structure(&self) -> Structure {
        self.structure
    }

    fn is_iso(&self) -> bool {
        self.is_iso
    }

    fn get_element(&self, row: usize, col: usize) -> Option<T> {
        self.get(row, col)
    }

    fn validate(&self) -> Result<()> {
        check_square(self.structure, self.nrows, self.ncols)?;
        let count = self.nrows.checked_mul(self.ncols).ok_or_else(|| {
            BinsparseError::invalid_argument(alloc::format!(
                "shape {}x{} overflows",
                self.nrows,
                self.ncols
            ))
        })?;
        validate_value_count("values", self.values.len(), count, self.is_iso)
    }

    fn arrays(&self) -> Vec<NamedArray<'_>> {
        vec![NamedArray::new(arrays::VALUES, T::slice_of(self.values))]
    }

    fn index_type(&self) -> Option<DataType> {
        None
    }
}

/// Dense vector view
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DenseVectorView<'a, T> {
    pub len: usize,
    pub values: &'a [T],
    pub is_iso: bool,
}

impl<'a, T: Element> DenseVectorView<'a, T> {
    pub fn new(values: &'a [T]) -> Self {
        Self {
            len: values.len(),
            values,
            is_iso: false,
        }
    }

    /// Vector of `len` copies of `values[0]`
    pub fn iso(len: usize, values: &'a [T]) -> Self {
        Self {
            len,
            values,
            is_iso: true,
        }
    }

    pub fn get(&self, i: usize) -> Option<T> {
        if i >= self.len {
            return None;
        }
        value_at(self.values, i, self.is_iso)
    }
}

impl<T: Element> MatrixView for DenseVectorView<'_, T> {
    type Value = T;

    fn format(&self) -> MatrixFormat {
        MatrixFormat::Dvec
    }

    fn dimensions(&self) -> (usize, usize) {
        (self.len, 1)
    }

    fn shape(&self) -> Vec<u64> {
        vec![self.len as u64]
    }

    fn nnz(&self) -> usize {
        self.len
    }

    fn is_iso(&self) -> bool {
        self.is_iso
    }

    fn get_element(&self, row: usize, col: usize) -> Option<T> {
        if col != 0 {
            return None;
        }
        self.get(row)
    }

    fn validate(&self) -> Result<()> {
        validate_value_count("values", self.values.len(), self.len, self.is_iso)
    }

    fn arrays(&self) -> Vec<NamedArray<'_>> {
        vec![NamedArray::new(arrays::VALUES, T::slice_of(self.values))]
    }

    fn index_type(&self) -> Option<DataType> {
        None
    }
}
