use std::fmt;

use bsp_core::{CsrView, Element, Index, Order, Result, Structure};

use super::{assigned_values, compress, to_index, AssignCoordinates, Container, MatrixDims};
use crate::alloc::{assign, Allocator, Buffer, Cell, Global, LocalCell};

/// Compressed sparse row matrix owning its buffers
pub struct CsrMatrix<T: Element, I: Index, A: Allocator = Global> {
    pub(crate) dims: A::Cell<MatrixDims>,
    pub(crate) values: A::Buffer<T>,
    pub(crate) col_indices: A::Buffer<I>,
    pub(crate) row_ptr: A::Buffer<I>,
}

impl<T: Element, I: Index> CsrMatrix<T, I> {
    /// Empty 0x0 matrix on the process heap
    pub fn new() -> Self {
        Self {
            dims: LocalCell(MatrixDims::default()),
            values: Vec::new(),
            col_indices: Vec::new(),
            row_ptr: vec![I::ZERO],
        }
    }

    pub fn from_view(view: &CsrView<'_, T, I>) -> Result<Self> {
        Self::from_view_in(view, &Global)
    }
}

impl<T: Element, I: Index> Default for CsrMatrix<T, I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Element, I: Index, A: Allocator> CsrMatrix<T, I, A> {
    /// Empty 0x0 matrix whose storage comes from `alloc`
    pub fn new_in(alloc: &A) -> Result<Self> {
        let mut row_ptr = alloc.new_buffer::<I>()?;
        row_ptr.push(I::ZERO)?;
        Ok(Self {
            dims: alloc.new_cell(MatrixDims::default())?,
            values: alloc.new_buffer::<T>()?,
            col_indices: alloc.new_buffer::<I>()?,
            row_ptr,
        })
    }

    pub(crate) fn from_parts(
        dims: A::Cell<MatrixDims>,
        values: A::Buffer<T>,
        col_indices: A::Buffer<I>,
        row_ptr: A::Buffer<I>,
    ) -> Self {
        Self {
            dims,
            values,
            col_indices,
            row_ptr,
        }
    }

    /// Deep copy of `view` into storage from `alloc`
    pub fn from_view_in(view: &CsrView<'_, T, I>, alloc: &A) -> Result<Self> {
        let mut matrix = Self::new_in(alloc)?;
        matrix.copy_from_view(view)?;
        Ok(matrix)
    }

    /// Replace the contents with a copy of `view`; the view is not validated
    pub fn copy_from_view(&mut self, view: &CsrView<'_, T, I>) -> Result<()> {
        self.assign(view.values, view.col_indices, view.row_ptr)?;
        self.dims.set(MatrixDims {
            structure: view.structure as u8,
            is_iso: view.is_iso as u8,
            ..MatrixDims::new(view.nrows, view.ncols)
        })
    }

    /// Replace all three buffers
    pub fn assign(&mut self, values: &[T], col_indices: &[I], row_ptr: &[I]) -> Result<()> {
        assign(&mut self.values, values)?;
        assign(&mut self.col_indices, col_indices)?;
        assign(&mut self.row_ptr, row_ptr)
    }

    /// Append one row and grow the row count by one
    pub fn push_row(&mut self, col_indices: &[I], values: &[T]) -> Result<()> {
        self.col_indices.extend_from_slice(col_indices)?;
        if !self.is_iso() {
            self.values.extend_from_slice(values)?;
        }
        self.row_ptr.push(to_index(self.col_indices.len())?)?;
        let mut dims = self.dims.get();
        dims.nrows += 1;
        self.dims.set(dims)
    }

    pub fn reserve(&mut self, additional: usize) -> Result<()> {
        self.values.reserve(additional)?;
        self.col_indices.reserve(additional)
    }

    pub fn shape(&self) -> (usize, usize) {
        self.dims.get().shape()
    }

    pub fn stored_count(&self) -> usize {
        self.col_indices.len()
    }

    pub fn structure(&self) -> Structure {
        self.dims.get().structure()
    }

    pub fn is_iso(&self) -> bool {
        self.dims.get().is_iso()
    }

    /// Set the logical shape; buffers are left untouched
    pub fn set_shape(&mut self, nrows: usize, ncols: usize) -> Result<()> {
        let dims = self.dims.get();
        self.dims.set(MatrixDims {
            nrows: nrows as u64,
            ncols: ncols as u64,
            ..dims
        })
    }

    pub fn set_structure(&mut self, structure: Structure) -> Result<()> {
        let mut dims = self.dims.get();
        dims.structure = structure as u8;
        self.dims.set(dims)
    }

    pub fn set_iso(&mut self, is_iso: bool) -> Result<()> {
        let mut dims = self.dims.get();
        dims.is_iso = is_iso as u8;
        self.dims.set(dims)
    }

    pub fn values(&self) -> &[T] {
        self.values.as_slice()
    }

    pub fn col_indices(&self) -> &[I] {
        self.col_indices.as_slice()
    }

    pub fn row_ptr(&self) -> &[I] {
        self.row_ptr.as_slice()
    }

    pub fn values_mut(&mut self) -> &mut A::Buffer<T> {
        &mut self.values
    }

    pub fn col_indices_mut(&mut self) -> &mut A::Buffer<I> {
        &mut self.col_indices
    }

    pub fn row_ptr_mut(&mut self) -> &mut A::Buffer<I> {
        &mut self.row_ptr
    }

    /// Zero-copy view of the current contents
    pub fn view(&self) -> CsrView<'_, T, I> {
        let dims = self.dims.get();
        let (nrows, ncols) = dims.shape();
        CsrView::new(
            nrows,
            ncols,
            self.values.as_slice(),
            self.col_indices.as_slice(),
            self.row_ptr.as_slice(),
        )
        .with_structure(dims.structure())
        .with_iso(dims.is_iso())
    }
}

impl<T: Element, I: Index, A: Allocator> Container for CsrMatrix<T, I, A> {
    type View<'a>
        = CsrView<'a, T, I>
    where
        Self: 'a;

    fn view(&self) -> CsrView<'_, T, I> {
        CsrMatrix::view(self)
    }
}

impl<T: Element, I: Index, A: Allocator> AssignCoordinates<T> for CsrMatrix<T, I, A> {
    fn preferred_order(&self) -> Order {
        Order::RowMajor
    }

    fn assign_coordinates(
        &mut self,
        nrows: usize,
        ncols: usize,
        entries: &[(usize, usize, T)],
        iso: Option<T>,
    ) -> Result<()> {
        let row_ptr: Vec<I> = compress(entries.iter().map(|(r, _, _)| *r), nrows)?;
        let col_indices = entries
            .iter()
            .map(|(_, c, _)| to_index(*c))
            .collect::<Result<Vec<I>>>()?;
        self.assign(&assigned_values(entries, iso), &col_indices, &row_ptr)?;
        let dims = self.dims.get();
        self.dims.set(MatrixDims {
            nrows: nrows as u64,
            ncols: ncols as u64,
            is_iso: iso.is_some() as u8,
            ..dims
        })
    }

    fn assign_structure(&mut self, structure: Structure) -> Result<()> {
        self.set_structure(structure)
    }
}

impl<T: Element, I: Index, A: Allocator> fmt::Debug for CsrMatrix<T, I, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CsrMatrix")
            .field("shape", &self.shape())
            .field("nnz", &self.stored_count())
            .field("structure", &self.structure())
            .field("is_iso", &self.is_iso())
            .finish()
    }
}
