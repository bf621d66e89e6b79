use std::fmt;

use bsp_core::{CscView, Element, Index, Order, Result, Structure};

use super::{assigned_values, compress, to_index, AssignCoordinates, Container, MatrixDims};
use crate::alloc::{assign, Allocator, Buffer, Cell, Global, LocalCell};

/// Compressed sparse column matrix owning its buffers
pub struct CscMatrix<T: Element, I: Index, A: Allocator = Global> {
    pub(crate) dims: A::Cell<MatrixDims>,
    pub(crate) values: A::Buffer<T>,
    pub(crate) row_indices: A::Buffer<I>,
    pub(crate) col_ptr: A::Buffer<I>,
}

impl<T: Element, I: Index> CscMatrix<T, I> {
    pub fn new() -> Self {
        Self {
            dims: LocalCell(MatrixDims::default()),
            values: Vec::new(),
            row_indices: Vec::new(),
            col_ptr: vec![I::ZERO],
        }
    }

    pub fn from_view(view: &CscView<'_, T, I>) -> Result<Self> {
        Self::from_view_in(view, &Global)
    }
}

impl<T: Element, I: Index> Default for CscMatrix<T, I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Element, I: Index, A: Allocator> CscMatrix<T, I, A> {
    pub fn new_in(alloc: &A) -> Result<Self> {
        let mut col_ptr = alloc.new_buffer::<I>()?;
        col_ptr.push(I::ZERO)?;
        Ok(Self {
            dims: alloc.new_cell(MatrixDims::default())?,
            values: alloc.new_buffer::<T>()?,
            row_indices: alloc.new_buffer::<I>()?,
            col_ptr,
        })
    }

    pub(crate) fn from_parts(
        dims: A::Cell<MatrixDims>,
        values: A::Buffer<T>,
        row_indices: A::Buffer<I>,
        col_ptr: A::Buffer<I>,
    ) -> Self {
        Self {
            dims,
            values,
            row_indices,
            col_ptr,
        }
    }

    pub fn from_view_in(view: &CscView<'_, T, I>, alloc: &A) -> Result<Self> {
        let mut matrix = Self::new_in(alloc)?;
        matrix.copy_from_view(view)?;
        Ok(matrix)
    }

    pub fn copy_from_view(&mut self, view: &CscView<'_, T, I>) -> Result<()> {
        self.assign(view.values, view.row_indices, view.col_ptr)?;
        self.dims.set(MatrixDims {
            structure: view.structure as u8,
            is_iso: view.is_iso as u8,
            ..MatrixDims::new(view.nrows, view.ncols)
        })
    }

    pub fn assign(&mut self, values: &[T], row_indices: &[I], col_ptr: &[I]) -> Result<()> {
        assign(&mut self.values, values)?;
        assign(&mut self.row_indices, row_indices)?;
        assign(&mut self.col_ptr, col_ptr)
    }

    /// Append one column and grow the column count by one
    pub fn push_col(&mut self, row_indices: &[I], values: &[T]) -> Result<()> {
        self.row_indices.extend_from_slice(row_indices)?;
        if !self.is_iso() {
            self.values.extend_from_slice(values)?;
        }
        self.col_ptr.push(to_index(self.row_indices.len())?)?;
        let mut dims = self.dims.get();
        dims.ncols += 1;
        self.dims.set(dims)
    }

    pub fn reserve(&mut self, additional: usize) -> Result<()> {
        self.values.reserve(additional)?;
        self.row_indices.reserve(additional)
    }

    pub fn shape(&self) -> (usize, usize) {
        self.dims.get().shape()
    }

    pub fn stored_count(&self) -> usize {
        self.row_indices.len()
    }

    pub fn structure(&self) -> Structure {
        self.dims.get().structure()
    }

    pub fn is_iso(&self) -> bool {
        self.dims.get().is_iso()
    }

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

    pub fn row_indices(&self) -> &[I] {
        self.row_indices.as_slice()
    }

    pub fn col_ptr(&self) -> &[I] {
        self.col_ptr.as_slice()
    }

    pub fn values_mut(&mut self) -> &mut A::Buffer<T> {
        &mut self.values
    }

    pub fn row_indices_mut(&mut self) -> &mut A::Buffer<I> {
        &mut self.row_indices
    }

    pub fn col_ptr_mut(&mut self) -> &mut A::Buffer<I> {
        &mut self.col_ptr
    }

    pub fn view(&self) -> CscView<'_, T, I> {
        let dims = self.dims.get();
        let (nrows, ncols) = dims.shape();
        CscView::new(
            nrows,
            ncols,
            self.values.as_slice(),
            self.row_indices.as_slice(),
            self.col_ptr.as_slice(),
        )
        .with_structure(dims.structure())
        .with_iso(dims.is_iso())
    }
}

impl<T: Element, I: Index, A: Allocator> Container for CscMatrix<T, I, A> {
    type View<'a>
        = CscView<'a, T, I>
    where
        Self: 'a;

    fn view(&self) -> CscView<'_, T, I> {
        CscMatrix::view(self)
    }
}

impl<T: Element, I: Index, A: Allocator> AssignCoordinates<T> for CscMatrix<T, I, A> {
    fn preferred_order(&self) -> Order {
        Order::ColumnMajor
    }

    fn assign_coordinates(
        &mut self,
        nrows: usize,
        ncols: usize,
        entries: &[(usize, usize, T)],
        iso: Option<T>,
    ) -> Result<()> {
        let col_ptr: Vec<I> = compress(entries.iter().map(|(_, c, _)| *c), ncols)?;
        let row_indices = entries
            .iter()
            .map(|(r, _, _)| to_index(*r))
            .collect::<Result<Vec<I>>>()?;
        self.assign(&assigned_values(entries, iso), &row_indices, &col_ptr)?;
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

impl<T: Element, I: Index, A: Allocator> fmt::Debug for CscMatrix<T, I, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CscMatrix")
            .field("shape", &self.shape())
            .field("nnz", &self.stored_count())
            .field("structure", &self.structure())
            .field("is_iso", &self.is_iso())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bsp_core::MatrixView;

    #[test]
    fn test_assign_column_major_entries() {
        // 4x4 scenario matrix, entries in column-major order
        let entries = [
            (0, 0, 1.0f64),
            (2, 0, 5.0),
            (1, 1, 3.0),
            (0, 2, 2.0),
            (1, 3, 4.0),
            (2, 3, 6.0),
        ];
        let mut matrix = CscMatrix::<f64, u32>::new();
        matrix.assign_coordinates(4, 4, &entries, None).unwrap();

        assert_eq!(matrix.col_ptr(), &[0, 2, 3, 4, 6]);
        assert_eq!(matrix.row_indices(), &[0, 2, 1, 0, 1, 2]);
        let view = matrix.view();
        assert!(view.validate().is_ok());
        assert_eq!(view.get(2, 3), Some(6.0));
        assert_eq!(view.get(3, 3), None);
    }

    #[test]
    fn test_push_col() {
        let mut matrix = CscMatrix::<f32, i64>::new();
        matrix.set_shape(2, 0).unwrap();
        matrix.push_col(&[1], &[2.5]).unwrap();
        matrix.push_col(&[0, 1], &[1.0, 1.5]).unwrap();
        assert_eq!(matrix.shape(), (2, 2));
        assert_eq!(matrix.view().get(1, 0), Some(2.5));
        assert_eq!(matrix.view().get(0, 1), Some(1.0));
    }
}
