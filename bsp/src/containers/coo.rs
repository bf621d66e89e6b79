use std::fmt;

use bsp_core::{CooView, Element, Index, Order, Result, Structure};

use super::{assigned_values, to_index, AssignCoordinates, Container, MatrixDims};
use crate::alloc::{assign, Allocator, Buffer, Cell, Global, LocalCell};

/// Coordinate matrix owning its buffers
///
/// Entry order is whatever the caller pushed; the stored [`Order`] only
/// selects the `COOR`/`COOC` tag and the importer's sort order.
pub struct CooMatrix<T: Element, I: Index, A: Allocator = Global> {
    pub(crate) dims: A::Cell<MatrixDims>,
    pub(crate) values: A::Buffer<T>,
    pub(crate) row_indices: A::Buffer<I>,
    pub(crate) col_indices: A::Buffer<I>,
}

impl<T: Element, I: Index> CooMatrix<T, I> {
    pub fn new() -> Self {
        Self {
            dims: LocalCell(MatrixDims::default()),
            values: Vec::new(),
            row_indices: Vec::new(),
            col_indices: Vec::new(),
        }
    }

    pub fn from_view(view: &CooView<'_, T, I>) -> Result<Self> {
        Self::from_view_in(view, &Global)
    }
}

impl<T: Element, I: Index> Default for CooMatrix<T, I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Element, I: Index, A: Allocator> CooMatrix<T, I, A> {
    pub fn new_in(alloc: &A) -> Result<Self> {
        Ok(Self {
            dims: alloc.new_cell(MatrixDims::default())?,
            values: alloc.new_buffer::<T>()?,
            row_indices: alloc.new_buffer::<I>()?,
            col_indices: alloc.new_buffer::<I>()?,
        })
    }

    pub(crate) fn from_parts(
        dims: A::Cell<MatrixDims>,
        values: A::Buffer<T>,
        row_indices: A::Buffer<I>,
        col_indices: A::Buffer<I>,
    ) -> Self {
        Self {
            dims,
            values,
            row_indices,
            col_indices,
        }
    }

    pub fn from_view_in(view: &CooView<'_, T, I>, alloc: &A) -> Result<Self> {
        let mut matrix = Self::new_in(alloc)?;
        matrix.copy_from_view(view)?;
        Ok(matrix)
    }

    pub fn copy_from_view(&mut self, view: &CooView<'_, T, I>) -> Result<()> {
        self.assign(view.values, view.row_indices, view.col_indices)?;
        let order = if view.column_oriented {
            Order::ColumnMajor
        } else {
            Order::RowMajor
        };
        self.dims.set(MatrixDims {
            structure: view.structure as u8,
            is_iso: view.is_iso as u8,
            order: order as u8,
            ..MatrixDims::new(view.nrows, view.ncols)
        })
    }

    pub fn assign(&mut self, values: &[T], row_indices: &[I], col_indices: &[I]) -> Result<()> {
        assign(&mut self.values, values)?;
        assign(&mut self.row_indices, row_indices)?;
        assign(&mut self.col_indices, col_indices)
    }

    /// Append one entry; iso matrices keep their single value
    pub fn push(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        self.row_indices.push(to_index(row)?)?;
        self.col_indices.push(to_index(col)?)?;
        if !self.is_iso() || self.values.is_empty() {
            self.values.push(value)?;
        }
        Ok(())
    }

    pub fn reserve(&mut self, additional: usize) -> Result<()> {
        self.values.reserve(additional)?;
        self.row_indices.reserve(additional)?;
        self.col_indices.reserve(additional)
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

    pub fn order(&self) -> Order {
        self.dims.get().order()
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

    /// Select `COOR` (row-major) or `COOC` (column-major)
    pub fn set_order(&mut self, order: Order) -> Result<()> {
        let mut dims = self.dims.get();
        dims.order = order as u8;
        self.dims.set(dims)
    }

    pub fn values(&self) -> &[T] {
        self.values.as_slice()
    }

    pub fn row_indices(&self) -> &[I] {
        self.row_indices.as_slice()
    }

    pub fn col_indices(&self) -> &[I] {
        self.col_indices.as_slice()
    }

    pub fn values_mut(&mut self) -> &mut A::Buffer<T> {
        &mut self.values
    }

    pub fn row_indices_mut(&mut self) -> &mut A::Buffer<I> {
        &mut self.row_indices
    }

    pub fn col_indices_mut(&mut self) -> &mut A::Buffer<I> {
        &mut self.col_indices
    }

    pub fn view(&self) -> CooView<'_, T, I> {
        let dims = self.dims.get();
        let (nrows, ncols) = dims.shape();
        CooView::new(
            nrows,
            ncols,
            self.values.as_slice(),
            self.row_indices.as_slice(),
            self.col_indices.as_slice(),
        )
        .with_structure(dims.structure())
        .with_iso(dims.is_iso())
        .with_column_orientation(dims.order() == Order::ColumnMajor)
    }
}

impl<T: Element, I: Index, A: Allocator> Container for CooMatrix<T, I, A> {
    type View<'a>
        = CooView<'a, T, I>
    where
        Self: 'a;

    fn view(&self) -> CooView<'_, T, I> {
        CooMatrix::view(self)
    }
}

impl<T: Element, I: Index, A: Allocator> AssignCoordinates<T> for CooMatrix<T, I, A> {
    fn preferred_order(&self) -> Order {
        self.order()
    }

    fn assign_coordinates(
        &mut self,
        nrows: usize,
        ncols: usize,
        entries: &[(usize, usize, T)],
        iso: Option<T>,
    ) -> Result<()> {
        let row_indices = entries
            .iter()
            .map(|(r, _, _)| to_index(*r))
            .collect::<Result<Vec<I>>>()?;
        let col_indices = entries
            .iter()
            .map(|(_, c, _)| to_index(*c))
            .collect::<Result<Vec<I>>>()?;
        self.assign(&assigned_values(entries, iso), &row_indices, &col_indices)?;
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

impl<T: Element, I: Index, A: Allocator> fmt::Debug for CooMatrix<T, I, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CooMatrix")
            .field("shape", &self.shape())
            .field("nnz", &self.stored_count())
            .field("order", &self.order())
            .field("structure", &self.structure())
            .field("is_iso", &self.is_iso())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bsp_core::{MatrixFormat, MatrixView};

    #[test]
    fn test_push_and_view() {
        let mut matrix = CooMatrix::<i64, u32>::new();
        matrix.set_shape(3, 2).unwrap();
        matrix.push(2, 1, 7).unwrap();
        matrix.push(0, 0, -1).unwrap();

        let view = matrix.view();
        assert_eq!(view.format(), MatrixFormat::Coor);
        assert_eq!(view.nnz(), 2);
        assert_eq!(view.get(2, 1), Some(7));
        assert!(view.validate().is_ok());

        matrix.set_order(Order::ColumnMajor).unwrap();
        assert_eq!(matrix.view().format(), MatrixFormat::Cooc);
    }

    #[test]
    fn test_iso_push_keeps_single_value() {
        let mut matrix = CooMatrix::<f32, u8>::new();
        matrix.set_shape(2, 2).unwrap();
        matrix.set_iso(true).unwrap();
        matrix.push(0, 0, 1.0).unwrap();
        matrix.push(1, 1, 1.0).unwrap();
        assert_eq!(matrix.values(), &[1.0]);
        assert!(matrix.view().validate().is_ok());
    }

    #[test]
    fn test_index_overflow() {
        let mut matrix = CooMatrix::<f32, u8>::new();
        assert!(matrix.push(300, 0, 1.0).is_err());
    }
}
