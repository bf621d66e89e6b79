use std::fmt;

use bsp_core::{BinsparseError, DenseVectorView, DenseView, Element, Order, Result, Structure};

use super::{AssignCoordinates, Container, MatrixDims};
use crate::alloc::{assign, Allocator, Buffer, Cell, Global, LocalCell};

fn dense_len(nrows: usize, ncols: usize) -> Result<usize> {
    nrows.checked_mul(ncols).ok_or_else(|| {
        BinsparseError::invalid_argument(format!("dense shape {nrows}x{ncols} overflows"))
    })
}

/// `len` zeros, failing instead of aborting when memory runs out
fn zeroed<T: Element>(len: usize) -> Result<Vec<T>> {
    let mut values = Vec::new();
    values.try_reserve_exact(len).map_err(|_| {
        BinsparseError::invalid_argument(format!("cannot allocate {len} dense values"))
    })?;
    values.resize(len, T::ZERO);
    Ok(values)
}

/// Dense matrix in row- or column-major order
pub struct DenseMatrix<T: Element, A: Allocator = Global> {
    pub(crate) dims: A::Cell<MatrixDims>,
    pub(crate) values: A::Buffer<T>,
}

impl<T: Element> DenseMatrix<T> {
    /// Empty row-major matrix on the process heap
    pub fn new() -> Self {
        Self {
            dims: LocalCell(MatrixDims::default()),
            values: Vec::new(),
        }
    }

    pub fn with_order(mut self, order: Order) -> Self {
        self.dims.0.order = order as u8;
        self
    }

    pub fn from_view(view: &DenseView<'_, T>) -> Result<Self> {
        Self::from_view_in(view, &Global)
    }
}

impl<T: Element> Default for DenseMatrix<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Element, A: Allocator> DenseMatrix<T, A> {
    pub fn new_in(alloc: &A) -> Result<Self> {
        Ok(Self {
            dims: alloc.new_cell(MatrixDims::default())?,
            values: alloc.new_buffer::<T>()?,
        })
    }

    pub(crate) fn from_parts(dims: A::Cell<MatrixDims>, values: A::Buffer<T>) -> Self {
        Self { dims, values }
    }

    pub fn from_view_in(view: &DenseView<'_, T>, alloc: &A) -> Result<Self> {
        let mut matrix = Self::new_in(alloc)?;
        matrix.copy_from_view(view)?;
        Ok(matrix)
    }

    pub fn copy_from_view(&mut self, view: &DenseView<'_, T>) -> Result<()> {
        assign(&mut self.values, view.values)?;
        self.dims.set(MatrixDims {
            structure: view.structure as u8,
            is_iso: view.is_iso as u8,
            order: view.order as u8,
            ..MatrixDims::new(view.nrows, view.ncols)
        })
    }

    /// Replace the values; `values` must already be in this matrix's order
    pub fn assign(&mut self, values: &[T]) -> Result<()> {
        assign(&mut self.values, values)
    }

    pub fn push(&mut self, value: T) -> Result<()> {
        self.values.push(value)
    }

    pub fn reserve(&mut self, additional: usize) -> Result<()> {
        self.values.reserve(additional)
    }

    pub fn shape(&self) -> (usize, usize) {
        self.dims.get().shape()
    }

    /// Logical entry count, `nrows * ncols`
    pub fn stored_count(&self) -> usize {
        let (nrows, ncols) = self.shape();
        nrows.saturating_mul(ncols)
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

    /// Change the linearization tag; stored values are not permuted
    pub fn set_order(&mut self, order: Order) -> Result<()> {
        let mut dims = self.dims.get();
        dims.order = order as u8;
        self.dims.set(dims)
    }

    pub fn values(&self) -> &[T] {
        self.values.as_slice()
    }

    pub fn values_mut(&mut self) -> &mut A::Buffer<T> {
        &mut self.values
    }

    pub fn view(&self) -> DenseView<'_, T> {
        let dims = self.dims.get();
        let (nrows, ncols) = dims.shape();
        DenseView::new(nrows, ncols, self.values.as_slice(), dims.order())
            .with_structure(dims.structure())
            .with_iso(dims.is_iso())
    }
}

impl<T: Element, A: Allocator> Container for DenseMatrix<T, A> {
    type View<'a>
        = DenseView<'a, T>
    where
        Self: 'a;

    fn view(&self) -> DenseView<'_, T> {
        DenseMatrix::view(self)
    }
}

impl<T: Element, A: Allocator> AssignCoordinates<T> for DenseMatrix<T, A> {
    fn preferred_order(&self) -> Order {
        self.order()
    }

    /// Dense storage is always explicit: absent entries become zero and an
    /// iso value is written to every present entry.
    fn assign_coordinates(
        &mut self,
        nrows: usize,
        ncols: usize,
        entries: &[(usize, usize, T)],
        iso: Option<T>,
    ) -> Result<()> {
        let order = self.order();
        let mut values = zeroed(dense_len(nrows, ncols)?)?;
        for &(row, col, value) in entries {
            if row >= nrows || col >= ncols {
                return Err(BinsparseError::invalid_argument(format!(
                    "entry ({row}, {col}) outside {nrows}x{ncols}"
                )));
            }
            values[order.linear_index(row, col, nrows, ncols)] = iso.unwrap_or(value);
        }
        self.assign(&values)?;
        let dims = self.dims.get();
        self.dims.set(MatrixDims {
            nrows: nrows as u64,
            ncols: ncols as u64,
            is_iso: 0,
            ..dims
        })
    }

    fn assign_structure(&mut self, structure: Structure) -> Result<()> {
        self.set_structure(structure)
    }
}

impl<T: Element, A: Allocator> fmt::Debug for DenseMatrix<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DenseMatrix")
            .field("shape", &self.shape())
            .field("order", &self.order())
            .field("structure", &self.structure())
            .field("is_iso", &self.is_iso())
            .finish()
    }
}

/// Dense vector; its shape is `(len, 1)`
pub struct DenseVector<T: Element, A: Allocator = Global> {
    pub(crate) dims: A::Cell<MatrixDims>,
    pub(crate) values: A::Buffer<T>,
}

impl<T: Element> DenseVector<T> {
    pub fn new() -> Self {
        Self {
            dims: LocalCell(MatrixDims::new(0, 1)),
            values: Vec::new(),
        }
    }

    pub fn from_view(view: &DenseVectorView<'_, T>) -> Result<Self> {
        Self::from_view_in(view, &Global)
    }
}

impl<T: Element> Default for DenseVector<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Element, A: Allocator> DenseVector<T, A> {
    pub fn new_in(alloc: &A) -> Result<Self> {
        Ok(Self {
            dims: alloc.new_cell(MatrixDims::new(0, 1))?,
            values: alloc.new_buffer::<T>()?,
        })
    }

    pub(crate) fn from_parts(dims: A::Cell<MatrixDims>, values: A::Buffer<T>) -> Self {
        Self { dims, values }
    }

    pub fn from_view_in(view: &DenseVectorView<'_, T>, alloc: &A) -> Result<Self> {
        let mut vector = Self::new_in(alloc)?;
        vector.copy_from_view(view)?;
        Ok(vector)
    }

    pub fn copy_from_view(&mut self, view: &DenseVectorView<'_, T>) -> Result<()> {
        assign(&mut self.values, view.values)?;
        self.dims.set(MatrixDims {
            is_iso: view.is_iso as u8,
            ..MatrixDims::new(view.len, 1)
        })
    }

    pub fn assign(&mut self, values: &[T]) -> Result<()> {
        assign(&mut self.values, values)?;
        self.set_len(values.len())
    }

    /// Append a value and grow the length by one
    pub fn push(&mut self, value: T) -> Result<()> {
        self.values.push(value)?;
        let len = self.len();
        self.set_len(len + 1)
    }

    pub fn reserve(&mut self, additional: usize) -> Result<()> {
        self.values.reserve(additional)
    }

    pub fn len(&self) -> usize {
        self.dims.get().nrows as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.len(), 1)
    }

    pub fn stored_count(&self) -> usize {
        self.len()
    }

    pub fn is_iso(&self) -> bool {
        self.dims.get().is_iso()
    }

    /// Set the logical length; with iso storage only one value is kept
    pub fn set_len(&mut self, len: usize) -> Result<()> {
        let mut dims = self.dims.get();
        dims.nrows = len as u64;
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

    pub fn values_mut(&mut self) -> &mut A::Buffer<T> {
        &mut self.values
    }

    pub fn view(&self) -> DenseVectorView<'_, T> {
        let dims = self.dims.get();
        let values = self.values.as_slice();
        if dims.is_iso() {
            DenseVectorView::iso(dims.nrows as usize, values)
        } else {
            DenseVectorView {
                len: dims.nrows as usize,
                values,
                is_iso: false,
            }
        }
    }
}

impl<T: Element, A: Allocator> Container for DenseVector<T, A> {
    type View<'a>
        = DenseVectorView<'a, T>
    where
        Self: 'a;

    fn view(&self) -> DenseVectorView<'_, T> {
        DenseVector::view(self)
    }
}

impl<T: Element, A: Allocator> AssignCoordinates<T> for DenseVector<T, A> {
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
        if ncols != 1 {
            return Err(BinsparseError::invalid_argument(format!(
                "a dense vector needs one column, input has {ncols}"
            )));
        }
        let mut values = zeroed(nrows)?;
        for &(row, _, value) in entries {
            let slot = values.get_mut(row).ok_or_else(|| {
                BinsparseError::invalid_argument(format!("entry {row} outside length {nrows}"))
            })?;
            *slot = iso.unwrap_or(value);
        }
        self.set_iso(false)?;
        self.assign(&values)
    }

    /// Vectors carry no structure; anything but general is rejected
    fn assign_structure(&mut self, structure: Structure) -> Result<()> {
        if structure.is_general() {
            return Ok(());
        }
        Err(BinsparseError::invalid_argument(format!(
            "dense vectors cannot be {}",
            structure.name().unwrap_or("general")
        )))
    }
}

impl<T: Element, A: Allocator> fmt::Debug for DenseVector<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DenseVector")
            .field("len", &self.len())
            .field("is_iso", &self.is_iso())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bsp_core::{MatrixFormat, MatrixView};

    #[test]
    fn test_dense_assign_orders() {
        let entries = [(0, 1, 2.0f64), (1, 0, 3.0)];

        let mut row_major = DenseMatrix::<f64>::new();
        row_major.assign_coordinates(2, 2, &entries, None).unwrap();
        assert_eq!(row_major.values(), &[0.0, 2.0, 3.0, 0.0]);
        assert_eq!(row_major.view().format(), MatrixFormat::Dmatr);

        let mut col_major = DenseMatrix::<f64>::new().with_order(Order::ColumnMajor);
        col_major.assign_coordinates(2, 2, &entries, None).unwrap();
        assert_eq!(col_major.values(), &[0.0, 3.0, 2.0, 0.0]);
        assert_eq!(col_major.view().format(), MatrixFormat::Dmatc);
        assert_eq!(col_major.view().get(0, 1), Some(2.0));
    }

    #[test]
    fn test_dense_vector() {
        let mut vector = DenseVector::<i32>::new();
        vector.push(4).unwrap();
        vector.push(5).unwrap();
        assert_eq!(vector.len(), 2);
        assert_eq!(vector.view().get(1), Some(5));
        assert!(vector.view().validate().is_ok());

        let iso = DenseVector::from_view(&DenseVectorView::iso(3, &[9])).unwrap();
        assert_eq!(iso.stored_count(), 3);
        assert_eq!(iso.view().get(2), Some(9));
    }

    #[test]
    fn test_vector_rejects_matrix_input() {
        let mut vector = DenseVector::<f32>::new();
        assert!(vector
            .assign_coordinates(2, 2, &[(0, 0, 1.0)], None)
            .is_err());
    }
}
