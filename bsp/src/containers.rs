//! Owning matrix containers
//!
//! Each container owns its buffers through an [`Allocator`] strategy and
//! hands out zero-copy views for the codec. With [`Global`](crate::alloc::Global)
//! the buffers are `Vec`s; with
//! [`HeapAllocator`](crate::heap_backend::HeapAllocator) they live in a
//! persistent heap and survive the process.

mod coo;
mod csc;
mod csr;
mod dense;

pub use coo::CooMatrix;
pub use csc::CscMatrix;
pub use csr::CsrMatrix;
pub use dense::{DenseMatrix, DenseVector};

use bsp_core::{BinsparseError, Element, Index, MatrixView, Order, Result, Structure};
use bytemuck::{Pod, Zeroable};

/// Shape and flags shared by every container, stored as one cell
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct MatrixDims {
    pub nrows: u64,
    pub ncols: u64,
    /// `Structure` discriminant
    pub structure: u8,
    pub is_iso: u8,
    /// `Order` discriminant, used by dense and COO containers
    pub order: u8,
    pub reserved: [u8; 5],
}

impl MatrixDims {
    pub fn new(nrows: usize, ncols: usize) -> Self {
        Self {
            nrows: nrows as u64,
            ncols: ncols as u64,
            ..Self::default()
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.nrows as usize, self.ncols as usize)
    }

    pub fn structure(&self) -> Structure {
        Structure::from_u8(self.structure).unwrap_or_default()
    }

    pub fn order(&self) -> Order {
        Order::from_u8(self.order).unwrap_or_default()
    }

    pub fn is_iso(&self) -> bool {
        self.is_iso != 0
    }
}

/// Container that can be described by a borrowed view
pub trait Container {
    type View<'a>: MatrixView
    where
        Self: 'a;

    fn view(&self) -> Self::View<'_>;
}

/// Fill a container from deduplicated coordinate entries
///
/// The importer calls this once with entries already sorted in
/// [`preferred_order`](Self::preferred_order). `iso` carries the single value
/// of an iso matrix; entry values are then ignored by sparse containers.
pub trait AssignCoordinates<T: Element> {
    fn preferred_order(&self) -> Order;

    fn assign_coordinates(
        &mut self,
        nrows: usize,
        ncols: usize,
        entries: &[(usize, usize, T)],
        iso: Option<T>,
    ) -> Result<()>;

    fn assign_structure(&mut self, structure: Structure) -> Result<()>;
}

pub(crate) fn to_index<I: Index>(value: usize) -> Result<I> {
    I::from_usize(value).ok_or_else(|| {
        BinsparseError::invalid_argument(format!(
            "index {value} does not fit in {}",
            I::DATA_TYPE
        ))
    })
}

/// Pointer array for entries sorted by `major`
pub(crate) fn compress<I: Index>(
    majors: impl Iterator<Item = usize>,
    major_len: usize,
) -> Result<Vec<I>> {
    let mut counts = vec![0usize; major_len + 1];
    for major in majors {
        match counts.get_mut(major + 1) {
            Some(count) => *count += 1,
            None => {
                return Err(BinsparseError::invalid_argument(format!(
                    "coordinate {major} outside dimension {major_len}"
                )))
            }
        }
    }
    let mut total = 0usize;
    counts
        .into_iter()
        .map(|count| {
            total += count;
            to_index(total)
        })
        .collect()
}

/// Values buffer contents for an iso or explicit assignment
pub(crate) fn assigned_values<T: Element>(
    entries: &[(usize, usize, T)],
    iso: Option<T>,
) -> Vec<T> {
    match iso {
        Some(value) => vec![value],
        None => entries.iter().map(|(_, _, v)| *v).collect(),
    }
}
