//! Persistent-heap storage for binsparse matrices
//!
//! A heap holds one matrix at the fixed slot names in
//! [`slots`](bsp_core::format::constants::slots): the metadata document as a
//! string object and the owning container as a [`ContainerRecord`]. Bulk
//! arrays are never copied on write or read: writing checks that the view's
//! arrays already live in the heap, and reading attaches to them in place.
//!
//! ```no_run
//! use bsp::heap_backend::{self, PersistentHeap};
//! use bsp::{CsrView, HeapConfig, WriteOptions};
//!
//! let heap = PersistentHeap::create("matrix.heap", &HeapConfig::default())?;
//! let view = CsrView::new(2, 2, &[1.0f64, 2.0], &[0u32, 1], &[0u32, 1, 2]);
//! heap_backend::store_csr(&heap, &view, &WriteOptions::default())?;
//!
//! let resident = heap_backend::read_csr::<f64, u32>(&heap)?;
//! assert_eq!(resident.view().get(1, 1), Some(2.0));
//! # Ok::<(), bsp::BinsparseError>(())
//! ```

mod heap_vec;
mod resident;
mod segment;

pub use heap_vec::{HeapAllocator, HeapCell, HeapVec, VecHeader};
pub use resident::{ContainerRecord, HeapContainer, Resident};
pub use segment::{
    DirectoryEntry, HeapObject, ObjectInfo, PersistentHeap, SegmentHeader, KIND_STRING,
    MAX_NAME_LEN, SEGMENT_MAGIC, SEGMENT_VERSION,
};

use bsp_core::format::constants::{arrays, slots};
use bsp_core::{
    decode, BinsparseError, CooView, CscView, CsrView, DecodedHeader, DenseVectorView, DenseView,
    Document, Element, Index, MatrixFormat, MatrixSink, MatrixView, NamedArray, Result,
};

use crate::config::WriteOptions;
use crate::containers::{Container, CooMatrix, CscMatrix, CsrMatrix, DenseMatrix, DenseVector};
use crate::dispatch;

/// [`MatrixSink`] that records metadata for arrays already in a heap
#[derive(Debug, Clone, Copy)]
pub struct HeapSink<'h> {
    heap: &'h PersistentHeap,
}

impl<'h> HeapSink<'h> {
    pub fn new(heap: &'h PersistentHeap) -> Self {
        Self { heap }
    }
}

impl MatrixSink for HeapSink<'_> {
    fn put_matrix(
        &mut self,
        arrays: &[NamedArray<'_>],
        metadata: &Document,
        compression_level: u8,
    ) -> Result<()> {
        for array in arrays {
            let bytes = array.data.as_bytes();
            if !self.heap.contains(bytes.as_ptr(), bytes.len()) {
                return Err(BinsparseError::invalid_argument(format!(
                    "array '{}' does not live in heap {}",
                    array.name,
                    self.heap.location()
                )));
            }
        }
        check_matrix_slot(self.heap, arrays)?;
        tracing::trace!(compression_level, "heap storage ignores compression");

        stage_metadata(self.heap, metadata)?;
        self.heap.rename(STAGING_METADATA, slots::METADATA)?;
        tracing::debug!(
            heap = %self.heap.location(),
            arrays = arrays.len(),
            "stored binsparse metadata"
        );
        Ok(())
    }
}

/// Names a store builds under before swapping into [`slots`]
const STAGING_MATRIX: &str = "binsparse-matrix.staging";
const STAGING_METADATA: &str = "binsparse-metadata.staging";

/// Every array must be the current buffer of the container in the matrix slot
fn check_matrix_slot(heap: &PersistentHeap, arrays: &[NamedArray<'_>]) -> Result<()> {
    let record = heap
        .find::<ContainerRecord>(slots::MATRIX)?
        .ok_or_else(|| BinsparseError::missing_object(heap.location(), slots::MATRIX))?;
    let parts = record
        .parts
        .get(..usize::from(record.part_count))
        .unwrap_or_default();
    if parts.len() != arrays.len() {
        return Err(BinsparseError::invalid_argument(format!(
            "view has {} arrays, the container in '{}' has {}",
            arrays.len(),
            slots::MATRIX,
            parts.len()
        )));
    }
    for (array, &header) in arrays.iter().zip(parts) {
        let buffer: VecHeader = heap.read_pod(header)?;
        let owned = heap.offset_of(array.data.as_bytes().as_ptr()) == Some(buffer.data)
            && array.data.len() as u64 == buffer.len;
        if !owned {
            return Err(BinsparseError::invalid_argument(format!(
                "array '{}' is not a buffer of the container in '{}'",
                array.name,
                slots::MATRIX
            )));
        }
    }
    Ok(())
}

fn stage_metadata(heap: &PersistentHeap, metadata: &Document) -> Result<()> {
    heap.destroy(STAGING_METADATA)?;
    heap.construct_str(STAGING_METADATA, &metadata.to_json_string()?)
}

/// Record metadata for a view whose arrays live in `heap`
pub fn write_matrix<V: MatrixView + ?Sized>(
    heap: &PersistentHeap,
    view: &V,
    options: &WriteOptions,
) -> Result<()> {
    dispatch::write_matrix(&mut HeapSink::new(heap), view, options)
}

pub fn write_csr<T: Element, I: Index>(
    heap: &PersistentHeap,
    view: &CsrView<'_, T, I>,
    options: &WriteOptions,
) -> Result<()> {
    write_matrix(heap, view, options)
}

pub fn write_csc<T: Element, I: Index>(
    heap: &PersistentHeap,
    view: &CscView<'_, T, I>,
    options: &WriteOptions,
) -> Result<()> {
    write_matrix(heap, view, options)
}

pub fn write_coo<T: Element, I: Index>(
    heap: &PersistentHeap,
    view: &CooView<'_, T, I>,
    options: &WriteOptions,
) -> Result<()> {
    write_matrix(heap, view, options)
}

pub fn write_dense<T: Element>(
    heap: &PersistentHeap,
    view: &DenseView<'_, T>,
    options: &WriteOptions,
) -> Result<()> {
    write_matrix(heap, view, options)
}

pub fn write_dense_vector<T: Element>(
    heap: &PersistentHeap,
    view: &DenseVectorView<'_, T>,
    options: &WriteOptions,
) -> Result<()> {
    write_matrix(heap, view, options)
}

/// Copy a container into the matrix slot and record its metadata.
///
/// The copy and its metadata are built under staging names and renamed into
/// the slots only once both are complete, so a failed store leaves the
/// previous matrix readable. Replaced objects are unlinked, not reclaimed.
fn store<'h, C, F>(heap: &'h PersistentHeap, fill: F, options: &WriteOptions) -> Result<C>
where
    C: HeapContainer<'h> + Container,
    F: FnOnce(&mut C) -> Result<()>,
{
    options.validate()?;
    heap.destroy(STAGING_MATRIX)?;
    let mut matrix = C::construct_in(heap, STAGING_MATRIX)?;
    fill(&mut matrix)?;
    let metadata = dispatch::prepare(&matrix.view(), options)?;
    stage_metadata(heap, &metadata)?;

    heap.rename(STAGING_MATRIX, slots::MATRIX)?;
    heap.rename(STAGING_METADATA, slots::METADATA)?;
    tracing::debug!(
        heap = %heap.location(),
        format = %matrix.view().format(),
        nnz = matrix.view().nnz(),
        "stored matrix"
    );
    Ok(matrix)
}

pub fn store_csr<'h, T: Element, I: Index>(
    heap: &'h PersistentHeap,
    view: &CsrView<'_, T, I>,
    options: &WriteOptions,
) -> Result<CsrMatrix<T, I, HeapAllocator<'h>>> {
    view.validate()?;
    store(heap, |m: &mut CsrMatrix<T, I, _>| m.copy_from_view(view), options)
}

pub fn store_csc<'h, T: Element, I: Index>(
    heap: &'h PersistentHeap,
    view: &CscView<'_, T, I>,
    options: &WriteOptions,
) -> Result<CscMatrix<T, I, HeapAllocator<'h>>> {
    view.validate()?;
    store(heap, |m: &mut CscMatrix<T, I, _>| m.copy_from_view(view), options)
}

pub fn store_coo<'h, T: Element, I: Index>(
    heap: &'h PersistentHeap,
    view: &CooView<'_, T, I>,
    options: &WriteOptions,
) -> Result<CooMatrix<T, I, HeapAllocator<'h>>> {
    view.validate()?;
    store(heap, |m: &mut CooMatrix<T, I, _>| m.copy_from_view(view), options)
}

pub fn store_dense<'h, T: Element>(
    heap: &'h PersistentHeap,
    view: &DenseView<'_, T>,
    options: &WriteOptions,
) -> Result<DenseMatrix<T, HeapAllocator<'h>>> {
    view.validate()?;
    store(heap, |m: &mut DenseMatrix<T, _>| m.copy_from_view(view), options)
}

pub fn store_dense_vector<'h, T: Element>(
    heap: &'h PersistentHeap,
    view: &DenseVectorView<'_, T>,
    options: &WriteOptions,
) -> Result<DenseVector<T, HeapAllocator<'h>>> {
    view.validate()?;
    store(heap, |m: &mut DenseVector<T, _>| m.copy_from_view(view), options)
}

fn metadata_document(heap: &PersistentHeap) -> Result<Document> {
    let json = heap
        .find_str(slots::METADATA)?
        .ok_or_else(|| BinsparseError::missing_object(heap.location(), slots::METADATA))?;
    Document::from_json_str(json)
}

/// Metadata document of the heap's matrix, version-checked
pub fn inspect(heap: &PersistentHeap) -> Result<Document> {
    let doc = metadata_document(heap)?;
    doc.check_version()?;
    Ok(doc)
}

/// Cross-check an attached container against its decoded metadata
fn check_resident<V: MatrixView>(
    heap: &PersistentHeap,
    header: &DecodedHeader,
    view: &V,
) -> Result<()> {
    let location = heap.location();
    let inconsistent = |array: &str, expected: String, actual: String| {
        Err(BinsparseError::InconsistentFile {
            location: location.to_string(),
            array: array.to_string(),
            expected,
            actual,
        })
    };

    if view.value_type() != header.value_type {
        return Err(BinsparseError::type_mismatch(
            location,
            arrays::VALUES,
            header.value_type.label(),
            view.value_type().label(),
        ));
    }
    if view.index_type() != header.index_type {
        return Err(BinsparseError::type_mismatch(
            location,
            arrays::INDICES_1,
            header.index_type.map_or("none", |t| t.label()),
            view.index_type().map_or("none", |t| t.label()),
        ));
    }
    if view.format() != header.format {
        return inconsistent(
            "format",
            header.format.tag().to_string(),
            view.format().tag().to_string(),
        );
    }
    if view.dimensions() != (header.nrows, header.ncols) {
        return inconsistent(
            "shape",
            format!("{:?}", (header.nrows, header.ncols)),
            format!("{:?}", view.dimensions()),
        );
    }
    if view.is_iso() != header.is_iso {
        return inconsistent(
            arrays::VALUES,
            format!("iso {}", header.is_iso),
            format!("iso {}", view.is_iso()),
        );
    }
    for array in view.arrays() {
        if let Some(expected) = header.expected_len(array.name) {
            if array.data.len() != expected {
                return Err(BinsparseError::length_mismatch(
                    location,
                    array.name,
                    expected,
                    array.data.len(),
                ));
            }
        }
    }
    Ok(())
}

fn read_resident<'h, C>(heap: &'h PersistentHeap, expected: MatrixFormat) -> Result<Resident<'h, C>>
where
    C: HeapContainer<'h> + Container,
{
    let header = decode(&metadata_document(heap)?, expected)?;
    let matrix = C::find_in(heap, slots::MATRIX)?
        .ok_or_else(|| BinsparseError::missing_object(heap.location(), slots::MATRIX))?;
    check_resident(heap, &header, &matrix.view())?;

    tracing::debug!(
        heap = %heap.location(),
        format = %header.format,
        nnz = header.nnz,
        "attached resident matrix"
    );
    Ok(Resident::new(matrix, header))
}

pub fn read_csr<'h, T: Element, I: Index>(
    heap: &'h PersistentHeap,
) -> Result<Resident<'h, CsrMatrix<T, I, HeapAllocator<'h>>>> {
    read_resident(heap, MatrixFormat::Csr)
}

pub fn read_csc<'h, T: Element, I: Index>(
    heap: &'h PersistentHeap,
) -> Result<Resident<'h, CscMatrix<T, I, HeapAllocator<'h>>>> {
    read_resident(heap, MatrixFormat::Csc)
}

/// Accepts both `COOR` and `COOC`
pub fn read_coo<'h, T: Element, I: Index>(
    heap: &'h PersistentHeap,
) -> Result<Resident<'h, CooMatrix<T, I, HeapAllocator<'h>>>> {
    read_resident(heap, MatrixFormat::Coor)
}

/// Accepts both `DMATR` and `DMATC`
pub fn read_dense<'h, T: Element>(
    heap: &'h PersistentHeap,
) -> Result<Resident<'h, DenseMatrix<T, HeapAllocator<'h>>>> {
    read_resident(heap, MatrixFormat::Dmatr)
}

pub fn read_dense_vector<'h, T: Element>(
    heap: &'h PersistentHeap,
) -> Result<Resident<'h, DenseVector<T, HeapAllocator<'h>>>> {
    read_resident(heap, MatrixFormat::Dvec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HeapConfig;

    fn scratch_heap(dir: &tempfile::TempDir) -> PersistentHeap {
        PersistentHeap::create(dir.path().join("m.heap"), &HeapConfig::with_capacity(1 << 20))
            .unwrap()
    }

    #[test]
    fn test_write_rejects_foreign_arrays() {
        let dir = tempfile::tempdir().unwrap();
        let heap = scratch_heap(&dir);
        let view = CsrView::new(1, 1, &[1.0f32], &[0u32], &[0u32, 1]);
        assert!(matches!(
            write_csr(&heap, &view, &WriteOptions::default()),
            Err(BinsparseError::InvalidArgument { .. })
        ));
        assert!(heap.find_str(slots::METADATA).unwrap().is_none());
    }

    #[test]
    fn test_write_requires_matrix_slot_buffers() {
        let dir = tempfile::tempdir().unwrap();
        let heap = scratch_heap(&dir);
        let options = WriteOptions::default();

        let mut other = CsrMatrix::<f64, u32, HeapAllocator<'_>>::construct_in(&heap, "other").unwrap();
        other
            .copy_from_view(&CsrView::new(2, 2, &[9.0, 9.0], &[1u32, 0], &[0u32, 1, 2]))
            .unwrap();
        assert!(matches!(
            write_csr(&heap, &other.view(), &options),
            Err(BinsparseError::MissingObject { .. })
        ));

        let stored = CsrView::new(2, 2, &[1.0f64, 2.0], &[0u32, 1], &[0u32, 1, 2]);
        drop(store_csr(&heap, &stored, &options).unwrap());
        assert!(matches!(
            write_csr(&heap, &other.view(), &options),
            Err(BinsparseError::InvalidArgument { .. })
        ));
        drop(other);

        let resident = read_csr::<f64, u32>(&heap).unwrap();
        assert_eq!(resident.view(), stored);
        drop(resident);

        // The slot's own buffers are accepted, but not a sub-slice of them
        let matrix = CsrMatrix::<f64, u32, HeapAllocator<'_>>::find_in(&heap, slots::MATRIX)
            .unwrap()
            .unwrap();
        write_csr(&heap, &matrix.view(), &options).unwrap();
        let truncated = CsrView::new(
            1,
            2,
            &matrix.values()[..1],
            &matrix.col_indices()[..1],
            &matrix.row_ptr()[..2],
        );
        assert!(matches!(
            write_csr(&heap, &truncated, &options),
            Err(BinsparseError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_failed_store_keeps_previous_matrix() {
        let dir = tempfile::tempdir().unwrap();
        let heap =
            PersistentHeap::create(dir.path().join("small.heap"), &HeapConfig::with_capacity(64 * 1024))
                .unwrap();
        let options = WriteOptions::default();
        let first = CsrView::new(2, 2, &[1.0f64, 2.0], &[0u32, 1], &[0u32, 1, 2]);
        drop(store_csr(&heap, &first, &options).unwrap());

        let wide = 16 * 1024;
        let values = vec![0.5f64; wide];
        let cols: Vec<u32> = (0..wide as u32).collect();
        let row_ptr = [0u32, wide as u32];
        let too_big = CsrView::new(1, wide, &values, &cols, &row_ptr);
        assert!(matches!(
            store_csr(&heap, &too_big, &options),
            Err(BinsparseError::CapacityExceeded { .. })
        ));

        let resident = read_csr::<f64, u32>(&heap).unwrap();
        assert_eq!(resident.view(), first);
        drop(resident);

        let second = CsrView::new(2, 2, &[3.0f64, 4.0], &[1u32, 0], &[0u32, 1, 2]);
        drop(store_csr(&heap, &second, &options).unwrap());
        assert_eq!(read_csr::<f64, u32>(&heap).unwrap().view(), second);
        assert!(!heap.contains_name(STAGING_MATRIX).unwrap());
        assert!(!heap.contains_name(STAGING_METADATA).unwrap());
    }

    #[test]
    fn test_read_missing_slots() {
        let dir = tempfile::tempdir().unwrap();
        let heap = scratch_heap(&dir);
        assert!(matches!(
            read_csr::<f32, u32>(&heap),
            Err(BinsparseError::MissingObject { .. })
        ));
        assert!(matches!(inspect(&heap), Err(BinsparseError::MissingObject { .. })));

        let view = CooView::new(2, 2, &[1i32], &[1u64], &[0u64]);
        store_coo(&heap, &view, &WriteOptions::default()).unwrap();
        heap.destroy(slots::MATRIX).unwrap();
        assert!(matches!(
            read_coo::<i32, u64>(&heap),
            Err(BinsparseError::MissingObject { .. })
        ));
    }

    #[test]
    fn test_store_and_read_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let heap = scratch_heap(&dir);
        let values = [1.0f64, 2.0, 3.0];
        let view = DenseView::new(1, 3, &values, bsp_core::Order::ColumnMajor);
        let stored = store_dense(&heap, &view, &WriteOptions::default()).unwrap();
        drop(stored);

        let resident = read_dense::<f64>(&heap).unwrap();
        assert_eq!(resident.header().format, MatrixFormat::Dmatc);
        let read_back = resident.view();
        assert_eq!(read_back.values, &values);
        let bytes: &[u8] = bytemuck::cast_slice(read_back.values);
        assert!(heap.contains(bytes.as_ptr(), bytes.len()));

        assert!(matches!(
            read_csr::<f64, u32>(&heap),
            Err(BinsparseError::FormatMismatch { .. })
        ));
    }
}
