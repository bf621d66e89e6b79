//! Containers stored as named objects in a persistent heap

use std::ops::Deref;

use bsp_core::{BinsparseError, DataType, DecodedHeader, Element, Index, MatrixFormat, Result};
use bytemuck::{Pod, Zeroable};

use super::heap_vec::{HeapAllocator, HeapCell, HeapVec};
use super::segment::{HeapObject, PersistentHeap};
use crate::containers::{CooMatrix, CscMatrix, CsrMatrix, DenseMatrix, DenseVector, MatrixDims};

const NO_INDEX: u8 = u8::MAX;

/// Directory object tying a container's cell and buffers together
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct ContainerRecord {
    /// `MatrixFormat` discriminant of the container kind
    pub kind: u8,
    pub value_type: u8,
    /// `u8::MAX` for dense containers
    pub index_type: u8,
    pub part_count: u8,
    pub reserved: [u8; 4],
    /// Offset of the `MatrixDims` cell
    pub dims: u64,
    /// Header offsets of the buffers, values first
    pub parts: [u64; 3],
}

impl HeapObject for ContainerRecord {
    const KIND: u32 = 2;
}

impl ContainerRecord {
    fn new(kind: MatrixFormat, value_type: DataType, index_type: Option<DataType>) -> Self {
        Self {
            kind: kind as u8,
            value_type: value_type as u8,
            index_type: index_type.map_or(NO_INDEX, |t| t as u8),
            part_count: 0,
            reserved: [0; 4],
            dims: 0,
            parts: [0; 3],
        }
    }

    fn with_parts(mut self, dims: u64, parts: &[u64]) -> Self {
        self.dims = dims;
        self.part_count = parts.len() as u8;
        self.parts[..parts.len()].copy_from_slice(parts);
        self
    }

    fn check(
        &self,
        heap: &PersistentHeap,
        kind: MatrixFormat,
        value_type: DataType,
        index_type: Option<DataType>,
        part_count: usize,
    ) -> Result<()> {
        let expected = Self::new(kind, value_type, index_type);
        let mismatch = |what: &str, expected: String, actual: String| {
            Err(BinsparseError::InconsistentFile {
                location: heap.location().to_string(),
                array: format!("container {what}"),
                expected,
                actual,
            })
        };
        let describe = |tag: u8| {
            DataType::from_u8(tag).map_or_else(|| format!("type tag {tag}"), |t| t.label().to_string())
        };

        if self.kind != expected.kind {
            return mismatch(
                "kind",
                kind.tag().to_string(),
                MatrixFormat::from_u8(self.kind)
                    .map_or_else(|| format!("kind tag {}", self.kind), |f| f.tag().to_string()),
            );
        }
        if self.value_type != expected.value_type {
            return mismatch("values", value_type.label().to_string(), describe(self.value_type));
        }
        if self.index_type != expected.index_type {
            return mismatch(
                "indices",
                index_type.map_or("none".to_string(), |t| t.label().to_string()),
                describe(self.index_type),
            );
        }
        if self.part_count as usize != part_count {
            return mismatch("parts", part_count.to_string(), self.part_count.to_string());
        }
        Ok(())
    }
}

/// Container that can be stored under a name in a persistent heap
pub trait HeapContainer<'h>: Sized {
    /// Empty container whose storage is allocated from `heap`
    fn new_in_heap(heap: &'h PersistentHeap) -> Result<Self>;

    /// Record locating this container's storage
    fn record(&self) -> ContainerRecord;

    /// Reattach to storage described by `record`
    fn attach(heap: &'h PersistentHeap, record: &ContainerRecord) -> Result<Self>;

    /// Create an empty container and register it as `name`
    fn construct_in(heap: &'h PersistentHeap, name: &str) -> Result<Self> {
        if heap.contains_name(name)? {
            return Err(BinsparseError::access_conflict(
                format!("{}:{name}", heap.location()),
                "object already exists",
            ));
        }
        let container = Self::new_in_heap(heap)?;
        heap.construct(name, &container.record())?;
        Ok(container)
    }

    /// Find a container registered as `name`
    ///
    /// Fails with `AccessConflict` if another live handle is attached.
    fn find_in(heap: &'h PersistentHeap, name: &str) -> Result<Option<Self>> {
        match heap.find::<ContainerRecord>(name)? {
            Some(record) => Self::attach(heap, &record).map(Some),
            None => Ok(None),
        }
    }
}

impl<'h, T: Element, I: Index> HeapContainer<'h> for CsrMatrix<T, I, HeapAllocator<'h>> {
    fn new_in_heap(heap: &'h PersistentHeap) -> Result<Self> {
        Self::new_in(&HeapAllocator::new(heap))
    }

    fn record(&self) -> ContainerRecord {
        ContainerRecord::new(MatrixFormat::Csr, T::DATA_TYPE, Some(I::DATA_TYPE)).with_parts(
            self.dims.offset(),
            &[self.values.offset(), self.col_indices.offset(), self.row_ptr.offset()],
        )
    }

    fn attach(heap: &'h PersistentHeap, record: &ContainerRecord) -> Result<Self> {
        record.check(heap, MatrixFormat::Csr, T::DATA_TYPE, Some(I::DATA_TYPE), 3)?;
        Ok(Self::from_parts(
            HeapCell::attach(heap, record.dims)?,
            HeapVec::attach(heap, record.parts[0])?,
            HeapVec::attach(heap, record.parts[1])?,
            HeapVec::attach(heap, record.parts[2])?,
        ))
    }
}

impl<'h, T: Element, I: Index> HeapContainer<'h> for CscMatrix<T, I, HeapAllocator<'h>> {
    fn new_in_heap(heap: &'h PersistentHeap) -> Result<Self> {
        Self::new_in(&HeapAllocator::new(heap))
    }

    fn record(&self) -> ContainerRecord {
        ContainerRecord::new(MatrixFormat::Csc, T::DATA_TYPE, Some(I::DATA_TYPE)).with_parts(
            self.dims.offset(),
            &[self.values.offset(), self.row_indices.offset(), self.col_ptr.offset()],
        )
    }

    fn attach(heap: &'h PersistentHeap, record: &ContainerRecord) -> Result<Self> {
        record.check(heap, MatrixFormat::Csc, T::DATA_TYPE, Some(I::DATA_TYPE), 3)?;
        Ok(Self::from_parts(
            HeapCell::attach(heap, record.dims)?,
            HeapVec::attach(heap, record.parts[0])?,
            HeapVec::attach(heap, record.parts[1])?,
            HeapVec::attach(heap, record.parts[2])?,
        ))
    }
}

impl<'h, T: Element, I: Index> HeapContainer<'h> for CooMatrix<T, I, HeapAllocator<'h>> {
    fn new_in_heap(heap: &'h PersistentHeap) -> Result<Self> {
        Self::new_in(&HeapAllocator::new(heap))
    }

    fn record(&self) -> ContainerRecord {
        ContainerRecord::new(MatrixFormat::Coor, T::DATA_TYPE, Some(I::DATA_TYPE)).with_parts(
            self.dims.offset(),
            &[self.values.offset(), self.row_indices.offset(), self.col_indices.offset()],
        )
    }

    fn attach(heap: &'h PersistentHeap, record: &ContainerRecord) -> Result<Self> {
        record.check(heap, MatrixFormat::Coor, T::DATA_TYPE, Some(I::DATA_TYPE), 3)?;
        Ok(Self::from_parts(
            HeapCell::attach(heap, record.dims)?,
            HeapVec::attach(heap, record.parts[0])?,
            HeapVec::attach(heap, record.parts[1])?,
            HeapVec::attach(heap, record.parts[2])?,
        ))
    }
}

impl<'h, T: Element> HeapContainer<'h> for DenseMatrix<T, HeapAllocator<'h>> {
    fn new_in_heap(heap: &'h PersistentHeap) -> Result<Self> {
        Self::new_in(&HeapAllocator::new(heap))
    }

    fn record(&self) -> ContainerRecord {
        ContainerRecord::new(MatrixFormat::Dmatr, T::DATA_TYPE, None)
            .with_parts(self.dims.offset(), &[self.values.offset()])
    }

    fn attach(heap: &'h PersistentHeap, record: &ContainerRecord) -> Result<Self> {
        record.check(heap, MatrixFormat::Dmatr, T::DATA_TYPE, None, 1)?;
        Ok(Self::from_parts(
            HeapCell::attach(heap, record.dims)?,
            HeapVec::attach(heap, record.parts[0])?,
        ))
    }
}

impl<'h, T: Element> HeapContainer<'h> for DenseVector<T, HeapAllocator<'h>> {
    fn new_in_heap(heap: &'h PersistentHeap) -> Result<Self> {
        Self::new_in(&HeapAllocator::new(heap))
    }

    fn record(&self) -> ContainerRecord {
        ContainerRecord::new(MatrixFormat::Dvec, T::DATA_TYPE, None)
            .with_parts(self.dims.offset(), &[self.values.offset()])
    }

    fn attach(heap: &'h PersistentHeap, record: &ContainerRecord) -> Result<Self> {
        record.check(heap, MatrixFormat::Dvec, T::DATA_TYPE, None, 1)?;
        Ok(Self::from_parts(
            HeapCell::<MatrixDims>::attach(heap, record.dims)?,
            HeapVec::attach(heap, record.parts[0])?,
        ))
    }
}

/// A container read back from a heap, with the metadata it was checked against
///
/// Dereferences to the container; its `view()` borrows the heap mapping
/// directly.
#[derive(Debug)]
pub struct Resident<'h, C> {
    matrix: C,
    header: DecodedHeader,
    _heap: std::marker::PhantomData<&'h PersistentHeap>,
}

impl<'h, C> Resident<'h, C> {
    pub(crate) fn new(matrix: C, header: DecodedHeader) -> Self {
        Self {
            matrix,
            header,
            _heap: std::marker::PhantomData,
        }
    }

    pub fn header(&self) -> &DecodedHeader {
        &self.header
    }

    /// Take the container, keeping it attached to the heap
    pub fn into_inner(self) -> C {
        self.matrix
    }
}

impl<C> Deref for Resident<'_, C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.matrix
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HeapConfig;

    #[test]
    fn test_construct_and_find_container() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("container.heap");
        let heap = PersistentHeap::create(&path, &HeapConfig::with_capacity(1 << 20)).unwrap();

        {
            let mut matrix = CooMatrix::<f32, u32, HeapAllocator<'_>>::construct_in(&heap, "coo").unwrap();
            matrix.set_shape(2, 2).unwrap();
            matrix.push(1, 0, 2.5).unwrap();

            assert!(matches!(
                CooMatrix::<f32, u32, HeapAllocator<'_>>::find_in(&heap, "coo"),
                Err(BinsparseError::AccessConflict { .. })
            ));
        }

        let matrix = CooMatrix::<f32, u32, HeapAllocator<'_>>::find_in(&heap, "coo")
            .unwrap()
            .unwrap();
        assert_eq!(matrix.shape(), (2, 2));
        assert_eq!(matrix.values().len(), 1);
        assert_eq!(matrix.view().get(1, 0), Some(2.5));
        drop(matrix);

        assert!(matches!(
            CsrMatrix::<f32, u32, HeapAllocator<'_>>::find_in(&heap, "coo"),
            Err(BinsparseError::InconsistentFile { .. })
        ));
        assert!(matches!(
            CooMatrix::<f64, u32, HeapAllocator<'_>>::find_in(&heap, "coo"),
            Err(BinsparseError::InconsistentFile { .. })
        ));
        assert!(CooMatrix::<f32, u32, HeapAllocator<'_>>::find_in(&heap, "other")
            .unwrap()
            .is_none());
    }
}
