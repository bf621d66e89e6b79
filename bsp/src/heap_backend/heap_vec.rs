//! Growable buffers and cells that live inside a persistent heap

use std::marker::PhantomData;
use std::mem::size_of;

use bsp_core::{BinsparseError, Element, Result};
use bytemuck::{Pod, Zeroable};

use super::segment::{HeapObject, PersistentHeap};
use crate::alloc::{Allocator, Buffer, Cell};

/// On-heap header of a [`HeapVec`]; its offset never changes
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct VecHeader {
    pub data: u64,
    pub len: u64,
    pub capacity: u64,
    /// `DataType` discriminant of the elements
    pub data_type: u8,
    pub reserved: [u8; 7],
}

impl HeapObject for VecHeader {
    const KIND: u32 = 3;
}

const MIN_CAPACITY: u64 = 8;

/// Vector whose header and elements are stored in a [`PersistentHeap`]
///
/// Growth allocates a fresh region and copies; the old region is not
/// reclaimed. Only one `HeapVec` may be attached to a header at a time.
pub struct HeapVec<'h, T: Element> {
    heap: &'h PersistentHeap,
    offset: u64,
    state: VecHeader,
    _marker: PhantomData<T>,
}

impl<'h, T: Element> HeapVec<'h, T> {
    /// Allocate an empty vector
    pub fn new_in(heap: &'h PersistentHeap) -> Result<Self> {
        let offset = heap.allocate(size_of::<VecHeader>() as u64)?;
        // An empty vector points at its own header so slices stay in the mapping
        let state = VecHeader {
            data: offset,
            len: 0,
            capacity: 0,
            data_type: T::DATA_TYPE as u8,
            reserved: [0; 7],
        };
        heap.write_pod(offset, &state)?;
        heap.attach(offset)?;
        Ok(Self {
            heap,
            offset,
            state,
            _marker: PhantomData,
        })
    }

    /// Attach to an existing vector by header offset
    pub fn attach(heap: &'h PersistentHeap, offset: u64) -> Result<Self> {
        let state: VecHeader = heap.read_pod(offset)?;
        if state.data_type != T::DATA_TYPE as u8 {
            return Err(BinsparseError::InconsistentFile {
                location: heap.location().to_string(),
                array: format!("vector@{offset}"),
                expected: T::DATA_TYPE.label().to_string(),
                actual: bsp_core::DataType::from_u8(state.data_type)
                    .map(|t| t.label().to_string())
                    .unwrap_or_else(|| format!("type tag {}", state.data_type)),
            });
        }
        if state.len > state.capacity {
            return Err(BinsparseError::InconsistentFile {
                location: heap.location().to_string(),
                array: format!("vector@{offset}"),
                expected: format!("length at most {}", state.capacity),
                actual: state.len.to_string(),
            });
        }
        heap.slice_at::<T>(state.data, state.capacity as usize)?;
        heap.attach(offset)?;
        Ok(Self {
            heap,
            offset,
            state,
            _marker: PhantomData,
        })
    }

    /// Offset of the header, stable for the life of the heap
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn capacity(&self) -> usize {
        self.state.capacity as usize
    }

    fn persist(&self) -> Result<()> {
        self.heap.write_pod(self.offset, &self.state)
    }

    fn element_offset(&self, index: u64) -> u64 {
        self.state.data + index * size_of::<T>() as u64
    }

    fn grow(&mut self, required: u64) -> Result<()> {
        let capacity = required.max(self.state.capacity * 2).max(MIN_CAPACITY);
        let bytes = capacity
            .checked_mul(size_of::<T>() as u64)
            .ok_or(BinsparseError::CapacityExceeded {
                requested: u64::MAX,
                available: self.heap.capacity(),
            })?;
        let data = self.heap.allocate(bytes)?;
        let heap = self.heap;
        let old: &[T] = heap.slice_at(self.state.data, self.state.len as usize)?;
        heap.write_bytes(data, bytemuck::cast_slice(old))?;

        tracing::trace!(
            header = self.offset,
            from = self.state.capacity,
            to = capacity,
            "heap vector grown"
        );
        self.state.data = data;
        self.state.capacity = capacity;
        self.persist()
    }
}

impl<T: Element> Buffer<T> for HeapVec<'_, T> {
    fn as_slice(&self) -> &[T] {
        self.heap
            .slice_at(self.state.data, self.state.len as usize)
            .unwrap_or(&[])
    }

    fn as_mut_slice(&mut self) -> Result<&mut [T]> {
        // SAFETY: this handle is the only one attached to the header and is
        // borrowed mutably for the lifetime of the slice
        unsafe {
            self.heap
                .slice_at_mut(self.state.data, self.state.len as usize)
        }
    }

    fn reserve(&mut self, additional: usize) -> Result<()> {
        let required = self.state.len + additional as u64;
        if required > self.state.capacity {
            self.grow(required)?;
        }
        Ok(())
    }

    fn push(&mut self, value: T) -> Result<()> {
        self.reserve(1)?;
        self.heap
            .write_pod(self.element_offset(self.state.len), &value)?;
        self.state.len += 1;
        self.persist()
    }

    fn resize(&mut self, len: usize, value: T) -> Result<()> {
        let old = self.state.len as usize;
        if len > old {
            self.reserve(len - old)?;
            // SAFETY: the new range is within capacity and owned by this handle
            let tail = unsafe {
                self.heap
                    .slice_at_mut::<T>(self.element_offset(old as u64), len - old)?
            };
            tail.fill(value);
        }
        self.state.len = len as u64;
        self.persist()
    }

    fn clear(&mut self) -> Result<()> {
        self.state.len = 0;
        self.persist()
    }

    fn extend_from_slice(&mut self, values: &[T]) -> Result<()> {
        self.reserve(values.len())?;
        self.heap
            .write_bytes(self.element_offset(self.state.len), bytemuck::cast_slice(values))?;
        self.state.len += values.len() as u64;
        self.persist()
    }

    fn len(&self) -> usize {
        self.state.len as usize
    }
}

impl<T: Element> Drop for HeapVec<'_, T> {
    fn drop(&mut self) {
        self.heap.detach(self.offset);
    }
}

impl<T: Element> std::fmt::Debug for HeapVec<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeapVec")
            .field("offset", &self.offset)
            .field("len", &self.state.len)
            .field("capacity", &self.state.capacity)
            .finish()
    }
}

/// Single plain-data value stored in a [`PersistentHeap`]
pub struct HeapCell<'h, T: Pod> {
    heap: &'h PersistentHeap,
    offset: u64,
    value: T,
}

impl<'h, T: Pod> HeapCell<'h, T> {
    pub fn new_in(heap: &'h PersistentHeap, value: T) -> Result<Self> {
        let offset = heap.allocate(size_of::<T>() as u64)?;
        heap.write_pod(offset, &value)?;
        heap.attach(offset)?;
        Ok(Self {
            heap,
            offset,
            value,
        })
    }

    pub fn attach(heap: &'h PersistentHeap, offset: u64) -> Result<Self> {
        let value = heap.read_pod(offset)?;
        heap.attach(offset)?;
        Ok(Self {
            heap,
            offset,
            value,
        })
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }
}

impl<T: Pod> Cell<T> for HeapCell<'_, T> {
    fn get(&self) -> T {
        self.value
    }

    fn set(&mut self, value: T) -> Result<()> {
        self.heap.write_pod(self.offset, &value)?;
        self.value = value;
        Ok(())
    }
}

impl<T: Pod> Drop for HeapCell<'_, T> {
    fn drop(&mut self) {
        self.heap.detach(self.offset);
    }
}

/// Allocation strategy placing container storage in a persistent heap
#[derive(Debug, Clone, Copy)]
pub struct HeapAllocator<'h> {
    heap: &'h PersistentHeap,
}

impl<'h> HeapAllocator<'h> {
    pub fn new(heap: &'h PersistentHeap) -> Self {
        Self { heap }
    }

    pub fn heap(&self) -> &'h PersistentHeap {
        self.heap
    }
}

impl<'h> Allocator for HeapAllocator<'h> {
    type Buffer<T: Element> = HeapVec<'h, T>;
    type Cell<T: Pod> = HeapCell<'h, T>;

    fn new_buffer<T: Element>(&self) -> Result<HeapVec<'h, T>> {
        HeapVec::new_in(self.heap)
    }

    fn new_cell<T: Pod>(&self, value: T) -> Result<HeapCell<'h, T>> {
        HeapCell::new_in(self.heap, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HeapConfig;

    #[test]
    fn test_heap_vec_growth_and_reattach() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vec.heap");
        let heap = PersistentHeap::create(&path, &HeapConfig::with_capacity(1 << 20)).unwrap();

        let offset = {
            let mut vec = HeapVec::<u32>::new_in(&heap).unwrap();
            assert!(vec.as_slice().is_empty());
            for i in 0..100 {
                vec.push(i).unwrap();
            }
            vec.extend_from_slice(&[7, 8]).unwrap();
            vec.as_mut_slice().unwrap()[0] = 42;
            assert_eq!(vec.len(), 102);
            assert!(vec.capacity() >= 102);

            assert!(matches!(
                HeapVec::<u32>::attach(&heap, vec.offset()),
                Err(BinsparseError::AccessConflict { .. })
            ));
            vec.offset()
        };

        let mut vec = HeapVec::<u32>::attach(&heap, offset).unwrap();
        assert_eq!(vec.as_slice()[0], 42);
        assert_eq!(vec.as_slice()[101], 8);
        vec.resize(104, 5).unwrap();
        assert_eq!(&vec.as_slice()[100..], &[7, 8, 5, 5]);
        vec.clear().unwrap();
        assert!(vec.is_empty());
        drop(vec);

        assert!(matches!(
            HeapVec::<f64>::attach(&heap, offset),
            Err(BinsparseError::InconsistentFile { .. })
        ));
    }

    #[test]
    fn test_heap_cell() {
        let dir = tempfile::tempdir().unwrap();
        let heap =
            PersistentHeap::create(dir.path().join("cell.heap"), &HeapConfig::with_capacity(1 << 16))
                .unwrap();
        let alloc = HeapAllocator::new(&heap);
        let mut cell = alloc.new_cell(5u64).unwrap();
        cell.set(6).unwrap();
        let offset = cell.offset();
        drop(cell);
        assert_eq!(HeapCell::<u64>::attach(&heap, offset).unwrap().get(), 6);
    }
}
