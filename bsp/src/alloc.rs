//! Allocation strategies for owning containers
//!
//! A container is generic over an [`Allocator`], which decides where its
//! buffers and its small shape record live. [`Global`] keeps everything on
//! the process heap; [`HeapAllocator`](crate::heap_backend::HeapAllocator)
//! places them inside a [`PersistentHeap`](crate::heap_backend::PersistentHeap)
//! so they can be found again by name after the heap is reopened.

use bsp_core::{Element, Result};
use bytemuck::Pod;

/// Growable array owned by a container
///
/// Mutators return `Result` because persistent buffers can run out of heap
/// space or belong to a heap opened read-only.
pub trait Buffer<T: Element> {
    fn as_slice(&self) -> &[T];

    fn as_mut_slice(&mut self) -> Result<&mut [T]>;

    fn reserve(&mut self, additional: usize) -> Result<()>;

    fn push(&mut self, value: T) -> Result<()>;

    fn resize(&mut self, len: usize, value: T) -> Result<()>;

    fn clear(&mut self) -> Result<()>;

    fn extend_from_slice(&mut self, values: &[T]) -> Result<()>;

    fn len(&self) -> usize {
        self.as_slice().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Single plain-data value owned by a container
pub trait Cell<T: Pod> {
    fn get(&self) -> T;

    fn set(&mut self, value: T) -> Result<()>;
}

/// Allocation strategy for containers
pub trait Allocator {
    type Buffer<T: Element>: Buffer<T>;
    type Cell<T: Pod>: Cell<T>;

    fn new_buffer<T: Element>(&self) -> Result<Self::Buffer<T>>;

    fn new_cell<T: Pod>(&self, value: T) -> Result<Self::Cell<T>>;
}

/// Process heap allocation; buffers are plain `Vec`s
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Global;

/// Cell stored inline in the container
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LocalCell<T>(pub T);

impl<T: Pod> Cell<T> for LocalCell<T> {
    fn get(&self) -> T {
        self.0
    }

    fn set(&mut self, value: T) -> Result<()> {
        self.0 = value;
        Ok(())
    }
}

impl<T: Element> Buffer<T> for Vec<T> {
    fn as_slice(&self) -> &[T] {
        self
    }

    fn as_mut_slice(&mut self) -> Result<&mut [T]> {
        Ok(self)
    }

    fn reserve(&mut self, additional: usize) -> Result<()> {
        Vec::reserve(self, additional);
        Ok(())
    }

    fn push(&mut self, value: T) -> Result<()> {
        Vec::push(self, value);
        Ok(())
    }

    fn resize(&mut self, len: usize, value: T) -> Result<()> {
        Vec::resize(self, len, value);
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        Vec::clear(self);
        Ok(())
    }

    fn extend_from_slice(&mut self, values: &[T]) -> Result<()> {
        Vec::extend_from_slice(self, values);
        Ok(())
    }

    fn len(&self) -> usize {
        Vec::len(self)
    }
}

impl Allocator for Global {
    type Buffer<T: Element> = Vec<T>;
    type Cell<T: Pod> = LocalCell<T>;

    fn new_buffer<T: Element>(&self) -> Result<Vec<T>> {
        Ok(Vec::new())
    }

    fn new_cell<T: Pod>(&self, value: T) -> Result<LocalCell<T>> {
        Ok(LocalCell(value))
    }
}

/// Replace the contents of `buffer` with `values`
pub(crate) fn assign<T: Element, B: Buffer<T>>(buffer: &mut B, values: &[T]) -> Result<()> {
    buffer.clear()?;
    buffer.extend_from_slice(values)
}
