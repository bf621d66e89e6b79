//! bsp - binsparse sparse matrix storage
//!
//! This library stores sparse and dense matrices in the binsparse
//! interchange format: a JSON metadata document plus one typed array per
//! logical component. Two back ends are provided, a memory-mapped flat file
//! and a persistent heap whose containers survive the process.
//!
//! ## Architecture
//!
//! - **bsp-core**: type labels, format tags, views and the metadata codec (no I/O)
//! - **bsp**: owning containers, allocators, back ends and the matrix market importer
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bsp::{CsrMatrix, ImportOptions, WriteOptions};
//!
//! fn example() -> bsp::Result<()> {
//!     let mut matrix = CsrMatrix::<f64, u32>::new();
//!     bsp::read_matrix_market("matrix.mtx", &ImportOptions::default(), &mut matrix)?;
//!     bsp::write_csr_file("matrix.bsp", &matrix.view(), &WriteOptions::default())?;
//!
//!     let loaded = bsp::read_csr::<f64, u32>("matrix.bsp")?;
//!     if let Some(value) = loaded.view().get(0, 0) {
//!         println!("matrix[0, 0] = {value}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Zero-copy views**: every container hands out borrowed views for the codec
//! - **Allocator strategy**: the same containers run on `Vec` or on a persistent heap
//! - **Resident reads**: heap matrices are read in place, without copying arrays
//! - **Matrix market import**: coordinate and array files, symmetry expansion
//! - **CLI** (feature `cli`): inspect files and convert matrix market input

// Re-export core abstractions and format definitions
pub use bsp_core::{
    // Errors
    BinsparseError, ErrorCategory, Result,
    // Format definitions
    DataType, MatrixFormat, Order, Structure,
    // Traits and the runtime array variant
    Element, Index, MatrixSink, MatrixView, NamedArray, TypedSlice,
    // Views
    CooView, CscView, CsrView, DenseVectorView, DenseView,
    // Metadata codec
    decode, encode, DecodedHeader, Descriptor, Document,
};

pub mod alloc;
pub mod config;
pub mod containers;
pub mod dispatch;
pub mod flat_backend;
pub mod heap_backend;
pub mod matrix_market;

pub use alloc::{Allocator, Buffer, Cell, Global};
pub use config::{DuplicatePolicy, HeapConfig, ImportOptions, WriteOptions};
pub use containers::{
    AssignCoordinates, Container, CooMatrix, CscMatrix, CsrMatrix, DenseMatrix, DenseVector,
};
pub use dispatch::{
    inspect, read_coo, read_coo_with, read_csc, read_csc_with, read_csr, read_csr_with,
    read_dense, read_dense_vector, read_dense_vector_with, read_dense_with, write_coo,
    write_coo_file, write_csc, write_csc_file, write_csr, write_csr_file, write_dense,
    write_dense_file, write_dense_vector, write_dense_vector_file, write_file, write_matrix,
};
pub use flat_backend::{FlatFileReader, FlatFileWriter};
pub use heap_backend::{HeapAllocator, HeapSink, PersistentHeap, Resident};
pub use matrix_market::{parse_matrix_market, read_matrix_market, MatrixMarketHeader};

/// Wrap an I/O failure with the file or heap it happened on
pub(crate) fn io_error(context: impl Into<String>, err: std::io::Error) -> BinsparseError {
    BinsparseError::io(context, err.to_string())
}
