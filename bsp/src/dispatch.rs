//! Format-level entry points
//!
//! Writers take any [`MatrixSink`], so the same call stores a matrix in a
//! [`FlatFileWriter`] or, through [`HeapSink`](crate::heap_backend::HeapSink),
//! in a persistent heap. Path-based readers open a flat file and copy its
//! arrays into [`Global`] or any other allocator.

use std::fs;
use std::path::{Path, PathBuf};

use bsp_core::{
    encode, BinsparseError, CooView, CscView, CsrView, DenseVectorView, DenseView, Document,
    Element, Index, MatrixSink, MatrixView, Result,
};

use crate::alloc::{Allocator, Global};
use crate::config::WriteOptions;
use crate::containers::{CooMatrix, CscMatrix, CsrMatrix, DenseMatrix, DenseVector};
use crate::flat_backend::{self, FlatFileReader, FlatFileWriter};
use crate::io_error;

/// Validate `view`, encode its metadata and hand both to `sink`
pub fn write_matrix<S, V>(sink: &mut S, view: &V, options: &WriteOptions) -> Result<()>
where
    S: MatrixSink + ?Sized,
    V: MatrixView + ?Sized,
{
    let metadata = prepare(view, options)?;
    put_prepared(sink, view, &metadata, options)
}

/// Options and view checks plus the metadata document, with no side effects
pub(crate) fn prepare<V: MatrixView + ?Sized>(view: &V, options: &WriteOptions) -> Result<Document> {
    options.validate()?;
    encode(view, &options.user_keys)
}

fn put_prepared<S, V>(sink: &mut S, view: &V, metadata: &Document, options: &WriteOptions) -> Result<()>
where
    S: MatrixSink + ?Sized,
    V: MatrixView + ?Sized,
{
    let arrays = view.arrays();
    tracing::debug!(
        format = %view.format(),
        nrows = view.dimensions().0,
        ncols = view.dimensions().1,
        nnz = view.nnz(),
        arrays = arrays.len(),
        "writing matrix"
    );
    sink.put_matrix(&arrays, metadata, options.compression_level)
}

pub fn write_csr<S: MatrixSink + ?Sized, T: Element, I: Index>(
    sink: &mut S,
    view: &CsrView<'_, T, I>,
    options: &WriteOptions,
) -> Result<()> {
    write_matrix(sink, view, options)
}

pub fn write_csc<S: MatrixSink + ?Sized, T: Element, I: Index>(
    sink: &mut S,
    view: &CscView<'_, T, I>,
    options: &WriteOptions,
) -> Result<()> {
    write_matrix(sink, view, options)
}

pub fn write_coo<S: MatrixSink + ?Sized, T: Element, I: Index>(
    sink: &mut S,
    view: &CooView<'_, T, I>,
    options: &WriteOptions,
) -> Result<()> {
    write_matrix(sink, view, options)
}

pub fn write_dense<S: MatrixSink + ?Sized, T: Element>(
    sink: &mut S,
    view: &DenseView<'_, T>,
    options: &WriteOptions,
) -> Result<()> {
    write_matrix(sink, view, options)
}

pub fn write_dense_vector<S: MatrixSink + ?Sized, T: Element>(
    sink: &mut S,
    view: &DenseVectorView<'_, T>,
    options: &WriteOptions,
) -> Result<()> {
    write_matrix(sink, view, options)
}

/// Write `view` to a flat file at `path`, replacing any existing file
///
/// The file is written next to `path` under a `.partial` name and renamed
/// into place once complete, so a failed write leaves `path` untouched.
pub fn write_file<P, V>(path: P, view: &V, options: &WriteOptions) -> Result<()>
where
    P: AsRef<Path>,
    V: MatrixView + ?Sized,
{
    let path = path.as_ref();
    let metadata = prepare(view, options)?;
    let staging = staging_path(path)?;

    let mut writer = FlatFileWriter::create(&staging)?;
    if let Err(e) = put_prepared(&mut writer, view, &metadata, options) {
        if let Err(cleanup) = writer.abandon() {
            tracing::warn!(path = %staging.display(), error = %cleanup, "failed to remove partial file");
        }
        return Err(e);
    }
    if let Err(e) = writer.finish() {
        if let Err(cleanup) = fs::remove_file(&staging) {
            tracing::warn!(path = %staging.display(), error = %cleanup, "failed to remove partial file");
        }
        return Err(e);
    }
    fs::rename(&staging, path).map_err(|e| io_error(path.display().to_string(), e))
}

fn staging_path(path: &Path) -> Result<PathBuf> {
    let name = path.file_name().ok_or_else(|| {
        BinsparseError::invalid_argument(format!("{} does not name a file", path.display()))
    })?;
    let mut staged = name.to_os_string();
    staged.push(".partial");
    Ok(path.with_file_name(staged))
}

pub fn write_csr_file<P: AsRef<Path>, T: Element, I: Index>(
    path: P,
    view: &CsrView<'_, T, I>,
    options: &WriteOptions,
) -> Result<()> {
    write_file(path, view, options)
}

pub fn write_csc_file<P: AsRef<Path>, T: Element, I: Index>(
    path: P,
    view: &CscView<'_, T, I>,
    options: &WriteOptions,
) -> Result<()> {
    write_file(path, view, options)
}

pub fn write_coo_file<P: AsRef<Path>, T: Element, I: Index>(
    path: P,
    view: &CooView<'_, T, I>,
    options: &WriteOptions,
) -> Result<()> {
    write_file(path, view, options)
}

pub fn write_dense_file<P: AsRef<Path>, T: Element>(
    path: P,
    view: &DenseView<'_, T>,
    options: &WriteOptions,
) -> Result<()> {
    write_file(path, view, options)
}

pub fn write_dense_vector_file<P: AsRef<Path>, T: Element>(
    path: P,
    view: &DenseVectorView<'_, T>,
    options: &WriteOptions,
) -> Result<()> {
    write_file(path, view, options)
}

pub fn read_csr<T: Element, I: Index>(path: impl AsRef<Path>) -> Result<CsrMatrix<T, I>> {
    read_csr_with(path, &Global)
}

/// Read a CSR flat file into storage from `alloc`
pub fn read_csr_with<T, I, A>(path: impl AsRef<Path>, alloc: &A) -> Result<CsrMatrix<T, I, A>>
where
    T: Element,
    I: Index,
    A: Allocator,
{
    flat_backend::read_csr_in(&FlatFileReader::open(path)?, alloc)
}

pub fn read_csc<T: Element, I: Index>(path: impl AsRef<Path>) -> Result<CscMatrix<T, I>> {
    read_csc_with(path, &Global)
}

pub fn read_csc_with<T, I, A>(path: impl AsRef<Path>, alloc: &A) -> Result<CscMatrix<T, I, A>>
where
    T: Element,
    I: Index,
    A: Allocator,
{
    flat_backend::read_csc_in(&FlatFileReader::open(path)?, alloc)
}

/// Read a `COOR` or `COOC` flat file
pub fn read_coo<T: Element, I: Index>(path: impl AsRef<Path>) -> Result<CooMatrix<T, I>> {
    read_coo_with(path, &Global)
}

pub fn read_coo_with<T, I, A>(path: impl AsRef<Path>, alloc: &A) -> Result<CooMatrix<T, I, A>>
where
    T: Element,
    I: Index,
    A: Allocator,
{
    flat_backend::read_coo_in(&FlatFileReader::open(path)?, alloc)
}

/// Read a `DMATR` or `DMATC` flat file
pub fn read_dense<T: Element>(path: impl AsRef<Path>) -> Result<DenseMatrix<T>> {
    read_dense_with(path, &Global)
}

pub fn read_dense_with<T: Element, A: Allocator>(
    path: impl AsRef<Path>,
    alloc: &A,
) -> Result<DenseMatrix<T, A>> {
    flat_backend::read_dense_in(&FlatFileReader::open(path)?, alloc)
}

pub fn read_dense_vector<T: Element>(path: impl AsRef<Path>) -> Result<DenseVector<T>> {
    read_dense_vector_with(path, &Global)
}

pub fn read_dense_vector_with<T: Element, A: Allocator>(
    path: impl AsRef<Path>,
    alloc: &A,
) -> Result<DenseVector<T, A>> {
    flat_backend::read_dense_vector_in(&FlatFileReader::open(path)?, alloc)
}

/// Metadata document of a flat file, after a version check
///
/// Only the directory and the `binsparse` attribute are read; dataset
/// payloads are not touched.
pub fn inspect(path: impl AsRef<Path>) -> Result<Document> {
    let reader = FlatFileReader::open(path)?;
    let document = flat_backend::read_document(&reader)?;
    document.check_version()?;
    Ok(document)
}
