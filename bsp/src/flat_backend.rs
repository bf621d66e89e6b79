//! Flat-file storage for binsparse matrices
//!
//! Every logical array becomes one dataset named after it (`values`,
//! `indices_0`, `indices_1`, `pointers_to_1`) and the metadata document is
//! stored as the `binsparse` attribute. Reads check the attribute against
//! each dataset's element type and length before copying anything.

mod file_io;
mod layout;

pub use file_io::{FlatFileReader, FlatFileWriter, MAX_DATASET_NAME_LEN};
pub use layout::{DatasetInfo, Directory, FileHeader, FLAT_MAGIC, FLAT_VERSION};

use bsp_core::format::constants::{arrays, METADATA_KEY};
use bsp_core::{
    decode, BinsparseError, DecodedHeader, Document, Element, Index, MatrixFormat, MatrixSink,
    NamedArray, Order, Result, TypedSlice,
};
use serde_json::Value;

use crate::alloc::{Allocator, Buffer, Global};
use crate::containers::{CooMatrix, CscMatrix, CsrMatrix, DenseMatrix, DenseVector, MatrixDims};

/// Destination for named arrays and attributes
pub trait DatasetSink {
    fn write_dataset(&mut self, name: &str, data: TypedSlice<'_>, compression_level: u8) -> Result<()>;

    fn set_attribute(&mut self, name: &str, value: Value) -> Result<()>;
}

/// Source of named arrays and attributes
pub trait DatasetSource {
    /// File or resource name used in error messages
    fn location(&self) -> &str;

    fn get_attribute(&self, name: &str) -> Option<&Value>;

    /// Element count of a dataset; `InconsistentFile` if absent
    fn dataset_len(&self, name: &str) -> Result<usize>;

    fn read_dataset(&self, name: &str) -> Result<TypedSlice<'_>>;

    /// Copy a dataset into a fresh buffer from `alloc`
    fn read_dataset_in<T: Element, A: Allocator>(&self, name: &str, alloc: &A) -> Result<A::Buffer<T>> {
        let data = self.read_dataset(name)?;
        let values = T::from_typed(&data).ok_or_else(|| {
            BinsparseError::type_mismatch(
                self.location(),
                name,
                T::DATA_TYPE.label(),
                data.data_type().label(),
            )
        })?;
        let mut buffer = alloc.new_buffer::<T>()?;
        buffer.extend_from_slice(values)?;
        Ok(buffer)
    }
}

/// Write every array as a dataset, then the document as the `binsparse`
/// attribute
pub fn put_arrays<S: DatasetSink + ?Sized>(
    sink: &mut S,
    arrays: &[NamedArray<'_>],
    metadata: &Document,
    compression_level: u8,
) -> Result<()> {
    for array in arrays {
        sink.write_dataset(array.name, array.data, compression_level)?;
    }
    sink.set_attribute(METADATA_KEY, Value::Object(metadata.as_map().clone()))
}

impl MatrixSink for FlatFileWriter {
    fn put_matrix(
        &mut self,
        arrays: &[NamedArray<'_>],
        metadata: &Document,
        compression_level: u8,
    ) -> Result<()> {
        put_arrays(self, arrays, metadata, compression_level)
    }
}

/// The stored metadata document, without any validation
pub fn read_document<S: DatasetSource + ?Sized>(source: &S) -> Result<Document> {
    let attribute = source.get_attribute(METADATA_KEY).ok_or_else(|| {
        BinsparseError::schema(format!(
            "{} has no '{METADATA_KEY}' attribute",
            source.location()
        ))
    })?;
    match attribute {
        Value::Object(map) => Ok(Document::from_map(map.clone())),
        other => Err(BinsparseError::schema(format!(
            "'{METADATA_KEY}' attribute must be an object, found {other}"
        ))),
    }
}

/// Decode the metadata and check every dataset's type and length against it
pub fn read_header<S: DatasetSource + ?Sized>(
    source: &S,
    expected: MatrixFormat,
) -> Result<DecodedHeader> {
    let header = decode(&read_document(source)?, expected)?;
    let location = source.location();

    for name in header.format.array_names() {
        let declared = header.data_types.get(*name).copied().ok_or_else(|| {
            BinsparseError::schema(format!("data_types has no entry for '{name}'"))
        })?;
        let stored = source.read_dataset(name)?.data_type();
        if stored != declared {
            return Err(BinsparseError::type_mismatch(
                location,
                *name,
                declared.label(),
                stored.label(),
            ));
        }
        if let Some(expected_len) = header.expected_len(name) {
            let len = source.dataset_len(name)?;
            if len != expected_len {
                return Err(BinsparseError::length_mismatch(location, *name, expected_len, len));
            }
        }
        tracing::trace!(dataset = *name, data_type = %stored, "checked dataset");
    }
    Ok(header)
}

fn check_requested<S: DatasetSource + ?Sized>(
    source: &S,
    header: &DecodedHeader,
    value_type: bsp_core::DataType,
    index_type: Option<bsp_core::DataType>,
) -> Result<()> {
    if header.value_type != value_type {
        return Err(BinsparseError::type_mismatch(
            source.location(),
            arrays::VALUES,
            value_type.label(),
            header.value_type.label(),
        ));
    }
    if header.index_type != index_type {
        return Err(BinsparseError::type_mismatch(
            source.location(),
            arrays::INDICES_1,
            index_type.map_or("none", |t| t.label()),
            header.index_type.map_or("none", |t| t.label()),
        ));
    }
    Ok(())
}

fn stored_dims(header: &DecodedHeader, order: Order) -> MatrixDims {
    MatrixDims {
        structure: header.structure as u8,
        is_iso: header.is_iso as u8,
        order: order as u8,
        ..MatrixDims::new(header.nrows, header.ncols)
    }
}

fn log_read(source: &(impl DatasetSource + ?Sized), header: &DecodedHeader) {
    tracing::debug!(
        path = %source.location(),
        format = %header.format,
        nnz = header.nnz,
        "read matrix"
    );
}

/// Read a CSR matrix into storage from `alloc`
pub fn read_csr_in<T, I, A, S>(source: &S, alloc: &A) -> Result<CsrMatrix<T, I, A>>
where
    T: Element,
    I: Index,
    A: Allocator,
    S: DatasetSource + ?Sized,
{
    let header = read_header(source, MatrixFormat::Csr)?;
    check_requested(source, &header, T::DATA_TYPE, Some(I::DATA_TYPE))?;
    let matrix = CsrMatrix::from_parts(
        alloc.new_cell(stored_dims(&header, Order::RowMajor))?,
        source.read_dataset_in::<T, A>(arrays::VALUES, alloc)?,
        source.read_dataset_in::<I, A>(arrays::INDICES_1, alloc)?,
        source.read_dataset_in::<I, A>(arrays::POINTERS_TO_1, alloc)?,
    );
    log_read(source, &header);
    Ok(matrix)
}

pub fn read_csc_in<T, I, A, S>(source: &S, alloc: &A) -> Result<CscMatrix<T, I, A>>
where
    T: Element,
    I: Index,
    A: Allocator,
    S: DatasetSource + ?Sized,
{
    let header = read_header(source, MatrixFormat::Csc)?;
    check_requested(source, &header, T::DATA_TYPE, Some(I::DATA_TYPE))?;
    let matrix = CscMatrix::from_parts(
        alloc.new_cell(stored_dims(&header, Order::ColumnMajor))?,
        source.read_dataset_in::<T, A>(arrays::VALUES, alloc)?,
        source.read_dataset_in::<I, A>(arrays::INDICES_1, alloc)?,
        source.read_dataset_in::<I, A>(arrays::POINTERS_TO_1, alloc)?,
    );
    log_read(source, &header);
    Ok(matrix)
}

/// Accepts both `COOR` and `COOC`; the stored orientation is kept
pub fn read_coo_in<T, I, A, S>(source: &S, alloc: &A) -> Result<CooMatrix<T, I, A>>
where
    T: Element,
    I: Index,
    A: Allocator,
    S: DatasetSource + ?Sized,
{
    let header = read_header(source, MatrixFormat::Coor)?;
    check_requested(source, &header, T::DATA_TYPE, Some(I::DATA_TYPE))?;
    let order = if header.format == MatrixFormat::Cooc {
        Order::ColumnMajor
    } else {
        Order::RowMajor
    };
    let matrix = CooMatrix::from_parts(
        alloc.new_cell(stored_dims(&header, order))?,
        source.read_dataset_in::<T, A>(arrays::VALUES, alloc)?,
        source.read_dataset_in::<I, A>(arrays::INDICES_0, alloc)?,
        source.read_dataset_in::<I, A>(arrays::INDICES_1, alloc)?,
    );
    log_read(source, &header);
    Ok(matrix)
}

/// Accepts both `DMATR` and `DMATC`; the stored order is kept
pub fn read_dense_in<T, A, S>(source: &S, alloc: &A) -> Result<DenseMatrix<T, A>>
where
    T: Element,
    A: Allocator,
    S: DatasetSource + ?Sized,
{
    let header = read_header(source, MatrixFormat::Dmatr)?;
    check_requested(source, &header, T::DATA_TYPE, None)?;
    let order = if header.format == MatrixFormat::Dmatc {
        Order::ColumnMajor
    } else {
        Order::RowMajor
    };
    let matrix = DenseMatrix::from_parts(
        alloc.new_cell(stored_dims(&header, order))?,
        source.read_dataset_in::<T, A>(arrays::VALUES, alloc)?,
    );
    log_read(source, &header);
    Ok(matrix)
}

pub fn read_dense_vector_in<T, A, S>(source: &S, alloc: &A) -> Result<DenseVector<T, A>>
where
    T: Element,
    A: Allocator,
    S: DatasetSource + ?Sized,
{
    let header = read_header(source, MatrixFormat::Dvec)?;
    check_requested(source, &header, T::DATA_TYPE, None)?;
    let vector = DenseVector::from_parts(
        alloc.new_cell(stored_dims(&header, Order::ColumnMajor))?,
        source.read_dataset_in::<T, A>(arrays::VALUES, alloc)?,
    );
    log_read(source, &header);
    Ok(vector)
}

pub fn read_csr<T: Element, I: Index>(reader: &FlatFileReader) -> Result<CsrMatrix<T, I>> {
    read_csr_in(reader, &Global)
}

pub fn read_csc<T: Element, I: Index>(reader: &FlatFileReader) -> Result<CscMatrix<T, I>> {
    read_csc_in(reader, &Global)
}

pub fn read_coo<T: Element, I: Index>(reader: &FlatFileReader) -> Result<CooMatrix<T, I>> {
    read_coo_in(reader, &Global)
}

pub fn read_dense<T: Element>(reader: &FlatFileReader) -> Result<DenseMatrix<T>> {
    read_dense_in(reader, &Global)
}

pub fn read_dense_vector<T: Element>(reader: &FlatFileReader) -> Result<DenseVector<T>> {
    read_dense_vector_in(reader, &Global)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WriteOptions;
    use crate::dispatch::write_csr;
    use bsp_core::{CooView, CsrView, Structure};
    use serde_json::json;

    #[test]
    fn test_csr_round_trip_with_user_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("csr.bsp");
        let values = [1.0f32, 2.0, 3.0];
        let cols = [0u16, 1, 0];
        let rows = [0u16, 1, 2, 3];
        let view = CsrView::new(3, 3, &values, &cols, &rows).with_structure(Structure::SymmetricLower);

        let mut writer = FlatFileWriter::create(&path).unwrap();
        let options = WriteOptions::default().with_user_key("origin", json!("unit test"));
        write_csr(&mut writer, &view, &options).unwrap();
        writer.finish().unwrap();

        let reader = FlatFileReader::open(&path).unwrap();
        let doc = read_document(&reader).unwrap();
        assert_eq!(doc.get("origin"), Some(&json!("unit test")));
        assert_eq!(reader.dataset_info("values").unwrap().compression_level, 9);

        let matrix = read_csr::<f32, u16>(&reader).unwrap();
        assert_eq!(matrix.view(), view);
        assert_eq!(matrix.structure(), Structure::SymmetricLower);

        assert!(matches!(
            read_csr::<f64, u16>(&reader),
            Err(BinsparseError::InconsistentFile { .. })
        ));
        assert!(matches!(
            read_csc::<f32, u16>(&reader),
            Err(BinsparseError::FormatMismatch { .. })
        ));
    }

    #[test]
    fn test_length_cross_check() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.bsp");
        let values = [1.0f64, 2.0];
        let rows = [0u32, 1];
        let cols = [1u32, 0];
        let view = CooView::new(2, 2, &values, &rows, &cols);
        let doc = bsp_core::encode(&view, &Default::default()).unwrap();

        // One index short of what the metadata declares
        let mut writer = FlatFileWriter::create(&path).unwrap();
        writer.write_dataset("values", TypedSlice::Float64(&values), 0).unwrap();
        writer.write_dataset("indices_0", TypedSlice::UInt32(&rows), 0).unwrap();
        writer.write_dataset("indices_1", TypedSlice::UInt32(&cols[..1]), 0).unwrap();
        writer
            .set_attribute(METADATA_KEY, Value::Object(doc.into_map()))
            .unwrap();
        writer.finish().unwrap();

        let reader = FlatFileReader::open(&path).unwrap();
        match read_coo::<f64, u32>(&reader) {
            Err(BinsparseError::InconsistentFile {
                array,
                expected,
                actual,
                ..
            }) => {
                assert_eq!(array, "indices_1");
                assert_eq!(expected, "2");
                assert_eq!(actual, "1");
            }
            other => panic!("expected InconsistentFile, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_attribute() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bare.bsp");
        FlatFileWriter::create(&path).unwrap().finish().unwrap();
        let reader = FlatFileReader::open(&path).unwrap();
        assert!(matches!(
            read_dense::<f32>(&reader),
            Err(BinsparseError::SchemaError { .. })
        ));
    }
}
