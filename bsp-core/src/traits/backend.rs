//! Storage seam between the codec and the storage engines
//!
//! Arrays cross the seam as [`TypedSlice`]s, a closed tagged variant over the
//! supported scalar set, so engines never need generic or dynamic dispatch.

use crate::format::DataType;
use crate::metadata::Document;
use crate::validation::validate_typed_slice;
use crate::Result;

/// Borrowed array of any supported element type
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TypedSlice<'a> {
    Int8(&'a [i8]),
    Int16(&'a [i16]),
    Int32(&'a [i32]),
    Int64(&'a [i64]),
    UInt8(&'a [u8]),
    UInt16(&'a [u16]),
    UInt32(&'a [u32]),
    UInt64(&'a [u64]),
    Float32(&'a [f32]),
    Float64(&'a [f64]),
}

macro_rules! dispatch_slice {
    ($slice:expr, $values:ident => $body:expr) => {
        match $slice {
            TypedSlice::Int8($values) => $body,
            TypedSlice::Int16($values) => $body,
            TypedSlice::Int32($values) => $body,
            TypedSlice::Int64($values) => $body,
            TypedSlice::UInt8($values) => $body,
            TypedSlice::UInt16($values) => $body,
            TypedSlice::UInt32($values) => $body,
            TypedSlice::UInt64($values) => $body,
            TypedSlice::Float32($values) => $body,
            TypedSlice::Float64($values) => $body,
        }
    };
}

impl<'a> TypedSlice<'a> {
    pub fn data_type(&self) -> DataType {
        match self {
            TypedSlice::Int8(_) => DataType::Int8,
            TypedSlice::Int16(_) => DataType::Int16,
            TypedSlice::Int32(_) => DataType::Int32,
            TypedSlice::Int64(_) => DataType::Int64,
            TypedSlice::UInt8(_) => DataType::UInt8,
            TypedSlice::UInt16(_) => DataType::UInt16,
            TypedSlice::UInt32(_) => DataType::UInt32,
            TypedSlice::UInt64(_) => DataType::UInt64,
            TypedSlice::Float32(_) => DataType::Float32,
            TypedSlice::Float64(_) => DataType::Float64,
        }
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        dispatch_slice!(self, values => values.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw native-endian bytes of the array
    pub fn as_bytes(&self) -> &'a [u8] {
        dispatch_slice!(*self, values => bytemuck::cast_slice(values))
    }

    /// Start address, used for residency checks
    pub fn as_ptr(&self) -> *const u8 {
        self.as_bytes().as_ptr()
    }

    /// Reinterpret a byte payload as an array of `data_type`.
    ///
    /// Fails when the payload length is not a multiple of the element size or
    /// the payload is not aligned for the element type.
    pub fn from_bytes(data_type: DataType, bytes: &'a [u8]) -> Result<Self> {
        fn cast<T: bytemuck::Pod>(bytes: &[u8]) -> Result<&[T]> {
            validate_typed_slice::<T>(bytes)?;
            Ok(bytemuck::cast_slice(bytes))
        }

        Ok(match data_type {
            DataType::Int8 => TypedSlice::Int8(cast(bytes)?),
            DataType::Int16 => TypedSlice::Int16(cast(bytes)?),
            DataType::Int32 => TypedSlice::Int32(cast(bytes)?),
            DataType::Int64 => TypedSlice::Int64(cast(bytes)?),
            DataType::UInt8 => TypedSlice::UInt8(cast(bytes)?),
            DataType::UInt16 => TypedSlice::UInt16(cast(bytes)?),
            DataType::UInt32 => TypedSlice::UInt32(cast(bytes)?),
            DataType::UInt64 => TypedSlice::UInt64(cast(bytes)?),
            DataType::Float32 => TypedSlice::Float32(cast(bytes)?),
            DataType::Float64 => TypedSlice::Float64(cast(bytes)?),
        })
    }
}

/// A logical array paired with its dataset name
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NamedArray<'a> {
    pub name: &'static str,
    pub data: TypedSlice<'a>,
}

impl<'a> NamedArray<'a> {
    pub fn new(name: &'static str, data: TypedSlice<'a>) -> Self {
        Self { name, data }
    }
}

/// Destination that can persist an encoded matrix
///
/// The caller has already encoded `metadata` from the same view that produced
/// `arrays`; implementations decide where the bulk arrays go (copied into a
/// file, or verified to already live in a persistent heap).
pub trait MatrixSink {
    fn put_matrix(
        &mut self,
        arrays: &[NamedArray<'_>],
        metadata: &Document,
        compression_level: u8,
    ) -> Result<()>;
}

impl<S: MatrixSink + ?Sized> MatrixSink for &mut S {
    fn put_matrix(
        &mut self,
        arrays: &[NamedArray<'_>],
        metadata: &Document,
        compression_level: u8,
    ) -> Result<()> {
        (**self).put_matrix(arrays, metadata, compression_level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_view() {
        let data = [1u32, 2, 3];
        let typed = TypedSlice::UInt32(&data);
        assert_eq!(typed.len(), 3);
        assert_eq!(typed.as_bytes().len(), 12);
        assert_eq!(typed.as_bytes()[..4], 1u32.to_ne_bytes());

        let back = TypedSlice::from_bytes(DataType::UInt32, typed.as_bytes()).unwrap();
        assert_eq!(back, typed);
    }

    #[test]
    fn test_from_bytes_rejects_ragged_payload() {
        let data = [0u64; 2];
        let bytes: &[u8] = bytemuck::cast_slice(&data);
        assert!(TypedSlice::from_bytes(DataType::Float32, &bytes[..7]).is_err());
        assert!(TypedSlice::from_bytes(DataType::UInt8, &bytes[..7]).is_ok());
    }
}
