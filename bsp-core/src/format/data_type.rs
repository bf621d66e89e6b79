//! Element type label registry
//!
//! Maps the closed set of supported scalar types to the stable type strings
//! used in the `data_types` section of the metadata, and back.

use crate::{BinsparseError, Result};
use alloc::string::String;
use core::fmt;
use core::str::FromStr;

/// Scalar element types supported by binsparse arrays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum DataType {
    Int8 = 0,
    Int16 = 1,
    Int32 = 2,
    Int64 = 3,
    UInt8 = 4,
    UInt16 = 5,
    UInt32 = 6,
    UInt64 = 7,
    Float32 = 8,
    Float64 = 9,
}

/// Label table, one row per supported type
const LABELS: [(DataType, &str); 10] = [
    (DataType::Int8, "int8"),
    (DataType::Int16, "int16"),
    (DataType::Int32, "int32"),
    (DataType::Int64, "int64"),
    (DataType::UInt8, "uint8"),
    (DataType::UInt16, "uint16"),
    (DataType::UInt32, "uint32"),
    (DataType::UInt64, "uint64"),
    (DataType::Float32, "float32"),
    (DataType::Float64, "float64"),
];

impl DataType {
    /// Every supported type, in tag order
    pub const ALL: [DataType; 10] = [
        DataType::Int8,
        DataType::Int16,
        DataType::Int32,
        DataType::Int64,
        DataType::UInt8,
        DataType::UInt16,
        DataType::UInt32,
        DataType::UInt64,
        DataType::Float32,
        DataType::Float64,
    ];

    /// Canonical metadata label for this type
    pub const fn label(self) -> &'static str {
        LABELS[self as usize].1
    }

    /// Resolve a metadata label
    pub fn from_label(label: &str) -> Result<Self> {
        LABELS
            .iter()
            .find(|(_, l)| *l == label)
            .map(|(t, _)| *t)
            .ok_or_else(|| BinsparseError::unsupported_type(label))
    }

    /// Resolve a stored numeric tag
    pub const fn from_u8(value: u8) -> Option<Self> {
        if (value as usize) < Self::ALL.len() {
            Some(Self::ALL[value as usize])
        } else {
            None
        }
    }

    /// Size in bytes of one element
    pub const fn size_bytes(self) -> usize {
        match self {
            DataType::Int8 | DataType::UInt8 => 1,
            DataType::Int16 | DataType::UInt16 => 2,
            DataType::Int32 | DataType::UInt32 | DataType::Float32 => 4,
            DataType::Int64 | DataType::UInt64 | DataType::Float64 => 8,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for DataType {
    type Err = BinsparseError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_label(s)
    }
}

/// Label of the `values` array, optionally wrapped as `iso[<label>]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueLabel {
    pub data_type: DataType,
    pub is_iso: bool,
}

impl ValueLabel {
    const ISO_PREFIX: &'static str = "iso[";

    pub const fn new(data_type: DataType, is_iso: bool) -> Self {
        Self { data_type, is_iso }
    }

    /// Parse `float32` or `iso[float32]`
    pub fn parse(label: &str) -> Result<Self> {
        match label.strip_prefix(Self::ISO_PREFIX) {
            Some(rest) => {
                let inner = rest
                    .strip_suffix(']')
                    .ok_or_else(|| BinsparseError::unsupported_type(label))?;
                Ok(Self::new(DataType::from_label(inner)?, true))
            }
            None => Ok(Self::new(DataType::from_label(label)?, false)),
        }
    }

    pub fn to_label(self) -> String {
        let mut out = String::new();
        if self.is_iso {
            out.push_str(Self::ISO_PREFIX);
            out.push_str(self.data_type.label());
            out.push(']');
        } else {
            out.push_str(self.data_type.label());
        }
        out
    }
}
