//! On-disk layout of flat binsparse files
//!
//! ```text
//! [FileHeader 64B][dataset payloads, each 8-byte aligned ...][JSON directory]
//! ```
//!
//! The header is written last, so a file whose writer never finished has a
//! zero directory size and is rejected on open.

use std::collections::BTreeMap;

use bsp_core::DataType;
use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Magic bytes at the start of every flat file
pub const FLAT_MAGIC: [u8; 4] = *b"BSPF";

/// Layout version written by [`FlatFileWriter`](super::FlatFileWriter)
pub const FLAT_VERSION: u32 = 1;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct FileHeader {
    pub magic: [u8; 4],
    pub version: u32,
    pub directory_offset: u64,
    pub directory_size: u64,
    pub reserved: [u8; 40],
}

impl FileHeader {
    pub const SIZE: usize = 64;

    pub fn new(directory_offset: u64, directory_size: u64) -> Self {
        Self {
            magic: FLAT_MAGIC,
            version: FLAT_VERSION,
            directory_offset,
            directory_size,
            reserved: [0; 40],
        }
    }
}

const _: () = assert!(std::mem::size_of::<FileHeader>() == FileHeader::SIZE);

/// Directory entry for one stored array
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetInfo {
    pub name: String,
    /// Element type label, e.g. `"float64"`
    pub data_type: String,
    /// Byte offset of the payload
    pub offset: u64,
    /// Element count
    pub len: u64,
    /// Level requested by the writer; payloads are stored uncompressed
    pub compression_level: u8,
}

impl DatasetInfo {
    pub fn byte_len(&self) -> Option<u64> {
        let data_type = DataType::from_label(&self.data_type).ok()?;
        self.len.checked_mul(data_type.size_bytes() as u64)
    }
}

/// Trailing JSON directory
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Directory {
    pub datasets: Vec<DatasetInfo>,
    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,
}

impl Directory {
    pub fn dataset(&self, name: &str) -> Option<&DatasetInfo> {
        self.datasets.iter().find(|d| d.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dataset_byte_len() {
        let info = DatasetInfo {
            name: "values".into(),
            data_type: "float32".into(),
            offset: 64,
            len: 6,
            compression_level: 9,
        };
        assert_eq!(info.byte_len(), Some(24));

        let bad = DatasetInfo {
            data_type: "complex".into(),
            ..info
        };
        assert_eq!(bad.byte_len(), None);
    }

    #[test]
    fn test_directory_json_shape() {
        let mut directory = Directory::default();
        directory.attributes.insert("note".into(), Value::from("x"));
        let json = serde_json::to_string(&directory).unwrap();
        assert_eq!(json, r#"{"datasets":[],"attributes":{"note":"x"}}"#);
        let back: Directory = serde_json::from_str(&json).unwrap();
        assert_eq!(back, directory);
    }
}
