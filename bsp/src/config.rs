//! Configuration for writes, imports and persistent heaps
//!
//! All options are plain builder structs: start from `Default` and adjust
//! with the `with_*` methods.

use bsp_core::format::constants::compression;
use bsp_core::{BinsparseError, Result};
use serde_json::{Map, Value};

/// Options for writing a matrix to any sink
#[derive(Debug, Clone, PartialEq)]
pub struct WriteOptions {
    /// Compression level requested from the dataset engine, 0 (none) to 9
    pub compression_level: u8,
    /// Extension keys merged into the metadata document
    pub user_keys: Map<String, Value>,
}

impl WriteOptions {
    /// Set the compression level
    pub fn with_compression_level(mut self, level: u8) -> Self {
        self.compression_level = level;
        self
    }

    /// Add one extension key
    pub fn with_user_key(mut self, key: impl Into<String>, value: Value) -> Self {
        self.user_keys.insert(key.into(), value);
        self
    }

    /// Replace all extension keys
    pub fn with_user_keys(mut self, user_keys: Map<String, Value>) -> Self {
        self.user_keys = user_keys;
        self
    }

    /// Reject levels outside 0..=9
    pub fn validate(&self) -> Result<()> {
        if self.compression_level > compression::MAX {
            return Err(BinsparseError::invalid_argument(format!(
                "compression level {} is outside 0..={}",
                self.compression_level,
                compression::MAX
            )));
        }
        Ok(())
    }
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            compression_level: compression::DEFAULT,
            user_keys: Map::new(),
        }
    }
}

/// What to do with repeated coordinates in matrix market input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// Add the values together
    #[default]
    Sum,
    /// Keep the value that appears last in the file
    KeepLast,
}

/// Options for matrix market import
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOptions {
    pub duplicates: DuplicatePolicy,
    /// Mirror symmetric, skew-symmetric and hermitian input into both
    /// triangles. When false the file's lower triangle is kept and the
    /// container is tagged with the matching `*_lower` structure.
    pub expand_symmetry: bool,
    /// Store pattern matrices as iso with a single value of one
    pub iso_pattern: bool,
}

impl ImportOptions {
    pub fn with_duplicates(mut self, duplicates: DuplicatePolicy) -> Self {
        self.duplicates = duplicates;
        self
    }

    pub fn with_expand_symmetry(mut self, expand_symmetry: bool) -> Self {
        self.expand_symmetry = expand_symmetry;
        self
    }

    pub fn with_iso_pattern(mut self, iso_pattern: bool) -> Self {
        self.iso_pattern = iso_pattern;
        self
    }
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            duplicates: DuplicatePolicy::Sum,
            expand_symmetry: true,
            iso_pattern: false,
        }
    }
}

/// Sizing of a newly created persistent heap
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapConfig {
    /// Total bytes reserved for the heap file, header and directory included
    pub capacity: u64,
    /// Number of named objects the heap can hold
    pub directory_slots: usize,
}

impl HeapConfig {
    /// Create config with a capacity in bytes
    pub fn with_capacity(capacity: u64) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    pub fn with_directory_slots(mut self, directory_slots: usize) -> Self {
        self.directory_slots = directory_slots;
        self
    }
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self {
            capacity: 1 << 30,
            directory_slots: 64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_write_options_builder() {
        let options = WriteOptions::default()
            .with_compression_level(0)
            .with_user_key("note", json!("fast path"));
        assert_eq!(options.compression_level, 0);
        assert_eq!(options.user_keys["note"], json!("fast path"));
        assert!(options.validate().is_ok());

        assert_eq!(WriteOptions::default().compression_level, 9);
        assert!(matches!(
            WriteOptions::default().with_compression_level(10).validate(),
            Err(BinsparseError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_import_defaults() {
        let options = ImportOptions::default();
        assert_eq!(options.duplicates, DuplicatePolicy::Sum);
        assert!(options.expand_symmetry);
        assert!(!options.iso_pattern);
    }

    #[test]
    fn test_heap_config() {
        let config = HeapConfig::with_capacity(1 << 20).with_directory_slots(8);
        assert_eq!(config.capacity, 1 << 20);
        assert_eq!(config.directory_slots, 8);
        assert_eq!(HeapConfig::default().directory_slots, 64);
    }
}
