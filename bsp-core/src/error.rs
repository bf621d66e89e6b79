//! Error types for binsparse operations

use alloc::string::{String, ToString};
use core::fmt;

/// Errors that can occur while encoding, decoding, storing or importing matrices
///
/// Every variant carries enough context (file or slot, array, expected and
/// actual values) to diagnose the failure without re-reading the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BinsparseError {
    /// Element type label outside the supported set
    UnsupportedType { label: String },
    /// Malformed or incomplete metadata document
    SchemaError { message: String },
    /// Metadata format tag disagrees with the requested format
    FormatMismatch { expected: String, found: String },
    /// A stored array disagrees with what the metadata declares
    InconsistentFile {
        location: String,
        array: String,
        expected: String,
        actual: String,
    },
    /// Named slot absent from a persistent heap
    MissingObject { heap: String, name: String },
    /// Malformed matrix market text
    ParseError {
        line: usize,
        column: Option<usize>,
        message: String,
    },
    /// Metadata version newer than this implementation understands
    UnsupportedVersion {
        found: String,
        supported: &'static str,
    },
    /// Concurrent or conflicting access reported by a storage engine
    AccessConflict { resource: String, message: String },
    /// Underlying I/O failure
    Io { context: String, message: String },
    /// Caller supplied an inconsistent view, option or name
    InvalidArgument { message: String },
    /// Persistent heap has no room left for an allocation
    CapacityExceeded { requested: u64, available: u64 },
}

/// Coarse classification of errors, useful for exit codes and retry policies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Metadata or type problems in the stored document
    Format,
    /// Stored data disagrees with its own description
    Content,
    /// Storage engine failures (I/O, conflicts, capacity)
    Storage,
    /// Caller mistakes
    Usage,
}

impl BinsparseError {
    pub fn unsupported_type(label: impl Into<String>) -> Self {
        Self::UnsupportedType {
            label: label.into(),
        }
    }

    pub fn schema(message: impl Into<String>) -> Self {
        Self::SchemaError {
            message: message.into(),
        }
    }

    pub fn format_mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::FormatMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Length disagreement between a stored array and its declared count
    pub fn length_mismatch(
        location: impl Into<String>,
        array: impl Into<String>,
        expected: usize,
        actual: usize,
    ) -> Self {
        Self::InconsistentFile {
            location: location.into(),
            array: array.into(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Element type disagreement between a stored array and the requested type
    pub fn type_mismatch(
        location: impl Into<String>,
        array: impl Into<String>,
        expected: &str,
        actual: &str,
    ) -> Self {
        Self::InconsistentFile {
            location: location.into(),
            array: array.into(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    pub fn missing_object(heap: impl Into<String>, name: impl Into<String>) -> Self {
        Self::MissingObject {
            heap: heap.into(),
            name: name.into(),
        }
    }

    pub fn parse(line: usize, column: Option<usize>, message: impl Into<String>) -> Self {
        Self::ParseError {
            line,
            column,
            message: message.into(),
        }
    }

    pub fn access_conflict(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::AccessConflict {
            resource: resource.into(),
            message: message.into(),
        }
    }

    pub fn io(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Io {
            context: context.into(),
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Classify this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UnsupportedType { .. }
            | Self::SchemaError { .. }
            | Self::FormatMismatch { .. }
            | Self::UnsupportedVersion { .. }
            | Self::ParseError { .. } => ErrorCategory::Format,
            Self::InconsistentFile { .. } | Self::MissingObject { .. } => ErrorCategory::Content,
            Self::AccessConflict { .. } | Self::Io { .. } | Self::CapacityExceeded { .. } => {
                ErrorCategory::Storage
            }
            Self::InvalidArgument { .. } => ErrorCategory::Usage,
        }
    }
}

impl fmt::Display for BinsparseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedType { label } => write!(f, "unsupported element type '{label}'"),
            Self::SchemaError { message } => write!(f, "invalid binsparse metadata: {message}"),
            Self::FormatMismatch { expected, found } => {
                write!(f, "format mismatch: expected {expected}, found {found}")
            }
            Self::InconsistentFile {
                location,
                array,
                expected,
                actual,
            } => write!(
                f,
                "inconsistent array '{array}' in {location}: expected {expected}, found {actual}"
            ),
            Self::MissingObject { heap, name } => {
                write!(f, "object '{name}' not found in persistent heap {heap}")
            }
            Self::ParseError {
                line,
                column: Some(column),
                message,
            } => write!(f, "matrix market parse error at {line}:{column}: {message}"),
            Self::ParseError {
                line,
                column: None,
                message,
            } => write!(f, "matrix market parse error at line {line}: {message}"),
            Self::UnsupportedVersion { found, supported } => write!(
                f,
                "binsparse version {found} is newer than supported version {supported}"
            ),
            Self::AccessConflict { resource, message } => {
                write!(f, "access conflict on {resource}: {message}")
            }
            Self::Io { context, message } => write!(f, "{context}: {message}"),
            Self::InvalidArgument { message } => write!(f, "invalid argument: {message}"),
            Self::CapacityExceeded {
                requested,
                available,
            } => write!(
                f,
                "persistent heap exhausted: requested {requested} bytes, {available} available"
            ),
        }
    }
}

impl core::error::Error for BinsparseError {}

/// Result type for binsparse operations
pub type Result<T> = core::result::Result<T, BinsparseError>;

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;

    #[test]
    fn test_display_carries_context() {
        let err = BinsparseError::length_mismatch("matrix.bsp", "indices_1", 6, 5);
        let msg = format!("{err}");
        assert!(msg.contains("matrix.bsp"));
        assert!(msg.contains("indices_1"));
        assert!(msg.contains('6') && msg.contains('5'));

        let err = BinsparseError::parse(12, Some(3), "non-numeric field");
        assert_eq!(
            format!("{err}"),
            "matrix market parse error at 12:3: non-numeric field"
        );
    }

    #[test]
    fn test_categories() {
        assert_eq!(
            BinsparseError::schema("x").category(),
            ErrorCategory::Format
        );
        assert_eq!(
            BinsparseError::missing_object("h", "n").category(),
            ErrorCategory::Content
        );
        assert_eq!(
            BinsparseError::CapacityExceeded {
                requested: 1,
                available: 0
            }
            .category(),
            ErrorCategory::Storage
        );
        assert_eq!(
            BinsparseError::invalid_argument("x").category(),
            ErrorCategory::Usage
        );
    }
}
