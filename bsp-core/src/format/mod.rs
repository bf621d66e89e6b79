//! Format definitions for the binsparse interchange format
//!
//! This module contains the pure vocabulary of the format: element type
//! labels, format tags and their aliases, structure qualifiers and the
//! well-known names used by both storage back ends. No I/O.

pub mod constants;
pub mod data_type;
pub mod matrix_format;
pub mod structure;

// Re-export format definitions
pub use data_type::{DataType, ValueLabel};
pub use matrix_format::{unalias_format, MatrixFormat, FORMAT_ALIASES};
pub use structure::{Order, Structure};
