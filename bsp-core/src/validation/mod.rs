//! Format validation utilities
//!
//! Pure checks on layout, lengths and strings, with no I/O dependencies.

pub mod bounds;
pub mod format;
pub mod parsing;

pub use bounds::{
    validate_alignment, validate_array_bounds, validate_compressed_pointers,
    validate_typed_slice, validate_value_count,
};
pub use format::{align_to_8, align_to_boundary, validate_extent, validate_magic_bytes};
pub use parsing::{parse_version, validate_name};
