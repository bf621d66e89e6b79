//! Array length, alignment and pointer validation
//!
//! Pure checks with no I/O dependencies, shared by the views, the containers
//! and the storage engines.

use crate::traits::Index;
use crate::{BinsparseError, Result};
use alloc::format;

/// Validate array bounds for a given element type
///
/// Returns the element count a byte length represents.
pub fn validate_array_bounds<T>(byte_len: usize) -> Result<usize> {
    let element_size = core::mem::size_of::<T>();

    if element_size == 0 || byte_len % element_size != 0 {
        return Err(BinsparseError::invalid_argument(format!(
            "{byte_len} bytes is not a whole number of {}",
            core::any::type_name::<T>()
        )));
    }

    Ok(byte_len / element_size)
}

/// Validate alignment for a pointer to typed data
pub fn validate_alignment<T>(ptr: *const u8) -> Result<()> {
    let alignment = core::mem::align_of::<T>();
    let addr = ptr as usize;

    if addr % alignment != 0 {
        return Err(BinsparseError::invalid_argument(format!(
            "address {addr:#x} is not aligned for {}",
            core::any::type_name::<T>()
        )));
    }

    Ok(())
}

/// Validate that a byte slice can be safely interpreted as a typed array
pub fn validate_typed_slice<T>(data: &[u8]) -> Result<usize> {
    validate_alignment::<T>(data.as_ptr())?;
    validate_array_bounds::<T>(data.len())
}

/// Check a compressed pointer array: `major + 1` entries, starting at zero,
/// non-decreasing, ending at `nnz`.
pub fn validate_compressed_pointers<I: Index>(
    array: &str,
    pointers: &[I],
    major: usize,
    nnz: usize,
) -> Result<()> {
    if pointers.len() != major + 1 {
        return Err(BinsparseError::invalid_argument(format!(
            "{array} has {} entries, expected {}",
            pointers.len(),
            major + 1
        )));
    }

    let mut previous = 0usize;
    for (i, p) in pointers.iter().enumerate() {
        let p = p.to_usize().ok_or_else(|| {
            BinsparseError::invalid_argument(format!("{array}[{i}] is negative"))
        })?;
        if (i == 0 && p != 0) || p < previous {
            return Err(BinsparseError::invalid_argument(format!(
                "{array} is not a non-decreasing sequence from 0 (entry {i} = {p})"
            )));
        }
        previous = p;
    }

    if previous != nnz {
        return Err(BinsparseError::invalid_argument(format!(
            "{array} ends at {previous}, expected {nnz} stored values"
        )));
    }

    Ok(())
}

/// Check an array length against the stored count, with the iso special case
pub fn validate_value_count(array: &str, len: usize, expected: usize, is_iso: bool) -> Result<()> {
    let ok = if is_iso { len == 1 } else { len == expected };
    if !ok {
        let expected = if is_iso { 1 } else { expected };
        return Err(BinsparseError::invalid_argument(format!(
            "{array} has {len} entries, expected {expected}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_array_bounds() {
        assert_eq!(validate_array_bounds::<u32>(16), Ok(4));
        assert_eq!(validate_array_bounds::<u64>(24), Ok(3));
        assert_eq!(validate_array_bounds::<u32>(0), Ok(0));

        assert!(validate_array_bounds::<u32>(15).is_err());
        assert!(validate_array_bounds::<u64>(23).is_err());
    }

    #[test]
    fn test_validate_alignment() {
        let aligned_data: [u64; 4] = [0; 4];
        let ptr = aligned_data.as_ptr() as *const u8;

        assert_eq!(validate_alignment::<u64>(ptr), Ok(()));
        assert_eq!(validate_alignment::<u32>(ptr), Ok(()));

        let unaligned_ptr = ptr.wrapping_add(1);
        assert!(validate_alignment::<u64>(unaligned_ptr).is_err());
        assert!(validate_alignment::<u8>(unaligned_ptr).is_ok());
    }

    #[test]
    fn test_validate_compressed_pointers() {
        assert_eq!(
            validate_compressed_pointers("row_ptr", &[0u32, 2, 3, 5, 6], 4, 6),
            Ok(())
        );
        assert_eq!(validate_compressed_pointers::<u32>("row_ptr", &[0], 0, 0), Ok(()));

        // wrong length
        assert!(validate_compressed_pointers("row_ptr", &[0u32, 2, 6], 4, 6).is_err());
        // decreasing
        assert!(validate_compressed_pointers("row_ptr", &[0u32, 3, 2, 5, 6], 4, 6).is_err());
        // does not start at zero
        assert!(validate_compressed_pointers("row_ptr", &[1u32, 2, 3, 5, 6], 4, 6).is_err());
        // last entry disagrees with nnz
        assert!(validate_compressed_pointers("row_ptr", &[0u32, 2, 3, 5, 5], 4, 6).is_err());
        // negative entry
        assert!(validate_compressed_pointers("row_ptr", &[0i32, -1, 3, 5, 6], 4, 6).is_err());
    }

    #[test]
    fn test_validate_value_count() {
        assert_eq!(validate_value_count("values", 6, 6, false), Ok(()));
        assert_eq!(validate_value_count("values", 1, 6, true), Ok(()));
        assert!(validate_value_count("values", 6, 6, true).is_err());
        assert!(validate_value_count("values", 5, 6, false).is_err());
    }
}
