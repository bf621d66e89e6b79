//! Layout validation for on-disk and in-heap binsparse payloads

use crate::{BinsparseError, Result};
use alloc::string::String;

/// Align an offset to a specific boundary
///
/// `boundary` must be a power of two.
pub const fn align_to_boundary(offset: usize, boundary: usize) -> usize {
    (offset + boundary - 1) & !(boundary - 1)
}

/// Align an offset to the 8-byte payload boundary
pub const fn align_to_8(offset: usize) -> usize {
    align_to_boundary(offset, 8)
}

/// Calculate padding needed to reach alignment boundary
pub const fn calculate_padding(offset: usize, boundary: usize) -> usize {
    align_to_boundary(offset, boundary) - offset
}

/// Check that `[offset, offset + len)` lies inside a region of `total` bytes
/// and starts on an 8-byte boundary.
pub fn validate_extent(
    location: &str,
    name: &str,
    offset: u64,
    len: u64,
    total: u64,
) -> Result<()> {
    let end = offset.checked_add(len);
    match end {
        Some(end) if end <= total && offset % 8 == 0 => Ok(()),
        _ => Err(BinsparseError::InconsistentFile {
            location: location.into(),
            array: name.into(),
            expected: alloc::format!("aligned extent within {total} bytes"),
            actual: alloc::format!("offset {offset}, length {len}"),
        }),
    }
}

/// Validate magic bytes match expected pattern
pub fn validate_magic_bytes(location: &str, actual: &[u8; 4], expected: &[u8; 4]) -> Result<()> {
    if actual != expected {
        return Err(BinsparseError::InconsistentFile {
            location: location.into(),
            array: "header".into(),
            expected: String::from_utf8_lossy(expected).into_owned(),
            actual: String::from_utf8_lossy(actual).into_owned(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_to_boundary() {
        assert_eq!(align_to_boundary(0, 8), 0);
        assert_eq!(align_to_boundary(1, 8), 8);
        assert_eq!(align_to_boundary(7, 8), 8);
        assert_eq!(align_to_boundary(8, 8), 8);
        assert_eq!(align_to_boundary(9, 8), 16);

        assert_eq!(align_to_boundary(0, 4), 0);
        assert_eq!(align_to_boundary(3, 4), 4);
        assert_eq!(align_to_boundary(5, 4), 8);
    }

    #[test]
    fn test_align_to_8() {
        assert_eq!(align_to_8(0), 0);
        assert_eq!(align_to_8(1), 8);
        assert_eq!(align_to_8(15), 16);
    }

    #[test]
    fn test_calculate_padding() {
        assert_eq!(calculate_padding(0, 8), 0);
        assert_eq!(calculate_padding(1, 8), 7);
        assert_eq!(calculate_padding(9, 8), 7);
    }

    #[test]
    fn test_validate_extent() {
        assert_eq!(validate_extent("f", "values", 64, 24, 88), Ok(()));
        assert_eq!(validate_extent("f", "values", 64, 0, 64), Ok(()));

        assert!(validate_extent("f", "values", 64, 32, 88).is_err());
        assert!(validate_extent("f", "values", 60, 4, 88).is_err());
        assert!(validate_extent("f", "values", u64::MAX, 8, 88).is_err());
    }

    #[test]
    fn test_validate_magic_bytes() {
        assert_eq!(validate_magic_bytes("f", b"BSPF", b"BSPF"), Ok(()));
        let err = validate_magic_bytes("f", b"FAIL", b"BSPF").unwrap_err();
        assert_eq!(
            err,
            BinsparseError::InconsistentFile {
                location: "f".into(),
                array: "header".into(),
                expected: "BSPF".into(),
                actual: "FAIL".into(),
            }
        );
    }
}
