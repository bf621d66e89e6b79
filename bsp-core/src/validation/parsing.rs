//! Parsing utilities for binsparse strings

use crate::{BinsparseError, Result};
use alloc::format;

/// Parse a version string in the format "major.minor.patch"
///
/// Returns (major, minor, patch) tuple. Patch version is optional.
pub fn parse_version(version_str: &str) -> Result<(u8, u8, u8)> {
    let invalid = || BinsparseError::schema(format!("malformed version '{version_str}'"));

    if version_str.is_empty() {
        return Err(invalid());
    }

    let mut version_parts = [0u8; 3];
    let mut count = 0;

    for part in version_str.split('.') {
        if count >= 3 || part.is_empty() {
            return Err(invalid());
        }

        let mut num: u8 = 0;
        for byte in part.bytes() {
            if !byte.is_ascii_digit() {
                return Err(invalid());
            }
            num = num
                .checked_mul(10)
                .and_then(|n| n.checked_add(byte - b'0'))
                .ok_or_else(invalid)?;
        }

        version_parts[count] = num;
        count += 1;
    }

    if count < 2 {
        return Err(invalid()); // Need at least major.minor
    }

    Ok((version_parts[0], version_parts[1], version_parts[2]))
}

/// Validate an object or dataset name
///
/// Names must be non-empty, at most `max_len` bytes and free of NUL and
/// control characters.
pub fn validate_name(name: &str, max_len: usize) -> Result<()> {
    if name.is_empty() {
        return Err(BinsparseError::invalid_argument("empty name"));
    }

    if name.len() > max_len {
        return Err(BinsparseError::invalid_argument(format!(
            "name '{name}' is {} bytes, limit is {max_len}",
            name.len()
        )));
    }

    if name.bytes().any(|b| b < 32) {
        return Err(BinsparseError::invalid_argument(format!(
            "name {name:?} contains control characters"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_version() {
        assert_eq!(parse_version("0.1"), Ok((0, 1, 0)));
        assert_eq!(parse_version("1.0.0"), Ok((1, 0, 0)));
        assert_eq!(parse_version("2.5.10"), Ok((2, 5, 10)));

        // Invalid cases
        assert!(parse_version("").is_err());
        assert!(parse_version("1").is_err());
        assert!(parse_version("1.0.0.0").is_err());
        assert!(parse_version("a.b.c").is_err());
        assert!(parse_version("1..0").is_err());
        assert!(parse_version("256.0").is_err());
    }

    #[test]
    fn test_validate_name() {
        assert_eq!(validate_name("binsparse-matrix", 47), Ok(()));
        assert_eq!(validate_name("label with spaces", 47), Ok(()));

        assert!(validate_name("", 47).is_err());
        assert!(validate_name("with\0nul", 47).is_err());
        assert!(validate_name("tab\there", 47).is_err());

        let long_name = "a".repeat(48);
        assert!(validate_name(&long_name, 47).is_err());
    }
}
