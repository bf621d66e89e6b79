//! Matrix format tags and alias resolution

use crate::format::constants::arrays;
use core::fmt;

/// Canonical binsparse format tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MatrixFormat {
    /// Compressed Sparse Row
    Csr = 0,
    /// Compressed Sparse Column
    Csc = 1,
    /// Coordinate, row-oriented
    Coor = 2,
    /// Coordinate, column-oriented
    Cooc = 3,
    /// Dense vector
    Dvec = 4,
    /// Dense matrix, row-major
    Dmatr = 5,
    /// Dense matrix, column-major
    Dmatc = 6,
}

/// Logical format name -> canonical tag.
///
/// Resolution goes through this table only; add rows here to accept new
/// aliases.
pub const FORMAT_ALIASES: &[(&str, &str)] = &[("COO", "COOR"), ("DMAT", "DMATR")];

/// Resolve an alias to its canonical tag; unknown names pass through unchanged
pub fn unalias_format(tag: &str) -> &str {
    FORMAT_ALIASES
        .iter()
        .find(|(alias, _)| *alias == tag)
        .map(|(_, canonical)| *canonical)
        .unwrap_or(tag)
}

impl MatrixFormat {
    pub const ALL: [MatrixFormat; 7] = [
        MatrixFormat::Csr,
        MatrixFormat::Csc,
        MatrixFormat::Coor,
        MatrixFormat::Cooc,
        MatrixFormat::Dvec,
        MatrixFormat::Dmatr,
        MatrixFormat::Dmatc,
    ];

    /// Canonical tag as written to metadata
    pub const fn tag(self) -> &'static str {
        match self {
            MatrixFormat::Csr => "CSR",
            MatrixFormat::Csc => "CSC",
            MatrixFormat::Coor => "COOR",
            MatrixFormat::Cooc => "COOC",
            MatrixFormat::Dvec => "DVEC",
            MatrixFormat::Dmatr => "DMATR",
            MatrixFormat::Dmatc => "DMATC",
        }
    }

    /// Parse a tag or alias (case-sensitive)
    pub fn from_tag(tag: &str) -> Option<Self> {
        let canonical = unalias_format(tag);
        Self::ALL.iter().copied().find(|f| f.tag() == canonical)
    }

    /// Resolve a stored numeric tag
    pub const fn from_u8(value: u8) -> Option<Self> {
        if (value as usize) < Self::ALL.len() {
            Some(Self::ALL[value as usize])
        } else {
            None
        }
    }

    /// Whether two tags describe the same container shape.
    ///
    /// COOR/COOC differ only in the ordering they promise, DMATR/DMATC only
    /// in their linearization; readers of one accept the other.
    pub const fn same_family(self, other: MatrixFormat) -> bool {
        matches!(
            (self, other),
            (MatrixFormat::Csr, MatrixFormat::Csr)
                | (MatrixFormat::Csc, MatrixFormat::Csc)
                | (MatrixFormat::Dvec, MatrixFormat::Dvec)
                | (
                    MatrixFormat::Coor | MatrixFormat::Cooc,
                    MatrixFormat::Coor | MatrixFormat::Cooc
                )
                | (
                    MatrixFormat::Dmatr | MatrixFormat::Dmatc,
                    MatrixFormat::Dmatr | MatrixFormat::Dmatc
                )
        )
    }

    pub const fn is_dense(self) -> bool {
        matches!(
            self,
            MatrixFormat::Dvec | MatrixFormat::Dmatr | MatrixFormat::Dmatc
        )
    }

    /// Arrays stored for this format, values first
    pub const fn array_names(self) -> &'static [&'static str] {
        match self {
            MatrixFormat::Csr | MatrixFormat::Csc => {
                &[arrays::VALUES, arrays::INDICES_1, arrays::POINTERS_TO_1]
            }
            MatrixFormat::Coor | MatrixFormat::Cooc => {
                &[arrays::VALUES, arrays::INDICES_0, arrays::INDICES_1]
            }
            MatrixFormat::Dvec | MatrixFormat::Dmatr | MatrixFormat::Dmatc => &[arrays::VALUES],
        }
    }
}

impl fmt::Display for MatrixFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aliases_resolve_to_primary_tag() {
        for (alias, canonical) in FORMAT_ALIASES {
            let primary = MatrixFormat::from_tag(canonical).unwrap();
            assert_eq!(MatrixFormat::from_tag(alias), Some(primary));
            assert_eq!(primary.tag(), *canonical);
        }
        assert_eq!(MatrixFormat::from_tag("COO"), Some(MatrixFormat::Coor));
        assert_eq!(MatrixFormat::from_tag("DMAT"), Some(MatrixFormat::Dmatr));
    }

    #[test]
    fn test_tags_round_trip() {
        for format in MatrixFormat::ALL {
            assert_eq!(MatrixFormat::from_tag(format.tag()), Some(format));
            assert_eq!(MatrixFormat::from_u8(format as u8), Some(format));
        }
        assert_eq!(MatrixFormat::from_tag("csr"), None);
        assert_eq!(MatrixFormat::from_tag("BOGUS"), None);
        assert_eq!(unalias_format("BOGUS"), "BOGUS");
    }

    #[test]
    fn test_families() {
        assert!(MatrixFormat::Coor.same_family(MatrixFormat::Cooc));
        assert!(MatrixFormat::Dmatc.same_family(MatrixFormat::Dmatr));
        assert!(!MatrixFormat::Csr.same_family(MatrixFormat::Csc));
        assert!(!MatrixFormat::Dvec.same_family(MatrixFormat::Dmatr));
    }

    #[test]
    fn test_array_names() {
        assert_eq!(
            MatrixFormat::Csc.array_names(),
            &["values", "indices_1", "pointers_to_1"]
        );
        assert_eq!(
            MatrixFormat::Coor.array_names(),
            &["values", "indices_0", "indices_1"]
        );
        assert_eq!(MatrixFormat::Dmatc.array_names(), &["values"]);
    }
}
