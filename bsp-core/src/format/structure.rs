//! Structure qualifiers and dense linearization order

/// Declared symmetry or triangularity of a square matrix.
///
/// The `*Lower`/`*Upper` suffix names the triangle that is actually stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Structure {
    #[default]
    General = 0,
    SymmetricLower = 1,
    SymmetricUpper = 2,
    HermitianLower = 3,
    HermitianUpper = 4,
    SkewSymmetricLower = 5,
    SkewSymmetricUpper = 6,
}

const NAMES: [(Structure, &str); 6] = [
    (Structure::SymmetricLower, "symmetric_lower"),
    (Structure::SymmetricUpper, "symmetric_upper"),
    (Structure::HermitianLower, "hermitian_lower"),
    (Structure::HermitianUpper, "hermitian_upper"),
    (Structure::SkewSymmetricLower, "skew_symmetric_lower"),
    (Structure::SkewSymmetricUpper, "skew_symmetric_upper"),
];

impl Structure {
    /// Metadata name; `None` for general, which is never written
    pub fn name(self) -> Option<&'static str> {
        NAMES.iter().find(|(s, _)| *s == self).map(|(_, n)| *n)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        NAMES.iter().find(|(_, n)| *n == name).map(|(s, _)| *s)
    }

    pub const fn is_general(self) -> bool {
        matches!(self, Structure::General)
    }

    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Structure::General),
            1 => Some(Structure::SymmetricLower),
            2 => Some(Structure::SymmetricUpper),
            3 => Some(Structure::HermitianLower),
            4 => Some(Structure::HermitianUpper),
            5 => Some(Structure::SkewSymmetricLower),
            6 => Some(Structure::SkewSymmetricUpper),
            _ => None,
        }
    }
}

/// Linearization of dense matrix values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Order {
    #[default]
    RowMajor = 0,
    ColumnMajor = 1,
}

impl Order {
    /// Linear index of `(row, col)` in an `nrows x ncols` matrix
    pub const fn linear_index(self, row: usize, col: usize, nrows: usize, ncols: usize) -> usize {
        match self {
            Order::RowMajor => row * ncols + col,
            Order::ColumnMajor => col * nrows + row,
        }
    }

    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Order::RowMajor),
            1 => Some(Order::ColumnMajor),
            _ => None,
        }
    }
}
