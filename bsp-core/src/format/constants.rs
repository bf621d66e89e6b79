//! Format constants and well-known names of the binsparse format

/// Metadata version written by this implementation
pub const VERSION: &str = "0.1";

/// Newest (major, minor) metadata version this implementation reads
pub const SUPPORTED_VERSION: (u8, u8) = (0, 1);

/// Top-level metadata key, and the flat-file attribute holding the document
pub const METADATA_KEY: &str = "binsparse";

/// Default alignment boundary for stored arrays
pub const ALIGNMENT_BOUNDARY: usize = 8;

/// Logical array names shared by every storage back end
pub mod arrays {
    /// Stored values (length 1 when iso)
    pub const VALUES: &str = "values";
    /// Row indices for COO
    pub const INDICES_0: &str = "indices_0";
    /// Column indices for CSR/COO, row indices for CSC
    pub const INDICES_1: &str = "indices_1";
    /// Row pointers for CSR, column pointers for CSC
    pub const POINTERS_TO_1: &str = "pointers_to_1";
}

/// Fixed slot names inside a persistent heap, stable across versions
pub mod slots {
    /// String object holding the serialized metadata document
    pub const METADATA: &str = "binsparse-metadata";
    /// Container object holding the owning buffers
    pub const MATRIX: &str = "binsparse-matrix";
}

/// Compression levels accepted by flat-file dataset writes
pub mod compression {
    /// Stored uncompressed
    pub const NONE: u8 = 0;
    /// Highest level accepted
    pub const MAX: u8 = 9;
    /// Level used when the caller does not choose one
    pub const DEFAULT: u8 = 9;
}
