use thiserror::Error;

/// Errors returned by this crate.
#[derive(Debug, Error)]
pub enum CfbError {
    /// The input ended before the structure being read was complete.
    #[error("input too small while reading {context}: needed {needed} bytes, have {have}")]
    TooSmall {
        context: &'static str,
        needed: usize,
        have: usize,
    },
    /// The input is recognizably not a compound file (ZIP magic, unsupported
    /// major version, …).
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
    /// A fixed header field did not hold its required value.
    #[error("{field}: expected {expected}, saw {actual}")]
    HeaderMismatch {
        field: &'static str,
        expected: String,
        actual: String,
    },
    /// The in-memory model lost the pairing between full paths and directory
    /// entries.
    #[error("inconsistent container: {full_paths} full paths for {file_index} directory entries")]
    InconsistentModel { full_paths: usize, file_index: usize },
    /// A FAT, DIFAT, or MiniFAT chain could not be walked.
    #[error("malformed sector chain: {0}")]
    ChainMalformed(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
