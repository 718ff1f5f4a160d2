//! Error taxonomy for archive parsing.
//!
//! Provider failures never cross the [`RangeSource`](crate::io::RangeSource)
//! boundary as errors; they surface as `None` and become [`ZipError::NoData`]
//! when the reader decides the missing bytes were required.

use thiserror::Error;

pub type ZipResult<T> = Result<T, ZipError>;

#[derive(Debug, Error)]
pub enum ZipError {
    /// A range read against the source unexpectedly returned nothing.
    #[error("range source returned no data while reading {0}")]
    NoData(&'static str),

    /// No EOCD record, malformed directory pointer, or a truncated
    /// central directory. Fatal to construction.
    #[error("invalid Zip archive: {0}")]
    InvalidArchive(&'static str),

    /// The requested member name is not in the file table.
    #[error("no such member in archive: {0}")]
    FileNotFound(String),

    /// Compression method other than stored (0) or DEFLATE (8).
    #[error("unsupported compression method {0}")]
    UnsupportedCompression(u16),
}
