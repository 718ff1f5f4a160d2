mod http;
mod local;

pub use http::HttpRangeSource;
pub use local::LocalFileSource;

use std::io::Read;

use flate2::read::DeflateDecoder;
use log::warn;

/// Trait for byte-range access to an opaque, finite byte sequence.
///
/// Failures never cross this boundary as errors: every method returns `None`
/// for malformed requests, out-of-bounds windows, and I/O failures alike, and
/// the caller decides whether the missing bytes are fatal.
pub trait RangeSource: Send + Sync {
    /// Total size of the byte sequence.
    fn size(&self) -> u64;

    /// Read `length` bytes starting `offset` bytes from the front.
    ///
    /// Returns `None` if `length` is zero or the window `[offset,
    /// offset+length)` extends past the end of the sequence.
    fn fetch_start(&self, length: u64, offset: u64) -> Option<Vec<u8>>;

    /// Read `length` bytes ending `offset` bytes before the end of the
    /// sequence, i.e. the window `[size-offset-length, size-offset)`.
    ///
    /// With `offset == 0` this is the trailing `length` bytes. An `offset`
    /// larger than the sequence is clamped to it. Returns `None` if `length`
    /// is zero or the window extends past the front.
    fn fetch_end(&self, length: u64, offset: u64) -> Option<Vec<u8>> {
        let size = self.size();
        let offset = offset.min(size);
        let end = offset.checked_add(length)?;
        if length == 0 || end > size {
            return None;
        }
        self.fetch_start(length, size - offset - length)
    }

    /// Open a bounded stream over `length` raw bytes starting at `offset`,
    /// inflated on the fly when `method` is DEFLATE (8). Method 0 yields the
    /// raw bytes; any other method logs a warning and returns `None`.
    fn open_stream(&self, length: u64, offset: u64, method: u16) -> Option<Box<dyn Read + Send>>;
}

/// Wrap a bounded raw stream in the decompression filter `method` calls for.
pub(crate) fn wrap_compression(
    raw: Box<dyn Read + Send>,
    method: u16,
) -> Option<Box<dyn Read + Send>> {
    match method {
        0 => Some(raw),
        8 => Some(Box::new(DeflateDecoder::new(raw))),
        other => {
            warn!("cannot stream member: unsupported compression method {other}");
            None
        }
    }
}
