//! # farzip
//!
//! Inspect and selectively extract Zip archive members over byte-range reads.
//!
//! This library extracts file-table metadata from a Zip archive without
//! reading the whole archive. All I/O goes through the [`RangeSource`]
//! capability trait, so the archive may live on local disk or behind an
//! HTTP/object-storage range-request interface: listing a remote archive
//! fetches only its tail and its central directory, and extracting one member
//! fetches only that member's bytes.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use farzip::{ArchiveReader, HttpRangeSource};
//!
//! fn main() -> anyhow::Result<()> {
//!     // Open a remote Zip file; only its directory is fetched.
//!     let source = Arc::new(HttpRangeSource::new(
//!         "https://example.com/archive.zip".to_string(),
//!     )?);
//!     let reader = ArchiveReader::new(source)?;
//!
//!     for entry in reader.entries() {
//!         println!("{}  {}", entry.crc32, entry.name);
//!     }
//!
//!     // Stream one member, inflated on the fly.
//!     let mut stream = reader.open_member("README.md")?;
//!     let mut contents = Vec::new();
//!     std::io::Read::read_to_end(&mut stream, &mut contents)?;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod io;
pub mod result;
pub mod zip;

pub use cli::Cli;
pub use io::{HttpRangeSource, LocalFileSource, RangeSource};
pub use result::{ZipError, ZipResult};
pub use zip::{ArchiveReader, CompressionMethod, FileEntry};
