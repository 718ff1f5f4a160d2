//! Zip directory parsing and member streaming.
//!
//! The module is organized into two components:
//!
//! - [`structures`]: wire shapes of the Zip format (EOCD, file headers) and
//!   the parsed [`FileEntry`]
//! - [`reader`]: [`ArchiveReader`], which locates and walks the central
//!   directory over a [`RangeSource`](crate::io::RangeSource)
//!
//! ## Supported Features
//!
//! - Standard ZIP format (PKZIP APPNOTE 6.3.x compatible)
//! - STORED (no compression) method
//! - DEFLATE compression method
//!
//! ## Limitations
//!
//! - No ZIP64 extension support
//! - No encryption support
//! - No multi-disk archive support
//! - No BZIP2, LZMA, or other compression methods

pub mod reader;
pub mod structures;

pub use reader::ArchiveReader;
pub use structures::*;
