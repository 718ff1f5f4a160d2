//! Directory reader over a byte-range source.
//!
//! Zip archives are designed to be read from the end:
//! 1. Find the End of Central Directory (EOCD) in the file's tail
//! 2. Read the Central Directory it points at to build the file table
//! 3. For a member's content, read its Local File Header to locate the
//!    compressed payload
//!
//! This keeps the number of range reads small and bounded, which is what
//! makes remote sources (HTTP Range requests) practical: listing an archive
//! touches only its tail and its central directory.

use byteorder::{LittleEndian, ReadBytesExt};
use indexmap::IndexMap;
use std::io::{Cursor, Read};
use std::sync::Arc;

use crate::io::RangeSource;
use crate::result::{ZipError, ZipResult};
use log::warn;

use super::structures::*;

/// Maximum ZIP comment size allowed by the format (65535 bytes).
///
/// This bounds the tail window fetched when locating the EOCD.
const MAX_COMMENT_SIZE: u64 = 65535;

/// Parsed directory of a single Zip archive.
///
/// Construction eagerly locates the EOCD record, validates its directory
/// pointer, and parses the whole central directory into a file table; a
/// reader is either fully valid or never returned. Member content is then
/// resolved lazily, one bounded stream per request.
///
/// ## Example
///
/// ```no_run
/// use std::path::Path;
/// use std::sync::Arc;
/// use farzip::{ArchiveReader, LocalFileSource};
///
/// # fn main() -> anyhow::Result<()> {
/// let source = Arc::new(LocalFileSource::new(Path::new("archive.zip"))?);
/// let reader = ArchiveReader::new(source)?;
/// for entry in reader.entries() {
///     println!("{} ({} bytes)", entry.name, entry.uncompressed_size);
/// }
/// let stream = reader.open_member("README.md")?;
/// # Ok(())
/// # }
/// ```
pub struct ArchiveReader<R: RangeSource> {
    /// The underlying byte source
    source: Arc<R>,
    /// Offset of the EOCD record, negative relative to end-of-stream
    eocd_offset: i64,
    /// Absolute offset of the first Central Directory File Header
    cd_offset: u64,
    /// Total byte length of the central directory
    cd_size: u64,
    /// Entry count the EOCD record declares
    expected_entries: u16,
    /// Member path -> entry, in on-disk order
    file_table: IndexMap<String, FileEntry>,
}

impl<R: RangeSource> ArchiveReader<R> {
    /// Open an archive over the given source and parse its directory.
    ///
    /// # Errors
    ///
    /// * [`ZipError::NoData`] when the source cannot produce the archive tail
    ///   or the central directory bytes
    /// * [`ZipError::InvalidArchive`] when no EOCD record exists, the
    ///   directory pointer carries a zero field, or the directory is
    ///   truncated mid-record
    pub fn new(source: Arc<R>) -> ZipResult<Self> {
        let (eocd, eocd_offset) = Self::locate_eocd(source.as_ref())?;

        // A well-formed non-empty archive never has a zero entry count,
        // directory size, or directory offset.
        if eocd.total_entries == 0 || eocd.cd_size == 0 || eocd.cd_offset == 0 {
            return Err(ZipError::InvalidArchive(
                "zero field in central directory pointer",
            ));
        }

        let file_table = Self::parse_central_directory(source.as_ref(), &eocd)?;

        Ok(Self {
            source,
            eocd_offset,
            cd_offset: eocd.cd_offset as u64,
            cd_size: eocd.cd_size as u64,
            expected_entries: eocd.total_entries,
            file_table,
        })
    }

    /// Find the End of Central Directory record in the archive's tail.
    ///
    /// The record sits at the very end unless a trailing archive comment
    /// (up to 65535 bytes) follows it, so one fetch of the maximum plausible
    /// window followed by a backward signature scan always finds it.
    ///
    /// Returns the decoded record and its offset, negative relative to
    /// end-of-stream (always <= -22).
    fn locate_eocd(source: &R) -> ZipResult<(EndOfCentralDirectory, i64)> {
        let window = (EndOfCentralDirectory::SIZE as u64 + MAX_COMMENT_SIZE).min(source.size());
        let buf = source
            .fetch_end(window, 0)
            .ok_or(ZipError::NoData("archive tail"))?;

        if buf.len() < EndOfCentralDirectory::SIZE {
            return Err(ZipError::InvalidArchive(
                "archive smaller than an end-of-central-directory record",
            ));
        }

        // Walk backward starting where a comment-less record would sit.
        let mut pos = buf.len() - EndOfCentralDirectory::SIZE;
        loop {
            if &buf[pos..pos + 4] == EndOfCentralDirectory::SIGNATURE {
                let eocd =
                    EndOfCentralDirectory::from_bytes(&buf[pos..pos + EndOfCentralDirectory::SIZE])?;
                let eocd_offset = pos as i64 - buf.len() as i64;
                return Ok((eocd, eocd_offset));
            }
            if pos == 0 {
                break;
            }
            pos -= 1;
        }

        Err(ZipError::InvalidArchive("no end-of-central-directory record"))
    }

    /// Fetch the central directory and walk it into a file table.
    ///
    /// The walk is a sequential cursor scan: each record's size depends on
    /// the three length fields inside it, so entries cannot be located
    /// independently. Records whose signature does not validate are skipped
    /// with a warning and do not enter the table.
    fn parse_central_directory(
        source: &R,
        eocd: &EndOfCentralDirectory,
    ) -> ZipResult<IndexMap<String, FileEntry>> {
        // One range request for the whole directory.
        let cd = source
            .fetch_start(eocd.cd_size as u64, eocd.cd_offset as u64)
            .ok_or(ZipError::NoData("central directory"))?;

        let expected = eocd.total_entries;
        let mut table = IndexMap::with_capacity(expected as usize);
        let mut cursor = Cursor::new(cd.as_slice());

        for parsed in 0..expected {
            if cursor.position() as usize >= cd.len() {
                // A skipped corrupt record can throw the cursor past the
                // remaining records; stop rather than abort the whole parse.
                warn!("central directory ended after {parsed} of {expected} records");
                break;
            }
            if let Some(entry) = Self::parse_directory_header(&mut cursor)? {
                // Last write wins on duplicate names; position stays at the
                // first occurrence, keeping on-disk order.
                table.insert(entry.name.clone(), entry);
            }
        }

        Ok(table)
    }

    /// Parse one Central Directory File Header at the cursor.
    ///
    /// Returns `Ok(None)` for a record whose signature does not match: the
    /// record is skipped by the fixed 46-byte header length only, since
    /// length fields read from a corrupt header cannot be trusted.
    fn parse_directory_header(cursor: &mut Cursor<&[u8]>) -> ZipResult<Option<FileEntry>> {
        let truncated = |_| ZipError::InvalidArchive("truncated central directory");
        let record_start = cursor.position();

        let mut sig = [0u8; 4];
        cursor.read_exact(&mut sig).map_err(truncated)?;
        if sig != CDFH_SIGNATURE {
            warn!(
                "bad central directory header signature at directory offset {record_start}, \
                 skipping record"
            );
            cursor.set_position(record_start + CDFH_SIZE as u64);
            return Ok(None);
        }

        // Fixed 46-byte portion.
        let _version_made_by = cursor.read_u16::<LittleEndian>().map_err(truncated)?;
        let _version_needed = cursor.read_u16::<LittleEndian>().map_err(truncated)?;
        let _flags = cursor.read_u16::<LittleEndian>().map_err(truncated)?;
        let compression_method = cursor.read_u16::<LittleEndian>().map_err(truncated)?;
        let last_mod_time = cursor.read_u16::<LittleEndian>().map_err(truncated)?;
        let last_mod_date = cursor.read_u16::<LittleEndian>().map_err(truncated)?;
        let mut crc_raw = [0u8; 4];
        cursor.read_exact(&mut crc_raw).map_err(truncated)?;
        let compressed_size = cursor.read_u32::<LittleEndian>().map_err(truncated)?;
        let uncompressed_size = cursor.read_u32::<LittleEndian>().map_err(truncated)?;
        let name_len = cursor.read_u16::<LittleEndian>().map_err(truncated)?;
        let extra_len = cursor.read_u16::<LittleEndian>().map_err(truncated)?;
        let comment_len = cursor.read_u16::<LittleEndian>().map_err(truncated)?;
        let _disk_number_start = cursor.read_u16::<LittleEndian>().map_err(truncated)?;
        let _internal_attrs = cursor.read_u16::<LittleEndian>().map_err(truncated)?;
        let _external_attrs = cursor.read_u32::<LittleEndian>().map_err(truncated)?;
        let lfh_offset = cursor.read_u32::<LittleEndian>().map_err(truncated)?;

        // Variable-length fields follow, each by its declared length.
        let mut name_bytes = vec![0u8; name_len as usize];
        cursor.read_exact(&mut name_bytes).map_err(truncated)?;
        // Lossy conversion keeps non-UTF8 names usable as table keys.
        let name = String::from_utf8_lossy(&name_bytes).to_string();

        // The extra field's contents are Zip64/platform extensions; skip it.
        cursor.set_position(cursor.position() + extra_len as u64);

        let comment = if comment_len > 0 {
            let mut comment_bytes = vec![0u8; comment_len as usize];
            cursor.read_exact(&mut comment_bytes).map_err(truncated)?;
            String::from_utf8_lossy(&comment_bytes).to_string()
        } else {
            String::new()
        };

        let is_directory = name.ends_with('/');

        Ok(Some(FileEntry {
            name,
            compression_method: CompressionMethod::from_u16(compression_method),
            compressed_size: compressed_size as u64,
            uncompressed_size: uncompressed_size as u64,
            crc32: crc32_hex(crc_raw),
            local_header_offset: lfh_offset as u64,
            comment,
            last_mod_time,
            last_mod_date,
            is_directory,
        }))
    }

    /// Open a decompressed byte stream over the named member's payload.
    ///
    /// Reads the member's Local File Header and trusts *its* name/extra
    /// lengths for the payload offset: they may legitimately differ from the
    /// central-directory copies.
    ///
    /// # Errors
    ///
    /// * [`ZipError::FileNotFound`] when `name` is not in the file table
    /// * [`ZipError::UnsupportedCompression`] for methods other than stored
    ///   or DEFLATE
    /// * [`ZipError::NoData`] when the source cannot produce the header or
    ///   the payload stream
    ///
    /// Failures here are per-call; the reader itself stays valid.
    pub fn open_member(&self, name: &str) -> ZipResult<Box<dyn Read + Send>> {
        let entry = self
            .file_table
            .get(name)
            .ok_or_else(|| ZipError::FileNotFound(name.to_string()))?;

        let header = self
            .source
            .fetch_start(LocalFileHeader::SIZE as u64, entry.local_header_offset)
            .ok_or(ZipError::NoData("local file header"))?;
        let local = LocalFileHeader::from_bytes(&header)?;

        let method = match local.compression_method {
            CompressionMethod::Stored | CompressionMethod::Deflate => {
                local.compression_method.as_u16()
            }
            CompressionMethod::Unknown(value) => {
                return Err(ZipError::UnsupportedCompression(value));
            }
        };

        // Payload follows the fixed header and the header's own variable
        // fields.
        let payload_offset = entry.local_header_offset
            + LocalFileHeader::SIZE as u64
            + local.name_len as u64
            + local.extra_len as u64;

        self.source
            .open_stream(entry.compressed_size, payload_offset, method)
            .ok_or(ZipError::NoData("member payload"))
    }

    /// Offset of the EOCD record, negative relative to end-of-stream.
    pub fn eocd_offset(&self) -> i64 {
        self.eocd_offset
    }

    /// Absolute offset of the first Central Directory File Header.
    pub fn central_directory_offset(&self) -> u64 {
        self.cd_offset
    }

    /// Total byte length of the central directory.
    pub fn central_directory_size(&self) -> u64 {
        self.cd_size
    }

    /// Entry count declared by the EOCD record. May exceed [`len`](Self::len)
    /// when records were skipped for bad signatures.
    pub fn expected_entries(&self) -> u16 {
        self.expected_entries
    }

    /// Look up a member by its stored path.
    pub fn entry(&self, name: &str) -> Option<&FileEntry> {
        self.file_table.get(name)
    }

    /// All members, in on-disk order.
    pub fn entries(&self) -> impl Iterator<Item = &FileEntry> {
        self.file_table.values()
    }

    /// Number of members whose directory record validated.
    pub fn len(&self) -> usize {
        self.file_table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.file_table.is_empty()
    }

    /// Get a reference to the underlying source.
    pub fn source(&self) -> &Arc<R> {
        &self.source
    }
}
