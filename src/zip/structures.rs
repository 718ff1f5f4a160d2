use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};

use crate::result::{ZipError, ZipResult};

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unknown(v) => *v,
        }
    }
}

/// End of Central Directory (EOCD) - 22 bytes
pub struct EndOfCentralDirectory {
    pub disk_number: u16,
    pub disk_with_cd: u16,
    pub disk_entries: u16,
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment_len: u16,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: &'static [u8] = b"PK\x05\x06";
    pub const SIZE: usize = 22;

    pub fn from_bytes(data: &[u8]) -> ZipResult<Self> {
        if data.len() < Self::SIZE || &data[0..4] != Self::SIGNATURE {
            return Err(ZipError::InvalidArchive(
                "bad end-of-central-directory record",
            ));
        }

        let decode = || -> std::io::Result<Self> {
            let mut cursor = Cursor::new(&data[4..]);
            Ok(Self {
                disk_number: cursor.read_u16::<LittleEndian>()?,
                disk_with_cd: cursor.read_u16::<LittleEndian>()?,
                disk_entries: cursor.read_u16::<LittleEndian>()?,
                total_entries: cursor.read_u16::<LittleEndian>()?,
                cd_size: cursor.read_u32::<LittleEndian>()?,
                cd_offset: cursor.read_u32::<LittleEndian>()?,
                comment_len: cursor.read_u16::<LittleEndian>()?,
            })
        };
        decode().map_err(|_| ZipError::InvalidArchive("bad end-of-central-directory record"))
    }
}

/// Central Directory File Header (CDFH)
pub const CDFH_SIGNATURE: &[u8] = b"PK\x01\x02";
pub const CDFH_SIZE: usize = 46;

/// Local File Header (LFH) - fixed 30-byte part
#[derive(Debug)]
pub struct LocalFileHeader {
    pub version_needed: u16,
    pub flags: u16,
    pub compression_method: CompressionMethod,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub crc32_raw: [u8; 4],
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub name_len: u16,
    pub extra_len: u16,
}

impl LocalFileHeader {
    pub const SIGNATURE: &'static [u8] = b"PK\x03\x04";
    pub const SIZE: usize = 30;

    pub fn from_bytes(data: &[u8]) -> ZipResult<Self> {
        if data.len() < Self::SIZE || &data[0..4] != Self::SIGNATURE {
            return Err(ZipError::InvalidArchive("bad local file header"));
        }

        let decode = || -> std::io::Result<Self> {
            let mut cursor = Cursor::new(&data[4..]);
            let version_needed = cursor.read_u16::<LittleEndian>()?;
            let flags = cursor.read_u16::<LittleEndian>()?;
            let compression_method =
                CompressionMethod::from_u16(cursor.read_u16::<LittleEndian>()?);
            let last_mod_time = cursor.read_u16::<LittleEndian>()?;
            let last_mod_date = cursor.read_u16::<LittleEndian>()?;
            let mut crc32_raw = [0u8; 4];
            cursor.read_exact(&mut crc32_raw)?;
            Ok(Self {
                version_needed,
                flags,
                compression_method,
                last_mod_time,
                last_mod_date,
                crc32_raw,
                compressed_size: cursor.read_u32::<LittleEndian>()?,
                uncompressed_size: cursor.read_u32::<LittleEndian>()?,
                name_len: cursor.read_u16::<LittleEndian>()?,
                extra_len: cursor.read_u16::<LittleEndian>()?,
            })
        };
        decode().map_err(|_| ZipError::InvalidArchive("bad local file header"))
    }
}

/// Render the four raw CRC32 bytes as the canonical 8-char uppercase hex form.
///
/// The bytes are stored little-endian, so hex-encoding them in storage order
/// produces the byte pairs in reversed order; un-reversing them is the same as
/// printing the value big-endian.
pub fn crc32_hex(raw: [u8; 4]) -> String {
    format!("{:08X}", u32::from_le_bytes(raw))
}

/// One member of the archive's file table, parsed from its Central Directory
/// File Header. Never mutated after the table is built.
#[derive(Debug, Clone)]
pub struct FileEntry {
    /// Member path as stored. Arbitrary separators, not validated against
    /// traversal.
    pub name: String,
    pub compression_method: CompressionMethod,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    /// Byte-order-corrected checksum, e.g. `"C6E036CC"`.
    pub crc32: String,
    /// Absolute offset of this member's Local File Header.
    pub local_header_offset: u64,
    /// Per-file comment, empty if none.
    pub comment: String,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub is_directory: bool,
}

impl FileEntry {
    /// Parse modification date to (year, month, day)
    pub fn mod_date(&self) -> (u16, u8, u8) {
        let day = (self.last_mod_date & 0x1F) as u8;
        let month = ((self.last_mod_date >> 5) & 0x0F) as u8;
        let year = ((self.last_mod_date >> 9) & 0x7F) + 1980;
        (year, month, day)
    }

    /// Parse modification time to (hour, minute, second)
    pub fn mod_time(&self) -> (u8, u8, u8) {
        let second = ((self.last_mod_time & 0x1F) * 2) as u8;
        let minute = ((self.last_mod_time >> 5) & 0x3F) as u8;
        let hour = ((self.last_mod_time >> 11) & 0x1F) as u8;
        (hour, minute, second)
    }
}
