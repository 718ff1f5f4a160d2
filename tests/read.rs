//! Directory-reader tests over an in-memory byte source.
//!
//! Fixtures are built by hand so every offset in the assertions is known
//! exactly rather than depending on what an external zip tool emits.

use std::io::{Cursor, Read, Write};
use std::sync::Arc;

use byteorder::{LittleEndian, WriteBytesExt};
use flate2::Compression;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;

use farzip::{ArchiveReader, LocalFileSource, RangeSource, ZipError};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A `RangeSource` over a byte buffer, for exercising the reader without any
/// real I/O.
struct MemorySource(Vec<u8>);

impl RangeSource for MemorySource {
    fn size(&self) -> u64 {
        self.0.len() as u64
    }

    fn fetch_start(&self, length: u64, offset: u64) -> Option<Vec<u8>> {
        let end = offset.checked_add(length)?;
        if length == 0 || end > self.size() {
            return None;
        }
        Some(self.0[offset as usize..(offset + length) as usize].to_vec())
    }

    fn open_stream(&self, length: u64, offset: u64, method: u16) -> Option<Box<dyn Read + Send>> {
        let raw = self.fetch_start(length, offset)?;
        match method {
            0 => Some(Box::new(Cursor::new(raw))),
            8 => Some(Box::new(DeflateDecoder::new(Cursor::new(raw)))),
            _ => None,
        }
    }
}

/// One member of a fixture archive.
struct Member {
    name: String,
    payload: Vec<u8>,
    uncompressed_size: u32,
    method: u16,
    crc_raw: [u8; 4],
    cd_extra: Vec<u8>,
    comment: String,
}

impl Member {
    fn stored(name: &str, data: &[u8], crc_raw: [u8; 4]) -> Self {
        Self {
            name: name.to_string(),
            payload: data.to_vec(),
            uncompressed_size: data.len() as u32,
            method: 0,
            crc_raw,
            cd_extra: Vec::new(),
            comment: String::new(),
        }
    }

    fn deflated(name: &str, data: &[u8]) -> Self {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        let payload = encoder.finish().unwrap();
        Self {
            name: name.to_string(),
            payload,
            uncompressed_size: data.len() as u32,
            method: 8,
            crc_raw: [0; 4],
            cd_extra: Vec::new(),
            comment: String::new(),
        }
    }
}

/// Lay out members, a central directory (optionally prefixed with
/// `corrupt_records` garbage fixed-size headers), and an EOCD record.
fn build_archive(members: &[Member], archive_comment: &[u8], corrupt_records: usize) -> Vec<u8> {
    let mut out = Vec::new();

    // Local file headers and payloads.
    let mut lfh_offsets = Vec::new();
    for m in members {
        lfh_offsets.push(out.len() as u32);
        out.extend_from_slice(b"PK\x03\x04");
        out.write_u16::<LittleEndian>(20).unwrap(); // version needed
        out.write_u16::<LittleEndian>(0).unwrap(); // flags
        out.write_u16::<LittleEndian>(m.method).unwrap();
        out.write_u16::<LittleEndian>(0x7d1c).unwrap(); // mod time
        out.write_u16::<LittleEndian>(0x5a61).unwrap(); // mod date
        out.extend_from_slice(&m.crc_raw);
        out.write_u32::<LittleEndian>(m.payload.len() as u32).unwrap();
        out.write_u32::<LittleEndian>(m.uncompressed_size).unwrap();
        out.write_u16::<LittleEndian>(m.name.len() as u16).unwrap();
        out.write_u16::<LittleEndian>(0).unwrap(); // extra len
        out.extend_from_slice(m.name.as_bytes());
        out.extend_from_slice(&m.payload);
    }

    // Central directory. Corrupt records carry a bad signature and exactly
    // the fixed header size, so the reader's skip realigns onto the next
    // record.
    let cd_offset = out.len() as u32;
    for _ in 0..corrupt_records {
        out.extend_from_slice(&[0xAA; 46]);
    }
    for (m, lfh_offset) in members.iter().zip(&lfh_offsets) {
        out.extend_from_slice(b"PK\x01\x02");
        out.write_u16::<LittleEndian>(20).unwrap(); // version made by
        out.write_u16::<LittleEndian>(20).unwrap(); // version needed
        out.write_u16::<LittleEndian>(0).unwrap(); // flags
        out.write_u16::<LittleEndian>(m.method).unwrap();
        out.write_u16::<LittleEndian>(0x7d1c).unwrap();
        out.write_u16::<LittleEndian>(0x5a61).unwrap();
        out.extend_from_slice(&m.crc_raw);
        out.write_u32::<LittleEndian>(m.payload.len() as u32).unwrap();
        out.write_u32::<LittleEndian>(m.uncompressed_size).unwrap();
        out.write_u16::<LittleEndian>(m.name.len() as u16).unwrap();
        out.write_u16::<LittleEndian>(m.cd_extra.len() as u16).unwrap();
        out.write_u16::<LittleEndian>(m.comment.len() as u16).unwrap();
        out.write_u16::<LittleEndian>(0).unwrap(); // disk number start
        out.write_u16::<LittleEndian>(0).unwrap(); // internal attrs
        out.write_u32::<LittleEndian>(0).unwrap(); // external attrs
        out.write_u32::<LittleEndian>(*lfh_offset).unwrap();
        out.extend_from_slice(m.name.as_bytes());
        out.extend_from_slice(&m.cd_extra);
        out.extend_from_slice(m.comment.as_bytes());
    }
    let cd_size = out.len() as u32 - cd_offset;

    // EOCD record plus optional archive comment.
    let total_entries = (members.len() + corrupt_records) as u16;
    out.extend_from_slice(b"PK\x05\x06");
    out.write_u16::<LittleEndian>(0).unwrap(); // disk number
    out.write_u16::<LittleEndian>(0).unwrap(); // disk with cd
    out.write_u16::<LittleEndian>(total_entries).unwrap();
    out.write_u16::<LittleEndian>(total_entries).unwrap();
    out.write_u32::<LittleEndian>(cd_size).unwrap();
    out.write_u32::<LittleEndian>(cd_offset).unwrap();
    out.write_u16::<LittleEndian>(archive_comment.len() as u16).unwrap();
    out.extend_from_slice(archive_comment);

    out
}

// Exactly 43 bytes.
const README: &[u8] = b"The quick brown fox jumps over the lazy dog";

/// The reference single-member archive: one stored 43-byte README.md whose
/// directory record carries a 36-byte extra field.
fn readme_archive() -> Vec<u8> {
    let mut member = Member::stored("README.md", README, [0xCC, 0x36, 0xE0, 0xC6]);
    let mut extra = vec![0x55, 0x54, 32, 0]; // one 32-byte extra block
    extra.extend_from_slice(&[0u8; 32]);
    member.cd_extra = extra;
    build_archive(&[member], b"", 0)
}

fn open(data: Vec<u8>) -> Result<ArchiveReader<MemorySource>, ZipError> {
    ArchiveReader::new(Arc::new(MemorySource(data)))
}

#[test]
fn single_member_layout() {
    init_logging();
    let reader = open(readme_archive()).unwrap();

    assert_eq!(reader.eocd_offset(), -22);
    assert_eq!(reader.central_directory_offset(), 82);
    assert_eq!(reader.central_directory_size(), 91);
    assert_eq!(reader.expected_entries(), 1);
    assert_eq!(reader.len(), 1);

    let entry = reader.entry("README.md").unwrap();
    assert_eq!(entry.crc32, "C6E036CC");
    assert_eq!(entry.local_header_offset, 0);
    assert_eq!(entry.comment, "");
    // Stored member: the sizes agree.
    assert_eq!(entry.compressed_size, entry.uncompressed_size);
    assert_eq!(entry.uncompressed_size, 43);

    let mut contents = Vec::new();
    reader
        .open_member("README.md")
        .unwrap()
        .read_to_end(&mut contents)
        .unwrap();
    assert_eq!(contents, README);
}

#[test]
fn file_table_preserves_on_disk_order() {
    init_logging();
    let members = vec![
        Member::stored("zz.txt", b"last name, first on disk", [1, 0, 0, 0]),
        Member::stored("aa.txt", b"first name, second on disk", [2, 0, 0, 0]),
        Member::stored("mm.txt", b"middle", [3, 0, 0, 0]),
    ];
    let reader = open(build_archive(&members, b"", 0)).unwrap();

    let names: Vec<&str> = reader.entries().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["zz.txt", "aa.txt", "mm.txt"]);
}

#[test]
fn trailing_archive_comment_shifts_eocd() {
    init_logging();
    let member = Member::stored("a.txt", b"hello", [0; 4]);
    let comment = [b'x'; 35];
    let reader = open(build_archive(&[member], &comment, 0)).unwrap();

    assert_eq!(reader.eocd_offset(), -(22 + 35));
    assert_eq!(reader.len(), 1);
}

#[test]
fn eocd_offset_round_trips() {
    init_logging();
    let data = build_archive(
        &[Member::stored("a.txt", b"hello", [0; 4])],
        b"an archive comment",
        0,
    );
    let source = MemorySource(data);
    let reader = ArchiveReader::new(Arc::new(source)).unwrap();

    let size = reader.source().size() as i64;
    let sig = reader
        .source()
        .fetch_start(4, (size + reader.eocd_offset()) as u64)
        .unwrap();
    assert_eq!(sig, b"PK\x05\x06");
}

#[test]
fn missing_member_is_file_not_found() {
    init_logging();
    let reader = open(readme_archive()).unwrap();
    match reader.open_member("nope.txt").err() {
        Some(ZipError::FileNotFound(name)) => assert_eq!(name, "nope.txt"),
        other => panic!("expected FileNotFound, got {other:?}"),
    }
    // The reader stays usable.
    assert!(reader.open_member("README.md").is_ok());
}

#[test]
fn unsupported_method_fails_only_that_member() {
    init_logging();
    let mut exotic = Member::stored("packed.bin", b"\x01\x02\x03", [0; 4]);
    exotic.method = 7; // tokenized, unsupported
    let members = vec![exotic, Member::stored("plain.txt", b"readable", [0; 4])];
    let reader = open(build_archive(&members, b"", 0)).unwrap();

    match reader.open_member("packed.bin").err() {
        Some(ZipError::UnsupportedCompression(7)) => {}
        other => panic!("expected UnsupportedCompression(7), got {other:?}"),
    }

    let mut contents = Vec::new();
    reader
        .open_member("plain.txt")
        .unwrap()
        .read_to_end(&mut contents)
        .unwrap();
    assert_eq!(contents, b"readable");
}

#[test]
fn deflate_member_round_trips() {
    init_logging();
    let text = b"compressible compressible compressible compressible".repeat(20);
    let members = vec![Member::deflated("big.txt", &text)];
    let reader = open(build_archive(&members, b"", 0)).unwrap();

    let entry = reader.entry("big.txt").unwrap();
    assert!(entry.compressed_size < entry.uncompressed_size);

    let mut contents = Vec::new();
    reader
        .open_member("big.txt")
        .unwrap()
        .read_to_end(&mut contents)
        .unwrap();
    assert_eq!(contents, text);
}

#[test]
fn corrupt_directory_record_is_skipped() {
    init_logging();
    let members = vec![
        Member::stored("ok1.txt", b"one", [0; 4]),
        Member::stored("ok2.txt", b"two", [0; 4]),
    ];
    let reader = open(build_archive(&members, b"", 1)).unwrap();

    // The corrupt record counts toward the declared total but not the table.
    assert_eq!(reader.expected_entries(), 3);
    assert_eq!(reader.len(), 2);
    assert!(reader.entry("ok1.txt").is_some());
    assert!(reader.entry("ok2.txt").is_some());
}

#[test]
fn duplicate_names_last_write_wins() {
    init_logging();
    let members = vec![
        Member::stored("dup.txt", b"first", [1, 0, 0, 0]),
        Member::stored("other.txt", b"other", [2, 0, 0, 0]),
        Member::stored("dup.txt", b"second!", [3, 0, 0, 0]),
    ];
    let reader = open(build_archive(&members, b"", 0)).unwrap();

    assert_eq!(reader.len(), 2);
    // Value from the later record, position from the earlier one.
    let entry = reader.entry("dup.txt").unwrap();
    assert_eq!(entry.crc32, "00000003");
    let names: Vec<&str> = reader.entries().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["dup.txt", "other.txt"]);

    let mut contents = Vec::new();
    reader
        .open_member("dup.txt")
        .unwrap()
        .read_to_end(&mut contents)
        .unwrap();
    assert_eq!(contents, b"second!");
}

#[test]
fn member_comment_is_parsed() {
    init_logging();
    let mut member = Member::stored("noted.txt", b"content", [0; 4]);
    member.comment = "a per-file note".to_string();
    let reader = open(build_archive(&[member], b"", 0)).unwrap();
    assert_eq!(reader.entry("noted.txt").unwrap().comment, "a per-file note");
}

#[test]
fn garbage_is_invalid_archive() {
    init_logging();
    match open(vec![0x33; 100]).err() {
        Some(ZipError::InvalidArchive(_)) => {}
        other => panic!("expected InvalidArchive, got {other:?}"),
    }
}

#[test]
fn empty_source_is_no_data() {
    init_logging();
    match open(Vec::new()).err() {
        Some(ZipError::NoData(_)) => {}
        other => panic!("expected NoData, got {other:?}"),
    }
}

#[test]
fn zero_directory_pointer_is_rejected() {
    init_logging();
    // A bare EOCD whose directory offset field is zero.
    let mut data = Vec::new();
    data.extend_from_slice(b"PK\x05\x06");
    data.write_u16::<LittleEndian>(0).unwrap();
    data.write_u16::<LittleEndian>(0).unwrap();
    data.write_u16::<LittleEndian>(1).unwrap();
    data.write_u16::<LittleEndian>(1).unwrap();
    data.write_u32::<LittleEndian>(91).unwrap();
    data.write_u32::<LittleEndian>(0).unwrap();
    data.write_u16::<LittleEndian>(0).unwrap();

    match open(data).err() {
        Some(ZipError::InvalidArchive(_)) => {}
        other => panic!("expected InvalidArchive, got {other:?}"),
    }
}

#[test]
fn fetch_end_window_semantics() {
    let source = MemorySource(b"0123456789".to_vec());

    assert_eq!(source.fetch_end(4, 0).unwrap(), b"6789");
    assert_eq!(source.fetch_end(4, 2).unwrap(), b"4567");
    assert_eq!(source.fetch_end(10, 0).unwrap(), b"0123456789");
    // Zero length and windows past the front are refused.
    assert!(source.fetch_end(0, 0).is_none());
    assert!(source.fetch_end(11, 0).is_none());
    assert!(source.fetch_end(4, 8).is_none());
    // Oversized offsets clamp to the sequence size.
    assert!(source.fetch_end(1, 9999).is_none());
    // Windows whose end would overflow u64 are refused, not panicked on.
    assert!(source.fetch_end(u64::MAX, 2).is_none());
    assert!(source.fetch_start(u64::MAX, 2).is_none());
}

#[test]
fn local_file_source_matches_memory_source() {
    init_logging();
    let data = readme_archive();

    let mut tmp = tempfile::NamedTempFile::new().unwrap();
    tmp.write_all(&data).unwrap();
    tmp.flush().unwrap();

    let source = Arc::new(LocalFileSource::new(tmp.path()).unwrap());
    assert_eq!(source.size(), data.len() as u64);
    assert!(source.fetch_start(u64::MAX, 2).is_none());
    assert!(source.open_stream(u64::MAX, 2, 0).is_none());

    let reader = ArchiveReader::new(source).unwrap();
    assert_eq!(reader.eocd_offset(), -22);
    assert_eq!(reader.central_directory_offset(), 82);
    assert_eq!(reader.entry("README.md").unwrap().crc32, "C6E036CC");

    let mut contents = Vec::new();
    reader
        .open_member("README.md")
        .unwrap()
        .read_to_end(&mut contents)
        .unwrap();
    assert_eq!(contents, README);

    // Two concurrent streams never share a cursor.
    let mut a = reader.open_member("README.md").unwrap();
    let mut b = reader.open_member("README.md").unwrap();
    let mut first = [0u8; 10];
    a.read_exact(&mut first).unwrap();
    let mut full = Vec::new();
    b.read_to_end(&mut full).unwrap();
    assert_eq!(&first, &README[..10]);
    assert_eq!(full, README);
}
