use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::Result;
use log::warn;

use super::{RangeSource, wrap_compression};

/// Local file provider with random access support.
///
/// Keeps the path alongside the open handle: positioned reads go through the
/// handle, while each streamed member reopens the path so concurrent streams
/// never share a file cursor.
pub struct LocalFileSource {
    path: PathBuf,
    file: File,
    size: u64,
}

impl LocalFileSource {
    pub fn new(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            path: path.to_path_buf(),
            file,
            size,
        })
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> std::io::Result<()> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::FileExt;
            self.file.read_exact_at(buf, offset)
        }

        #[cfg(not(unix))]
        {
            use std::io::{Seek, SeekFrom};
            // No pread available: reopen so the shared handle's cursor
            // is never touched.
            let mut file = File::open(&self.path)?;
            file.seek(SeekFrom::Start(offset))?;
            file.read_exact(buf)
        }
    }
}

impl RangeSource for LocalFileSource {
    fn size(&self) -> u64 {
        self.size
    }

    fn fetch_start(&self, length: u64, offset: u64) -> Option<Vec<u8>> {
        let end = offset.checked_add(length)?;
        if length == 0 || end > self.size {
            return None;
        }
        let mut buf = vec![0u8; length as usize];
        match self.read_at(offset, &mut buf) {
            Ok(()) => Some(buf),
            Err(err) => {
                warn!(
                    "read of {length} bytes at {offset} from {} failed: {err}",
                    self.path.display()
                );
                None
            }
        }
    }

    fn open_stream(&self, length: u64, offset: u64, method: u16) -> Option<Box<dyn Read + Send>> {
        use std::io::{Seek, SeekFrom};

        let end = offset.checked_add(length)?;
        if length == 0 || end > self.size {
            return None;
        }
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) => {
                warn!("reopening {} for streaming failed: {err}", self.path.display());
                return None;
            }
        };
        if let Err(err) = file.seek(SeekFrom::Start(offset)) {
            warn!("seek to {offset} in {} failed: {err}", self.path.display());
            return None;
        }
        wrap_compression(Box::new(file.take(length)), method)
    }
}
