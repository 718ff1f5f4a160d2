use std::io::Read;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use log::warn;
use reqwest::blocking::Client;

use super::{RangeSource, wrap_compression};
use anyhow::{Result, anyhow, bail};

/// HTTP Range provider for remote Zip files.
pub struct HttpRangeSource {
    client: Client,
    url: String,
    size: u64,
    transferred_bytes: Arc<AtomicU64>,
    max_retry: u32,
}

/// Adds each byte its inner reader produces to a shared counter, so streams
/// that are dropped early only account for what was actually read.
struct CountingReader<R> {
    inner: R,
    counter: Arc<AtomicU64>,
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.counter.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }
}

impl HttpRangeSource {
    /// Create a new HTTP Range source.
    ///
    /// Sends a HEAD request to verify Range support and get the file size.
    pub fn new(url: String) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        // Send HEAD request to check capabilities
        let resp = client.head(&url).send()?;

        if !resp.status().is_success() {
            bail!("HTTP request failed with status: {}", resp.status());
        }

        // Check if server supports Range requests
        let accept_ranges = resp
            .headers()
            .get("accept-ranges")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("none");

        if !accept_ranges.contains("bytes") {
            bail!("Remote server does not support Range requests");
        }

        // Get file size from Content-Length
        let size = resp
            .headers()
            .get("content-length")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| anyhow!("Remote server did not return Content-Length"))?;

        Ok(Self {
            client,
            url,
            size,
            transferred_bytes: Arc::new(AtomicU64::new(0)),
            max_retry: 10,
        })
    }

    /// Get total bytes transferred from network.
    pub fn transferred_bytes(&self) -> u64 {
        self.transferred_bytes.load(Ordering::Relaxed)
    }

    /// Fill `buf` with the bytes at `offset`, retrying transient failures
    /// with linear backoff.
    fn read_range(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let end = offset + buf.len() as u64 - 1;
        let expected_size = buf.len();

        let mut received = 0;
        let mut retry_count = 0;

        while received < expected_size {
            let current_start = offset + received as u64;
            let range = format!("bytes={}-{}", current_start, end);

            let result = self.client.get(&self.url).header("Range", &range).send();

            match result {
                Ok(resp) => {
                    if resp.status() != reqwest::StatusCode::PARTIAL_CONTENT {
                        bail!("HTTP request failed with status: {}", resp.status());
                    }

                    let bytes = resp.bytes()?;
                    let chunk_len = bytes.len().min(expected_size - received);
                    buf[received..received + chunk_len].copy_from_slice(&bytes[..chunk_len]);
                    received += chunk_len;

                    self.transferred_bytes
                        .fetch_add(chunk_len as u64, Ordering::Relaxed);
                }
                Err(e) if e.is_timeout() || e.is_connect() => {
                    retry_count += 1;
                    if retry_count >= self.max_retry {
                        bail!("Max retries exceeded");
                    }
                    warn!(
                        "connection error, retry {}/{}: {}",
                        retry_count, self.max_retry, e
                    );
                    std::thread::sleep(Duration::from_millis(500 * retry_count as u64));
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(())
    }
}

impl RangeSource for HttpRangeSource {
    fn size(&self) -> u64 {
        self.size
    }

    fn fetch_start(&self, length: u64, offset: u64) -> Option<Vec<u8>> {
        let end = offset.checked_add(length)?;
        if length == 0 || end > self.size {
            return None;
        }
        let mut buf = vec![0u8; length as usize];
        match self.read_range(offset, &mut buf) {
            Ok(()) => Some(buf),
            Err(err) => {
                warn!("range read of {length} bytes at {offset} from {} failed: {err}", self.url);
                None
            }
        }
    }

    fn open_stream(&self, length: u64, offset: u64, method: u16) -> Option<Box<dyn Read + Send>> {
        let end = offset.checked_add(length)?;
        if length == 0 || end > self.size {
            return None;
        }
        let range = format!("bytes={}-{}", offset, offset + length - 1);
        let resp = match self.client.get(&self.url).header("Range", &range).send() {
            Ok(resp) => resp,
            Err(err) => {
                warn!("range GET {range} against {} failed: {err}", self.url);
                return None;
            }
        };
        if resp.status() != reqwest::StatusCode::PARTIAL_CONTENT {
            warn!(
                "range GET {range} against {} answered {}",
                self.url,
                resp.status()
            );
            return None;
        }

        let counted = CountingReader {
            inner: resp.take(length),
            counter: Arc::clone(&self.transferred_bytes),
        };
        wrap_compression(Box::new(counted), method)
    }
}
