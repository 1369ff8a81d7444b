//! Streaming marker scanner
//!
//! Reads the dump sequentially in fixed-size blocks and yields absolute,
//! strictly increasing offsets of the marker. The tail of each block (at
//! most `marker.len() - 1` bytes, never reaching back before the end of
//! the previous match) is carried into the next search window so markers
//! that straddle a block boundary are found.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

use tokio::sync::mpsc::Sender;
use tracing::{debug, trace};

use crate::error::{Outcome, RecoveryError, Result};
use crate::simd_search::find_pattern_from;
use crate::types::{report_progress, CancelToken, CarveConfig, Offset, ScanProgress};

/// Lazy, finite, non-restartable sequence of marker offsets
pub struct SignatureScanner<R: Read> {
    reader: R,
    marker: Vec<u8>,
    block_size: usize,
    /// carried tail followed by the current block
    window: Vec<u8>,
    /// absolute offset of `window[0]`
    window_base: u64,
    pending: VecDeque<Offset>,
    bytes_read: u64,
    finished: bool,
    cancelled: bool,
    cancel: Option<CancelToken>,
    progress: Option<Sender<ScanProgress>>,
}

impl SignatureScanner<File> {
    /// Open a dump read-only and scan it with the configured marker and block size
    pub fn open<P: AsRef<Path>>(path: P, config: &CarveConfig) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                RecoveryError::FileNotFound(path.display().to_string())
            } else {
                RecoveryError::Io(e)
            }
        })?;
        Self::new(file, &config.marker, config.read_block_size)
    }
}

impl<R: Read> SignatureScanner<R> {
    pub fn new(reader: R, marker: &[u8], block_size: usize) -> Result<Self> {
        if marker.is_empty() {
            return Err(RecoveryError::InvalidArgument("marker must not be empty".to_string()));
        }
        if block_size == 0 {
            return Err(RecoveryError::InvalidArgument(
                "block size must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            reader,
            marker: marker.to_vec(),
            block_size,
            window: Vec::with_capacity(block_size + marker.len()),
            window_base: 0,
            pending: VecDeque::new(),
            bytes_read: 0,
            finished: false,
            cancelled: false,
            cancel: None,
            progress: None,
        })
    }

    /// Stop at the next block boundary once `token` is cancelled
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Stream progress updates to a channel
    pub fn with_progress(mut self, sender: Sender<ScanProgress>) -> Self {
        self.progress = Some(sender);
        self
    }

    /// Bytes consumed from the dump so far
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// True when the scan stopped because of cancellation
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Read one block, search it together with the carried tail
    fn scan_next_block(&mut self) -> Result<()> {
        if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            debug!(bytes_read = self.bytes_read, "signature scan cancelled");
            self.cancelled = true;
            self.finished = true;
            return Ok(());
        }

        let carried = self.window.len();
        self.window.resize(carried + self.block_size, 0);
        let read = match fill_block(&mut self.reader, &mut self.window[carried..]) {
            Ok(read) => read,
            Err(e) => {
                self.finished = true;
                return Err(RecoveryError::Io(e));
            }
        };
        self.window.truncate(carried + read);

        if read == 0 {
            self.finished = true;
            return Ok(());
        }

        self.bytes_read += read as u64;
        report_progress(self.progress.as_ref(), ScanProgress::BytesScanned(read as u64));
        trace!(block_bytes = read, total = self.bytes_read, "block read");

        // in-window search, resuming right after the end of each match
        let mut search_from = 0;
        while let Some(pos) = find_pattern_from(&self.window, &self.marker, search_from) {
            let offset = Offset::new(self.window_base + pos as u64);
            report_progress(self.progress.as_ref(), ScanProgress::SignatureFound(offset));
            self.pending.push_back(offset);
            search_from = pos + self.marker.len();
        }

        // carry the tail that may still start a match
        let keep_from = self
            .window
            .len()
            .saturating_sub(self.marker.len() - 1)
            .max(search_from.min(self.window.len()));
        self.window.drain(..keep_from);
        self.window_base += keep_from as u64;

        Ok(())
    }
}

/// Fill `buf` as far as the reader allows; returns bytes read (0 at EOF)
fn fill_block<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

impl<R: Read> Iterator for SignatureScanner<R> {
    type Item = Result<Offset>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(offset) = self.pending.pop_front() {
                return Some(Ok(offset));
            }
            if self.finished {
                return None;
            }
            if let Err(e) = self.scan_next_block() {
                return Some(Err(e));
            }
        }
    }
}

/// Summary of a full signature scan
#[derive(Debug, Clone, Default)]
pub struct ScanSummary {
    pub offsets: Vec<Offset>,
    pub bytes_scanned: u64,
    /// Whole read blocks consumed (bytes scanned / block size)
    pub blocks_scanned: u64,
}

impl ScanSummary {
    pub fn signature_count(&self) -> usize {
        self.offsets.len()
    }
}

/// Drain a scanner into a summary
pub fn collect_offsets<R: Read>(mut scanner: SignatureScanner<R>) -> Result<Outcome<ScanSummary>> {
    let mut offsets = Vec::new();
    for offset in scanner.by_ref() {
        offsets.push(offset?);
    }

    if scanner.is_cancelled() {
        return Ok(Outcome::Abandoned);
    }

    let bytes_scanned = scanner.bytes_read();
    Ok(Outcome::Completed(ScanSummary {
        offsets,
        bytes_scanned,
        blocks_scanned: bytes_scanned / scanner.block_size as u64,
    }))
}
