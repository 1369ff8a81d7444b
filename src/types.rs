use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{CandidateRejection, RecoveryError, Result};

/// Newtype wrapper for byte offsets in dumps
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Offset(pub u64);

impl Offset {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Offset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:X}", self.0)
    }
}

/// Newtype wrapper for sizes in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Size(pub u64);

impl Size {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// Local file header signature of ZIP-based office documents
pub const DOCX_SIGNATURE: &[u8] = b"PK\x03\x04";

pub const DEFAULT_READ_BLOCK_SIZE: usize = 1024 * 1024;
pub const DEFAULT_FRAGMENT_WINDOW: u64 = 20 * 1024 * 1024;
pub const DEFAULT_MAX_CANDIDATE_SIZE: usize = 800 * 1024;
pub const DEFAULT_RECOVERY_CAP: usize = 20;
pub const DEFAULT_WORKER_FRACTION: f64 = 0.7;
pub const DEFAULT_ENTROPY_THRESHOLD: f64 = 5.0;

/// Carving session configuration
#[derive(Debug, Clone)]
pub struct CarveConfig {
    /// Marker that starts every candidate container
    pub marker: Vec<u8>,

    /// Sequential read size of the signature scanner
    pub read_block_size: usize,

    /// Bytes copied per offset into fragment files
    pub fragment_window: u64,

    /// Upper bound of a candidate window
    pub max_candidate_size: usize,

    /// Maximum number of recovered documents per session
    pub recovery_cap: usize,

    /// Share of hardware concurrency used by fragment workers
    pub worker_fraction: f64,

    /// Explicit worker count, overrides `worker_fraction`
    pub workers: Option<usize>,

    /// Entropy (bits/byte) above which an opaque artifact is flagged encrypted
    pub entropy_threshold: f64,
}

impl Default for CarveConfig {
    fn default() -> Self {
        Self {
            marker: DOCX_SIGNATURE.to_vec(),
            read_block_size: DEFAULT_READ_BLOCK_SIZE,
            fragment_window: DEFAULT_FRAGMENT_WINDOW,
            max_candidate_size: DEFAULT_MAX_CANDIDATE_SIZE,
            recovery_cap: DEFAULT_RECOVERY_CAP,
            worker_fraction: DEFAULT_WORKER_FRACTION,
            workers: None,
            entropy_threshold: DEFAULT_ENTROPY_THRESHOLD,
        }
    }
}

impl CarveConfig {
    /// Check the configuration for values the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.marker.is_empty() {
            return Err(RecoveryError::Config("marker must not be empty".to_string()));
        }

        if self.read_block_size < self.marker.len() {
            return Err(RecoveryError::Config(format!(
                "read block size ({}) must be at least the marker length ({})",
                self.read_block_size,
                self.marker.len()
            )));
        }

        if self.fragment_window == 0 {
            return Err(RecoveryError::Config(
                "fragment window must be greater than 0".to_string(),
            ));
        }

        if self.max_candidate_size < self.marker.len() {
            return Err(RecoveryError::Config(format!(
                "maximum candidate size ({}) must be at least the marker length ({})",
                self.max_candidate_size,
                self.marker.len()
            )));
        }

        if self.recovery_cap == 0 {
            return Err(RecoveryError::Config(
                "recovery cap must be greater than 0".to_string(),
            ));
        }

        if !(self.worker_fraction > 0.0 && self.worker_fraction <= 1.0) {
            return Err(RecoveryError::Config(format!(
                "worker fraction ({}) must be in (0, 1]",
                self.worker_fraction
            )));
        }

        if self.workers == Some(0) {
            return Err(RecoveryError::Config("worker count must be greater than 0".to_string()));
        }

        if !(0.0..=8.0).contains(&self.entropy_threshold) {
            return Err(RecoveryError::Config(format!(
                "entropy threshold ({}) must be within 0..=8 bits/byte",
                self.entropy_threshold
            )));
        }

        Ok(())
    }
}

/// Shared cancellation flag, checked at block and candidate boundaries
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Progress update sent via tokio channel
#[derive(Debug, Clone)]
pub enum ScanProgress {
    /// Bytes consumed by the signature scanner
    BytesScanned(u64),
    /// Marker occurrence found
    SignatureFound(Offset),
    /// A fragment worker finished its group
    FragmentWritten { part: usize, offsets: usize },
    /// A fragment worker failed (non-fatal for its siblings)
    WorkerFailed { part: usize, error: String },
    /// A candidate was persisted
    DocumentRecovered { index: usize, offset: Offset },
    /// A candidate was rejected
    CandidateRejected { offset: Offset, reason: CandidateRejection },
}

/// Forward a progress update if anyone is still listening
pub(crate) fn report_progress(
    sender: Option<&tokio::sync::mpsc::Sender<ScanProgress>>,
    update: ScanProgress,
) {
    if let Some(s) = sender {
        if !s.is_closed() {
            let _ = s.blocking_send(update);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_display_is_hex() {
        assert_eq!(Offset::new(255).to_string(), "0xFF");
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = CarveConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.marker, b"PK\x03\x04");
        assert_eq!(config.read_block_size, 1024 * 1024);
        assert_eq!(config.fragment_window, 20 * 1024 * 1024);
        assert_eq!(config.max_candidate_size, 800 * 1024);
        assert_eq!(config.recovery_cap, 20);
    }

    #[test]
    fn test_invalid_configs_rejected() {
        let mut config = CarveConfig::default();
        config.marker.clear();
        assert!(config.validate().is_err());

        let mut config = CarveConfig::default();
        config.read_block_size = 2;
        assert!(config.validate().is_err());

        let mut config = CarveConfig::default();
        config.worker_fraction = 1.5;
        assert!(config.validate().is_err());

        let mut config = CarveConfig::default();
        config.workers = Some(0);
        assert!(config.validate().is_err());

        let mut config = CarveConfig::default();
        config.entropy_threshold = 9.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cancel_token_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!token.is_cancelled());
        clone.cancel();
        assert!(token.is_cancelled());
    }
}
