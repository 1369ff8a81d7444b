//! Precision carving of candidate containers
//!
//! Offsets are visited in strictly increasing order. For each marker the
//! carver takes a bounded window, validates it, fingerprints its text and
//! persists it when the fingerprint is new:
//!
//! ```text
//! SCAN -> EXTRACT -> VALIDATE -> FINGERPRINT -> PERSIST -> SCAN
//!   |                   |             |
//!   |                   +-------------+--> rescan from offset + marker length
//!   +--> DONE (no marker left, or cap reached)
//! ```
//!
//! An accepted window moves the cursor past its end, so markers inside it
//! are never revisited. A rejected one only skips the marker itself.

use std::path::PathBuf;

use ahash::AHashSet;
use sha2::{Digest, Sha256};
use tokio::sync::mpsc::Sender;
use tracing::{debug, info};

use crate::container::ContainerValidator;
use crate::error::{CandidateRejection, Outcome, Result};
use crate::output::ArtifactSink;
use crate::simd_search::find_pattern_from;
use crate::types::{report_progress, CancelToken, CarveConfig, Offset, ScanProgress};

/// A persisted candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveredDocument {
    /// 1-based recovery index, increasing with offset
    pub index: usize,
    pub offset: Offset,
    /// Bytes written, i.e. the window length
    pub length: usize,
    pub path: PathBuf,
    pub sha256: String,
    pub fingerprint: String,
}

/// A candidate that was not persisted, and why
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejection {
    pub offset: Offset,
    pub reason: CandidateRejection,
}

/// Why the carver stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// No marker left in the source
    Exhausted,
    /// The recovery cap was reached
    CapacityReached,
}

#[derive(Debug, Clone)]
pub struct RecoverySummary {
    pub documents: Vec<RecoveredDocument>,
    pub rejections: Vec<Rejection>,
    pub stop: StopReason,
}

impl RecoverySummary {
    /// Markers examined: every accepted or rejected candidate
    pub fn candidates_examined(&self) -> usize {
        self.documents.len() + self.rejections.len()
    }

    pub fn rejected_for(&self, reason: CandidateRejection) -> usize {
        self.rejections.iter().filter(|r| r.reason == reason).count()
    }
}

/// Sequential carver over an in-memory or memory-mapped source
pub struct CandidateCarver<V: ContainerValidator> {
    config: CarveConfig,
    validator: V,
    cancel: Option<CancelToken>,
    progress: Option<Sender<ScanProgress>>,
}

impl<V: ContainerValidator> CandidateCarver<V> {
    pub fn new(config: CarveConfig, validator: V) -> Self {
        Self {
            config,
            validator,
            cancel: None,
            progress: None,
        }
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn with_progress(mut self, sender: Sender<ScanProgress>) -> Self {
        self.progress = Some(sender);
        self
    }

    /// Carve `source`, persisting unique valid candidates into `sink`
    ///
    /// Only a sink failure is an error. Cancellation keeps the documents
    /// already persisted and returns [`Outcome::Abandoned`].
    pub fn carve<S: ArtifactSink>(
        &self,
        source: &[u8],
        sink: &mut S,
    ) -> Result<Outcome<RecoverySummary>> {
        self.config.validate()?;

        let marker = self.config.marker.as_slice();
        let mut seen: AHashSet<String> = AHashSet::new();
        let mut documents: Vec<RecoveredDocument> = Vec::new();
        let mut rejections = Vec::new();
        let mut cursor = 0usize;

        let stop = loop {
            if documents.len() >= self.config.recovery_cap {
                break StopReason::CapacityReached;
            }

            if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
                info!(
                    recovered = documents.len(),
                    cursor, "carving cancelled, recovered documents kept"
                );
                return Ok(Outcome::Abandoned);
            }

            let Some(start) = find_pattern_from(source, marker, cursor) else {
                break StopReason::Exhausted;
            };
            let offset = Offset::new(start as u64);
            let end = start.saturating_add(self.config.max_candidate_size).min(source.len());
            let window = &source[start..end];

            match self.fingerprint(window, &seen) {
                Ok(fingerprint) => {
                    let index = documents.len() + 1;
                    let file_name = format!("recovered_{index}.docx");
                    let path = sink.persist(&file_name, window)?;

                    info!(index, %offset, length = window.len(), path = %path.display(), "document recovered");
                    report_progress(
                        self.progress.as_ref(),
                        ScanProgress::DocumentRecovered { index, offset },
                    );

                    documents.push(RecoveredDocument {
                        index,
                        offset,
                        length: window.len(),
                        path,
                        sha256: format!("{:x}", Sha256::digest(window)),
                        fingerprint: fingerprint.clone(),
                    });
                    seen.insert(fingerprint);
                    cursor = end;
                }
                Err(reason) => {
                    debug!(%offset, %reason, "candidate rejected");
                    report_progress(
                        self.progress.as_ref(),
                        ScanProgress::CandidateRejected { offset, reason },
                    );
                    rejections.push(Rejection { offset, reason });
                    cursor = start + marker.len();
                }
            }
        };

        info!(
            recovered = documents.len(),
            rejected = rejections.len(),
            ?stop,
            "carving finished"
        );

        Ok(Outcome::Completed(RecoverySummary {
            documents,
            rejections,
            stop,
        }))
    }

    /// VALIDATE and FINGERPRINT one window
    fn fingerprint(
        &self,
        window: &[u8],
        seen: &AHashSet<String>,
    ) -> std::result::Result<String, CandidateRejection> {
        let mut handle = self
            .validator
            .open(window)
            .map_err(|_| CandidateRejection::NotAContainer)?;

        let primary = self.validator.primary_entry();
        let has_primary = self.validator.has_entry(&mut handle, primary);
        let encrypted = self
            .validator
            .encrypted_marker()
            .is_some_and(|entry| self.validator.has_entry(&mut handle, entry));

        if !has_primary {
            // an encrypted package is a container, but has no text to fingerprint
            return Err(if encrypted {
                CandidateRejection::NoText
            } else {
                CandidateRejection::NotAContainer
            });
        }

        let text = self
            .validator
            .read_text(&mut handle, primary)
            .ok_or(CandidateRejection::NoText)?;
        let text = text.trim();

        if text.is_empty() {
            return Err(CandidateRejection::NoText);
        }
        if seen.contains(text) {
            return Err(CandidateRejection::DuplicateContent);
        }

        Ok(text.to_string())
    }
}
