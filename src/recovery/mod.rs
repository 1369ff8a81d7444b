//! Precision path: candidate carving and post-recovery media extraction

pub mod carver;
pub mod media;

pub use carver::{CandidateCarver, RecoveredDocument, Rejection, RecoverySummary, StopReason};
pub use media::{extract_media, extract_media_from_dir, MediaSummary};

use std::path::Path;

use tokio::sync::mpsc::Sender;
use tracing::info;

use crate::container::DocxValidator;
use crate::disk::DiskImage;
use crate::error::{Outcome, Result};
use crate::output::OutputDir;
use crate::types::{CancelToken, CarveConfig, ScanProgress};

/// Carve word-processing documents out of `source` into `output`
///
/// The source is memory-mapped read-only for the whole session.
pub fn recover_documents(
    source: &Path,
    config: &CarveConfig,
    output: &OutputDir,
    cancel: Option<CancelToken>,
    progress: Option<Sender<ScanProgress>>,
) -> Result<Outcome<RecoverySummary>> {
    config.validate()?;

    let image = DiskImage::open(source)?;
    info!(
        source = %image.path().display(),
        size = image.size().as_u64(),
        cap = config.recovery_cap,
        "carving documents"
    );

    let mut carver = CandidateCarver::new(config.clone(), DocxValidator);
    if let Some(token) = cancel {
        carver = carver.with_cancel(token);
    }
    if let Some(sender) = progress {
        carver = carver.with_progress(sender);
    }

    let mut sink = output.clone();
    carver.carve(image.data(), &mut sink)
}
