//! Bulk triage path: signature scan, partitioning, parallel fragment extraction

pub mod parallel;
pub mod partition;
pub mod signature;

pub use parallel::{FragmentExtractor, FragmentFile, FragmentReport, WorkerFailure};
pub use partition::{partition_offsets, worker_count};
pub use signature::{collect_offsets, ScanSummary, SignatureScanner};

use std::path::Path;

use tokio::sync::mpsc::Sender;
use tracing::info;

use crate::error::{Outcome, Result};
use crate::output::OutputDir;
use crate::types::{CancelToken, CarveConfig, ScanProgress};

/// Result of scanning a dump and writing its triage fragments
#[derive(Debug, Clone, Default)]
pub struct FragmentRun {
    pub scan: ScanSummary,
    pub report: FragmentReport,
}

impl FragmentRun {
    /// True when every scanned signature ended up in a fragment file
    pub fn is_complete(&self) -> bool {
        !self.report.is_partial() && self.report.total_offsets() == self.scan.signature_count()
    }
}

/// Scan `dump` for the configured marker and extract fragments into `output`
pub fn scan_and_extract(
    dump: &Path,
    config: &CarveConfig,
    output: &OutputDir,
    cancel: Option<CancelToken>,
    progress: Option<Sender<ScanProgress>>,
) -> Result<Outcome<FragmentRun>> {
    config.validate()?;

    let mut scanner = SignatureScanner::open(dump, config)?;
    if let Some(token) = &cancel {
        scanner = scanner.with_cancel(token.clone());
    }
    if let Some(sender) = &progress {
        scanner = scanner.with_progress(sender.clone());
    }

    let scan = match collect_offsets(scanner)? {
        Outcome::Completed(scan) => scan,
        Outcome::Abandoned => return Ok(Outcome::Abandoned),
    };
    info!(
        signatures = scan.signature_count(),
        bytes = scan.bytes_scanned,
        blocks = scan.blocks_scanned,
        "signature scan finished"
    );

    if scan.offsets.is_empty() {
        return Ok(Outcome::Completed(FragmentRun {
            scan,
            report: FragmentReport::default(),
        }));
    }

    let groups = partition_offsets(&scan.offsets, config.effective_workers());

    let mut extractor = FragmentExtractor::new(config.clone());
    if let Some(token) = cancel {
        extractor = extractor.with_cancel(token);
    }
    if let Some(sender) = progress {
        extractor = extractor.with_progress(sender);
    }

    Ok(match extractor.extract(dump, &groups, output)? {
        Outcome::Completed(report) => Outcome::Completed(FragmentRun { scan, report }),
        Outcome::Abandoned => Outcome::Abandoned,
    })
}
