use crate::error::{Outcome, RecoveryError, Result};
use crate::output::OutputDir;
use crate::types::{report_progress, CancelToken, CarveConfig, Offset, ScanProgress};
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::Sender;
use tracing::{debug, info, warn};

const COPY_BUFFER_SIZE: usize = 256 * 1024;

/// One fragment file written by one worker
#[derive(Debug, Clone)]
pub struct FragmentFile {
    /// 1-based partition number, as in `fragment_part{N}.bin`
    pub part: usize,
    pub path: PathBuf,
    pub offsets: usize,
    pub bytes_written: u64,
    pub sha256: String,
}

/// A worker whose I/O failed; its partial file has been removed
#[derive(Debug, Clone)]
pub struct WorkerFailure {
    pub part: usize,
    pub offsets: usize,
    pub error: String,
}

/// Coordinator view of a fragment extraction run
#[derive(Debug, Clone, Default)]
pub struct FragmentReport {
    pub fragments: Vec<FragmentFile>,
    pub failures: Vec<WorkerFailure>,
}

impl FragmentReport {
    /// Offsets actually written, summed over successful workers
    pub fn total_offsets(&self) -> usize {
        self.fragments.iter().map(|f| f.offsets).sum()
    }

    /// True when at least one worker failed
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}

enum WorkerResult {
    Done(FragmentFile),
    Failed(WorkerFailure),
    Abandoned,
}

/// Parallel extraction of fixed-size windows into per-worker fragment files
///
/// Each partition group is one task on a bounded rayon pool. Workers share
/// nothing mutable: each opens the dump on its own and owns its output file.
pub struct FragmentExtractor {
    config: CarveConfig,
    cancel: Option<CancelToken>,
    progress: Option<Sender<ScanProgress>>,
}

impl FragmentExtractor {
    pub fn new(config: CarveConfig) -> Self {
        Self {
            config,
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

    /// Write one `fragment_part{N}.bin` per group into `output`
    ///
    /// Fails as a whole only when the dump itself cannot be opened. A
    /// worker's I/O error lands in [`FragmentReport::failures`].
    pub fn extract(
        &self,
        dump: &Path,
        groups: &[Vec<Offset>],
        output: &OutputDir,
    ) -> Result<Outcome<FragmentReport>> {
        // the dump must be readable before any worker starts
        File::open(dump).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                RecoveryError::FileNotFound(dump.display().to_string())
            } else {
                RecoveryError::Io(e)
            }
        })?;

        if groups.is_empty() {
            return Ok(Outcome::Completed(FragmentReport::default()));
        }

        let threads = self.config.effective_workers().min(groups.len());
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("fragment-worker-{i}"))
            .build()
            .map_err(|e| RecoveryError::Config(format!("failed to build worker pool: {e}")))?;

        info!(
            groups = groups.len(),
            threads,
            window = self.config.fragment_window,
            "extracting fragments"
        );

        let window = self.config.fragment_window;
        let cancel = self.cancel.as_ref();
        let progress = self.progress.as_ref();

        let results: Vec<WorkerResult> = pool.install(|| {
            groups
                .par_iter()
                .enumerate()
                .map(|(index, group)| {
                    let part = index + 1;
                    // Isolate panics with catch_unwind
                    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                        extract_group(dump, group, part, window, output, cancel)
                    }))
                    .unwrap_or_else(|_| {
                        WorkerResult::Failed(WorkerFailure {
                            part,
                            offsets: group.len(),
                            error: "panic in fragment worker".to_string(),
                        })
                    });

                    match &result {
                        WorkerResult::Done(fragment) => report_progress(
                            progress,
                            ScanProgress::FragmentWritten {
                                part,
                                offsets: fragment.offsets,
                            },
                        ),
                        WorkerResult::Failed(failure) => report_progress(
                            progress,
                            ScanProgress::WorkerFailed {
                                part,
                                error: failure.error.clone(),
                            },
                        ),
                        WorkerResult::Abandoned => {}
                    }
                    result
                })
                .collect()
        });

        let mut report = FragmentReport::default();
        let mut abandoned = false;
        for result in results {
            match result {
                WorkerResult::Done(fragment) => report.fragments.push(fragment),
                WorkerResult::Failed(failure) => {
                    warn!(part = failure.part, error = %failure.error, "fragment worker failed");
                    report.failures.push(failure);
                }
                WorkerResult::Abandoned => abandoned = true,
            }
        }

        if abandoned {
            info!(
                kept = report.fragments.len(),
                "fragment extraction cancelled, completed fragments kept"
            );
            return Ok(Outcome::Abandoned);
        }

        Ok(Outcome::Completed(report))
    }
}

/// Worker body: copy `window` bytes at every offset of `group` into one file
fn extract_group(
    dump: &Path,
    group: &[Offset],
    part: usize,
    window: u64,
    output: &OutputDir,
    cancel: Option<&CancelToken>,
) -> WorkerResult {
    let file_name = format!("fragment_part{part}.bin");
    let (path, out) = match output.create_file(&file_name) {
        Ok(created) => created,
        Err(e) => {
            return WorkerResult::Failed(WorkerFailure {
                part,
                offsets: group.len(),
                error: e.to_string(),
            })
        }
    };

    match write_windows(dump, group, window, out, cancel) {
        Ok(Some((bytes_written, sha256))) => {
            debug!(part, offsets = group.len(), bytes_written, path = %path.display(), "fragment written");
            WorkerResult::Done(FragmentFile {
                part,
                path,
                offsets: group.len(),
                bytes_written,
                sha256,
            })
        }
        Ok(None) => {
            let _ = fs::remove_file(&path);
            WorkerResult::Abandoned
        }
        Err(e) => {
            let _ = fs::remove_file(&path);
            WorkerResult::Failed(WorkerFailure {
                part,
                offsets: group.len(),
                error: e.to_string(),
            })
        }
    }
}

/// Returns `(bytes written, sha256)`, or `None` when cancelled
fn write_windows(
    dump: &Path,
    group: &[Offset],
    window: u64,
    out: File,
    cancel: Option<&CancelToken>,
) -> std::io::Result<Option<(u64, String)>> {
    let mut source = File::open(dump)?;
    let mut writer = BufWriter::new(out);
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
    let mut total = 0u64;

    for offset in group {
        if cancel.is_some_and(CancelToken::is_cancelled) {
            return Ok(None);
        }

        source.seek(SeekFrom::Start(offset.as_u64()))?;
        let mut remaining = window;

        // truncated at the end of the dump
        while remaining > 0 {
            let want = remaining.min(buffer.len() as u64) as usize;
            let read = match source.read(&mut buffer[..want]) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            writer.write_all(&buffer[..read])?;
            hasher.update(&buffer[..read]);
            remaining -= read as u64;
            total += read as u64;
        }
    }

    writer.flush()?;
    writer.get_ref().sync_all()?;
    Ok(Some((total, format!("{:x}", hasher.finalize()))))
}
