//! Embedded image extraction from recovered documents

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::container::ZipHandle;
use crate::error::{RecoveryError, Result};
use crate::output::OutputDir;

/// Folder holding embedded media inside a word-processing package
pub const MEDIA_PREFIX: &str = "word/media/";

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp"];

/// Outcome of extracting media from a directory of documents
#[derive(Debug, Clone, Default)]
pub struct MediaSummary {
    pub documents_processed: usize,
    pub documents_skipped: usize,
    pub images: Vec<PathBuf>,
}

/// Base names of every `word/media/` entry, images or not
pub fn media_entry_names(handle: &ZipHandle<'_>) -> Vec<String> {
    handle
        .entry_names()
        .iter()
        .filter_map(|name| name.strip_prefix(MEDIA_PREFIX))
        .map(base_name)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// True for `word/media/*` entries with an image extension (any case)
pub fn is_image_entry(name: &str) -> bool {
    if !name.starts_with(MEDIA_PREFIX) {
        return false;
    }
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
}

/// Write every embedded image of the document at `docx` into `output`
pub fn extract_media(docx: &Path, output: &OutputDir) -> Result<Vec<PathBuf>> {
    let bytes = fs::read(docx).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            RecoveryError::FileNotFound(docx.display().to_string())
        } else {
            RecoveryError::Io(e)
        }
    })?;
    extract_media_from_bytes(&bytes, output)
}

/// Same as [`extract_media`] for a document already in memory
pub fn extract_media_from_bytes(bytes: &[u8], output: &OutputDir) -> Result<Vec<PathBuf>> {
    let mut handle = ZipHandle::open_document(bytes).map_err(|e| RecoveryError::Container(e.to_string()))?;

    let mut written = Vec::new();
    for entry in handle.entry_names() {
        if !is_image_entry(&entry) {
            continue;
        }
        let Some(data) = handle.read_entry(&entry) else {
            warn!(%entry, "unreadable media entry skipped");
            continue;
        };
        let path = output.write_new(base_name(&entry), &data)?;
        debug!(%entry, path = %path.display(), "image extracted");
        written.push(path);
    }

    Ok(written)
}

/// Extract media from every `.docx` directly inside `dir`
///
/// Documents are visited in name order. One that cannot be opened is logged
/// and skipped; only output failures abort the batch.
pub fn extract_media_from_dir(dir: &Path, output: &OutputDir) -> Result<MediaSummary> {
    if !dir.is_dir() {
        return Err(RecoveryError::FileNotFound(dir.display().to_string()));
    }

    let mut documents: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("docx"))
        })
        .collect();
    documents.sort();

    let mut summary = MediaSummary::default();
    for document in &documents {
        let bytes = match fs::read(document) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(document = %document.display(), error = %e, "document unreadable, skipped");
                summary.documents_skipped += 1;
                continue;
            }
        };

        // write failures propagate, a broken container is skipped
        match extract_media_from_bytes(&bytes, output) {
            Ok(mut images) => {
                summary.documents_processed += 1;
                summary.images.append(&mut images);
            }
            Err(RecoveryError::Container(reason)) => {
                warn!(document = %document.display(), %reason, "not a container, skipped");
                summary.documents_skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }

    info!(
        processed = summary.documents_processed,
        skipped = summary.documents_skipped,
        images = summary.images.len(),
        "media extraction finished"
    );
    Ok(summary)
}

fn base_name(entry: &str) -> &str {
    entry.rsplit('/').next().unwrap_or(entry)
}
