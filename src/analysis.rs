//! Per-file triage of recovered artifacts

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, warn};

use crate::container::{document_text, ZipHandle, DOCUMENT_ENTRY, ENCRYPTED_PACKAGE_ENTRY};
use crate::disk::DiskImage;
use crate::entropy::{text_features, EntropyReport};
use crate::recovery::media::media_entry_names;

/// Report for one `.docx` artifact
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocxReport {
    #[serde(rename = "type")]
    pub kind: String,
    pub valid_zip: bool,
    pub has_document_xml: bool,
    pub encrypted: bool,
    pub extracted_text: String,
    pub images: Vec<String>,
    /// `[entropy, alphabet utilization, printable ratio]` of `extracted_text`
    pub features: [f64; 3],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DocxReport {
    fn empty() -> Self {
        Self {
            kind: "docx".to_string(),
            valid_zip: false,
            has_document_xml: false,
            encrypted: false,
            extracted_text: String::new(),
            images: Vec::new(),
            features: [0.0; 3],
            error: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ArtifactReport {
    Docx(DocxReport),
    Opaque(EntropyReport),
    Unreadable {
        #[serde(rename = "type")]
        kind: String,
        error: String,
    },
    Unsupported {
        error: String,
    },
}

/// Analyze one file, dispatching on its extension
///
/// Never fails: problems end up in the report's `error` field.
pub fn analyze_artifact(path: &Path, entropy_threshold: f64) -> ArtifactReport {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("docx") => ArtifactReport::Docx(analyze_docx(path)),
        Some("enc") | Some("bin") => analyze_opaque(path, entropy_threshold),
        _ => ArtifactReport::Unsupported {
            error: "Unsupported format".to_string(),
        },
    }
}

/// Analyze a batch of files, keyed by file name
pub fn analyze_files<P: AsRef<Path>>(
    paths: &[P],
    entropy_threshold: f64,
) -> BTreeMap<String, ArtifactReport> {
    paths
        .iter()
        .map(|path| {
            let path = path.as_ref();
            let name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            let report = analyze_artifact(path, entropy_threshold);
            debug!(file = %name, "artifact analyzed");
            (name, report)
        })
        .collect()
}

fn analyze_docx(path: &Path) -> DocxReport {
    let mut report = DocxReport::empty();

    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            report.error = Some(e.to_string());
            return report;
        }
    };
    let mut handle = match ZipHandle::open_document(&bytes) {
        Ok(handle) => handle,
        Err(e) => {
            report.error = Some(e.to_string());
            return report;
        }
    };

    report.valid_zip = true;
    report.has_document_xml = handle.has_entry(DOCUMENT_ENTRY);
    report.encrypted = handle.has_entry(ENCRYPTED_PACKAGE_ENTRY);
    report.images = media_entry_names(&handle);

    if report.has_document_xml && !report.encrypted {
        match handle.read_entry(DOCUMENT_ENTRY).and_then(|xml| document_text(&xml)) {
            Some(text) => {
                report.features = text_features(&text);
                report.extracted_text = text;
            }
            None => {
                warn!(file = %path.display(), "document part unreadable");
                report.error = Some(format!("unreadable {DOCUMENT_ENTRY}"));
            }
        }
    }

    report
}

fn analyze_opaque(path: &Path, entropy_threshold: f64) -> ArtifactReport {
    match DiskImage::open(path) {
        Ok(image) => ArtifactReport::Opaque(EntropyReport::from_bytes(
            "enc",
            image.data(),
            entropy_threshold,
        )),
        Err(e) => ArtifactReport::Unreadable {
            kind: "enc".to_string(),
            error: e.to_string(),
        },
    }
}
