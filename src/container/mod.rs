//! Container validation and text extraction
//!
//! The carver only relies on [`ContainerValidator`]; [`DocxValidator`] is
//! the ZIP/WordprocessingML implementation.

pub mod text;

use std::io::{Cursor, Read};

use thiserror::Error;
use tracing::trace;
use zip::ZipArchive;

use crate::simd_search::find_pattern_from;

pub use text::{collect_text_runs, document_text};

/// Primary content entry of a word-processing document
pub const DOCUMENT_ENTRY: &str = "word/document.xml";

/// Entry present in password-protected packages
pub const ENCRYPTED_PACKAGE_ENTRY: &str = "EncryptedPackage";

/// End of central directory signature
const EOCD_SIGNATURE: &[u8] = b"PK\x05\x06";
const EOCD_MIN_LEN: usize = 22;

/// Candidate EOCD records tried before giving up on a window
const MAX_EOCD_CANDIDATES: usize = 64;

/// Upper bound on a decompressed entry read into memory
const MAX_ENTRY_SIZE: u64 = 64 * 1024 * 1024;

/// The bytes do not open as a container
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("not a container: {0}")]
pub struct NotAContainer(pub String);

/// Capability the carver consumes to check and read a candidate window
pub trait ContainerValidator {
    type Handle<'a>;

    /// Entry that must exist and carries the document text
    fn primary_entry(&self) -> &str;

    /// Entry that marks a structurally valid but encrypted container
    fn encrypted_marker(&self) -> Option<&str> {
        None
    }

    fn open<'a>(&self, bytes: &'a [u8]) -> Result<Self::Handle<'a>, NotAContainer>;

    fn has_entry(&self, handle: &mut Self::Handle<'_>, name: &str) -> bool;

    /// Concatenated text runs of `entry`, `None` when unreadable
    fn read_text(&self, handle: &mut Self::Handle<'_>, entry: &str) -> Option<String>;
}

/// Open ZIP container over borrowed bytes
pub struct ZipHandle<'a> {
    archive: ZipArchive<Cursor<&'a [u8]>>,
    /// length of the archive proper, up to the end of its EOCD record
    len: usize,
}

impl<'a> ZipHandle<'a> {
    /// Open `bytes` as a ZIP archive, ignoring anything after its EOCD record
    ///
    /// EOCD candidates are tried in file order, so the first complete archive
    /// starting at `bytes[0]` wins over archives that follow it.
    pub fn open(bytes: &'a [u8]) -> Result<Self, NotAContainer> {
        Self::open_with(bytes, |_| true)
    }

    /// Like [`ZipHandle::open`], skipping archives `accept` turns down
    ///
    /// A stored archive embedded in the container ends before the container
    /// does, so its EOCD comes first. When no candidate is accepted the first
    /// archive that opened at all is returned.
    pub fn open_with(
        bytes: &'a [u8],
        accept: impl Fn(&ZipHandle<'a>) -> bool,
    ) -> Result<Self, NotAContainer> {
        let mut search_from = 0;
        let mut fallback = None;
        let mut last_error = String::from("no end of central directory record");

        for _ in 0..MAX_EOCD_CANDIDATES {
            let Some(pos) = find_pattern_from(bytes, EOCD_SIGNATURE, search_from) else {
                break;
            };
            search_from = pos + EOCD_SIGNATURE.len();

            if pos + EOCD_MIN_LEN > bytes.len() {
                break;
            }
            let comment_len = u16::from_le_bytes([bytes[pos + 20], bytes[pos + 21]]) as usize;
            let end = pos + EOCD_MIN_LEN + comment_len;
            if end > bytes.len() {
                continue;
            }

            match ZipArchive::new(Cursor::new(&bytes[..end])) {
                Ok(archive) => {
                    let handle = Self { archive, len: end };
                    if accept(&handle) {
                        trace!(archive_len = end, entries = handle.archive.len(), "container opened");
                        return Ok(handle);
                    }
                    trace!(archive_len = end, "archive passed over");
                    fallback.get_or_insert(handle);
                }
                Err(e) => last_error = e.to_string(),
            }
        }

        fallback.ok_or_else(|| NotAContainer(last_error))
    }

    /// Open a word-processing package, preferring the archive that holds
    /// its document or encrypted payload over packages embedded in it
    pub fn open_document(bytes: &'a [u8]) -> Result<Self, NotAContainer> {
        Self::open_with(bytes, |handle| {
            handle.has_entry(DOCUMENT_ENTRY) || handle.has_entry(ENCRYPTED_PACKAGE_ENTRY)
        })
    }

    /// Length of the archive inside the window it was opened from
    pub fn archive_len(&self) -> usize {
        self.len
    }

    pub fn entry_names(&self) -> Vec<String> {
        self.archive.file_names().map(str::to_string).collect()
    }

    pub fn has_entry(&self, name: &str) -> bool {
        self.archive.file_names().any(|entry| entry == name)
    }

    /// Decompressed bytes of one entry, `None` when missing or corrupt
    pub fn read_entry(&mut self, name: &str) -> Option<Vec<u8>> {
        let entry = self.archive.by_name(name).ok()?;
        let mut data = Vec::with_capacity(entry.size().min(MAX_ENTRY_SIZE) as usize);
        entry.take(MAX_ENTRY_SIZE).read_to_end(&mut data).ok()?;
        Some(data)
    }
}

/// Word-processing (`.docx`) container validator
#[derive(Debug, Clone, Copy, Default)]
pub struct DocxValidator;

impl ContainerValidator for DocxValidator {
    type Handle<'a> = ZipHandle<'a>;

    fn primary_entry(&self) -> &str {
        DOCUMENT_ENTRY
    }

    fn encrypted_marker(&self) -> Option<&str> {
        Some(ENCRYPTED_PACKAGE_ENTRY)
    }

    fn open<'a>(&self, bytes: &'a [u8]) -> Result<Self::Handle<'a>, NotAContainer> {
        let primary = self.primary_entry();
        ZipHandle::open_with(bytes, |handle| {
            handle.has_entry(primary) || handle.has_entry(ENCRYPTED_PACKAGE_ENTRY)
        })
    }

    fn has_entry(&self, handle: &mut Self::Handle<'_>, name: &str) -> bool {
        handle.has_entry(name)
    }

    fn read_text(&self, handle: &mut Self::Handle<'_>, entry: &str) -> Option<String> {
        let xml = handle.read_entry(entry)?;
        document_text(&xml)
    }
}
