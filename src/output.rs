//! Append-only output directory
//!
//! Files are only ever created, never overwritten. When a name is taken the
//! first free `stem_{k}.ext` (k = 1, 2, ...) is used instead.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::{RecoveryError, Result};

/// Destination for carved artifacts
pub trait ArtifactSink {
    /// Store `bytes` under a name derived from `file_name`; returns the final path
    fn persist(&mut self, file_name: &str, bytes: &[u8]) -> Result<PathBuf>;
}

#[derive(Debug, Clone)]
pub struct OutputDir {
    root: PathBuf,
}

impl OutputDir {
    /// Create (if needed) and wrap an output directory
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        if !root.is_dir() {
            return Err(RecoveryError::InvalidArgument(format!(
                "{} is not a directory",
                root.display()
            )));
        }
        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Create a brand-new file, resolving name collisions with a suffix counter
    pub fn create_file(&self, file_name: &str) -> Result<(PathBuf, File)> {
        let (stem, ext) = split_name(file_name);

        for attempt in 0u32.. {
            let name = match (attempt, ext) {
                (0, _) => file_name.to_string(),
                (k, Some(ext)) => format!("{stem}_{k}.{ext}"),
                (k, None) => format!("{stem}_{k}"),
            };
            let path = self.root.join(name);

            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(RecoveryError::Io(e)),
            }
        }

        Err(RecoveryError::Config(format!(
            "no free file name for {file_name} in {}",
            self.root.display()
        )))
    }

    /// Write `bytes` to a new file and flush it to disk
    pub fn write_new(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let (path, file) = self.create_file(file_name)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(bytes)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(path)
    }
}

impl ArtifactSink for OutputDir {
    fn persist(&mut self, file_name: &str, bytes: &[u8]) -> Result<PathBuf> {
        self.write_new(file_name, bytes)
    }
}

/// `"image.png"` -> `("image", Some("png"))`, dotfiles keep their name as stem
fn split_name(file_name: &str) -> (&str, Option<&str>) {
    match file_name.rfind('.') {
        Some(0) | None => (file_name, None),
        Some(dot) => (&file_name[..dot], Some(&file_name[dot + 1..])),
    }
}
