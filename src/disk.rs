use crate::error::{RecoveryError, Result};
use crate::types::Size;
use memmap2::Mmap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Read-only, memory-mapped dump kept open for a whole carving session
#[derive(Clone)]
pub struct DiskImage {
    // empty dumps are not mapped
    mmap: Option<Arc<Mmap>>,
    size: Size,
    path: PathBuf,
}

impl DiskImage {
    /// Open a dump with memory mapping
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let file = File::open(path_ref).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RecoveryError::FileNotFound(path_ref.display().to_string())
            } else {
                RecoveryError::Io(e)
            }
        })?;

        let metadata = file.metadata()?;
        if !metadata.is_file() {
            return Err(RecoveryError::InvalidArgument(format!(
                "{} is not a regular file",
                path_ref.display()
            )));
        }
        let size = Size::new(metadata.len());

        let mmap = if size.as_u64() == 0 {
            None
        } else {
            // Safety: the mapping is read-only and the engine never writes to the dump
            let mmap = unsafe {
                Mmap::map(&file)
                    .map_err(|e| RecoveryError::Mmap(format!("Failed to mmap file: {}", e)))?
            };
            Some(Arc::new(mmap))
        };

        Ok(Self {
            mmap,
            size,
            path: path_ref.to_path_buf(),
        })
    }

    /// Get the total size of the dump
    pub fn size(&self) -> Size {
        self.size
    }

    /// Get the path of the dump
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whole dump as a byte slice
    pub fn data(&self) -> &[u8] {
        match &self.mmap {
            Some(mmap) => &mmap[..],
            None => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_open_maps_whole_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"0123456789").unwrap();
        file.flush().unwrap();

        let image = DiskImage::open(file.path()).unwrap();
        assert_eq!(image.size().as_u64(), 10);

        assert_eq!(image.data(), b"0123456789");
        assert_eq!(image.path(), file.path());
    }

    #[test]
    fn test_empty_dump() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let image = DiskImage::open(file.path()).unwrap();
        assert!(image.data().is_empty());
        assert_eq!(image.size().as_u64(), 0);
    }

    #[test]
    fn test_missing_dump() {
        let dir = tempfile::tempdir().unwrap();
        let err = DiskImage::open(dir.path().join("missing.bin")).err().unwrap();
        assert!(matches!(err, RecoveryError::FileNotFound(_)));
    }
}
