use std::fs::File;
use std::io;
use std::path::Path;

use memmap2::Mmap;
use tracing::debug;

use crate::TransferError;

#[derive(Debug)]
pub struct ZeroCopyFile {
    mmap: Mmap,
    _file: File,
    file_size: usize,
}

impl ZeroCopyFile {
    pub fn new<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path.as_ref())?;
        let file_size = file.metadata()?.len() as usize;

        // empty files cannot be mapped
        if file_size == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "cannot memory map an empty file",
            ));
        }

        // SAFETY: the file is assumed not to be truncated by someone else while
        // mapped. Uploads and downloads are handled one at a time.
        let mmap = unsafe { Mmap::map(&file)? };

        Ok(Self {
            mmap,
            _file: file,
            file_size,
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.mmap
    }

    pub fn len(&self) -> usize {
        self.file_size
    }

    pub fn is_empty(&self) -> bool {
        self.file_size == 0
    }
}

/// Bytes of a file to be served.
#[derive(Debug)]
pub enum FileContents {
    InMemory(Vec<u8>),
    Mapped(ZeroCopyFile),
}

impl FileContents {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            FileContents::InMemory(data) => data,
            FileContents::Mapped(file) => file.as_bytes(),
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_memory_mapped(&self) -> bool {
        matches!(self, FileContents::Mapped(_))
    }
}

/// Loads `path` for download, mapping it when it is at least `threshold` bytes.
///
/// A missing path, or one that is not a regular file, is `ResourceNotFound`.
pub async fn load_file(path: &Path, threshold: usize) -> Result<FileContents, TransferError> {
    let metadata = match tokio::fs::metadata(path).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(TransferError::ResourceNotFound(path.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    };
    if !metadata.is_file() {
        return Err(TransferError::ResourceNotFound(path.to_path_buf()));
    }

    let size = metadata.len() as usize;
    if size > 0 && size >= threshold {
        debug!(path = %path.display(), size, "memory mapping download");
        return Ok(FileContents::Mapped(ZeroCopyFile::new(path)?));
    }

    Ok(FileContents::InMemory(tokio::fs::read(path).await?))
}
