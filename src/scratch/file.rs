//! # Scratch File
//!
//! A scratch file is a session-scoped temp file holding spilled undo
//! record images, laid out as a simple append log past a reserved header.
//! It never outlives the process: the file is unlinked on drop and its
//! layout is free to change between releases.
//!
//! ## File Layout
//!
//! ```text
//! +------------------+----------------------------------+
//! | ScratchHeader    | Record images (append log)       |
//! | (64 bytes)       | [entry][entry][entry]...         |
//! +------------------+----------------------------------+
//! ```
//!
//! ## Header Format (64 bytes)
//!
//! ```text
//! Offset  Size  Field     Description
//! 0       16    magic     "Verso Scratch" + NULs
//! 16      4     version   Format version (1)
//! 20      4     pid       Creating process id, for orphan diagnosis
//! 24      8     created   Unix seconds at creation
//! 32      32    reserved  Zeroed
//! ```
//!
//! ## Cursor Discipline
//!
//! The store itself is positionless: every read and write takes an
//! absolute offset and the undo log tracks its own append cursor. This
//! removes the invariant that an implicit file position must equal the
//! end of spilled data between calls.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use eyre::{ensure, Result, WrapErr};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::config::{SCRATCH_HEADER_SIZE, SCRATCH_MAGIC, SCRATCH_VERSION};

#[repr(C)]
#[derive(Debug, Clone, Copy, IntoBytes, FromBytes, Immutable, KnownLayout)]
pub struct ScratchHeader {
    pub magic: [u8; 16],
    pub version: u32,
    pub pid: u32,
    pub created_unix_secs: u64,
    _reserved: [u8; 32],
}

const _: () = assert!(
    std::mem::size_of::<ScratchHeader>() == SCRATCH_HEADER_SIZE,
    "ScratchHeader must exactly fill the reserved header region"
);

impl ScratchHeader {
    pub fn new(created_unix_secs: u64) -> Self {
        Self {
            magic: *SCRATCH_MAGIC,
            version: SCRATCH_VERSION,
            pid: std::process::id(),
            created_unix_secs,
            _reserved: [0u8; 32],
        }
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.magic == *SCRATCH_MAGIC, "bad scratch file magic");
        ensure!(
            self.version == SCRATCH_VERSION,
            "unsupported scratch file version {}",
            self.version
        );
        Ok(())
    }
}

/// Byte-level synchronous I/O the undo log performs on spilled images.
///
/// All operations take absolute offsets; implementations keep no cursor.
pub trait ScratchStore {
    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()>;

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()>;

    /// Closes and deletes the backing storage. Errors are swallowed;
    /// callers invoke this from cleanup paths. Idempotent.
    fn delete_silently(&mut self);
}

/// File-backed scratch store with a stamped header and drop cleanup.
#[derive(Debug)]
pub struct FileScratch {
    path: PathBuf,
    file: Option<File>,
    auto_delete: bool,
}

impl FileScratch {
    /// Creates the file, stamps the header region and marks it for
    /// deletion on drop.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::options()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)
            .wrap_err_with(|| format!("failed to create scratch file '{}'", path.display()))?;

        let created = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let header = ScratchHeader::new(created);
        file.write_all(header.as_bytes())
            .wrap_err_with(|| format!("failed to stamp scratch header '{}'", path.display()))?;

        Ok(Self {
            path,
            file: Some(file),
            auto_delete: true,
        })
    }

    /// Reopens an existing scratch file and validates its header.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::options()
            .read(true)
            .write(true)
            .open(&path)
            .wrap_err_with(|| format!("failed to open scratch file '{}'", path.display()))?;

        let mut raw = [0u8; SCRATCH_HEADER_SIZE];
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut raw)
            .wrap_err_with(|| format!("failed to read scratch header '{}'", path.display()))?;
        let header = ScratchHeader::read_from_bytes(&raw)
            .map_err(|_| eyre::eyre!("scratch header size mismatch"))?;
        header.validate()?;

        Ok(Self {
            path,
            file: Some(file),
            auto_delete: true,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn file_mut(&mut self) -> Result<&mut File> {
        self.file
            .as_mut()
            .ok_or_else(|| eyre::eyre!("scratch file already deleted"))
    }
}

impl ScratchStore for FileScratch {
    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        let path = self.path.clone();
        let file = self.file_mut()?;
        file.seek(SeekFrom::Start(offset))
            .wrap_err_with(|| format!("seek failed on scratch file '{}'", path.display()))?;
        file.write_all(data)
            .wrap_err_with(|| format!("write failed on scratch file '{}'", path.display()))?;
        Ok(())
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let path = self.path.clone();
        let file = self.file_mut()?;
        file.seek(SeekFrom::Start(offset))
            .wrap_err_with(|| format!("seek failed on scratch file '{}'", path.display()))?;
        file.read_exact(buf)
            .wrap_err_with(|| format!("read failed on scratch file '{}'", path.display()))?;
        Ok(())
    }

    fn delete_silently(&mut self) {
        if self.file.take().is_some() {
            let _ = std::fs::remove_file(&self.path);
        }
        self.auto_delete = false;
    }
}

impl Drop for FileScratch {
    fn drop(&mut self) {
        if self.auto_delete {
            self.delete_silently();
        }
    }
}

/// In-memory scratch store for non-persistent engines and unit tests.
#[derive(Debug, Default)]
pub struct MemScratch {
    bytes: Vec<u8>,
}

impl MemScratch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl ScratchStore for MemScratch {
    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        let offset = offset as usize;
        let end = offset + data.len();
        if self.bytes.len() < end {
            self.bytes.resize(end, 0);
        }
        self.bytes[offset..end].copy_from_slice(data);
        Ok(())
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let offset = offset as usize;
        let end = offset + buf.len();
        ensure!(
            end <= self.bytes.len(),
            "read past end of scratch: {} > {}",
            end,
            self.bytes.len()
        );
        buf.copy_from_slice(&self.bytes[offset..end]);
        Ok(())
    }

    fn delete_silently(&mut self) {
        self.bytes.clear();
    }
}
