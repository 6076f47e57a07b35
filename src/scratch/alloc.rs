//! # Scratch Allocation
//!
//! The undo log allocates its scratch file lazily, on the first spill.
//! `ScratchAllocator` is the seam between the log and the engine's temp
//! file management: the production allocator hands out uniquely named
//! files in a session scratch directory, while tests can swap in the
//! in-memory allocator and never touch the filesystem.

use std::path::{Path, PathBuf};

use eyre::{Result, WrapErr};
use tempfile::TempDir;

use super::file::{FileScratch, MemScratch, ScratchStore};

/// Hands out fresh scratch stores for the undo log.
pub trait ScratchAllocator {
    type Store: ScratchStore;

    fn create_scratch(&mut self) -> Result<Self::Store>;
}

/// Allocates `*.undo` scratch files in a scratch directory.
///
/// By default the directory is an owned temp dir removed when the
/// allocator drops; `in_dir` targets an engine-managed directory
/// instead (files are still unlinked individually by their stores).
#[derive(Debug)]
pub struct TempFileAllocator {
    dir: PathBuf,
    _owned: Option<TempDir>,
    next_seq: u64,
}

impl TempFileAllocator {
    pub fn new() -> Result<Self> {
        let owned = tempfile::Builder::new()
            .prefix("versodb-undo-")
            .tempdir()
            .wrap_err("failed to create undo scratch directory")?;
        Ok(Self {
            dir: owned.path().to_path_buf(),
            _owned: Some(owned),
            next_seq: 0,
        })
    }

    pub fn in_dir<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            _owned: None,
            next_seq: 0,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ScratchAllocator for TempFileAllocator {
    type Store = FileScratch;

    fn create_scratch(&mut self) -> Result<FileScratch> {
        let seq = self.next_seq;
        self.next_seq += 1;
        let path = self
            .dir
            .join(format!("undo_{}_{:06}.undo", std::process::id(), seq));
        FileScratch::create(path)
    }
}

/// Allocates in-memory scratch stores. Test seam.
#[derive(Debug, Default)]
pub struct MemAllocator;

impl ScratchAllocator for MemAllocator {
    type Store = MemScratch;

    fn create_scratch(&mut self) -> Result<MemScratch> {
        Ok(MemScratch::new())
    }
}
