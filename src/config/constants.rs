//! # VersoDB Undo Configuration Constants
//!
//! This module centralizes the constants shared between the undo log, the
//! scratch file layout and the row codec. Constants that depend on each
//! other are co-located to prevent mismatch bugs.
//!
//! ## Dependency Graph
//!
//! ```text
//! SCRATCH_HEADER_SIZE (64 bytes)
//!       │
//!       ├─> ScratchHeader struct (must fit, checked at compile time)
//!       │
//!       └─> First spill offset: the undo log positions its append
//!           cursor at SCRATCH_HEADER_SIZE when the scratch file is
//!           created, so record images never overlap the header.
//!
//! DEFAULT_CODEC_PAGE_SIZE (4096 bytes)
//!       │
//!       └─> Initial capacity of the reusable encode/decode buffer.
//!           Entries larger than this grow the buffer; it never shrinks
//!           for the lifetime of the scratch file.
//!
//! DEFAULT_MAX_MEMORY_UNDO (50,000 records)
//!       │
//!       └─> Rehydration window: pop reads back up to
//!           DEFAULT_MAX_MEMORY_UNDO / 2 + 1 stored records in one batch.
//! ```
//!
//! ## Modifying Constants
//!
//! `SCRATCH_HEADER_SIZE` and `SCRATCH_MAGIC` are baked into every scratch
//! file header. Scratch files never outlive the process, so both may be
//! changed freely between releases.

/// Magic bytes stamped at offset 0 of every scratch file.
pub const SCRATCH_MAGIC: &[u8; 16] = b"Verso Scratch\x00\x00\x00";

/// Scratch file format version.
pub const SCRATCH_VERSION: u32 = 1;

/// Size of the reserved header region at the start of a scratch file.
/// Record images are appended strictly after this region.
pub const SCRATCH_HEADER_SIZE: usize = 64;

/// Initial capacity of the reusable codec buffer, in bytes.
/// Sized for typical rows; oversized rows grow the buffer on demand.
pub const DEFAULT_CODEC_PAGE_SIZE: usize = 4096;

/// Default number of undo records kept in memory before spilling.
/// This is a record count, not a byte budget; callers must size it
/// against expected row sizes.
pub const DEFAULT_MAX_MEMORY_UNDO: usize = 50_000;

const _: () = assert!(
    SCRATCH_HEADER_SIZE >= 16 + 4 + 4 + 8,
    "SCRATCH_HEADER_SIZE must fit magic, version, pid and reserved fields"
);

const _: () = assert!(
    DEFAULT_CODEC_PAGE_SIZE > 0,
    "codec buffer must have a nonzero initial capacity"
);
