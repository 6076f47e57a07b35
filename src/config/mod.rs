//! Configuration constants for the undo subsystem.

mod constants;

pub use constants::{
    DEFAULT_CODEC_PAGE_SIZE, DEFAULT_MAX_MEMORY_UNDO, SCRATCH_HEADER_SIZE, SCRATCH_MAGIC,
    SCRATCH_VERSION,
};
