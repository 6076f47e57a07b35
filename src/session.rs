//! # Session Context
//!
//! The undo log borrows a handful of engine/session knobs for the duration
//! of each call. `SessionContext` is the narrow, read-only view of those
//! knobs: the embedding engine constructs one per session and hands the
//! log a reference.
//!
//! ## Budget Semantics
//!
//! `max_memory_undo` is a record COUNT, not a byte budget. Callers must
//! size it against expected row sizes. The count may be exceeded by
//! ineligible records (which refuse to spill) and transiently during
//! rehydration, bounded by `max_memory_undo / 2 + 1`.

use crate::config::{DEFAULT_CODEC_PAGE_SIZE, DEFAULT_MAX_MEMORY_UNDO, SCRATCH_HEADER_SIZE};

/// Read-only engine/session knobs consumed by the undo log.
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// Number of undo records kept memory-resident before spilling.
    pub max_memory_undo: usize,
    /// Whether the engine is persistent. Non-persistent engines never
    /// spill: undo data stays in memory regardless of record count.
    pub persistent: bool,
    /// Initial size of the reusable codec buffer, in bytes.
    pub page_size: usize,
    /// Reserved region at the start of the scratch file. Must match the
    /// header region the scratch store stamps on creation.
    pub scratch_header_len: usize,
}

impl SessionContext {
    pub fn new(max_memory_undo: usize, persistent: bool) -> Self {
        Self {
            max_memory_undo,
            persistent,
            page_size: DEFAULT_CODEC_PAGE_SIZE,
            scratch_header_len: SCRATCH_HEADER_SIZE,
        }
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MEMORY_UNDO, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_config_constants() {
        let ctx = SessionContext::default();
        assert_eq!(ctx.max_memory_undo, DEFAULT_MAX_MEMORY_UNDO);
        assert!(ctx.persistent);
        assert_eq!(ctx.page_size, DEFAULT_CODEC_PAGE_SIZE);
        assert_eq!(ctx.scratch_header_len, SCRATCH_HEADER_SIZE);
    }
}
