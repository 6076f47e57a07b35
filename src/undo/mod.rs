//! # Undo Subsystem
//!
//! Per-session undo logging for transactional rollback. Each session
//! keeps one `UndoLog`; every row-level change appends an `UndoRecord`
//! describing how to invert it, and rollback pops records in strict
//! LIFO order.
//!
//! The log holds records in memory up to the session's `max_memory_undo`
//! budget, then transparently spills the oldest eligible images to a
//! session-scoped scratch file and reads them back in windows as
//! rollback approaches them. See `log` for the spill policy and `record`
//! for the per-record residency state machine.

mod log;
mod record;

/// Opaque identifier of the table a record targets. The log never
/// interprets it; the embedding engine maps it back to a table.
pub type TableRef = u64;

pub use log::UndoLog;
pub use record::{UndoKind, UndoRecord};
