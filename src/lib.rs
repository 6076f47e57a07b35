//! # VersoDB Undo Log
//!
//! Session-scoped undo logging with adaptive memory/disk spill for the
//! VersoDB embedded relational engine. This crate implements the
//! transaction-rollback core: an ordered log of row-change records that
//! preserves perfect LIFO reversal under a hard memory budget, spilling
//! older records to an auto-deleted scratch file and rehydrating them on
//! demand.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │        Session / Executor           │  appends on write,
//! ├─────────────────────────────────────┤  pops on rollback
//! │        UndoLog  (undo)              │
//! │  ordered records, budget control,   │
//! │  spill policy, LIFO reader          │
//! ├──────────────────┬──────────────────┤
//! │  Row Codec       │  Scratch File    │
//! │  (rows)          │  (scratch)       │
//! │  length-prefixed │  append log past │
//! │  checksummed     │  a reserved      │
//! │  entry pages     │  header region   │
//! └──────────────────┴──────────────────┘
//! ```
//!
//! The log cooperates with the rest of the engine only through narrow
//! seams: the [`rows::RowCodec`] trait (encode/decode/eligibility), the
//! [`scratch::ScratchStore`]/[`scratch::ScratchAllocator`] traits
//! (absolute-offset byte I/O over auto-deleted temp files) and the
//! read-only [`session::SessionContext`] knobs.
//!
//! ## Guarantees
//!
//! - Strict LIFO: pops return records in exact reverse append order,
//!   byte-equal to what was appended, whether or not they spilled.
//! - Budgeted residency: at most `max_memory_undo` records hold their
//!   row image in memory, except for records the codec cannot
//!   round-trip (kept resident) and a bounded transient excess during
//!   rehydration.
//! - Nothing durable: scratch files are process-scoped, stamped with a
//!   throwaway header and unlinked on clear or drop. Undo data never
//!   survives the session.
//!
//! ## Quick Start
//!
//! ```ignore
//! use versodb::{SessionContext, UndoKind, UndoLog, UndoRecord};
//!
//! let mut log = UndoLog::for_session(SessionContext::default())?;
//! log.append(UndoRecord::new(UndoKind::Insert, table_ref, row))?;
//! // ... statement execution ...
//! while !log.is_empty() {
//!     let record = log.pop_last()?;
//!     // invert record.kind() against record.table_ref()
//! }
//! log.clear();
//! ```
//!
//! ## Module Overview
//!
//! - [`undo`]: `UndoLog`, `UndoRecord`, the spill/rehydrate state machine
//! - [`rows`]: entry codec (length-prefixed, CRC64-checksummed pages)
//! - [`scratch`]: scratch file stores and allocators
//! - [`session`]: per-session knobs the log consumes
//! - [`types`]: runtime `Value` representation for row images
//! - [`config`]: shared constants

pub mod config;
pub mod rows;
pub mod scratch;
pub mod session;
pub mod types;
pub mod undo;

pub use rows::{BinaryRowCodec, RowCodec, UndoEntry};
pub use scratch::{FileScratch, MemAllocator, MemScratch, ScratchAllocator, ScratchStore, TempFileAllocator};
pub use session::SessionContext;
pub use types::{RowImage, Value};
pub use undo::{TableRef, UndoKind, UndoLog, UndoRecord};
