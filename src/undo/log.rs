//! # Per-Session Undo Log
//!
//! This module implements the session undo log: an ordered collection of
//! row-change records supporting strict LIFO rollback under a hard
//! memory budget, with transparent spill to a scratch file and on-demand
//! rehydration.
//!
//! ## Memory Budget Model
//!
//! Residency is measured as a COUNT of in-memory records, matching the
//! `max_memory_undo` knob, not bytes. While the log holds at most
//! `max_memory_undo` resident records, two sanctioned excesses exist:
//!
//! - Ineligible records (the codec refuses to round-trip them) always
//!   stay resident; the budget is advisory for them.
//! - Rehydration reads back a half-budget window in one batch, so the
//!   count may transiently exceed the budget by `max_memory_undo / 2 + 1`.
//!
//! ## Spill Policy
//!
//! ```text
//! append #1..#budget          append #budget+1            later appends
//! ┌───────────────┐           ┌──────────────────┐        ┌─────────────┐
//! │ all resident  │  ──────>  │ create scratch,  │ ─────> │ spill the   │
//! │ no scratch    │           │ walk head→tail,  │        │ new tail    │
//! │               │           │ spill eligible   │        │ record only │
//! └───────────────┘           └──────────────────┘        └─────────────┘
//! ```
//!
//! The first spill walks from the head because the oldest records are
//! the least likely to be popped soon; paging them out first maximizes
//! the expected time until rehydration. Later spills only consider the
//! tail: every earlier record was already considered when it was the
//! tail.
//!
//! ## Pop and Rehydration
//!
//! Rollback pops in LIFO order and overwhelmingly touches adjacent
//! records next, so when the tail is stored, pop rehydrates the window
//! `[i - max_memory_undo/2, i]` in one pass, amortizing scratch reads
//! over the following pops. The append cursor is then placed at the end
//! of the last image read; only tail records are ever spilled after the
//! first batch and the window read them all, so no live image lies past
//! the cursor.
//!
//! ## Failure Semantics
//!
//! Codec and scratch I/O errors surface synchronously; the record being
//! spilled or rehydrated keeps its previous residency state and the
//! resident count is untouched. No retries happen internally.
//!
//! ## Lifecycle
//!
//! Created bound to one session, grown as statements execute, fully
//! consumed by rollback or cleared on commit. `clear` deletes the
//! scratch file (errors swallowed) and is idempotent. Undo data never
//! survives the process.
//!
//! ## Thread Safety
//!
//! Not thread-safe by design: one session owns its log exclusively and
//! drives it from a single actor. There is no internal locking.

use eyre::{bail, ensure, Result, WrapErr};
use tracing::{debug, trace};

use crate::rows::{BinaryRowCodec, RowCodec};
use crate::scratch::{ScratchAllocator, ScratchStore, TempFileAllocator};
use crate::session::SessionContext;

use super::record::UndoRecord;

/// Ordered collection of undo records with budgeted memory residency.
///
/// Records are index-addressed and removed only at the tail, so indices
/// are stable for the lifetime of a record.
pub struct UndoLog<C: RowCodec, A: ScratchAllocator> {
    ctx: SessionContext,
    codec: C,
    alloc: A,
    records: Vec<UndoRecord>,
    resident: usize,
    scratch: Option<A::Store>,
    cursor: u64,
    page_buf: Option<Vec<u8>>,
}

impl UndoLog<BinaryRowCodec, TempFileAllocator> {
    /// The standard configuration: binary codec, temp-dir scratch files.
    pub fn for_session(ctx: SessionContext) -> Result<Self> {
        Ok(Self::new(ctx, BinaryRowCodec, TempFileAllocator::new()?))
    }
}

impl<C: RowCodec, A: ScratchAllocator> UndoLog<C, A> {
    pub fn new(ctx: SessionContext, codec: C, alloc: A) -> Self {
        Self {
            ctx,
            codec,
            alloc,
            records: Vec::new(),
            resident: 0,
            scratch: None,
            cursor: 0,
            page_buf: None,
        }
    }

    /// Appends a record and enforces the memory budget.
    ///
    /// The record is always accepted; if the resident count now exceeds
    /// `max_memory_undo` on a persistent engine, eligible records are
    /// spilled to the scratch file (all of them on the first spill, only
    /// the new tail afterwards).
    pub fn append(&mut self, record: UndoRecord) -> Result<()> {
        self.records.push(record);
        self.resident += 1;

        if self.resident <= self.ctx.max_memory_undo || !self.ctx.persistent {
            return Ok(());
        }

        if self.scratch.is_none() {
            let scratch = self
                .alloc
                .create_scratch()
                .wrap_err("failed to allocate undo scratch file")?;
            debug!(
                records = self.records.len(),
                budget = self.ctx.max_memory_undo,
                "undo budget exceeded, spilling to scratch"
            );
            self.scratch = Some(scratch);
            self.cursor = self.ctx.scratch_header_len as u64;
            self.page_buf = Some(self.codec.create_page(self.ctx.page_size));

            for idx in 0..self.records.len() {
                self.spill_attempt(idx)?;
            }
        } else {
            let tail = self.records.len() - 1;
            self.spill_attempt(tail)?;
        }
        Ok(())
    }

    /// Removes and returns the most recently appended record, always
    /// memory-resident. Errors on an empty log.
    ///
    /// When the tail record is stored, a contiguous window of stored
    /// records ending at the tail is rehydrated first; the transient
    /// resident-count excess is bounded by `max_memory_undo / 2 + 1`.
    pub fn pop_last(&mut self) -> Result<UndoRecord> {
        ensure!(!self.records.is_empty(), "pop from empty undo log");

        let i = self.records.len() - 1;
        if self.records[i].is_stored() {
            self.rehydrate_window(i)?;
        }

        match self.records.pop() {
            Some(record) => {
                self.resident -= 1;
                debug_assert!(!record.is_stored());
                Ok(record)
            }
            None => bail!("pop from empty undo log"),
        }
    }

    /// Number of records in the log, resident or stored.
    pub fn size(&self) -> usize {
        debug_assert!(
            self.resident <= self.records.len(),
            "resident count {} exceeds record count {}",
            self.resident,
            self.records.len()
        );
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of records currently holding an in-memory row image.
    pub fn resident_count(&self) -> usize {
        self.resident
    }

    /// True once a record has ever spilled, until `clear`.
    pub fn is_spilled(&self) -> bool {
        self.scratch.is_some()
    }

    /// Drops all records and deletes the scratch file, ignoring deletion
    /// errors; `clear` is invoked from cleanup paths. Idempotent.
    pub fn clear(&mut self) {
        self.records.clear();
        self.resident = 0;
        self.cursor = 0;
        self.page_buf = None;
        if let Some(mut scratch) = self.scratch.take() {
            scratch.delete_silently();
            debug!("undo log cleared, scratch file deleted");
        }
    }

    /// Spills the record at `idx` if it is not already stored and the
    /// codec can round-trip it. Ineligible records stay resident.
    fn spill_attempt(&mut self, idx: usize) -> Result<()> {
        let (Some(scratch), Some(buf)) = (self.scratch.as_mut(), self.page_buf.as_mut()) else {
            bail!("spill attempted without a scratch file");
        };

        let record = &mut self.records[idx];
        let Some(row) = record.row() else {
            return Ok(());
        };
        if !self.codec.can_encode(row) {
            return Ok(());
        }

        let end = record.spill(&self.codec, buf, scratch, self.cursor)?;
        trace!(idx, offset = self.cursor, len = end - self.cursor, "spilled undo record");
        self.cursor = end;
        self.resident -= 1;
        Ok(())
    }

    /// Rehydrates every stored record in `[i - budget/2, i]` and places
    /// the append cursor at the end of the last image read.
    fn rehydrate_window(&mut self, i: usize) -> Result<()> {
        let start = i.saturating_sub(self.ctx.max_memory_undo / 2);
        let (Some(scratch), Some(buf)) = (self.scratch.as_mut(), self.page_buf.as_mut()) else {
            bail!("stored undo record without a scratch file");
        };

        let mut restored = 0usize;
        let mut last_end = None;
        for j in start..=i {
            let record = &mut self.records[j];
            if !record.is_stored() {
                continue;
            }
            let end = record.rehydrate(&self.codec, buf, scratch, &self.ctx)?;
            self.resident += 1;
            restored += 1;
            last_end = Some(end);
        }

        // Stored images sit in the file in record-index order and the
        // window read every stored record up to the tail, so no live
        // image lies at or past `last_end`; subsequent appends may
        // reuse that region.
        if let Some(end) = last_end {
            self.cursor = end;
        }

        trace!(window_start = start, tail = i, restored, "rehydrated undo window");
        Ok(())
    }
}
