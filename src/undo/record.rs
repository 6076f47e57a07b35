//! # Undo Record
//!
//! One logical undo entry: the change kind, the target table and the row
//! image at the moment of logging. A record's image is either memory
//! resident or stored in the scratch file, never both.
//!
//! ## Residency State Machine
//!
//! ```text
//! append() ──> MEM ──spill──> DISK
//!               ^               │
//!               └──rehydrate────┘
//!
//! Terminal: removed from the log (pop consumption or clear).
//! ```
//!
//! MEM → DISK requires eligibility (the codec must be able to round-trip
//! the row byte-exactly; see `RowCodec::can_encode`). DISK → MEM happens
//! in a batch during `UndoLog::pop_last` when the tail record is stored.
//!
//! State only advances after the scratch write or read succeeds: a
//! failed spill leaves the record memory-resident, a failed rehydration
//! leaves it stored.

use eyre::{bail, ensure, Result};

use crate::rows::RowCodec;
use crate::scratch::ScratchStore;
use crate::session::SessionContext;
use crate::types::{RowImage, Value};

use super::TableRef;

/// How to invert the logged change during rollback.
///
/// `UpdateOld`/`UpdateNew` are logged as a pair: the old image to
/// restore and the new image to remove.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndoKind {
    Insert,
    Delete,
    UpdateOld,
    UpdateNew,
}

impl UndoKind {
    pub fn as_u8(self) -> u8 {
        match self {
            UndoKind::Insert => 0,
            UndoKind::Delete => 1,
            UndoKind::UpdateOld => 2,
            UndoKind::UpdateNew => 3,
        }
    }

    pub fn from_u8(raw: u8) -> Result<Self> {
        match raw {
            0 => Ok(UndoKind::Insert),
            1 => Ok(UndoKind::Delete),
            2 => Ok(UndoKind::UpdateOld),
            3 => Ok(UndoKind::UpdateNew),
            _ => bail!("invalid undo kind byte: 0x{:02X}", raw),
        }
    }
}

#[derive(Debug)]
enum Residency {
    Mem(RowImage),
    Disk { offset: u64, len: u32 },
}

/// One row-level change, sufficient to invert it.
#[derive(Debug)]
pub struct UndoRecord {
    kind: UndoKind,
    table_ref: TableRef,
    state: Residency,
}

impl UndoRecord {
    pub fn new(kind: UndoKind, table_ref: TableRef, row: RowImage) -> Self {
        Self {
            kind,
            table_ref,
            state: Residency::Mem(row),
        }
    }

    pub fn kind(&self) -> UndoKind {
        self.kind
    }

    pub fn table_ref(&self) -> TableRef {
        self.table_ref
    }

    /// True iff the row image lives in the scratch file.
    pub fn is_stored(&self) -> bool {
        matches!(self.state, Residency::Disk { .. })
    }

    /// The in-memory row image, or `None` while stored.
    pub fn row(&self) -> Option<&[Value<'static>]> {
        match &self.state {
            Residency::Mem(row) => Some(row),
            Residency::Disk { .. } => None,
        }
    }

    /// Consumes the record. Errors if the image is still on disk; a
    /// record returned by `pop_last` is always memory-resident.
    pub fn into_parts(self) -> Result<(UndoKind, TableRef, RowImage)> {
        match self.state {
            Residency::Mem(row) => Ok((self.kind, self.table_ref, row)),
            Residency::Disk { .. } => bail!("undo record image is still on disk"),
        }
    }

    /// Serializes the image into `buf` and appends it to the scratch
    /// store at `offset`. On success the in-memory image is dropped and
    /// the record transitions to DISK. Returns the end offset of the
    /// written image.
    pub(crate) fn spill<C: RowCodec, S: ScratchStore>(
        &mut self,
        codec: &C,
        buf: &mut Vec<u8>,
        scratch: &mut S,
        offset: u64,
    ) -> Result<u64> {
        let Residency::Mem(row) = &self.state else {
            bail!("undo record is already stored");
        };
        codec.encode_into(buf, self.kind, self.table_ref, row)?;
        scratch.write_at(offset, buf)?;

        let len = buf.len() as u32;
        self.state = Residency::Disk { offset, len };
        Ok(offset + u64::from(len))
    }

    /// Reads the stored image back from the scratch store, decodes it
    /// and reattaches it in memory. Returns the end offset of the image
    /// just read.
    pub(crate) fn rehydrate<C: RowCodec, S: ScratchStore>(
        &mut self,
        codec: &C,
        buf: &mut Vec<u8>,
        scratch: &mut S,
        ctx: &SessionContext,
    ) -> Result<u64> {
        let Residency::Disk { offset, len } = self.state else {
            bail!("undo record is not stored");
        };
        let len = len as usize;

        buf.clear();
        buf.resize(len, 0);
        scratch.read_at(offset, buf)?;

        ensure!(
            codec.serialized_length(buf)? == len,
            "stored undo image length does not match record bookkeeping"
        );
        let entry = codec.decode(buf, ctx)?;
        ensure!(
            entry.kind == self.kind && entry.table_ref == self.table_ref,
            "stored undo image does not match its record"
        );

        self.state = Residency::Mem(entry.row);
        Ok(offset + len as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rows::BinaryRowCodec;
    use crate::scratch::MemScratch;
    use smallvec::smallvec;
    use std::borrow::Cow;

    fn sample_row() -> RowImage {
        smallvec![
            Value::Int(7),
            Value::Text(Cow::Owned("seven".to_string())),
            Value::Null,
        ]
    }

    #[test]
    fn undo_kind_roundtrip() {
        for kind in [
            UndoKind::Insert,
            UndoKind::Delete,
            UndoKind::UpdateOld,
            UndoKind::UpdateNew,
        ] {
            assert_eq!(UndoKind::from_u8(kind.as_u8()).unwrap(), kind);
        }
        assert!(UndoKind::from_u8(99).is_err());
    }

    #[test]
    fn new_record_is_memory_resident() {
        let record = UndoRecord::new(UndoKind::Insert, 5, sample_row());
        assert!(!record.is_stored());
        assert_eq!(record.row().unwrap().len(), 3);
    }

    #[test]
    fn spill_then_rehydrate_restores_image() {
        let codec = BinaryRowCodec;
        let ctx = SessionContext::default();
        let mut scratch = MemScratch::new();
        let mut buf = codec.create_page(256);

        let mut record = UndoRecord::new(UndoKind::Delete, 9, sample_row());
        let end = record.spill(&codec, &mut buf, &mut scratch, 64).unwrap();
        assert!(record.is_stored());
        assert!(record.row().is_none());
        assert!(end > 64);

        let read_end = record
            .rehydrate(&codec, &mut buf, &mut scratch, &ctx)
            .unwrap();
        assert_eq!(read_end, end);
        assert!(!record.is_stored());
        assert_eq!(record.row().unwrap(), sample_row().as_slice());
    }

    #[test]
    fn double_spill_is_an_error() {
        let codec = BinaryRowCodec;
        let mut scratch = MemScratch::new();
        let mut buf = codec.create_page(256);

        let mut record = UndoRecord::new(UndoKind::Insert, 1, sample_row());
        record.spill(&codec, &mut buf, &mut scratch, 0).unwrap();
        assert!(record.spill(&codec, &mut buf, &mut scratch, 0).is_err());
    }

    #[test]
    fn rehydrate_of_resident_record_is_an_error() {
        let codec = BinaryRowCodec;
        let ctx = SessionContext::default();
        let mut scratch = MemScratch::new();
        let mut buf = codec.create_page(256);

        let mut record = UndoRecord::new(UndoKind::Insert, 1, sample_row());
        assert!(record
            .rehydrate(&codec, &mut buf, &mut scratch, &ctx)
            .is_err());
    }

    #[test]
    fn failed_spill_leaves_record_resident() {
        let codec = BinaryRowCodec;
        let mut scratch = MemScratch::new();
        let mut buf = codec.create_page(256);

        let row: RowImage = smallvec![Value::Stream { handle: 3 }];
        let mut record = UndoRecord::new(UndoKind::Insert, 1, row);
        assert!(record.spill(&codec, &mut buf, &mut scratch, 0).is_err());
        assert!(!record.is_stored());
        assert!(record.row().is_some());
    }

    #[test]
    fn into_parts_requires_resident_image() {
        let codec = BinaryRowCodec;
        let mut scratch = MemScratch::new();
        let mut buf = codec.create_page(256);

        let mut record = UndoRecord::new(UndoKind::Delete, 2, sample_row());
        record.spill(&codec, &mut buf, &mut scratch, 0).unwrap();
        assert!(record.into_parts().is_err());

        let record = UndoRecord::new(UndoKind::Delete, 2, sample_row());
        let (kind, table_ref, row) = record.into_parts().unwrap();
        assert_eq!(kind, UndoKind::Delete);
        assert_eq!(table_ref, 2);
        assert_eq!(row, sample_row());
    }
}
