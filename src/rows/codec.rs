//! # Undo Entry Codec
//!
//! This module serializes undo records into self-describing binary pages
//! for the scratch file. Each entry carries its own length prefix and a
//! trailing checksum so a stored image can be sized without decoding and
//! validated on the way back in.
//!
//! ## Entry Format
//!
//! ```text
//! Entry := [total_len: u32] [kind: u8] [table_ref: u64] [col_count: u16]
//!          [Column]* [checksum: u64]
//! Column := [discriminant: u8] [data...]
//!
//! Discriminants:
//!   0x01 = NULL (no data)
//!   0x10 = NEG_INFINITY (no data, deserializes to Float)
//!   0x12 = NEG_INT (8 bytes big-endian i64)
//!   0x13 = NEG_FLOAT (8 bytes f64 bits)
//!   0x14 = ZERO (no data, deserializes to Int(0))
//!   0x15 = POS_FLOAT (8 bytes f64 bits)
//!   0x16 = POS_INT (8 bytes big-endian i64)
//!   0x18 = POS_INFINITY (no data, deserializes to Float)
//!   0x19 = NAN (8 bytes f64 bits, payload preserved)
//!   0x20 = TEXT ([len: u32] [utf8_bytes])
//!   0x21 = BLOB ([len: u32] [bytes])
//!   0x30 = LOB (8 + 8 bytes: id + byte_len)
//! ```
//!
//! `total_len` covers the entire entry including the prefix and checksum.
//! The checksum is CRC64 (ECMA-182) over everything before it. A mismatch
//! on decode means the scratch image is corrupt and is fatal to the
//! enclosing transaction.
//!
//! ## Eligibility
//!
//! `Stream` values wrap session-local handles that are meaningless after
//! serialization, so they have no discriminant. `can_encode` is the
//! predicate the undo log consults before spilling; `encode_into` on a
//! stream-bearing row is an error.
//!
//! ## Buffer Reuse
//!
//! `encode_into`/`decode` operate on a caller-owned buffer created by
//! `create_page`. The undo log reuses one buffer across every spill and
//! rehydration; its contents are not valid across operations.

use crate::session::SessionContext;
use crate::types::{RowImage, Value};
use crate::undo::{TableRef, UndoKind};
use crc::{Crc, CRC_64_ECMA_182};
use eyre::{bail, ensure, Result};
use std::borrow::Cow;

const CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_ECMA_182);

/// Length prefix + kind + table_ref + col_count.
const ENTRY_HEADER_SIZE: usize = 4 + 1 + 8 + 2;

/// Smallest possible entry: header plus checksum, zero columns.
const MIN_ENTRY_SIZE: usize = ENTRY_HEADER_SIZE + 8;

mod discriminant {
    pub const NULL: u8 = 0x01;

    pub const NEG_INFINITY: u8 = 0x10;
    pub const NEG_INT: u8 = 0x12;
    pub const NEG_FLOAT: u8 = 0x13;
    pub const ZERO: u8 = 0x14;
    pub const POS_FLOAT: u8 = 0x15;
    pub const POS_INT: u8 = 0x16;
    pub const POS_INFINITY: u8 = 0x18;
    pub const NAN: u8 = 0x19;

    pub const TEXT: u8 = 0x20;
    pub const BLOB: u8 = 0x21;

    pub const LOB: u8 = 0x30;
}

/// One decoded undo entry: the change kind, the target table and the
/// row image at the moment of logging.
#[derive(Debug, Clone, PartialEq)]
pub struct UndoEntry {
    pub kind: UndoKind,
    pub table_ref: TableRef,
    pub row: RowImage,
}

/// Encodes and decodes undo entries for scratch storage.
///
/// The eligibility predicate lives here rather than on the record so row
/// images remain plain data.
pub trait RowCodec {
    /// Allocates a reusable encode/decode buffer of the given capacity.
    fn create_page(&self, size: usize) -> Vec<u8>;

    /// Serializes one entry into `buf`, replacing its contents.
    fn encode_into(
        &self,
        buf: &mut Vec<u8>,
        kind: UndoKind,
        table_ref: TableRef,
        row: &[Value<'_>],
    ) -> Result<()>;

    /// Decodes one entry from `bytes`, validating length and checksum.
    fn decode(&self, bytes: &[u8], ctx: &SessionContext) -> Result<UndoEntry>;

    /// True iff every value in `row` survives a round-trip byte-exactly.
    fn can_encode(&self, row: &[Value<'_>]) -> bool;

    /// Reads the entry length from its prefix without decoding.
    fn serialized_length(&self, bytes: &[u8]) -> Result<usize>;
}

/// The standard length-prefixed, checksummed binary codec.
#[derive(Debug, Default, Clone, Copy)]
pub struct BinaryRowCodec;

impl RowCodec for BinaryRowCodec {
    fn create_page(&self, size: usize) -> Vec<u8> {
        Vec::with_capacity(size)
    }

    fn encode_into(
        &self,
        buf: &mut Vec<u8>,
        kind: UndoKind,
        table_ref: TableRef,
        row: &[Value<'_>],
    ) -> Result<()> {
        buf.clear();
        buf.extend_from_slice(&[0u8; 4]);
        buf.push(kind.as_u8());
        buf.extend_from_slice(&table_ref.to_le_bytes());
        buf.extend_from_slice(&(row.len() as u16).to_be_bytes());

        for value in row {
            encode_value_into(value, buf)?;
        }

        let total_len = (buf.len() + 8) as u32;
        buf[0..4].copy_from_slice(&total_len.to_le_bytes());

        let checksum = CRC64.checksum(buf);
        buf.extend_from_slice(&checksum.to_le_bytes());
        Ok(())
    }

    fn decode(&self, bytes: &[u8], _ctx: &SessionContext) -> Result<UndoEntry> {
        ensure!(
            bytes.len() >= MIN_ENTRY_SIZE,
            "undo entry too small: {} < {}",
            bytes.len(),
            MIN_ENTRY_SIZE
        );

        let total_len =
            u32::from_le_bytes(bytes[0..4].try_into().unwrap()) as usize; // INVARIANT: length validated by ensure above
        ensure!(
            bytes.len() >= total_len && total_len >= MIN_ENTRY_SIZE,
            "undo entry truncated: have {} bytes, prefix says {}",
            bytes.len(),
            total_len
        );

        let crc_start = total_len - 8;
        let stored = u64::from_le_bytes(bytes[crc_start..total_len].try_into().unwrap()); // INVARIANT: total_len validated above
        let computed = CRC64.checksum(&bytes[..crc_start]);
        ensure!(
            stored == computed,
            "undo entry checksum mismatch: stored {:016x}, computed {:016x}",
            stored,
            computed
        );

        let kind = UndoKind::from_u8(bytes[4])?;
        let table_ref = u64::from_le_bytes(bytes[5..13].try_into().unwrap()); // INVARIANT: MIN_ENTRY_SIZE covers the header
        let col_count = u16::from_be_bytes(bytes[13..15].try_into().unwrap()) as usize; // INVARIANT: MIN_ENTRY_SIZE covers the header

        let mut row = RowImage::new();
        row.reserve(col_count);
        let mut offset = ENTRY_HEADER_SIZE;
        for _ in 0..col_count {
            let value = decode_value(&bytes[..crc_start], &mut offset)?;
            row.push(value);
        }
        ensure!(
            offset == crc_start,
            "undo entry has {} trailing bytes after last column",
            crc_start - offset
        );

        Ok(UndoEntry {
            kind,
            table_ref,
            row,
        })
    }

    fn can_encode(&self, row: &[Value<'_>]) -> bool {
        row.iter().all(Value::is_storable)
    }

    fn serialized_length(&self, bytes: &[u8]) -> Result<usize> {
        ensure!(bytes.len() >= 4, "undo entry too small for length prefix");
        Ok(u32::from_le_bytes(bytes[0..4].try_into().unwrap()) as usize) // INVARIANT: length validated by ensure above
    }
}

fn encode_value_into(value: &Value<'_>, buf: &mut Vec<u8>) -> Result<()> {
    match value {
        Value::Null => {
            buf.push(discriminant::NULL);
        }
        Value::Int(i) => {
            if *i < 0 {
                buf.push(discriminant::NEG_INT);
                buf.extend_from_slice(&i.to_be_bytes());
            } else if *i == 0 {
                buf.push(discriminant::ZERO);
            } else {
                buf.push(discriminant::POS_INT);
                buf.extend_from_slice(&i.to_be_bytes());
            }
        }
        Value::Float(f) => {
            if f.is_nan() {
                buf.push(discriminant::NAN);
                buf.extend_from_slice(&f.to_bits().to_be_bytes());
            } else if *f == f64::NEG_INFINITY {
                buf.push(discriminant::NEG_INFINITY);
            } else if *f == f64::INFINITY {
                buf.push(discriminant::POS_INFINITY);
            } else if *f < 0.0 {
                buf.push(discriminant::NEG_FLOAT);
                buf.extend_from_slice(&f.to_bits().to_be_bytes());
            } else {
                buf.push(discriminant::POS_FLOAT);
                buf.extend_from_slice(&f.to_bits().to_be_bytes());
            }
        }
        Value::Text(s) => {
            buf.push(discriminant::TEXT);
            let bytes = s.as_bytes();
            buf.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
            buf.extend_from_slice(bytes);
        }
        Value::Blob(b) => {
            buf.push(discriminant::BLOB);
            buf.extend_from_slice(&(b.len() as u32).to_be_bytes());
            buf.extend_from_slice(b);
        }
        Value::Lob { id, byte_len } => {
            buf.push(discriminant::LOB);
            buf.extend_from_slice(&id.to_be_bytes());
            buf.extend_from_slice(&byte_len.to_be_bytes());
        }
        Value::Stream { handle } => {
            bail!("cannot encode transient stream value (handle {})", handle);
        }
    }
    Ok(())
}

fn decode_value(data: &[u8], offset: &mut usize) -> Result<Value<'static>> {
    ensure!(data.len() > *offset, "truncated row: missing discriminant");

    let disc = data[*offset];
    *offset += 1;

    match disc {
        discriminant::NULL => Ok(Value::Null),

        discriminant::ZERO => Ok(Value::Int(0)),

        discriminant::NEG_INT | discriminant::POS_INT => {
            ensure!(data.len() >= *offset + 8, "truncated int");
            let bytes: [u8; 8] = data[*offset..*offset + 8].try_into().unwrap();
            *offset += 8;
            Ok(Value::Int(i64::from_be_bytes(bytes)))
        }

        discriminant::NEG_INFINITY => Ok(Value::Float(f64::NEG_INFINITY)),

        discriminant::POS_INFINITY => Ok(Value::Float(f64::INFINITY)),

        discriminant::NEG_FLOAT | discriminant::POS_FLOAT | discriminant::NAN => {
            ensure!(data.len() >= *offset + 8, "truncated float");
            let bytes: [u8; 8] = data[*offset..*offset + 8].try_into().unwrap();
            *offset += 8;
            Ok(Value::Float(f64::from_bits(u64::from_be_bytes(bytes))))
        }

        discriminant::TEXT => {
            ensure!(data.len() >= *offset + 4, "truncated text length");
            let len = u32::from_be_bytes(data[*offset..*offset + 4].try_into().unwrap()) as usize;
            *offset += 4;
            ensure!(data.len() >= *offset + len, "truncated text data");
            let s = std::str::from_utf8(&data[*offset..*offset + len])?;
            *offset += len;
            Ok(Value::Text(Cow::Owned(s.to_string())))
        }

        discriminant::BLOB => {
            ensure!(data.len() >= *offset + 4, "truncated blob length");
            let len = u32::from_be_bytes(data[*offset..*offset + 4].try_into().unwrap()) as usize;
            *offset += 4;
            ensure!(data.len() >= *offset + len, "truncated blob data");
            let b = data[*offset..*offset + len].to_vec();
            *offset += len;
            Ok(Value::Blob(Cow::Owned(b)))
        }

        discriminant::LOB => {
            ensure!(data.len() >= *offset + 16, "truncated lob reference");
            let id = u64::from_be_bytes(data[*offset..*offset + 8].try_into().unwrap());
            *offset += 8;
            let byte_len = u64::from_be_bytes(data[*offset..*offset + 8].try_into().unwrap());
            *offset += 8;
            Ok(Value::Lob { id, byte_len })
        }

        _ => bail!("unknown discriminant: 0x{:02X}", disc),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    const SMALL_PAGE_CAPACITY: usize = 512;

    fn ctx() -> SessionContext {
        SessionContext::default()
    }

    fn roundtrip(kind: UndoKind, table_ref: TableRef, row: &[Value<'_>]) -> UndoEntry {
        let codec = BinaryRowCodec;
        let mut buf = codec.create_page(256);
        codec.encode_into(&mut buf, kind, table_ref, row).unwrap();
        codec.decode(&buf, &ctx()).unwrap()
    }

    #[test]
    fn roundtrip_mixed_row() {
        let row: RowImage = smallvec![
            Value::Int(123),
            Value::Text(Cow::Owned("hello".to_string())),
            Value::Float(3.14),
            Value::Null,
            Value::Blob(Cow::Owned(vec![1, 2, 3, 4])),
        ];

        let entry = roundtrip(UndoKind::Delete, 42, &row);
        assert_eq!(entry.kind, UndoKind::Delete);
        assert_eq!(entry.table_ref, 42);
        assert_eq!(entry.row.as_slice(), row.as_slice());
    }

    #[test]
    fn roundtrip_negative_and_zero_int() {
        let row: RowImage = smallvec![Value::Int(-123456), Value::Int(0)];
        let entry = roundtrip(UndoKind::Insert, 1, &row);
        assert_eq!(entry.row[0], Value::Int(-123456));
        assert_eq!(entry.row[1], Value::Int(0));
    }

    #[test]
    fn roundtrip_float_specials() {
        let row: RowImage = smallvec![
            Value::Float(f64::INFINITY),
            Value::Float(f64::NEG_INFINITY),
            Value::Float(-2.5),
            Value::Float(0.0),
        ];
        let entry = roundtrip(UndoKind::UpdateOld, 9, &row);
        assert_eq!(entry.row[0], Value::Float(f64::INFINITY));
        assert_eq!(entry.row[1], Value::Float(f64::NEG_INFINITY));
        assert_eq!(entry.row[2], Value::Float(-2.5));
        assert_eq!(entry.row[3], Value::Float(0.0));
    }

    #[test]
    fn nan_payload_bits_roundtrip_exactly() {
        let nans = [
            f64::NAN,
            f64::from_bits(0x7ff8000000000001),
            f64::from_bits(0x7ff0000000000001),
            f64::from_bits(0xfff8000000000123),
        ];
        let row: RowImage = nans.iter().map(|f| Value::Float(*f)).collect();

        let entry = roundtrip(UndoKind::UpdateNew, 9, &row);
        for (got, want) in entry.row.iter().zip(nans) {
            match got {
                Value::Float(f) => assert_eq!(f.to_bits(), want.to_bits()),
                _ => panic!("expected Float"),
            }
        }
    }

    #[test]
    fn roundtrip_lob_reference() {
        let row: RowImage = smallvec![Value::Lob {
            id: 77,
            byte_len: 1 << 30,
        }];
        let entry = roundtrip(UndoKind::Delete, 3, &row);
        assert_eq!(
            entry.row[0],
            Value::Lob {
                id: 77,
                byte_len: 1 << 30
            }
        );
    }

    #[test]
    fn roundtrip_empty_row() {
        let entry = roundtrip(UndoKind::Insert, 5, &[]);
        assert!(entry.row.is_empty());
    }

    #[test]
    fn stream_row_is_not_encodable() {
        let codec = BinaryRowCodec;
        let row: RowImage = smallvec![Value::Int(1), Value::Stream { handle: 8 }];
        assert!(!codec.can_encode(&row));

        let mut buf = codec.create_page(64);
        let result = codec.encode_into(&mut buf, UndoKind::Insert, 1, &row);
        assert!(result.is_err());
    }

    #[test]
    fn serialized_length_matches_buffer() {
        let codec = BinaryRowCodec;
        let row: RowImage = smallvec![Value::Text(Cow::Owned("abcdef".to_string()))];
        let mut buf = codec.create_page(64);
        codec
            .encode_into(&mut buf, UndoKind::Delete, 2, &row)
            .unwrap();
        assert_eq!(codec.serialized_length(&buf).unwrap(), buf.len());
    }

    #[test]
    fn decode_rejects_corrupt_checksum() {
        let codec = BinaryRowCodec;
        let row: RowImage = smallvec![Value::Int(42)];
        let mut buf = codec.create_page(64);
        codec
            .encode_into(&mut buf, UndoKind::Insert, 1, &row)
            .unwrap();

        let mid = buf.len() / 2;
        buf[mid] ^= 0xFF;
        assert!(codec.decode(&buf, &ctx()).is_err());
    }

    #[test]
    fn decode_rejects_truncated_entry() {
        let codec = BinaryRowCodec;
        let row: RowImage = smallvec![Value::Blob(Cow::Owned(vec![0u8; 100]))];
        let mut buf = codec.create_page(256);
        codec
            .encode_into(&mut buf, UndoKind::Insert, 1, &row)
            .unwrap();

        buf.truncate(buf.len() - 20);
        assert!(codec.decode(&buf, &ctx()).is_err());
    }

    #[test]
    fn decode_rejects_bad_kind_byte() {
        let codec = BinaryRowCodec;
        let row: RowImage = smallvec![Value::Null];
        let mut buf = codec.create_page(64);
        codec
            .encode_into(&mut buf, UndoKind::Insert, 1, &row)
            .unwrap();

        buf[4] = 0x7F;
        let crc_start = buf.len() - 8;
        let checksum = CRC64.checksum(&buf[..crc_start]);
        buf[crc_start..].copy_from_slice(&checksum.to_le_bytes());
        assert!(codec.decode(&buf, &ctx()).is_err());
    }

    #[test]
    fn entry_beyond_page_capacity_grows_buffer() {
        let codec = BinaryRowCodec;
        let big = "x".repeat(SMALL_PAGE_CAPACITY * 2);
        let row: RowImage = smallvec![Value::Text(Cow::Owned(big.clone()))];
        let mut buf = codec.create_page(SMALL_PAGE_CAPACITY);
        codec
            .encode_into(&mut buf, UndoKind::Delete, 1, &row)
            .unwrap();

        let entry = codec.decode(&buf, &ctx()).unwrap();
        match &entry.row[0] {
            Value::Text(s) => assert_eq!(s.len(), big.len()),
            _ => panic!("expected Text"),
        }
    }
}
