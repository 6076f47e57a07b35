//! # Runtime Value Representation
//!
//! This module provides `Value<'a>`, the runtime representation for row
//! values flowing through the undo log. Values use `Cow` for text/blob
//! types to enable zero-copy when a row image is borrowed from engine
//! pages while supporting owned data once a record takes ownership.
//!
//! ## Value Variants
//!
//! | Variant | Rust Type | Description |
//! |---------|-----------|-------------|
//! | Null | - | SQL NULL |
//! | Int | i64 | 64-bit signed integer |
//! | Float | f64 | 64-bit floating point |
//! | Text | Cow<str> | UTF-8 string |
//! | Blob | Cow<[u8]> | Binary data |
//! | Lob | {id, byte_len} | Reference into the external large-object store |
//! | Stream | {handle} | Transient pipe-backed value owned by the session |
//!
//! ## Spill Eligibility
//!
//! `Lob` is a stable reference: the id round-trips byte-exactly and the
//! object itself lives in the external LOB store, so rows containing it
//! may spill. `Stream` wraps a session-local handle that is meaningless
//! after serialization; the row codec refuses to encode rows containing
//! one and the undo log keeps such records memory-resident.

use smallvec::SmallVec;
use std::borrow::Cow;

/// Runtime value representation for row values.
#[derive(Debug, Clone, PartialEq)]
pub enum Value<'a> {
    Null,
    Int(i64),
    Float(f64),
    Text(Cow<'a, str>),
    Blob(Cow<'a, [u8]>),
    Lob { id: u64, byte_len: u64 },
    Stream { handle: u64 },
}

/// A full row image as captured at logging time.
pub type RowImage = SmallVec<[Value<'static>; 8]>;

impl<'a> Value<'a> {
    /// Returns true if this value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns true if this value survives a serialize/deserialize
    /// round-trip byte-exactly.
    pub fn is_storable(&self) -> bool {
        !matches!(self, Value::Stream { .. })
    }

    /// Converts a possibly-borrowed value into an owned `'static` one.
    pub fn to_owned_static(&self) -> Value<'static> {
        match self {
            Value::Null => Value::Null,
            Value::Int(i) => Value::Int(*i),
            Value::Float(f) => Value::Float(*f),
            Value::Text(s) => Value::Text(Cow::Owned(s.to_string())),
            Value::Blob(b) => Value::Blob(Cow::Owned(b.to_vec())),
            Value::Lob { id, byte_len } => Value::Lob {
                id: *id,
                byte_len: *byte_len,
            },
            Value::Stream { handle } => Value::Stream { handle: *handle },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_is_null() {
        assert!(Value::Null.is_null());
        assert!(!Value::Int(0).is_null());
    }

    #[test]
    fn stream_is_not_storable() {
        assert!(!Value::Stream { handle: 7 }.is_storable());
        assert!(Value::Lob { id: 7, byte_len: 1024 }.is_storable());
        assert!(Value::Text(Cow::Borrowed("x")).is_storable());
    }

    #[test]
    fn to_owned_static_detaches_borrows() {
        let backing = String::from("borrowed");
        let v = Value::Text(Cow::Borrowed(backing.as_str()));
        let owned: Value<'static> = v.to_owned_static();
        drop(backing);
        match owned {
            Value::Text(s) => assert_eq!(s.as_ref(), "borrowed"),
            _ => panic!("expected Text"),
        }
    }
}
