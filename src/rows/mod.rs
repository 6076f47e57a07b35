//! Row codec: serialization of undo entries for scratch storage.

mod codec;

pub use codec::{BinaryRowCodec, RowCodec, UndoEntry};
