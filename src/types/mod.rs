//! Runtime value types shared by the row codec and the undo log.

mod value;

pub use value::{RowImage, Value};
