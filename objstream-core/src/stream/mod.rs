//! Object streams: the encoder, the decoder and their handle tables.
//!
//! An [`ObjectOutputStream`] writes a stream header followed by records for
//! objects, class descriptors and block data; an [`ObjectInputStream`] reads
//! them back, rebuilding shared references and cycles through the handle
//! table.

mod fields;
mod handles;
mod input;
mod output;

pub use fields::{GetField, PutField};
pub use handles::{Handle, HandleTable, ReadHandleTable, ReadSlot, Retained};
pub use input::{ObjectInput, ObjectInputStream};
pub use output::{ObjectOutput, ObjectOutputStream};

#[cold]
fn depth_exceeded(max_depth: usize) -> crate::error::StreamError {
    crate::error::StreamError::InvalidObject(format!(
        "object graph nested deeper than {} levels",
        max_depth
    ))
}
