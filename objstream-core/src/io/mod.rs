//! Primitive I/O underneath the object streams.
//!
//! Big-endian primitive encoding over in-memory buffers and over
//! `std::io` byte sinks and sources, plus the modified UTF-8 string codec.

mod data_input;
mod data_output;
pub mod mutf8;

pub use data_input::{DataInput, DataSource, ObjectDataInput};
pub use data_output::{DataOutput, DataSink, ObjectDataOutput};
