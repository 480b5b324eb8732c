//! Self-describing object graph serialization.
//!
//! Objects are written with a description of their class, so a reader can
//! rebuild a graph with shared references and cycles intact, and can decode
//! data written by an older or newer version of a class.
//!
//! The pieces:
//!
//! - [`model`]: the object graph: classes, instances, arrays, enums and values.
//! - [`descriptor`]: type descriptors computed from classes, and their cache.
//! - [`stream`]: [`ObjectOutputStream`] and [`ObjectInputStream`].
//! - [`resolve`]: mapping stream class names to local classes.
//! - [`io`]: big-endian primitive I/O and the modified UTF-8 codec.
//! - [`protocol`]: wire tags, flags and limits.
//!
//! # Example
//!
//! ```
//! use objstream_core::model::{ClassDefinition, FieldType, ObjectRef};
//! use objstream_core::resolve::ClassRegistry;
//! use objstream_core::{ObjectInputStream, ObjectOutputStream};
//!
//! let node = ClassDefinition::builder("com.example.Node")
//!     .serializable()
//!     .field("next", FieldType::object("com.example.Node"))
//!     .build();
//! let a = ObjectRef::instance(&node);
//! a.set_field("next", a.clone()).unwrap();
//!
//! let mut out = ObjectOutputStream::new(Vec::new()).unwrap();
//! out.write_object(a).unwrap();
//! let bytes = out.into_inner().unwrap();
//!
//! let mut classes = ClassRegistry::new();
//! classes.register(&node);
//! let mut input = ObjectInputStream::with_resolver(bytes.as_slice(), classes).unwrap();
//! let copy = input.read_object().unwrap();
//! let copy = copy.as_object().unwrap();
//! let next = copy.get_field("next").unwrap();
//! assert!(next.as_object().unwrap().ptr_eq(copy));
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod config_file;
pub mod descriptor;
pub mod error;
pub mod io;
pub mod model;
pub mod protocol;
pub mod resolve;
pub mod stream;

pub use config::{ConfigError, ProtocolVersion, StreamConfig, StreamConfigBuilder};
pub use descriptor::{DescriptorRegistry, TypeDescriptor};
pub use error::{Result, StreamError};
pub use io::{DataInput, DataOutput};
pub use model::{ClassDefinition, ClassRef, FieldType, ObjectRef, StreamClass, StreamType, Value};
pub use resolve::{ClassRegistry, ClassResolver};
pub use stream::{ObjectInput, ObjectInputStream, ObjectOutput, ObjectOutputStream};

#[cfg(feature = "config-file")]
pub use config_file::load_config;

#[cfg(feature = "derive")]
pub use objstream_derive::StreamClass;
