//! Derive macro for objstream classes.
//!
//! `#[derive(StreamClass)]` maps a struct with named fields onto a
//! serializable class: each field becomes a class field whose type comes from
//! the field's `StreamType` implementation.
//!
//! # Example
//!
//! ```ignore
//! use objstream_core::StreamClass;
//!
//! #[derive(StreamClass)]
//! #[stream(name = "com.example.Person", version = 1)]
//! struct Person {
//!     name: String,
//!     age: i32,
//!     #[stream(rename = "emailAddress")]
//!     email: Option<String>,
//!     #[stream(skip)]
//!     cached_hash: u64,
//! }
//! ```

extern crate proc_macro;

mod stream_class;

use proc_macro::TokenStream;

/// Derives `StreamClass` for a struct.
///
/// # Attributes
///
/// ## Struct-level
/// - `#[stream(name = "...")]`: the class name (defaults to the struct name).
/// - `#[stream(version = N)]`: a fixed version tag instead of the computed one.
///
/// ## Field-level
/// - `#[stream(rename = "...")]`: the class field name (defaults to the Rust name).
/// - `#[stream(unshared)]`: the field's value is always written as a fresh record.
/// - `#[stream(skip)]`: not part of the class; filled with `Default::default()` on read.
///
/// Generic structs are not supported.
#[proc_macro_derive(StreamClass, attributes(stream))]
pub fn derive_stream_class(input: TokenStream) -> TokenStream {
    stream_class::derive_stream_class_impl(input)
}
