//! Object stream wire protocol.
//!
//! The record tags, descriptor flags and framing limits shared by the encoder
//! and the decoder.

pub mod constants;

pub use constants::*;
