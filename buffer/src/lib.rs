//! Position-tracked binary buffer primitives for the gridcast protocol.
//!
//! This crate provides the byte- and bit-level encoding surface everything
//! else serializes through: transform-aware multi-width integer access in
//! four byte orders, MSB-first bit packing, variable-length message framing
//! with back-patched lengths, terminated strings, and reversed byte runs.
//!
//! # Design Principles
//!
//! - **Loud contract violations** - Mixing byte and bit access, unmatched
//!   framing calls, and unsupported order/width combinations fail
//!   immediately; they indicate logic bugs that would corrupt the stream.
//! - **Bounded reads** - Every read is checked against the buffer; malformed
//!   input never panics.
//! - **Deterministic** - Same operations produce the same bytes.

mod error;
mod game_buffer;
mod transform;

pub use error::{BufferError, BufferResult};
pub use game_buffer::{GameBuffer, LengthKind, STRING_TERMINATOR};
pub use transform::{ByteOrder, Transform};
