//! Opcode cipher and message framing for the gridcast protocol.
//!
//! This crate owns the wire framing layer: a per-direction ISAAC stream
//! cipher producing one key per message, the cipher-adjusted opcode byte,
//! and the 1- or 2-byte length prefixes of variable-length messages. It does
//! not know about game state, only the structure of frames.
//!
//! # Design Principles
//!
//! - **Lock-step or dead** - Each direction consumes exactly one cipher key
//!   per message. Desynchronization is unrecoverable and surfaces as a fatal
//!   error; the session must be torn down.
//! - **Bounded decoding** - Announced lengths are validated against limits
//!   before any allocation or iteration.
//! - **No global state** - Opcode tables are explicit registry objects
//!   populated at construction time.

mod cipher;
mod error;
mod frame;

pub use cipher::{IsaacCipher, SEED_WORDS};
pub use error::{WireError, WireResult};
pub use frame::{Deframer, Frame, FrameLimits, Framer, MessageLength, OpcodeTable};
