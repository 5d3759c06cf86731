//! Error types for buffer operations.

use std::fmt;

use crate::transform::ByteOrder;

/// Result type for buffer operations.
pub type BufferResult<T> = Result<T, BufferError>;

/// Errors that can occur during buffer encoding/decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferError {
    /// Attempted to read past the end of the buffer.
    ///
    /// Units are those of the failed operation: bytes for byte-mode access,
    /// bits for bit-mode access.
    UnexpectedEof { requested: usize, available: usize },

    /// Bit count outside the supported `1..=32` range.
    InvalidBitCount { bits: usize },

    /// Byte order not defined for this value width.
    UnsupportedOrder {
        /// The rejected order.
        order: ByteOrder,
        /// Value width in bits.
        width: usize,
    },

    /// `start_bit_access` called while bit access is already active.
    BitAccessAlreadyActive,

    /// Bit-mode operation attempted outside bit access.
    BitAccessNotActive,

    /// Byte-mode operation attempted during bit access.
    ByteAccessDuringBitAccess,

    /// `begin_var_message` called while another message is open.
    MessageAlreadyOpen {
        /// Opcode of the message already being built.
        opcode: u8,
    },

    /// `end_var_message` called with no message open.
    NoOpenMessage,

    /// Variable-length payload exceeds what the length placeholder can hold.
    LengthOverflow { length: usize, max: usize },

    /// String content contains the terminator byte.
    TerminatorInString,

    /// Reached the end of the buffer before the string terminator.
    UnterminatedString {
        /// Number of bytes scanned before giving up.
        scanned: usize,
    },
}

impl fmt::Display for BufferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedEof {
                requested,
                available,
            } => {
                write!(
                    f,
                    "attempted to read {requested} units but only {available} available"
                )
            }
            Self::InvalidBitCount { bits } => {
                write!(f, "invalid bit count {bits}, supported range is 1..=32")
            }
            Self::UnsupportedOrder { order, width } => {
                write!(f, "byte order {order:?} is not defined for {width}-bit values")
            }
            Self::BitAccessAlreadyActive => {
                write!(f, "bit access started while already active")
            }
            Self::BitAccessNotActive => {
                write!(f, "bit access ended while not active")
            }
            Self::ByteAccessDuringBitAccess => {
                write!(f, "byte access attempted during bit access")
            }
            Self::MessageAlreadyOpen { opcode } => {
                write!(f, "variable message with opcode {opcode} is already open")
            }
            Self::NoOpenMessage => {
                write!(f, "no variable message is open")
            }
            Self::LengthOverflow { length, max } => {
                write!(f, "payload length {length} exceeds placeholder maximum {max}")
            }
            Self::TerminatorInString => {
                write!(f, "string content contains the terminator byte")
            }
            Self::UnterminatedString { scanned } => {
                write!(f, "no string terminator within {scanned} bytes")
            }
        }
    }
}

impl std::error::Error for BufferError {}
