//! Error types for wire framing.

use std::fmt;

use buffer::BufferError;

/// Result type for wire operations.
pub type WireResult<T> = Result<T, WireError>;

/// Errors that can occur while framing or deframing messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// Underlying buffer error (opcode byte not yet available, etc.).
    Buffer(BufferError),

    /// Decoded opcode has no entry in the opcode table.
    ///
    /// Fatal: either the peer sent garbage or the cipher streams have lost
    /// lock-step, and no resynchronization protocol exists.
    UnknownOpcode { opcode: u8 },

    /// Frame body ended before the announced length was reached.
    ///
    /// Fatal: the cipher key for this frame has already been consumed.
    TruncatedFrame { needed: usize, available: usize },

    /// Inbound frame announced a length above the configured maximum.
    ///
    /// Fatal: the cipher key for this frame has already been consumed.
    OversizedFrame { opcode: u8, length: usize, max: usize },

    /// Outbound payload does not fit the chosen length encoding.
    ///
    /// Rejected before a cipher key is drawn; the stream stays synchronized.
    PayloadTooLong { length: usize, max: usize },

    /// Outbound payload length does not match the opcode's fixed size.
    FixedLengthMismatch {
        opcode: u8,
        expected: usize,
        actual: usize,
    },

    /// Opcode registered twice in the same table.
    DuplicateOpcode { opcode: u8 },
}

impl WireError {
    /// Returns `true` if the connection must be torn down.
    ///
    /// Fatal errors leave the inbound cipher stream permanently
    /// desynchronized.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::UnknownOpcode { .. } | Self::TruncatedFrame { .. } | Self::OversizedFrame { .. }
        )
    }
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buffer(err) => write!(f, "buffer error: {err}"),
            Self::UnknownOpcode { opcode } => {
                write!(f, "unknown opcode {opcode} (stream desynchronized?)")
            }
            Self::TruncatedFrame { needed, available } => {
                write!(f, "truncated frame: need {needed} bytes, have {available}")
            }
            Self::OversizedFrame {
                opcode,
                length,
                max,
            } => {
                write!(
                    f,
                    "frame for opcode {opcode} announces {length} bytes, maximum is {max}"
                )
            }
            Self::PayloadTooLong { length, max } => {
                write!(f, "payload of {length} bytes exceeds maximum {max}")
            }
            Self::FixedLengthMismatch {
                opcode,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "opcode {opcode} is fixed at {expected} bytes but payload has {actual}"
                )
            }
            Self::DuplicateOpcode { opcode } => {
                write!(f, "opcode {opcode} registered twice")
            }
        }
    }
}

impl std::error::Error for WireError {}

impl From<BufferError> for WireError {
    fn from(err: BufferError) -> Self {
        Self::Buffer(err)
    }
}
