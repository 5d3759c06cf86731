//! Error types for update-block encoding.

use std::fmt;

use buffer::BufferError;

use crate::flags::UpdateFlag;

/// Result type for block operations.
pub type BlockResult<T> = Result<T, BlockError>;

/// Errors that can occur building a registry or encoding a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockError {
    /// Two descriptors registered for the same flag.
    DuplicateFlag { flag: UpdateFlag },

    /// Two descriptors registered with the same mask value.
    DuplicateMask { mask: u16 },

    /// A descriptor registered with mask zero.
    ZeroMask { flag: UpdateFlag },

    /// A descriptor mask overlaps the extension bit.
    MaskCollidesWithExtension { flag: UpdateFlag, mask: u16 },

    /// A descriptor forces a flag no descriptor is registered for.
    UnknownForcedFlag { flag: UpdateFlag, forces: UpdateFlag },

    /// A set or forced flag has no registered descriptor.
    ///
    /// Encoding is rejected rather than emitting a mask that disagrees with
    /// the payload; the receiver cannot recover from that.
    MissingDescriptor { flag: UpdateFlag },

    /// A descriptor's payload encoder failed.
    EncodeFailed { flag: UpdateFlag, source: BufferError },

    /// Writing the leading mask failed.
    MaskWriteFailed { source: BufferError },
}

impl fmt::Display for BlockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateFlag { flag } => {
                write!(f, "descriptor for {flag:?} registered twice")
            }
            Self::DuplicateMask { mask } => {
                write!(f, "mask 0x{mask:X} registered twice")
            }
            Self::ZeroMask { flag } => {
                write!(f, "descriptor for {flag:?} has mask zero")
            }
            Self::MaskCollidesWithExtension { flag, mask } => {
                write!(
                    f,
                    "mask 0x{mask:X} for {flag:?} overlaps the extension bit"
                )
            }
            Self::UnknownForcedFlag { flag, forces } => {
                write!(
                    f,
                    "descriptor for {flag:?} forces unregistered flag {forces:?}"
                )
            }
            Self::MissingDescriptor { flag } => {
                write!(f, "no descriptor registered for {flag:?}")
            }
            Self::EncodeFailed { flag, source } => {
                write!(f, "payload encoder for {flag:?} failed: {source}")
            }
            Self::MaskWriteFailed { source } => {
                write!(f, "failed to write block mask: {source}")
            }
        }
    }
}

impl std::error::Error for BlockError {}
