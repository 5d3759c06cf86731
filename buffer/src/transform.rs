//! Value transforms and byte-order conventions.

/// Per-value transform applied to the least-significant byte on write and
/// inverted on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Transform {
    /// No transformation.
    #[default]
    Normal,
    /// Adds 128 to the byte.
    Add,
    /// Negates the byte.
    Negate,
    /// Replaces the byte with 128 minus its value.
    Subtract,
}

impl Transform {
    /// Applies the transform to an outgoing byte.
    #[must_use]
    pub const fn apply(self, byte: u8) -> u8 {
        match self {
            Self::Normal => byte,
            Self::Add => byte.wrapping_add(128),
            Self::Negate => byte.wrapping_neg(),
            Self::Subtract => 128u8.wrapping_sub(byte),
        }
    }

    /// Reverts the transform on an incoming byte.
    #[must_use]
    pub const fn revert(self, byte: u8) -> u8 {
        match self {
            Self::Normal => byte,
            Self::Add => byte.wrapping_sub(128),
            // Negate and Subtract are their own inverses.
            Self::Negate => byte.wrapping_neg(),
            Self::Subtract => 128u8.wrapping_sub(byte),
        }
    }
}

/// Byte-order conventions for multi-byte values.
///
/// With value bytes named `B3 B2 B1 B0` (most to least significant), a
/// 32-bit value is emitted as:
///
/// | order           | layout        |
/// |-----------------|---------------|
/// | `Big`           | `B3 B2 B1 B0` |
/// | `Little`        | `B0 B1 B2 B3` |
/// | `Middle`        | `B1 B0 B3 B2` |
/// | `InverseMiddle` | `B2 B3 B0 B1` |
///
/// `Middle` and `InverseMiddle` are defined for 32-bit values only; no valid
/// layout exists at other widths and requesting one is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ByteOrder {
    /// Most-significant byte first.
    #[default]
    Big,
    /// Least-significant byte first.
    Little,
    /// Historical mixed order, 32-bit only.
    Middle,
    /// Historical mixed order, 32-bit only.
    InverseMiddle,
}

impl ByteOrder {
    /// Returns `true` if this order is defined for the given width in bits.
    #[must_use]
    pub const fn supports_width(self, width: usize) -> bool {
        match self {
            Self::Big | Self::Little => true,
            Self::Middle | Self::InverseMiddle => width == 32,
        }
    }
}
