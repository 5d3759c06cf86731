//! Cipher-adjusted opcode framing and deframing.

use buffer::{ByteOrder, GameBuffer, Transform};

use crate::cipher::{IsaacCipher, SEED_WORDS};
use crate::error::{WireError, WireResult};

/// Limits applied to framed messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLimits {
    /// Maximum payload length accepted in either direction.
    pub max_payload_len: usize,
}

impl Default for FrameLimits {
    fn default() -> Self {
        Self {
            max_payload_len: 5000,
        }
    }
}

impl FrameLimits {
    /// Creates limits suitable for testing with smaller values.
    #[must_use]
    pub const fn for_testing() -> Self {
        Self {
            max_payload_len: 256,
        }
    }
}

/// Length encoding for one opcode, fixed at protocol design time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLength {
    /// Payload is always exactly this many bytes; no length prefix on the wire.
    Fixed(usize),
    /// One-byte length prefix.
    VariableByte,
    /// Two-byte big-endian length prefix.
    VariableShort,
}

/// Registry mapping opcodes to their length encoding.
///
/// Populated at construction time and passed to the components that need
/// lookups; there is no process-wide table.
#[derive(Debug, Clone)]
pub struct OpcodeTable {
    lengths: [Option<MessageLength>; 256],
}

impl Default for OpcodeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl OpcodeTable {
    /// Creates an empty table.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            lengths: [None; 256],
        }
    }

    /// Registers the length encoding for an opcode.
    pub fn register(&mut self, opcode: u8, length: MessageLength) -> WireResult<()> {
        if self.lengths[opcode as usize].is_some() {
            return Err(WireError::DuplicateOpcode { opcode });
        }
        self.lengths[opcode as usize] = Some(length);
        Ok(())
    }

    /// Returns the length encoding registered for an opcode.
    #[must_use]
    pub const fn length_of(&self, opcode: u8) -> Option<MessageLength> {
        self.lengths[opcode as usize]
    }
}

/// A deframed inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub opcode: u8,
    pub payload: Vec<u8>,
}

/// Outbound framing: one cipher instance, one key consumed per message.
#[derive(Debug)]
pub struct Framer {
    cipher: IsaacCipher,
    limits: FrameLimits,
}

impl Framer {
    /// Creates a framer for one connection direction.
    #[must_use]
    pub fn new(seed: &[u32; SEED_WORDS], limits: FrameLimits) -> Self {
        Self {
            cipher: IsaacCipher::new(seed),
            limits,
        }
    }

    /// Frames one message into `out`: cipher-adjusted opcode, optional length
    /// prefix, payload.
    ///
    /// Length validation happens before a cipher key is drawn, so a rejected
    /// frame leaves the key stream synchronized.
    pub fn frame(
        &mut self,
        out: &mut GameBuffer,
        opcode: u8,
        length: MessageLength,
        payload: &[u8],
    ) -> WireResult<()> {
        match length {
            MessageLength::Fixed(expected) => {
                if payload.len() != expected {
                    return Err(WireError::FixedLengthMismatch {
                        opcode,
                        expected,
                        actual: payload.len(),
                    });
                }
            }
            MessageLength::VariableByte => {
                let max = (u8::MAX as usize).min(self.limits.max_payload_len);
                if payload.len() > max {
                    return Err(WireError::PayloadTooLong {
                        length: payload.len(),
                        max,
                    });
                }
            }
            MessageLength::VariableShort => {
                let max = (u16::MAX as usize).min(self.limits.max_payload_len);
                if payload.len() > max {
                    return Err(WireError::PayloadTooLong {
                        length: payload.len(),
                        max,
                    });
                }
            }
        }

        let key = self.cipher.next_key();
        out.put_u8(opcode.wrapping_add(key as u8), Transform::Normal)?;
        match length {
            MessageLength::Fixed(_) => {}
            MessageLength::VariableByte => {
                out.put_u8(payload.len() as u8, Transform::Normal)?;
            }
            MessageLength::VariableShort => {
                out.put_u16(payload.len() as u16, Transform::Normal, ByteOrder::Big)?;
            }
        }
        out.put_bytes(payload)?;
        Ok(())
    }
}

/// Inbound deframing: the opposite-direction cipher plus the opcode table.
#[derive(Debug)]
pub struct Deframer {
    cipher: IsaacCipher,
    table: OpcodeTable,
    limits: FrameLimits,
}

impl Deframer {
    /// Creates a deframer for one connection direction.
    #[must_use]
    pub fn new(seed: &[u32; SEED_WORDS], table: OpcodeTable, limits: FrameLimits) -> Self {
        Self {
            cipher: IsaacCipher::new(seed),
            table,
            limits,
        }
    }

    /// Reads one framed message from `buf`.
    ///
    /// A [`WireError::Buffer`] before the opcode byte consumes nothing and is
    /// recoverable; any error after that point is fatal for the connection
    /// (see [`WireError::is_fatal`]).
    pub fn read_frame(&mut self, buf: &mut GameBuffer) -> WireResult<Frame> {
        let raw = buf.get_u8(Transform::Normal)?;
        let key = self.cipher.next_key();
        let opcode = raw.wrapping_sub(key as u8);

        let Some(length) = self.table.length_of(opcode) else {
            return Err(WireError::UnknownOpcode { opcode });
        };

        let announced = match length {
            MessageLength::Fixed(len) => len,
            MessageLength::VariableByte => {
                usize::from(self.read_or_truncated(buf, |buf| buf.get_u8(Transform::Normal))?)
            }
            MessageLength::VariableShort => usize::from(
                self.read_or_truncated(buf, |buf| buf.get_u16(Transform::Normal, ByteOrder::Big))?,
            ),
        };
        if announced > self.limits.max_payload_len {
            return Err(WireError::OversizedFrame {
                opcode,
                length: announced,
                max: self.limits.max_payload_len,
            });
        }

        let payload = self.read_or_truncated(buf, |buf| buf.get_bytes(announced))?;
        Ok(Frame { opcode, payload })
    }

    fn read_or_truncated<T>(
        &self,
        buf: &mut GameBuffer,
        read: impl FnOnce(&mut GameBuffer) -> buffer::BufferResult<T>,
    ) -> WireResult<T> {
        read(buf).map_err(|err| match err {
            buffer::BufferError::UnexpectedEof {
                requested,
                available,
            } => WireError::TruncatedFrame {
                needed: requested,
                available,
            },
            other => WireError::Buffer(other),
        })
    }
}
