//! Data-driven registry of update-block descriptors.

use std::fmt;

use buffer::{BufferResult, GameBuffer};

use crate::error::{BlockError, BlockResult};
use crate::flags::UpdateFlag;

/// Payload encoder for one attribute kind.
pub type BlockEncoder<E> = fn(&E, &mut GameBuffer) -> BufferResult<()>;

/// One attribute kind: its flag, its protocol mask bit, an optional flag it
/// forces into the same record, and its payload encoder.
pub struct BlockDescriptor<E> {
    flag: UpdateFlag,
    mask: u16,
    forces: Option<UpdateFlag>,
    encode: BlockEncoder<E>,
}

impl<E> BlockDescriptor<E> {
    /// The flag this descriptor encodes.
    #[must_use]
    pub const fn flag(&self) -> UpdateFlag {
        self.flag
    }

    /// The protocol mask bit.
    #[must_use]
    pub const fn mask(&self) -> u16 {
        self.mask
    }

    /// A flag this descriptor forces into the record alongside itself.
    #[must_use]
    pub const fn forces(&self) -> Option<UpdateFlag> {
        self.forces
    }

    pub(crate) fn encode_payload(&self, entity: &E, out: &mut GameBuffer) -> BlockResult<()> {
        (self.encode)(entity, out).map_err(|source| BlockError::EncodeFailed {
            flag: self.flag,
            source,
        })
    }
}

impl<E> fmt::Debug for BlockDescriptor<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockDescriptor")
            .field("flag", &self.flag)
            .field("mask", &self.mask)
            .field("forces", &self.forces)
            .finish_non_exhaustive()
    }
}

/// Ordered table of descriptors for one entity kind.
///
/// Insertion order is significant: it defines both the bit layout of the
/// leading mask and the byte layout of the payloads that follow.
pub struct BlockRegistry<E> {
    descriptors: Vec<BlockDescriptor<E>>,
    extension_bit: u16,
}

impl<E> BlockRegistry<E> {
    /// Starts building a registry with the given mask-extension bit.
    #[must_use]
    pub const fn builder(extension_bit: u16) -> BlockRegistryBuilder<E> {
        BlockRegistryBuilder {
            descriptors: Vec::new(),
            extension_bit,
        }
    }

    /// Descriptors in registration order.
    #[must_use]
    pub fn descriptors(&self) -> &[BlockDescriptor<E>] {
        &self.descriptors
    }

    /// The bit set in the mask's low byte when the two-byte form is used.
    #[must_use]
    pub const fn extension_bit(&self) -> u16 {
        self.extension_bit
    }

    /// Finds the descriptor for a flag.
    #[must_use]
    pub fn descriptor_for(&self, flag: UpdateFlag) -> Option<&BlockDescriptor<E>> {
        self.descriptors
            .iter()
            .find(|descriptor| descriptor.flag == flag)
    }
}

impl<E> fmt::Debug for BlockRegistry<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockRegistry")
            .field("descriptors", &self.descriptors)
            .field("extension_bit", &self.extension_bit)
            .finish()
    }
}

/// Builder validating registry invariants at construction time.
pub struct BlockRegistryBuilder<E> {
    descriptors: Vec<BlockDescriptor<E>>,
    extension_bit: u16,
}

impl<E> BlockRegistryBuilder<E> {
    /// Registers a descriptor.
    #[must_use]
    pub fn descriptor(mut self, flag: UpdateFlag, mask: u16, encode: BlockEncoder<E>) -> Self {
        self.descriptors.push(BlockDescriptor {
            flag,
            mask,
            forces: None,
            encode,
        });
        self
    }

    /// Registers a descriptor that forces another flag into the record.
    ///
    /// Forced inclusion is expanded once at encode time; the forced
    /// descriptor's own `forces` link is never followed.
    #[must_use]
    pub fn forcing_descriptor(
        mut self,
        flag: UpdateFlag,
        mask: u16,
        forces: UpdateFlag,
        encode: BlockEncoder<E>,
    ) -> Self {
        self.descriptors.push(BlockDescriptor {
            flag,
            mask,
            forces: Some(forces),
            encode,
        });
        self
    }

    /// Validates and builds the registry.
    pub fn build(self) -> BlockResult<BlockRegistry<E>> {
        for (index, descriptor) in self.descriptors.iter().enumerate() {
            if descriptor.mask == 0 {
                return Err(BlockError::ZeroMask {
                    flag: descriptor.flag,
                });
            }
            if descriptor.mask & self.extension_bit != 0 {
                return Err(BlockError::MaskCollidesWithExtension {
                    flag: descriptor.flag,
                    mask: descriptor.mask,
                });
            }
            for other in &self.descriptors[index + 1..] {
                if other.flag == descriptor.flag {
                    return Err(BlockError::DuplicateFlag {
                        flag: descriptor.flag,
                    });
                }
                if other.mask == descriptor.mask {
                    return Err(BlockError::DuplicateMask {
                        mask: descriptor.mask,
                    });
                }
            }
            if let Some(forces) = descriptor.forces {
                if !self.descriptors.iter().any(|other| other.flag == forces) {
                    return Err(BlockError::UnknownForcedFlag {
                        flag: descriptor.flag,
                        forces,
                    });
                }
            }
        }
        Ok(BlockRegistry {
            descriptors: self.descriptors,
            extension_bit: self.extension_bit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use buffer::Transform;

    struct Mob;

    fn noop(_: &Mob, _: &mut GameBuffer) -> BufferResult<()> {
        Ok(())
    }

    fn one_byte(_: &Mob, out: &mut GameBuffer) -> BufferResult<()> {
        out.put_u8(0xFF, Transform::Normal)
    }

    #[test]
    fn builder_preserves_order() {
        let registry: BlockRegistry<Mob> = BlockRegistry::builder(0x40)
            .descriptor(UpdateFlag::Graphic, 0x1, noop)
            .descriptor(UpdateFlag::Animation, 0x2, one_byte)
            .descriptor(UpdateFlag::Chat, 0x4, noop)
            .build()
            .unwrap();
        let flags: Vec<UpdateFlag> = registry
            .descriptors()
            .iter()
            .map(BlockDescriptor::flag)
            .collect();
        assert_eq!(
            flags,
            vec![UpdateFlag::Graphic, UpdateFlag::Animation, UpdateFlag::Chat]
        );
    }

    #[test]
    fn rejects_duplicate_flag() {
        let err = BlockRegistry::<Mob>::builder(0x40)
            .descriptor(UpdateFlag::Chat, 0x1, noop)
            .descriptor(UpdateFlag::Chat, 0x2, noop)
            .build()
            .unwrap_err();
        assert!(matches!(err, BlockError::DuplicateFlag { .. }));
    }

    #[test]
    fn rejects_duplicate_mask() {
        let err = BlockRegistry::<Mob>::builder(0x40)
            .descriptor(UpdateFlag::Chat, 0x1, noop)
            .descriptor(UpdateFlag::Graphic, 0x1, noop)
            .build()
            .unwrap_err();
        assert!(matches!(err, BlockError::DuplicateMask { mask: 0x1 }));
    }

    #[test]
    fn rejects_zero_mask() {
        let err = BlockRegistry::<Mob>::builder(0x40)
            .descriptor(UpdateFlag::Chat, 0, noop)
            .build()
            .unwrap_err();
        assert!(matches!(err, BlockError::ZeroMask { .. }));
    }

    #[test]
    fn rejects_extension_collision() {
        let err = BlockRegistry::<Mob>::builder(0x40)
            .descriptor(UpdateFlag::Chat, 0x40, noop)
            .build()
            .unwrap_err();
        assert!(matches!(err, BlockError::MaskCollidesWithExtension { .. }));
    }

    #[test]
    fn rejects_unknown_forced_flag() {
        let err = BlockRegistry::<Mob>::builder(0x40)
            .forcing_descriptor(UpdateFlag::Transform, 0x1, UpdateFlag::Appearance, noop)
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            BlockError::UnknownForcedFlag {
                flag: UpdateFlag::Transform,
                forces: UpdateFlag::Appearance,
            }
        ));
    }

    #[test]
    fn descriptor_lookup() {
        let registry: BlockRegistry<Mob> = BlockRegistry::builder(0x40)
            .descriptor(UpdateFlag::Chat, 0x4, noop)
            .build()
            .unwrap();
        assert_eq!(
            registry.descriptor_for(UpdateFlag::Chat).unwrap().mask(),
            0x4
        );
        assert!(registry.descriptor_for(UpdateFlag::Graphic).is_none());
    }
}
