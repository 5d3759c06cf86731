//! The update-block encoding pipeline: mask, payloads, per-tick cache.

use std::sync::Arc;

use buffer::{ByteOrder, GameBuffer, Transform};

use crate::error::{BlockError, BlockResult};
use crate::flags::{DirtyFlagSet, UpdateFlag};
use crate::registry::BlockRegistry;

/// Cached encoding of one entity's blocks for one tick.
///
/// Valid only for the exact (tick, flag revision) it was stored under; a
/// record is never reused across ticks or after any flag changes.
#[derive(Debug, Clone, Default)]
pub struct BlockCache {
    entry: Option<CacheEntry>,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    tick: u64,
    revision: u64,
    bytes: Arc<[u8]>,
}

impl BlockCache {
    /// Creates an empty cache.
    #[must_use]
    pub const fn new() -> Self {
        Self { entry: None }
    }

    /// Drops any cached record.
    pub fn invalidate(&mut self) {
        self.entry = None;
    }

    fn lookup(&self, tick: u64, revision: u64) -> Option<Arc<[u8]>> {
        self.entry
            .as_ref()
            .filter(|entry| entry.tick == tick && entry.revision == revision)
            .map(|entry| Arc::clone(&entry.bytes))
    }

    fn store(&mut self, tick: u64, revision: u64, bytes: Arc<[u8]>) {
        self.entry = Some(CacheEntry {
            tick,
            revision,
            bytes,
        });
    }
}

/// Returns `true` if an entity needs a block record at all this tick.
#[must_use]
pub fn needs_encoding(flags: &DirtyFlagSet, forced: &[UpdateFlag]) -> bool {
    !flags.is_empty() || !forced.is_empty()
}

/// Encodes one entity's update-block record.
///
/// `forced` carries per-observer inclusions (first appearance forces
/// `Appearance` regardless of the flag state). Descriptors are processed in
/// registry order: the combined mask is written first, one byte when it
/// fits, otherwise two bytes little-endian with the extension bit set, then
/// each included payload in the same order.
///
/// The cache is consulted only when `forced` is empty; a per-observer force
/// bypasses it for that observer without disturbing the stored record.
pub fn encode_update_blocks<E>(
    registry: &BlockRegistry<E>,
    entity: &E,
    flags: &DirtyFlagSet,
    forced: &[UpdateFlag],
    tick: u64,
    cache: &mut BlockCache,
) -> BlockResult<Arc<[u8]>> {
    if !needs_encoding(flags, forced) {
        return Ok(Arc::from(&[][..]));
    }

    // A set or forced flag without a descriptor would produce a mask the
    // payload cannot honor; reject before writing anything.
    for flag in flags.iter() {
        if registry.descriptor_for(flag).is_none() {
            return Err(BlockError::MissingDescriptor { flag });
        }
    }
    for flag in forced {
        if registry.descriptor_for(*flag).is_none() {
            return Err(BlockError::MissingDescriptor { flag: *flag });
        }
    }

    let cacheable = forced.is_empty();
    if cacheable {
        if let Some(bytes) = cache.lookup(tick, flags.revision()) {
            return Ok(bytes);
        }
    }

    let descriptors = registry.descriptors();
    let mut included = vec![false; descriptors.len()];
    for (index, descriptor) in descriptors.iter().enumerate() {
        included[index] =
            flags.contains(descriptor.flag()) || forced.contains(&descriptor.flag());
    }

    // Single expansion pass: descriptors included above may force one more
    // descriptor each, but forced inclusions never force further.
    let base = included.clone();
    for (index, descriptor) in descriptors.iter().enumerate() {
        if !base[index] {
            continue;
        }
        if let Some(target) = descriptor.forces() {
            if let Some(position) = descriptors
                .iter()
                .position(|candidate| candidate.flag() == target)
            {
                included[position] = true;
            }
        }
    }

    let mut mask = 0u16;
    for (index, descriptor) in descriptors.iter().enumerate() {
        if included[index] {
            mask |= descriptor.mask();
        }
    }

    let mut out = GameBuffer::new();
    write_mask(&mut out, mask, registry.extension_bit())?;
    for (index, descriptor) in descriptors.iter().enumerate() {
        if included[index] {
            descriptor.encode_payload(entity, &mut out)?;
        }
    }

    let bytes: Arc<[u8]> = out.into_bytes().into();
    if cacheable {
        cache.store(tick, flags.revision(), Arc::clone(&bytes));
    }
    Ok(bytes)
}

fn write_mask(out: &mut GameBuffer, mask: u16, extension_bit: u16) -> BlockResult<()> {
    let result = if mask < 0x100 {
        out.put_u8(mask as u8, Transform::Normal)
    } else {
        out.put_u16(mask | extension_bit, Transform::Normal, ByteOrder::Little)
    };
    result.map_err(|source| BlockError::MaskWriteFailed { source })
}
