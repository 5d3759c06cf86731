//! Spatial interest management and update dispatch for the gridcast protocol.
//!
//! This crate decides *what* each observer receives, not how it is encoded:
//! the world is partitioned into fixed-size chunks, entities and pending
//! update requests live in per-chunk repositories, and the chunk manager
//! diffs each observer's interest set per tick to deliver transient batches
//! and replay persistent state.
//!
//! # Design Principles
//!
//! - **Single-writer** - Repositories, queues and lists are owned by the
//!   logic thread; there is no internal synchronization to pay for.
//! - **Deterministic iteration** - `BTreeSet` buckets and row-major interest
//!   sets keep per-tick output stable across runs.
//! - **Isolated failures** - One observer's delivery failure is logged and
//!   counted, never propagated into the tick loop.

mod chunk;
mod entity;
mod error;
mod local_list;
mod manager;
mod position;
mod request;

pub use chunk::ChunkRepository;
pub use entity::{EntityCategory, EntityId};
pub use error::{GridError, GridResult};
pub use local_list::{
    compare_priority, Candidate, LocalList, PriorityFactors, SlotWinner, PROTOCOL_LOCAL_LIST_CAPACITY,
};
pub use manager::{
    ChunkBatch, ChunkManager, DispatchReport, GridLimits, RequestSource, UpdateSink,
};
pub use position::{ChunkCoordinate, Position, CHUNK_SIZE, ORIGIN_CHUNK_OFFSET};
pub use request::{Durability, UpdateRequest, Visibility};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_api_exports() {
        // Verify all expected items are exported
        let _ = Position::new(0, 0, 0);
        let _ = ChunkCoordinate::new(0, 0);
        let _ = EntityId::new(0);
        let _ = EntityCategory::ALL;
        let _ = GridLimits::default();
        let _ = LocalList::with_protocol_capacity();
        let _ = CHUNK_SIZE;
        let _ = ORIGIN_CHUNK_OFFSET;

        // Error types
        let _: GridResult<()> = Ok(());
    }

    #[test]
    fn default_limits_are_reasonable() {
        let limits = GridLimits::default();
        assert!(limits.view_radius >= 1);
        assert_eq!(limits.local_list_capacity, PROTOCOL_LOCAL_LIST_CAPACITY);
    }
}
