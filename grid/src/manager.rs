//! The chunk manager: repository ownership, interest diffing, dispatch.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::chunk::ChunkRepository;
use crate::entity::{EntityCategory, EntityId};
use crate::error::{GridError, GridResult};
use crate::position::{ChunkCoordinate, Position};
use crate::request::{Durability, UpdateRequest, Visibility};

/// Tunables for the spatial grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLimits {
    /// Radius of the square interest set, in chunks (inclusive both axes).
    pub view_radius: i32,
    /// Per-category capacity of an observer's local list.
    pub local_list_capacity: usize,
    /// Ticks a repository must stay idle and untouched before
    /// [`ChunkManager::evict_idle`] drops it.
    pub idle_epochs: u64,
}

impl Default for GridLimits {
    fn default() -> Self {
        Self {
            view_radius: 3,
            local_list_capacity: 255,
            idle_epochs: 100,
        }
    }
}

impl GridLimits {
    /// Creates limits suitable for testing with smaller values.
    #[must_use]
    pub const fn for_testing() -> Self {
        Self {
            view_radius: 1,
            local_list_capacity: 4,
            idle_epochs: 2,
        }
    }
}

/// World adapter used to re-evaluate persistent requests at replay time.
pub trait RequestSource {
    /// Current visibility of the request's source entity, or `None` if the
    /// source no longer exists (the request is then skipped silently).
    fn current_visibility(&self, source: EntityId) -> Option<Visibility>;
}

/// One grouped delivery for a single chunk and observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkBatch {
    pub coordinate: ChunkCoordinate,
    /// Instructs the client to drop stale partial state for the chunk before
    /// applying the messages. Set on still-visible deliveries.
    pub clear_first: bool,
    pub messages: Vec<Arc<[u8]>>,
}

/// Transport-facing consumer of grouped update batches.
pub trait UpdateSink {
    /// Transport-level delivery error. Failures are logged and isolated;
    /// they never abort the remaining chunks or observers.
    type Error: fmt::Display;

    /// Delivers one batch to one observer.
    fn send(&mut self, observer: EntityId, batch: ChunkBatch) -> Result<(), Self::Error>;
}

/// Outcome counters for one observer's dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchReport {
    /// Batches handed to the sink.
    pub batches: usize,
    /// Messages across all batches, including failed sends.
    pub messages: usize,
    /// Batches the sink rejected.
    pub failures: usize,
}

#[derive(Debug)]
struct ChunkEntry {
    repository: ChunkRepository,
    last_touched: u64,
}

/// Owns every chunk repository and drives per-tick transmission.
///
/// All methods must be called from the single logic thread; the manager has
/// no internal synchronization.
#[derive(Debug)]
pub struct ChunkManager {
    limits: GridLimits,
    chunks: HashMap<ChunkCoordinate, ChunkEntry>,
    touched: BTreeSet<ChunkCoordinate>,
    epoch: u64,
}

impl ChunkManager {
    /// Creates a manager with the given limits.
    #[must_use]
    pub fn new(limits: GridLimits) -> Self {
        Self {
            limits,
            chunks: HashMap::new(),
            touched: BTreeSet::new(),
            epoch: 0,
        }
    }

    /// The configured limits.
    #[must_use]
    pub const fn limits(&self) -> GridLimits {
        self.limits
    }

    /// Number of ticks completed, counted by end-of-tick resets.
    #[must_use]
    pub const fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Number of live repositories.
    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Gets or lazily creates the repository for a chunk.
    pub fn load(&mut self, coordinate: ChunkCoordinate) -> &mut ChunkRepository {
        let epoch = self.epoch;
        &mut self
            .chunks
            .entry(coordinate)
            .or_insert_with(|| ChunkEntry {
                repository: ChunkRepository::new(coordinate),
                last_touched: epoch,
            })
            .repository
    }

    /// Gets or lazily creates the repository containing a position.
    pub fn load_at(&mut self, position: Position) -> &mut ChunkRepository {
        self.load(position.chunk_coordinate())
    }

    /// Returns the repository for a chunk, if one exists.
    #[must_use]
    pub fn get(&self, coordinate: ChunkCoordinate) -> Option<&ChunkRepository> {
        self.chunks.get(&coordinate).map(|entry| &entry.repository)
    }

    /// Returns every chunk within the interest radius of `center`, in
    /// row-major order, creating missing repositories.
    pub fn viewable_chunks(&mut self, center: Position) -> Vec<ChunkCoordinate> {
        let center_chunk = center.chunk_coordinate();
        let radius = self.limits.view_radius;
        let side = (2 * radius + 1) as usize;
        let mut coordinates = Vec::with_capacity(side * side);
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                let coordinate = center_chunk.translate(dx, dy);
                self.load(coordinate);
                coordinates.push(coordinate);
            }
        }
        coordinates
    }

    /// Adds an entity to the chunk containing `position`.
    pub fn add_entity(
        &mut self,
        entity: EntityId,
        category: EntityCategory,
        position: Position,
    ) -> GridResult<()> {
        self.load_at(position).add(category, entity)
    }

    /// Removes an entity from the chunk containing `position`.
    pub fn remove_entity(
        &mut self,
        entity: EntityId,
        category: EntityCategory,
        position: Position,
    ) -> GridResult<()> {
        let coordinate = position.chunk_coordinate();
        match self.chunks.get_mut(&coordinate) {
            Some(entry) => entry.repository.remove(category, entity),
            None => Err(GridError::EntityNotPresent {
                entity,
                category,
                coordinate,
            }),
        }
    }

    /// Moves an entity between chunks. A move within one chunk is a no-op;
    /// the entity never occupies two repositories at once.
    pub fn move_entity(
        &mut self,
        entity: EntityId,
        category: EntityCategory,
        from: Position,
        to: Position,
    ) -> GridResult<()> {
        if from.chunk_coordinate() == to.chunk_coordinate() {
            return Ok(());
        }
        self.remove_entity(entity, category, from)?;
        self.add_entity(entity, category, to)
    }

    /// Queues a request on a chunk through the manager, marking the chunk
    /// touched for transient requests so the end-of-tick reset reclaims it
    /// even if no observer views the chunk this tick.
    pub fn enqueue(
        &mut self,
        coordinate: ChunkCoordinate,
        request: UpdateRequest,
        durability: Durability,
    ) {
        self.load(coordinate).enqueue(request, durability);
        if durability == Durability::Transient {
            self.touched.insert(coordinate);
        }
    }

    /// Runs the per-observer dispatch for one tick.
    ///
    /// Computes the interest diff between `previous` and `current`, delivers
    /// filtered transient batches for still-visible chunks (preceded by a
    /// client-side clear) and transient plus replayed-persistent batches for
    /// newly-visible chunks. With `full_refresh` every viewable chunk is
    /// treated as newly visible, triggering a full resend.
    ///
    /// Sink failures are logged and counted, never propagated; one failing
    /// chunk does not abort the rest.
    pub fn dispatch_updates<W, S>(
        &mut self,
        observer: EntityId,
        current: Position,
        previous: Position,
        full_refresh: bool,
        world: &W,
        sink: &mut S,
    ) -> DispatchReport
    where
        W: RequestSource,
        S: UpdateSink,
    {
        let new_interest = self.viewable_chunks(current);
        let old_interest: BTreeSet<ChunkCoordinate> = if full_refresh {
            BTreeSet::new()
        } else {
            self.viewable_chunks(previous).into_iter().collect()
        };

        let mut report = DispatchReport::default();
        for coordinate in new_interest {
            let newly_visible = !old_interest.contains(&coordinate);
            let messages = self.collect_messages(coordinate, observer, newly_visible, world);
            if messages.is_empty() {
                continue;
            }

            self.touched.insert(coordinate);
            report.messages += messages.len();
            let batch = ChunkBatch {
                coordinate,
                clear_first: !newly_visible,
                messages,
            };
            match sink.send(observer, batch) {
                Ok(()) => report.batches += 1,
                Err(err) => {
                    report.failures += 1;
                    log::warn!(
                        "dropped update batch for observer {} at chunk ({}, {}): {err}",
                        observer.raw(),
                        coordinate.cx(),
                        coordinate.cy(),
                    );
                }
            }
        }
        report
    }

    fn collect_messages<W: RequestSource>(
        &self,
        coordinate: ChunkCoordinate,
        observer: EntityId,
        newly_visible: bool,
        world: &W,
    ) -> Vec<Arc<[u8]>> {
        let Some(entry) = self.chunks.get(&coordinate) else {
            return Vec::new();
        };
        let repository = &entry.repository;

        let mut messages: Vec<Arc<[u8]>> = repository
            .transient_requests()
            .iter()
            .filter(|request| request.visibility().is_visible_to(observer))
            .map(UpdateRequest::message)
            .collect();

        if newly_visible {
            for request in repository.persistent_requests() {
                // Ownership may have changed since enqueue; ask the world for
                // the visibility as of right now. A vanished source is skipped.
                match world.current_visibility(request.source()) {
                    Some(view) if view.is_visible_to(observer) => {
                        messages.push(request.message());
                    }
                    _ => {}
                }
            }
        }
        messages
    }

    /// End-of-tick reset. Must run exactly once per tick, after every
    /// observer's [`dispatch_updates`](Self::dispatch_updates) call: drops
    /// the transient queue of every touched chunk and advances the epoch.
    pub fn reset_touched_chunks(&mut self) {
        self.epoch += 1;
        let epoch = self.epoch;
        for coordinate in std::mem::take(&mut self.touched) {
            if let Some(entry) = self.chunks.get_mut(&coordinate) {
                entry.repository.clear_transient();
                entry.last_touched = epoch;
            }
        }
    }

    /// Drops repositories that hold nothing and have not been touched for
    /// [`GridLimits::idle_epochs`] ticks. Returns the number evicted.
    pub fn evict_idle(&mut self) -> usize {
        let epoch = self.epoch;
        let idle_epochs = self.limits.idle_epochs;
        let before = self.chunks.len();
        self.chunks.retain(|_, entry| {
            !(entry.repository.is_idle() && epoch.saturating_sub(entry.last_touched) >= idle_epochs)
        });
        before - self.chunks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::CHUNK_SIZE;
    use std::convert::Infallible;

    struct EmptyWorld;

    impl RequestSource for EmptyWorld {
        fn current_visibility(&self, _source: EntityId) -> Option<Visibility> {
            Some(Visibility::Global)
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        batches: Vec<(EntityId, ChunkBatch)>,
    }

    impl UpdateSink for RecordingSink {
        type Error = Infallible;

        fn send(&mut self, observer: EntityId, batch: ChunkBatch) -> Result<(), Infallible> {
            self.batches.push((observer, batch));
            Ok(())
        }
    }

    fn manager() -> ChunkManager {
        ChunkManager::new(GridLimits::for_testing())
    }

    fn transient(source: u32, byte: u8) -> UpdateRequest {
        UpdateRequest::new(EntityId::new(source), vec![byte], Visibility::Global)
    }

    #[test]
    fn load_is_cached() {
        let mut manager = manager();
        let coordinate = ChunkCoordinate::new(4, 4);
        manager.load(coordinate).enqueue(
            transient(1, 0xAA),
            Durability::Transient,
        );
        // Same coordinate resolves to the same repository.
        assert_eq!(manager.load(coordinate).transient_requests().len(), 1);
        assert_eq!(manager.chunk_count(), 1);
    }

    #[test]
    fn positions_in_same_cell_share_repository() {
        let mut manager = manager();
        let a = Position::new(3200, 3200, 0);
        let b = Position::new(3207, 3207, 0);
        manager.load_at(a).enqueue(transient(1, 1), Durability::Transient);
        assert_eq!(manager.load_at(b).transient_requests().len(), 1);
    }

    #[test]
    fn viewable_chunks_row_major_and_sized() {
        let mut manager = manager();
        let center = Position::new(3200, 3200, 0);
        let chunks = manager.viewable_chunks(center);
        // Radius 1 in test limits: 3x3 square.
        assert_eq!(chunks.len(), 9);
        let center_chunk = center.chunk_coordinate();
        assert_eq!(chunks[0], center_chunk.translate(-1, -1));
        assert_eq!(chunks[4], center_chunk);
        assert_eq!(chunks[8], center_chunk.translate(1, 1));
        assert_eq!(manager.chunk_count(), 9);
    }

    #[test]
    fn stationary_observer_sees_still_visible_only() {
        let mut manager = manager();
        let position = Position::new(3200, 3200, 0);
        let chunk = position.chunk_coordinate();
        manager.enqueue(chunk, transient(1, 0x11), Durability::Transient);

        let mut sink = RecordingSink::default();
        let report = manager.dispatch_updates(
            EntityId::new(100),
            position,
            position,
            false,
            &EmptyWorld,
            &mut sink,
        );
        assert_eq!(report.batches, 1);
        assert_eq!(report.failures, 0);
        let (_, batch) = &sink.batches[0];
        assert_eq!(batch.coordinate, chunk);
        // Still-visible deliveries clear stale client state first.
        assert!(batch.clear_first);
    }

    #[test]
    fn full_refresh_treats_chunks_as_newly_visible() {
        let mut manager = manager();
        let position = Position::new(3200, 3200, 0);
        let chunk = position.chunk_coordinate();
        manager.enqueue(chunk, transient(1, 0x11), Durability::Transient);

        let mut sink = RecordingSink::default();
        manager.dispatch_updates(
            EntityId::new(100),
            position,
            position,
            true,
            &EmptyWorld,
            &mut sink,
        );
        let (_, batch) = &sink.batches[0];
        assert!(!batch.clear_first);
    }

    #[test]
    fn nothing_queued_sends_nothing() {
        let mut manager = manager();
        let position = Position::new(3200, 3200, 0);
        let mut sink = RecordingSink::default();
        let report = manager.dispatch_updates(
            EntityId::new(100),
            position,
            position,
            false,
            &EmptyWorld,
            &mut sink,
        );
        assert_eq!(report, DispatchReport::default());
        assert!(sink.batches.is_empty());
    }

    #[test]
    fn restricted_requests_are_filtered_per_observer() {
        let mut manager = manager();
        let position = Position::new(3200, 3200, 0);
        let chunk = position.chunk_coordinate();
        manager.enqueue(
            chunk,
            UpdateRequest::new(
                EntityId::new(1),
                vec![0x77],
                Visibility::restricted_to([EntityId::new(100)]),
            ),
            Durability::Transient,
        );

        let mut sink = RecordingSink::default();
        manager.dispatch_updates(
            EntityId::new(100),
            position,
            position,
            false,
            &EmptyWorld,
            &mut sink,
        );
        manager.dispatch_updates(
            EntityId::new(200),
            position,
            position,
            false,
            &EmptyWorld,
            &mut sink,
        );
        assert_eq!(sink.batches.len(), 1);
        assert_eq!(sink.batches[0].0, EntityId::new(100));
    }

    #[test]
    fn reset_clears_transients_and_advances_epoch() {
        let mut manager = manager();
        let chunk = ChunkCoordinate::new(2, 2);
        manager.enqueue(chunk, transient(1, 1), Durability::Transient);
        manager.enqueue(chunk, transient(2, 2), Durability::Persistent);

        assert_eq!(manager.epoch(), 0);
        manager.reset_touched_chunks();
        assert_eq!(manager.epoch(), 1);

        let repository = manager.get(chunk).unwrap();
        assert!(repository.transient_requests().is_empty());
        assert_eq!(repository.persistent_requests().len(), 1);
    }

    #[test]
    fn unviewed_transients_still_reclaimed_at_reset() {
        let mut manager = manager();
        let chunk = ChunkCoordinate::new(50, 50);
        manager.enqueue(chunk, transient(1, 1), Durability::Transient);
        // No observer dispatched near the chunk this tick.
        manager.reset_touched_chunks();
        assert!(manager.get(chunk).unwrap().transient_requests().is_empty());
    }

    #[test]
    fn failing_sink_is_isolated() {
        struct FailingSink;

        impl UpdateSink for FailingSink {
            type Error = String;

            fn send(&mut self, _observer: EntityId, _batch: ChunkBatch) -> Result<(), String> {
                Err("connection buffer full".to_owned())
            }
        }

        let mut manager = manager();
        let position = Position::new(3200, 3200, 0);
        let near = position.chunk_coordinate();
        manager.enqueue(near, transient(1, 1), Durability::Transient);
        manager.enqueue(near.translate(1, 0), transient(2, 2), Durability::Transient);

        let mut sink = FailingSink;
        let report = manager.dispatch_updates(
            EntityId::new(100),
            position,
            position,
            false,
            &EmptyWorld,
            &mut sink,
        );
        // Both chunks were attempted despite the first failure.
        assert_eq!(report.failures, 2);
        assert_eq!(report.batches, 0);
        assert_eq!(report.messages, 2);
    }

    #[test]
    fn move_entity_between_chunks() {
        let mut manager = manager();
        let from = Position::new(3200, 3200, 0);
        let to = Position::new(3200 + CHUNK_SIZE, 3200, 0);
        manager
            .add_entity(EntityId::new(1), EntityCategory::Npc, from)
            .unwrap();
        manager
            .move_entity(EntityId::new(1), EntityCategory::Npc, from, to)
            .unwrap();

        assert!(!manager
            .get(from.chunk_coordinate())
            .unwrap()
            .category_view(EntityCategory::Npc)
            .contains(&EntityId::new(1)));
        assert!(manager
            .get(to.chunk_coordinate())
            .unwrap()
            .category_view(EntityCategory::Npc)
            .contains(&EntityId::new(1)));
    }

    #[test]
    fn move_within_chunk_is_noop() {
        let mut manager = manager();
        let from = Position::new(3200, 3200, 0);
        let to = Position::new(3201, 3201, 0);
        manager
            .add_entity(EntityId::new(1), EntityCategory::Npc, from)
            .unwrap();
        manager
            .move_entity(EntityId::new(1), EntityCategory::Npc, from, to)
            .unwrap();
        assert!(manager
            .get(from.chunk_coordinate())
            .unwrap()
            .category_view(EntityCategory::Npc)
            .contains(&EntityId::new(1)));
    }

    #[test]
    fn eviction_drops_only_idle_untouched_chunks() {
        let mut manager = manager();
        let idle = ChunkCoordinate::new(0, 0);
        let occupied = ChunkCoordinate::new(1, 0);
        manager.load(idle);
        manager.load(occupied);
        manager
            .load(occupied)
            .add(EntityCategory::Npc, EntityId::new(1))
            .unwrap();

        // Test limits require two idle epochs before eviction.
        manager.reset_touched_chunks();
        assert_eq!(manager.evict_idle(), 0);
        manager.reset_touched_chunks();
        assert_eq!(manager.evict_idle(), 1);
        assert!(manager.get(idle).is_none());
        assert!(manager.get(occupied).is_some());
    }

    #[test]
    fn touched_chunks_are_not_evicted_early() {
        let mut manager = manager();
        let chunk = ChunkCoordinate::new(0, 0);
        manager.enqueue(chunk, transient(1, 1), Durability::Transient);
        manager.reset_touched_chunks();
        // Touched at epoch 1; idle_epochs is 2, so epoch must reach 3.
        manager.reset_touched_chunks();
        assert_eq!(manager.evict_idle(), 0);
        manager.reset_touched_chunks();
        assert_eq!(manager.evict_idle(), 1);
    }
}
