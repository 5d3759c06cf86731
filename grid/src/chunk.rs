//! Per-chunk entity buckets and update-request queues.

use std::collections::BTreeSet;

use crate::entity::{EntityCategory, EntityId};
use crate::error::{GridError, GridResult};
use crate::position::ChunkCoordinate;
use crate::request::{Durability, UpdateRequest};

/// Storage for one chunk: entities bucketed by category plus the queues of
/// not-yet-sent update requests.
///
/// Repositories are owned by the single logic thread; there is no internal
/// synchronization.
#[derive(Debug)]
pub struct ChunkRepository {
    coordinate: ChunkCoordinate,
    entities: [BTreeSet<EntityId>; EntityCategory::COUNT],
    transient: Vec<UpdateRequest>,
    persistent: Vec<UpdateRequest>,
}

impl ChunkRepository {
    /// Creates an empty repository for the given chunk.
    #[must_use]
    pub fn new(coordinate: ChunkCoordinate) -> Self {
        Self {
            coordinate,
            entities: std::array::from_fn(|_| BTreeSet::new()),
            transient: Vec::new(),
            persistent: Vec::new(),
        }
    }

    /// The chunk this repository covers.
    #[must_use]
    pub const fn coordinate(&self) -> ChunkCoordinate {
        self.coordinate
    }

    /// Adds an entity to its category bucket.
    ///
    /// # Errors
    ///
    /// Fails with [`GridError::EntityAlreadyPresent`] if the entity is
    /// already in the bucket; that indicates a movement-logic bug.
    pub fn add(&mut self, category: EntityCategory, entity: EntityId) -> GridResult<()> {
        if !self.entities[category.index()].insert(entity) {
            return Err(GridError::EntityAlreadyPresent {
                entity,
                category,
                coordinate: self.coordinate,
            });
        }
        Ok(())
    }

    /// Removes an entity from its category bucket.
    ///
    /// # Errors
    ///
    /// Fails with [`GridError::EntityNotPresent`] if the entity is absent.
    pub fn remove(&mut self, category: EntityCategory, entity: EntityId) -> GridResult<()> {
        if !self.entities[category.index()].remove(&entity) {
            return Err(GridError::EntityNotPresent {
                entity,
                category,
                coordinate: self.coordinate,
            });
        }
        Ok(())
    }

    /// Returns the live set of entities for a category.
    ///
    /// Callers must not rely on mutating it; membership changes go through
    /// [`add`](Self::add)/[`remove`](Self::remove).
    #[must_use]
    pub fn category_view(&self, category: EntityCategory) -> &BTreeSet<EntityId> {
        &self.entities[category.index()]
    }

    /// Total number of entities across all categories.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.iter().map(BTreeSet::len).sum()
    }

    /// Queues an update request on this chunk.
    pub fn enqueue(&mut self, request: UpdateRequest, durability: Durability) {
        match durability {
            Durability::Transient => self.transient.push(request),
            Durability::Persistent => self.persistent.push(request),
        }
    }

    /// This tick's pending transient requests.
    #[must_use]
    pub fn transient_requests(&self) -> &[UpdateRequest] {
        &self.transient
    }

    /// The currently queued persistent requests.
    #[must_use]
    pub fn persistent_requests(&self) -> &[UpdateRequest] {
        &self.persistent
    }

    /// Drops every persistent request issued by `source`.
    ///
    /// Called when the underlying state is cleared, e.g. a placed object is
    /// removed from the world.
    pub fn retire_persistent(&mut self, source: EntityId) {
        self.persistent.retain(|request| request.source() != source);
    }

    /// Drops the transient queue. Persistent requests survive.
    pub(crate) fn clear_transient(&mut self) {
        self.transient.clear();
    }

    /// Returns `true` if nothing keeps this repository alive: no entities,
    /// no pending requests of either kind.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.entity_count() == 0 && self.transient.is_empty() && self.persistent.is_empty()
    }
}
