//! Error types for spatial grid operations.

use std::fmt;

use crate::entity::{EntityCategory, EntityId};
use crate::position::ChunkCoordinate;

/// Result type for grid operations.
pub type GridResult<T> = Result<T, GridError>;

/// Errors that can occur while maintaining the spatial index.
///
/// These indicate logic bugs in the caller (an entity can only occupy one
/// repository bucket at a time) and are never silently ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GridError {
    /// Entity added to a bucket it already occupies.
    EntityAlreadyPresent {
        entity: EntityId,
        category: EntityCategory,
        coordinate: ChunkCoordinate,
    },

    /// Entity removed from a bucket it does not occupy.
    EntityNotPresent {
        entity: EntityId,
        category: EntityCategory,
        coordinate: ChunkCoordinate,
    },
}

impl fmt::Display for GridError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EntityAlreadyPresent {
                entity,
                category,
                coordinate,
            } => {
                write!(
                    f,
                    "entity {} already present in {category:?} bucket of chunk ({}, {})",
                    entity.raw(),
                    coordinate.cx(),
                    coordinate.cy()
                )
            }
            Self::EntityNotPresent {
                entity,
                category,
                coordinate,
            } => {
                write!(
                    f,
                    "entity {} not present in {category:?} bucket of chunk ({}, {})",
                    entity.raw(),
                    coordinate.cx(),
                    coordinate.cy()
                )
            }
        }
    }
}

impl std::error::Error for GridError {}
