//! Queued update requests and their visibility.

use std::collections::BTreeSet;
use std::sync::Arc;

use buffer::GameBuffer;

use crate::entity::EntityId;

/// Who may receive an update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visibility {
    /// Visible to every observer.
    Global,
    /// Visible only to the listed observers.
    Restricted(BTreeSet<EntityId>),
}

impl Visibility {
    /// Creates a visibility restricted to the given observers.
    #[must_use]
    pub fn restricted_to(observers: impl IntoIterator<Item = EntityId>) -> Self {
        Self::Restricted(observers.into_iter().collect())
    }

    /// Returns `true` if the given observer may receive the update.
    #[must_use]
    pub fn is_visible_to(&self, observer: EntityId) -> bool {
        match self {
            Self::Global => true,
            Self::Restricted(observers) => observers.contains(&observer),
        }
    }
}

/// Lifetime of a queued request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Durability {
    /// One-shot; dropped by the end-of-tick reset.
    Transient,
    /// Survives across ticks and is replayed whenever its chunk re-enters an
    /// observer's interest set.
    Persistent,
}

/// A pre-encoded update queued on a chunk. Immutable once issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRequest {
    source: EntityId,
    message: Arc<[u8]>,
    visibility: Visibility,
}

impl UpdateRequest {
    /// Creates a request from already-encoded message bytes.
    #[must_use]
    pub fn new(source: EntityId, message: impl Into<Arc<[u8]>>, visibility: Visibility) -> Self {
        Self {
            source,
            message: message.into(),
            visibility,
        }
    }

    /// Creates a request from an encoded buffer.
    #[must_use]
    pub fn from_buffer(source: EntityId, message: GameBuffer, visibility: Visibility) -> Self {
        Self::new(source, message.into_bytes(), visibility)
    }

    /// The entity the update originated from.
    #[must_use]
    pub const fn source(&self) -> EntityId {
        self.source
    }

    /// The encoded message bytes.
    #[must_use]
    pub fn message(&self) -> Arc<[u8]> {
        Arc::clone(&self.message)
    }

    /// The visibility captured when the request was issued.
    ///
    /// Persistent requests recompute visibility at replay time instead of
    /// trusting this snapshot.
    #[must_use]
    pub const fn visibility(&self) -> &Visibility {
        &self.visibility
    }
}
