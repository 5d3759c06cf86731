//! Entity identifiers and categories.

/// A stable entity identifier, also used for observers.
///
/// IDs are assigned by the simulation layer and must remain stable for the
/// lifetime of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EntityId(u32);

impl EntityId {
    /// Creates a new entity ID.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl From<u32> for EntityId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl From<EntityId> for u32 {
    fn from(id: EntityId) -> Self {
        id.0
    }
}

/// The closed set of entity categories a chunk buckets separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityCategory {
    Player,
    Npc,
    GroundItem,
    WorldObject,
    Projectile,
}

impl EntityCategory {
    /// All categories in their stable order.
    pub const ALL: [Self; 5] = [
        Self::Player,
        Self::Npc,
        Self::GroundItem,
        Self::WorldObject,
        Self::Projectile,
    ];

    /// Number of categories.
    pub const COUNT: usize = Self::ALL.len();

    /// Dense index of this category.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_id_roundtrip() {
        let id = EntityId::new(42);
        assert_eq!(id.raw(), 42);
        assert_eq!(u32::from(id), 42);
        assert_eq!(EntityId::from(42u32), id);
    }

    #[test]
    fn entity_id_ordering() {
        assert!(EntityId::new(1) < EntityId::new(2));
    }

    #[test]
    fn category_indices_are_dense() {
        for (expected, category) in EntityCategory::ALL.iter().enumerate() {
            assert_eq!(category.index(), expected);
        }
        assert_eq!(EntityCategory::COUNT, 5);
    }
}
