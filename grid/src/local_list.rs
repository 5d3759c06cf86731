//! Bounded per-observer tracking lists and the admission priority policy.

use crate::entity::EntityId;

/// Per-category local-list capacity fixed by the wire protocol.
pub const PROTOCOL_LOCAL_LIST_CAPACITY: usize = 255;

const DISTANCE_WEIGHT: u32 = 4;
const CONTACT_WEIGHT: u32 = 3;
const COMBAT_WEIGHT: u32 = 2;
const SIZE_WEIGHT: u32 = 1;
const LEVEL_WEIGHT: u32 = 1;

/// Inputs to the admission policy, computed fresh per comparison.
///
/// Kept as plain data so the policy stays a pure function with no state
/// carried between calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorityFactors {
    /// Chebyshev distance from the observer, in tiles. Closer is favored.
    pub distance: u32,
    /// Whether the observer has this entity as a known contact.
    pub known_contact: bool,
    /// Physical footprint in tiles. Larger is favored.
    pub size: u32,
    /// Capability metric (combat level or equivalent). Higher is favored.
    pub level: u32,
    /// Whether the entity is currently fighting.
    pub in_combat: bool,
}

/// Which of two candidates should win a contested slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotWinner {
    Left,
    Right,
}

/// Decides which of two candidates takes a contested slot.
///
/// Each factor votes its weight for the side it favors, or 1 to both sides
/// on a per-factor tie; the greater total wins. An overall tie favors the
/// left argument, deterministically. This is a heuristic admission order
/// only, never a correctness property of world state.
#[must_use]
pub fn compare_priority(left: &PriorityFactors, right: &PriorityFactors) -> SlotWinner {
    let (left_score, right_score) = scores(left, right);
    if right_score > left_score {
        SlotWinner::Right
    } else {
        SlotWinner::Left
    }
}

fn scores(left: &PriorityFactors, right: &PriorityFactors) -> (u32, u32) {
    let mut totals = (0u32, 0u32);
    vote(
        &mut totals,
        left.distance < right.distance,
        right.distance < left.distance,
        DISTANCE_WEIGHT,
    );
    vote(
        &mut totals,
        left.known_contact && !right.known_contact,
        right.known_contact && !left.known_contact,
        CONTACT_WEIGHT,
    );
    vote(
        &mut totals,
        left.size > right.size,
        right.size > left.size,
        SIZE_WEIGHT,
    );
    vote(
        &mut totals,
        left.level > right.level,
        right.level > left.level,
        LEVEL_WEIGHT,
    );
    vote(
        &mut totals,
        left.in_combat && !right.in_combat,
        right.in_combat && !left.in_combat,
        COMBAT_WEIGHT,
    );
    totals
}

fn vote(totals: &mut (u32, u32), favors_left: bool, favors_right: bool, weight: u32) {
    if favors_left {
        totals.0 += weight;
    } else if favors_right {
        totals.1 += weight;
    } else {
        totals.0 += 1;
        totals.1 += 1;
    }
}

/// A candidate competing for a local-list slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub entity: EntityId,
    pub factors: PriorityFactors,
}

/// An observer's bounded set of tracked entities for one category.
///
/// Entities must be explicitly added (triggering a full attribute resend on
/// the client) before incremental blocks are meaningful to the receiver, so
/// insertion order is retained.
#[derive(Debug, Clone)]
pub struct LocalList {
    capacity: usize,
    members: Vec<EntityId>,
}

impl LocalList {
    /// Creates a list with the given capacity.
    #[must_use]
    pub const fn new(capacity: usize) -> Self {
        Self {
            capacity,
            members: Vec::new(),
        }
    }

    /// Creates a list with the wire protocol's capacity.
    #[must_use]
    pub const fn with_protocol_capacity() -> Self {
        Self::new(PROTOCOL_LOCAL_LIST_CAPACITY)
    }

    /// The configured capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of tracked entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Returns `true` if nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Returns `true` if no slots remain.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.members.len() >= self.capacity
    }

    /// Returns `true` if the entity is tracked.
    #[must_use]
    pub fn contains(&self, entity: EntityId) -> bool {
        self.members.contains(&entity)
    }

    /// Tracked entities in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.members.iter().copied()
    }

    /// Tracks an entity. Returns `false` without change when the list is
    /// full or the entity is already tracked; a full list is not an error,
    /// the candidate is simply retried next tick.
    pub fn insert(&mut self, entity: EntityId) -> bool {
        if self.is_full() || self.contains(entity) {
            return false;
        }
        self.members.push(entity);
        true
    }

    /// Stops tracking an entity. Returns `false` if it was not tracked.
    pub fn remove(&mut self, entity: EntityId) -> bool {
        let Some(index) = self.members.iter().position(|member| *member == entity) else {
            return false;
        };
        self.members.remove(index);
        true
    }

    /// Fills free slots from a candidate pool in priority order and returns
    /// the admitted entities. Candidates left over simply wait for the next
    /// tick.
    pub fn admit(&mut self, mut candidates: Vec<Candidate>) -> Vec<EntityId> {
        candidates.sort_by(|a, b| {
            let (left, right) = scores(&a.factors, &b.factors);
            // Equal totals keep input order: the stable sort leaves the
            // left-most candidate first.
            right.cmp(&left)
        });

        let mut admitted = Vec::new();
        for candidate in candidates {
            if self.is_full() {
                break;
            }
            if self.insert(candidate.entity) {
                admitted.push(candidate.entity);
            }
        }
        admitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn baseline() -> PriorityFactors {
        PriorityFactors {
            distance: 5,
            known_contact: false,
            size: 1,
            level: 50,
            in_combat: false,
        }
    }

    #[test]
    fn identical_factors_favor_left() {
        let factors = baseline();
        for _ in 0..32 {
            assert_eq!(compare_priority(&factors, &factors), SlotWinner::Left);
        }
    }

    #[test]
    fn closer_candidate_wins() {
        let near = PriorityFactors {
            distance: 1,
            ..baseline()
        };
        let far = PriorityFactors {
            distance: 10,
            ..baseline()
        };
        assert_eq!(compare_priority(&near, &far), SlotWinner::Left);
        assert_eq!(compare_priority(&far, &near), SlotWinner::Right);
    }

    #[test]
    fn known_contact_beats_size_and_level() {
        let contact = PriorityFactors {
            known_contact: true,
            ..baseline()
        };
        let big = PriorityFactors {
            size: 3,
            level: 90,
            ..baseline()
        };
        assert_eq!(compare_priority(&contact, &big), SlotWinner::Left);
    }

    #[test]
    fn distance_outweighs_combat() {
        let near = PriorityFactors {
            distance: 1,
            ..baseline()
        };
        let fighting_far = PriorityFactors {
            distance: 10,
            in_combat: true,
            ..baseline()
        };
        assert_eq!(compare_priority(&near, &fighting_far), SlotWinner::Left);
    }

    #[test]
    fn list_capacity_is_respected() {
        let mut list = LocalList::new(2);
        assert!(list.insert(EntityId::new(1)));
        assert!(list.insert(EntityId::new(2)));
        assert!(list.is_full());
        assert!(!list.insert(EntityId::new(3)));
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn duplicate_insert_rejected() {
        let mut list = LocalList::new(8);
        assert!(list.insert(EntityId::new(1)));
        assert!(!list.insert(EntityId::new(1)));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn remove_frees_a_slot() {
        let mut list = LocalList::new(1);
        list.insert(EntityId::new(1));
        assert!(list.remove(EntityId::new(1)));
        assert!(!list.remove(EntityId::new(1)));
        assert!(list.insert(EntityId::new(2)));
    }

    #[test]
    fn protocol_capacity() {
        let list = LocalList::with_protocol_capacity();
        assert_eq!(list.capacity(), 255);
    }

    #[test]
    fn admit_ranks_candidates() {
        let mut list = LocalList::new(2);
        let candidates = vec![
            Candidate {
                entity: EntityId::new(1),
                factors: PriorityFactors {
                    distance: 9,
                    ..baseline()
                },
            },
            Candidate {
                entity: EntityId::new(2),
                factors: PriorityFactors {
                    distance: 1,
                    ..baseline()
                },
            },
            Candidate {
                entity: EntityId::new(3),
                factors: PriorityFactors {
                    distance: 4,
                    ..baseline()
                },
            },
        ];
        let admitted = list.admit(candidates);
        // Closest two win the two slots; the farthest waits for next tick.
        assert_eq!(admitted, vec![EntityId::new(2), EntityId::new(3)]);
        assert!(list.contains(EntityId::new(2)));
        assert!(!list.contains(EntityId::new(1)));
    }

    #[test]
    fn admit_ties_keep_input_order() {
        let mut list = LocalList::new(1);
        let factors = baseline();
        let admitted = list.admit(vec![
            Candidate {
                entity: EntityId::new(10),
                factors,
            },
            Candidate {
                entity: EntityId::new(20),
                factors,
            },
        ]);
        assert_eq!(admitted, vec![EntityId::new(10)]);
    }
}
