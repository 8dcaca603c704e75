//! Entity arena: a tombstoned `Vec<Option<Thing>>` keyed by stable `Id`, plus
//! per-kind swap-removable index buckets (spec §3 "Entity registry", §4.1).
//!
//! Grounded on `core_sim/src/orders.rs`'s `TurnQueue` bookkeeping idiom
//! (plain `Vec`/`HashMap` state mutated through narrow methods, no shared
//! ownership) generalized from "pending orders per faction" to "entities by
//! kind", and on `core_sim/src/fauna.rs`'s `HerdRegistry` (a resource that
//! owns a `Vec` and exposes `find`/`entries`/`clear`).

use crate::ids::{Id, ThingKind};
use crate::thing::{Thing, ThingPayload};

/// `things: Vec<Thing>` from the spec, reimplemented as a tombstoned arena so
/// `Id`s stay stable across removals of *other* entities (Design Notes §9:
/// "arena allocation with indices eliminates cyclic references").
#[derive(Debug, Default)]
pub struct EntityRegistry {
    slots: Vec<Option<Thing>>,
    free: Vec<usize>,
    by_kind: Vec<Vec<usize>>,
    agent_ids: Vec<Id>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            by_kind: (0..ThingKind::COUNT).map(|_| Vec::new()).collect(),
            agent_ids: Vec::new(),
        }
    }

    /// Insert a new entity, assigning it a fresh or recycled `Id`. Returns
    /// the assigned `Id`; the caller's `thing.id` field is overwritten to
    /// match.
    pub fn insert(&mut self, mut thing: Thing) -> Id {
        let kind = thing.kind;
        let is_agent = matches!(thing.payload, ThingPayload::Agent { .. });
        let slot_idx = match self.free.pop() {
            Some(idx) => idx,
            None => {
                self.slots.push(None);
                self.slots.len() - 1
            }
        };
        let id = Id(slot_idx);
        thing.id = id;
        thing.things_index = slot_idx;
        thing.kind_list_index = self.by_kind[kind as usize].len();
        self.by_kind[kind as usize].push(slot_idx);
        self.slots[slot_idx] = Some(thing);
        if is_agent {
            self.agent_ids.push(id);
        }
        id
    }

    pub fn get(&self, id: Id) -> Option<&Thing> {
        self.slots.get(id.0).and_then(|s| s.as_ref())
    }

    pub fn get_mut(&mut self, id: Id) -> Option<&mut Thing> {
        self.slots.get_mut(id.0).and_then(|s| s.as_mut())
    }

    pub fn contains(&self, id: Id) -> bool {
        self.get(id).is_some()
    }

    /// Remove an entity from the arena and its per-kind bucket. Idempotent:
    /// removing an already-removed or never-inserted `Id` is a no-op.
    /// Agents are never removed through this path (spec §3: "agents never
    /// leave `agents`"); callers clear an agent's grid cell and mark it
    /// terminated instead.
    pub fn remove(&mut self, id: Id) -> Option<Thing> {
        let slot = self.slots.get_mut(id.0)?;
        let thing = slot.take()?;
        let kind = thing.kind;
        let bucket = &mut self.by_kind[kind as usize];
        let pos = thing.kind_list_index;
        bucket.swap_remove(pos);
        if let Some(&moved_slot_idx) = bucket.get(pos) {
            if let Some(moved) = self.slots[moved_slot_idx].as_mut() {
                moved.kind_list_index = pos;
            }
        }
        self.free.push(id.0);
        Some(thing)
    }

    pub fn kind_ids(&self, kind: ThingKind) -> impl Iterator<Item = Id> + '_ {
        self.by_kind[kind as usize].iter().map(|&idx| Id(idx))
    }

    pub fn kind_count(&self, kind: ThingKind) -> usize {
        self.by_kind[kind as usize].len()
    }

    pub fn agent_ids(&self) -> &[Id] {
        &self.agent_ids
    }

    pub fn iter(&self) -> impl Iterator<Item = &Thing> {
        self.slots.iter().filter_map(|s| s.as_ref())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Thing> {
        self.slots.iter_mut().filter_map(|s| s.as_mut())
    }

    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        for bucket in self.by_kind.iter_mut() {
            bucket.clear();
        }
        self.agent_ids.clear();
    }

    /// Checked invariant from spec §4.1: every live `Thing` is reachable by
    /// both its arena slot and its per-kind bucket slot. Used by tests and
    /// by debug-mode invariant checks in the step pipeline.
    pub fn check_invariants(&self) -> Result<(), String> {
        for (idx, slot) in self.slots.iter().enumerate() {
            let Some(thing) = slot else { continue };
            if thing.things_index != idx {
                return Err(format!(
                    "thing at slot {idx} has things_index {}",
                    thing.things_index
                ));
            }
            let bucket = &self.by_kind[thing.kind as usize];
            match bucket.get(thing.kind_list_index) {
                Some(&slot_idx) if slot_idx == idx => {}
                other => {
                    return Err(format!(
                        "thing {idx} kind_list_index {} does not point back (found {:?})",
                        thing.kind_list_index, other
                    ))
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{Orientation, Pos, TeamId};
    use crate::thing::UnitClass;
    use std::collections::HashMap;

    fn agent(pos: Pos) -> Thing {
        Thing {
            id: Id(0),
            kind: ThingKind::Agent,
            pos,
            team_id: TeamId(0),
            hp: 10,
            max_hp: 10,
            cooldown: 0,
            frozen: 0,
            payload: ThingPayload::Agent {
                agent_id: 0,
                orientation: Orientation::North,
                unit_class: UnitClass::Villager,
                inventory: HashMap::new(),
                reward: 0.0,
                attack_damage: 1,
                home_altar: None,
                shield_ticks: 0,
            },
            things_index: 0,
            kind_list_index: 0,
        }
    }

    fn wall(pos: Pos) -> Thing {
        Thing {
            id: Id(0),
            kind: ThingKind::Wall,
            pos,
            team_id: TeamId::NEUTRAL,
            hp: 1,
            max_hp: 1,
            cooldown: 0,
            frozen: 0,
            payload: ThingPayload::Static,
            things_index: 0,
            kind_list_index: 0,
        }
    }

    #[test]
    fn insert_then_remove_repairs_bucket() {
        let mut reg = EntityRegistry::new();
        let a = reg.insert(wall(Pos::new(0, 0)));
        let b = reg.insert(wall(Pos::new(1, 0)));
        let c = reg.insert(wall(Pos::new(2, 0)));
        assert_eq!(reg.kind_count(ThingKind::Wall), 3);
        reg.remove(a);
        reg.check_invariants().unwrap();
        assert!(reg.get(a).is_none());
        assert!(reg.get(b).is_some());
        assert!(reg.get(c).is_some());
        assert_eq!(reg.kind_count(ThingKind::Wall), 2);
    }

    #[test]
    fn ids_recycle_after_removal() {
        let mut reg = EntityRegistry::new();
        let a = reg.insert(wall(Pos::new(0, 0)));
        reg.remove(a);
        let b = reg.insert(wall(Pos::new(3, 3)));
        assert_eq!(a, b);
    }

    #[test]
    fn agent_ids_are_stable_order() {
        let mut reg = EntityRegistry::new();
        let _a0 = reg.insert(agent(Pos::new(0, 0)));
        let _a1 = reg.insert(agent(Pos::new(1, 0)));
        assert_eq!(reg.agent_ids().len(), 2);
    }
}
