//! Damage application, death/corpse handling, and altar respawn/flip logic
//! (spec §4.5).
//!
//! Grounded on `core_sim/src/combat.rs`'s `apply_damage`/`resolve_death`
//! split (a pure damage-reduction function feeding a separate death-effects
//! function), kept here as two top-level functions operating on `&mut World`
//! rather than Bevy commands.

use crate::buildings::is_resource_camp;
use crate::config::EnvironmentConfig;
use crate::ids::{Id, Pos, TeamId, ThingKind};
use crate::observation::update_observations_for_pos;
use crate::thing::{Inventory, ItemKey, Thing, ThingPayload};
use crate::tint::ActionTintCode;
use crate::world::World;

/// Applies `dmg` to `target_id`, reducing by one consumed armor if the
/// target is an agent carrying any (spec §4.5 step 1). Returns `true` if the
/// target died from this hit.
pub fn apply_agent_damage(world: &mut World, target_id: Id, dmg: i32, _attacker_id: Option<Id>) -> bool {
    let mut effective = dmg.max(0);
    let mut has_armor = false;
    if let Some(thing) = world.registry.get_mut(target_id) {
        if let ThingPayload::Agent { inventory, .. } = &mut thing.payload {
            if inventory.get(&ItemKey::Armor).copied().unwrap_or(0) > 0 {
                has_armor = true;
                *inventory.get_mut(&ItemKey::Armor).unwrap() -= 1;
                effective = (effective - effective.min(2)).max(0);
            }
        }
    }
    if has_armor {
        world.action_tint.set(
            world.registry.get(target_id).map(|t| t.pos).unwrap_or(Pos::new(-1, -1)),
            ActionTintCode::Shield,
            2,
        );
    }

    let Some(thing) = world.registry.get_mut(target_id) else {
        return false;
    };
    thing.hp -= effective;
    let died = thing.hp <= 0;
    let pos = thing.pos;
    world.action_tint.set(pos, ActionTintCode::Melee, 2);

    if died {
        resolve_agent_death(world, target_id);
    }
    died
}

fn resolve_agent_death(world: &mut World, target_id: Id) {
    let Some(thing) = world.registry.get(target_id) else {
        return;
    };
    let pos = thing.pos;
    let team_id = thing.team_id;
    let (agent_id, loot) = match &thing.payload {
        ThingPayload::Agent { agent_id, inventory, .. } => (*agent_id, inventory.clone()),
        _ => return,
    };

    world.grid_or_overlay_clear(pos);
    if let Some(t) = world.registry.get_mut(target_id) {
        // Out-of-bounds sentinel: the dead agent keeps its `Thing` (agents
        // never leave `agents`) but must not satisfy `isValidPos` until
        // `respawn_agent` gives it a real position again, or the
        // registry/spatial-index invariant (§4.1) would demand it still
        // appear in the spatial index after `grid_or_overlay_clear` removed it.
        t.pos = Pos::new(-1, -1);
    }
    if agent_id < world.terminated.len() {
        world.terminated[agent_id] = 1;
    }
    if agent_id < world.rewards.len() {
        world.rewards[agent_id] += world.config.death_penalty;
    }
    let corpse = Thing {
        id: Id(0),
        kind: ThingKind::Corpse,
        pos,
        team_id: TeamId::NEUTRAL,
        hp: 1,
        max_hp: 1,
        cooldown: 0,
        frozen: 0,
        payload: ThingPayload::Corpse { loot },
        things_index: 0,
        kind_list_index: 0,
    };
    world.add(corpse);
    world.action_tint.set(pos, ActionTintCode::Death, 2);
    update_observations_for_pos(world, pos);

    decrement_home_altar_heart(world, team_id, agent_id);
}

fn decrement_home_altar_heart(world: &mut World, team_id: TeamId, agent_id: usize) {
    let home_altar = world
        .registry
        .get(world.agent_thing_id(agent_id).unwrap_or(Id(usize::MAX)))
        .and_then(|t| match &t.payload {
            ThingPayload::Agent { home_altar, .. } => *home_altar,
            _ => None,
        });
    let Some(altar_id) = home_altar else { return };
    let Some(altar) = world.registry.get_mut(altar_id) else {
        return;
    };
    if altar.team_id != team_id {
        return;
    }
    if let ThingPayload::Altar { hearts } = &mut altar.payload {
        *hearts = (*hearts - 1).max(0);
    }
}

/// Per-tick altar auto-respawn: for every altar at or above the threshold,
/// respawn one terminated teammate using one heart (spec §4.9 step 7).
pub fn altar_auto_respawn(world: &mut World) {
    let altar_ids: Vec<Id> = world.registry.kind_ids(ThingKind::Altar).collect();
    for altar_id in altar_ids {
        let Some(altar) = world.registry.get(altar_id) else { continue };
        let hearts = match altar.payload {
            ThingPayload::Altar { hearts } => hearts,
            _ => continue,
        };
        if hearts < world.config.altar_auto_spawn_threshold {
            continue;
        }
        let team_id = altar.team_id;
        let altar_pos = altar.pos;
        let Some(dead_agent_id) = world.find_terminated_teammate(team_id) else { continue };
        if let Some(spawn_pos) = world.find_empty_adjacent(altar_pos) {
            respawn_agent(world, dead_agent_id, spawn_pos);
            if let Some(altar) = world.registry.get_mut(altar_id) {
                if let ThingPayload::Altar { hearts } = &mut altar.payload {
                    *hearts -= 1;
                }
            }
        }
    }
}

fn respawn_agent(world: &mut World, agent_id: usize, spawn_pos: Pos) {
    let Some(id) = world.agent_thing_id(agent_id) else { return };
    let Some(thing) = world.registry.get_mut(id) else { return };
    thing.hp = thing.max_hp;
    thing.pos = spawn_pos;
    thing.cooldown = 0;
    thing.frozen = 0;
    if let ThingPayload::Agent { inventory, shield_ticks, .. } = &mut thing.payload {
        inventory.clear();
        *shield_ticks = 0;
    }
    let kind = thing.kind;
    world.spatial.add(id, spawn_pos, kind);
    let idx = world.idx(spawn_pos);
    world.set_grid_slot(idx, Some(id), kind.is_overlay());
    if agent_id < world.terminated.len() {
        world.terminated[agent_id] = 0;
    }
    update_observations_for_pos(world, spawn_pos);
}

/// Altar ownership flip on zero hearts: flips the altar to the attacker's
/// team and cascades to the former owner's `Door`s only (Open Question
/// resolution 4 in `DESIGN.md`).
pub fn flip_altar_if_destroyed(world: &mut World, altar_id: Id, attacker_team: TeamId) {
    let Some(altar) = world.registry.get(altar_id) else { return };
    let hearts_zero = matches!(altar.payload, ThingPayload::Altar { hearts } if hearts <= 0);
    if !hearts_zero {
        return;
    }
    let former_owner = altar.team_id;
    if let Some(altar) = world.registry.get_mut(altar_id) {
        altar.team_id = attacker_team;
    }
    let door_ids: Vec<Id> = world.registry.kind_ids(ThingKind::Door).collect();
    for door_id in door_ids {
        if let Some(door) = world.registry.get_mut(door_id) {
            if door.team_id == former_owner {
                door.team_id = attacker_team;
            }
        }
    }
}

/// Hands `loot` to a `Cow` kill: meat if the attacker has capacity, else a
/// residual-carrying `Corpse` (spec §4.3 ATTACK `Cow` case).
pub fn harvest_cow(world: &mut World, cow_id: Id, attacker_id: Id, cfg: &EnvironmentConfig) {
    let Some(cow) = world.registry.get(cow_id) else { return };
    let pos = cow.pos;
    world.remove_thing(cow_id);
    let mut granted = false;
    if let Some(attacker) = world.registry.get_mut(attacker_id) {
        if let ThingPayload::Agent { inventory, .. } = &mut attacker.payload {
            let total: i32 = inventory.values().sum();
            if total < cfg.max_inventory {
                *inventory.entry(ItemKey::Meat).or_insert(0) += 1;
                granted = true;
            }
        }
    }
    if granted && cfg.resource_node_initial > 1 {
        let mut loot = Inventory::new();
        loot.insert(ItemKey::Meat, cfg.resource_node_initial - 1);
        let corpse = Thing {
            id: Id(0),
            kind: ThingKind::Corpse,
            pos,
            team_id: TeamId::NEUTRAL,
            hp: 1,
            max_hp: 1,
            cooldown: 0,
            frozen: 0,
            payload: ThingPayload::Corpse { loot },
            things_index: 0,
            kind_list_index: 0,
        };
        world.add(corpse);
    }
    update_observations_for_pos(world, pos);
}

pub fn resource_camp_draws_road(kind: ThingKind) -> bool {
    is_resource_camp(kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnvironmentConfig;
    use crate::ids::Orientation;
    use crate::thing::UnitClass;

    fn small_world() -> World {
        let mut cfg = EnvironmentConfig::default();
        cfg.map_width = 20;
        cfg.map_height = 20;
        cfg.num_agents = 2;
        cfg.agents_per_team = 1;
        World::new(cfg)
    }

    fn insert_agent(world: &mut World, pos: Pos, team: TeamId, agent_id: usize) -> Id {
        world.add(Thing {
            id: Id(0),
            kind: ThingKind::Agent,
            pos,
            team_id: team,
            hp: 5,
            max_hp: 5,
            cooldown: 0,
            frozen: 0,
            payload: ThingPayload::Agent {
                agent_id,
                orientation: Orientation::South,
                unit_class: UnitClass::Villager,
                inventory: Inventory::new(),
                reward: 0.0,
                attack_damage: 1,
                home_altar: None,
                shield_ticks: 0,
            },
            things_index: 0,
            kind_list_index: 0,
        })
    }

    #[test]
    fn lethal_damage_terminates_and_spawns_corpse() {
        let mut world = small_world();
        let id = insert_agent(&mut world, Pos::new(15, 15), TeamId(0), 0);
        apply_agent_damage(&mut world, id, 100, None);
        assert_eq!(world.terminated[0], 1);
        assert!(world.registry.kind_ids(ThingKind::Corpse).next().is_some());
    }

    #[test]
    fn armor_absorbs_part_of_a_hit() {
        let mut world = small_world();
        let id = insert_agent(&mut world, Pos::new(16, 16), TeamId(0), 1);
        if let Some(thing) = world.registry.get_mut(id) {
            if let ThingPayload::Agent { inventory, .. } = &mut thing.payload {
                inventory.insert(ItemKey::Armor, 1);
            }
        }
        apply_agent_damage(&mut world, id, 3, None);
        let thing = world.registry.get(id).unwrap();
        assert!(thing.hp > 5 - 3);
    }

    /// Open Question resolution 4 in `DESIGN.md`: a destroyed altar's
    /// ownership cascades to `Door`s of the former owning team only, never
    /// to other building kinds.
    #[test]
    fn flip_altar_cascades_to_former_owners_doors_but_not_other_buildings() {
        let mut world = small_world();
        let old_team = TeamId(0);
        let new_team = TeamId(1);
        let altar_id = world.add(Thing {
            id: Id(0),
            kind: ThingKind::Altar,
            pos: Pos::new(10, 10),
            team_id: old_team,
            hp: 1,
            max_hp: 1,
            cooldown: 0,
            frozen: 0,
            payload: ThingPayload::Altar { hearts: 0 },
            things_index: 0,
            kind_list_index: 0,
        });
        let door_id = world.add(Thing {
            id: Id(0),
            kind: ThingKind::Door,
            pos: Pos::new(11, 10),
            team_id: old_team,
            hp: 20,
            max_hp: 20,
            cooldown: 0,
            frozen: 0,
            payload: ThingPayload::Door {},
            things_index: 0,
            kind_list_index: 0,
        });
        let mill_id = world.add(Thing {
            id: Id(0),
            kind: ThingKind::Mill,
            pos: Pos::new(12, 10),
            team_id: old_team,
            hp: 60,
            max_hp: 60,
            cooldown: 0,
            frozen: 0,
            payload: ThingPayload::Building {
                use_kind: crate::buildings::use_kind_for(ThingKind::Mill),
                cooldown_max: 0,
            },
            things_index: 0,
            kind_list_index: 0,
        });

        flip_altar_if_destroyed(&mut world, altar_id, new_team);

        assert_eq!(world.registry.get(altar_id).unwrap().team_id, new_team);
        assert_eq!(world.registry.get(door_id).unwrap().team_id, new_team);
        assert_eq!(
            world.registry.get(mill_id).unwrap().team_id,
            old_team,
            "non-Door buildings are never re-owned by an altar flip"
        );
    }

    // E4 — attacking a 1-heart enemy Altar flips both the altar and its
    // team's doors to the attacker's team.
    #[test]
    fn attacking_altar_to_zero_hearts_flips_team_and_cascades_doors() {
        let mut world = small_world();
        let attacker_pos = Pos::new(2, 3);
        let altar_pos = Pos::new(2, 2);
        let old_team = TeamId(1);

        let id = insert_agent(&mut world, attacker_pos, TeamId(0), 0);
        if let Some(t) = world.registry.get_mut(id) {
            t.payload = ThingPayload::Agent {
                agent_id: 0,
                orientation: crate::ids::Orientation::North,
                unit_class: UnitClass::Villager,
                inventory: Inventory::new(),
                reward: 0.0,
                attack_damage: 1,
                home_altar: None,
                shield_ticks: 0,
            };
        }
        let altar_id = world.add(Thing {
            id: Id(0),
            kind: ThingKind::Altar,
            pos: altar_pos,
            team_id: old_team,
            hp: 1,
            max_hp: 1,
            cooldown: 0,
            frozen: 0,
            payload: ThingPayload::Altar { hearts: 1 },
            things_index: 0,
            kind_list_index: 0,
        });
        let door_id = world.add(Thing {
            id: Id(0),
            kind: ThingKind::Door,
            pos: Pos::new(1, 1),
            team_id: old_team,
            hp: 20,
            max_hp: 20,
            cooldown: 0,
            frozen: 0,
            payload: ThingPayload::Door {},
            things_index: 0,
            kind_list_index: 0,
        });

        // verb 2 (ATTACK), dir 0 (North) => argument 0.
        crate::actions::dispatch_actions(&mut world, &[20]);

        assert!(matches!(world.registry.get(altar_id).unwrap().payload, ThingPayload::Altar { hearts: 0 }));
        assert_eq!(world.registry.get(altar_id).unwrap().team_id, TeamId(0));
        assert_eq!(world.registry.get(door_id).unwrap().team_id, TeamId(0));
        assert_eq!(world.stats[0].action_attack, 1);
    }
}
