//! The action dispatcher (spec §4.3): decodes each agent's packed `u8`
//! into `(verb, argument)` and mutates the world accordingly. The largest
//! single module in the core, matching its 22% share of the spec's
//! component budget (§2).
//!
//! Grounded on the teacher's function-per-concern systems style seen
//! across `fauna.rs`/`terrain.rs` (many small free functions over
//! explicit state rather than methods on a god object) and
//! `bin/server.rs`'s `parse_command`/match-based command dispatch,
//! generalized from string commands to packed-byte verbs.

use rand::Rng;

use crate::buildings::{self, UseKind};
use crate::combat::{self, apply_agent_damage, flip_altar_if_destroyed};
use crate::ids::{Id, Orientation, Pos, TeamId, ThingKind};
use crate::observation::update_observations_for_pos;
use crate::terrain::TerrainType;
use crate::thing::{Inventory, ItemKey, Thing, ThingPayload, UnitClass};
use crate::tint::ActionTintCode;
use crate::world::World;

const HEAL_AMOUNT: i32 = 3;
const MAGMA_COOLDOWN: i32 = 5;
const ARMOR_DAMAGE_REDUCTION: i32 = 2;
const SIEGE_RANGE_BONUS: i32 = 2;

/// Decode one packed action byte: `verb = action / 10`, `argument = action
/// mod 10` (spec §6.2).
fn decode(action: u8) -> (u8, u8) {
    (action / 10, action % 10)
}

/// Apply one tick's worth of agent actions, in ascending `agentId` order
/// (spec §4.3 "Agents are processed in ascending agentId order"). Frozen
/// and terminated agents skip.
pub fn dispatch_actions(world: &mut World, actions: &[u8]) {
    let num_agents = world.config.num_agents;
    for agent_id in 0..num_agents {
        let Some(id) = world.agent_thing_id(agent_id) else {
            continue;
        };
        let Some(thing) = world.registry.get(id) else {
            continue;
        };
        if thing.frozen > 0 || world.terminated.get(agent_id).copied().unwrap_or(1) == 1 {
            continue;
        }
        let action = actions.get(agent_id).copied().unwrap_or(0);
        let (verb, argument) = decode(action);
        match verb {
            0 => world.stats[agent_id].action_noop += 1,
            1 => do_move(world, agent_id, id, argument),
            2 => do_attack(world, agent_id, id, argument),
            3 => do_use(world, agent_id, id, argument),
            4 => do_swap(world, agent_id, id, argument),
            5 => do_put(world, agent_id, id, argument),
            6 => do_plant_lantern(world, agent_id, id, argument),
            7 => do_plant_resource(world, agent_id, id, argument),
            8 => do_build(world, agent_id, id, argument),
            9 => do_orient(world, agent_id, id, argument),
            _ => world.stats[agent_id].action_invalid += 1,
        }
    }
}

// ---------------------------------------------------------------------
// shared helpers
// ---------------------------------------------------------------------

fn agent_snapshot(world: &World, id: Id) -> Option<(Pos, TeamId, i32)> {
    world.registry.get(id).map(|t| (t.pos, t.team_id, t.frozen))
}

fn agent_id_of(world: &World, id: Id) -> Option<usize> {
    match world.registry.get(id).map(|t| &t.payload) {
        Some(ThingPayload::Agent { agent_id, .. }) => Some(*agent_id),
        _ => None,
    }
}

fn add_reward(world: &mut World, actor: Id, amount: f32) {
    if amount == 0.0 {
        return;
    }
    if let Some(aid) = agent_id_of(world, actor) {
        if let Some(r) = world.rewards.get_mut(aid) {
            *r += amount;
        }
    }
}

fn set_orientation_if_differs(world: &mut World, id: Id, dir: Orientation) {
    if let Some(t) = world.registry.get_mut(id) {
        if let ThingPayload::Agent { orientation, .. } = &mut t.payload {
            if *orientation != dir {
                *orientation = dir;
            }
        }
    }
}

fn has_item(world: &World, id: Id, item: ItemKey) -> bool {
    matches!(
        world.registry.get(id).map(|t| &t.payload),
        Some(ThingPayload::Agent { inventory, .. }) if inventory.get(&item).copied().unwrap_or(0) > 0
    )
}

fn inventory_total_of(world: &World, id: Id) -> i32 {
    match world.registry.get(id).map(|t| &t.payload) {
        Some(ThingPayload::Agent { inventory, .. }) => inventory.values().sum(),
        _ => 0,
    }
}

fn consume_item(world: &mut World, id: Id, item: ItemKey, n: i32) {
    if let Some(t) = world.registry.get_mut(id) {
        if let ThingPayload::Agent { inventory, .. } = &mut t.payload {
            if let Some(c) = inventory.get_mut(&item) {
                *c -= n;
                if *c <= 0 {
                    inventory.remove(&item);
                }
            }
        }
    }
}

/// Grants `n` of `item`, respecting `MaxInventory` (spec §3 "total capped
/// at `MaxInventory` for stockpile-class items").
fn grant_item(world: &mut World, id: Id, item: ItemKey, n: i32) -> bool {
    let cap = world.config.max_inventory;
    let Some(t) = world.registry.get_mut(id) else {
        return false;
    };
    let ThingPayload::Agent { inventory, .. } = &mut t.payload else {
        return false;
    };
    let total: i32 = inventory.values().sum();
    if total + n > cap {
        return false;
    }
    *inventory.entry(item).or_insert(0) += n;
    true
}

fn reward_for_item(cfg: &crate::config::EnvironmentConfig, item: ItemKey) -> f32 {
    match item {
        ItemKey::Wood => cfg.wood_reward,
        ItemKey::Wheat => cfg.wheat_reward,
        ItemKey::Stone | ItemKey::Gold => cfg.ore_reward,
        ItemKey::Water => cfg.water_reward,
        ItemKey::Bread => cfg.food_reward,
        ItemKey::Cloth => cfg.cloth_reward,
        ItemKey::Spear => cfg.spear_reward,
        ItemKey::Armor => cfg.armor_reward,
        ItemKey::Bar => cfg.bar_reward,
        _ => 0.0,
    }
}

fn perpendiculars(d: (i32, i32)) -> [(i32, i32); 2] {
    [(-d.1, d.0), (d.1, -d.0)]
}

/// What a resource node leaves behind once depleted (spec §4.6 "optionally
/// leaving a `Stump`, `Stubble`, or `Skeleton`"), re-seeded as a
/// one-unit `ResourceNode` so it stays harvestable through the same
/// `harvest_node` path the USE dispatch already uses for it (spec §4.3
/// USE lists `Stump` among the resource-take kinds).
fn spawn_residue(world: &mut World, kind: ThingKind, pos: Pos) {
    let (item, remaining) = match kind {
        ThingKind::Stump => (ItemKey::Wood, 1),
        ThingKind::Stubble => (ItemKey::Wheat, 1),
        _ => return,
    };
    world.add(Thing {
        id: Id(0),
        kind,
        pos,
        team_id: TeamId::NEUTRAL,
        hp: 1,
        max_hp: 1,
        cooldown: 0,
        frozen: 0,
        payload: ThingPayload::ResourceNode { item, remaining },
        things_index: 0,
        kind_list_index: 0,
    });
}

fn leave_behind_kind(kind: ThingKind) -> Option<ThingKind> {
    match kind {
        ThingKind::Tree => Some(ThingKind::Stump),
        ThingKind::Wheat => Some(ThingKind::Stubble),
        _ => None,
    }
}

/// Decrements a resource node's internal count, grants one item to
/// `actor`, applies the per-resource reward, and removes the node (leaving
/// residue where applicable) once exhausted (spec §4.6).
fn harvest_node(world: &mut World, node_id: Id, actor: Id) -> bool {
    let (item, remaining, pos, kind) = {
        let Some(node) = world.registry.get(node_id) else {
            return false;
        };
        let ThingPayload::ResourceNode { item, remaining } = node.payload else {
            return false;
        };
        (item, remaining, node.pos, node.kind)
    };
    if remaining <= 0 {
        return false;
    }
    if !grant_item(world, actor, item, 1) {
        return false;
    }
    add_reward(world, actor, reward_for_item(&world.config, item));

    let new_remaining = remaining - 1;
    if new_remaining <= 0 {
        world.remove_thing(node_id);
        if let Some(residue) = leave_behind_kind(kind) {
            spawn_residue(world, residue, pos);
        }
    } else if let Some(t) = world.registry.get_mut(node_id) {
        if let ThingPayload::ResourceNode { remaining, .. } = &mut t.payload {
            *remaining = new_remaining;
        }
    }
    update_observations_for_pos(world, pos);
    true
}

// ---------------------------------------------------------------------
// verb 0/9: NOOP / ORIENT
// ---------------------------------------------------------------------

fn do_orient(world: &mut World, agent_id: usize, id: Id, argument: u8) {
    let Some(dir) = Orientation::from_index(argument) else {
        world.stats[agent_id].action_invalid += 1;
        return;
    };
    set_orientation_if_differs(world, id, dir);
    world.stats[agent_id].action_orient += 1;
}

// ---------------------------------------------------------------------
// verb 1: MOVE
// ---------------------------------------------------------------------

enum CanEnter {
    Entered,
    Handled,
    Invalid,
}

/// Attempts to push a blocking `Lantern` out of the mover's path (spec
/// §4.3 MOVE step 2). Preferred destinations are `step1 + d`, then
/// `step1 + 2d`, then any of the 8 neighbors of the lantern's own
/// position; the first candidate that is empty, door-free, unblocked, and
/// at least Chebyshev-3 from every *other* lantern wins.
fn try_push_lantern(world: &mut World, lantern_id: Id, lantern_pos: Pos, dir: Orientation) -> bool {
    let (dx, dy) = dir.delta();
    let mut candidates = vec![
        lantern_pos.offset_dir(dir),
        Pos::new(lantern_pos.x + dx * 2, lantern_pos.y + dy * 2),
    ];
    for d in Orientation::DELTAS {
        candidates.push(lantern_pos.offset(d));
    }
    for cand in candidates {
        if !world.is_valid_pos(cand) || world.is_terrain_blocked(cand) {
            continue;
        }
        if world.grid_at(cand).is_some() || world.overlay_at(cand).is_some() {
            continue;
        }
        if !lantern_spacing_ok(world, cand, lantern_id) {
            continue;
        }
        world.move_thing(lantern_id, cand);
        return true;
    }
    false
}

fn lantern_spacing_ok(world: &World, cand: Pos, self_id: Id) -> bool {
    for other_id in world.registry.kind_ids(ThingKind::Lantern) {
        if other_id == self_id {
            continue;
        }
        if let Some(other) = world.registry.get(other_id) {
            if cand.chebyshev(other.pos) < 3 {
                return false;
            }
        }
    }
    true
}

/// `canEnter(step1)` per spec §4.3 MOVE: empty tile, pushable `Lantern`,
/// teammate-agent swap, or `Tree` harvest, in that priority order.
fn can_enter(world: &mut World, mover_id: Id, agent_id: usize, team: TeamId, target: Pos, dir: Orientation) -> CanEnter {
    if let Some(overlay_id) = world.overlay_at(target) {
        if world.registry.get(overlay_id).map(|t| t.kind) == Some(ThingKind::Lantern) {
            return if try_push_lantern(world, overlay_id, target, dir) {
                CanEnter::Entered
            } else {
                CanEnter::Invalid
            };
        }
    }
    let Some(blocker_id) = world.grid_at(target) else {
        return CanEnter::Entered;
    };
    let Some(blocker) = world.registry.get(blocker_id) else {
        return CanEnter::Entered;
    };
    let (blocker_kind, blocker_team, blocker_frozen) = (blocker.kind, blocker.team_id, blocker.frozen);
    if blocker_kind == ThingKind::Agent && blocker_team == team && blocker_frozen == 0 {
        perform_swap(world, mover_id, blocker_id);
        set_orientation_if_differs(world, mover_id, dir);
        world.stats[agent_id].action_move += 1;
        return CanEnter::Handled;
    }
    if blocker_kind == ThingKind::Tree && blocker_frozen == 0 {
        if harvest_node(world, blocker_id, mover_id) {
            world.stats[agent_id].action_use += 1;
            return CanEnter::Handled;
        }
        return CanEnter::Invalid;
    }
    CanEnter::Invalid
}

/// Simplified `canEnter` used only for the Road double-move's second tile
/// (spec §4.3 MOVE step 3): literally empty of any blocking or overlay
/// occupant, no swap/harvest/push fallback chained from the first step.
fn can_enter_plain(world: &World, target: Pos) -> bool {
    world.grid_at(target).is_none() && world.overlay_at(target).is_none()
}

fn perform_swap(world: &mut World, a: Id, b: Id) {
    let Some(pa) = world.registry.get(a).map(|t| t.pos) else { return };
    let Some(pb) = world.registry.get(b).map(|t| t.pos) else { return };
    world.move_thing(a, pb);
    world.move_thing(b, pa);
    update_observations_for_pos(world, pa);
    update_observations_for_pos(world, pb);
}

fn do_move(world: &mut World, agent_id: usize, id: Id, argument: u8) {
    let Some(dir) = Orientation::from_index(argument) else {
        world.stats[agent_id].action_invalid += 1;
        return;
    };
    let Some((pos, team, frozen)) = agent_snapshot(world, id) else {
        return;
    };
    set_orientation_if_differs(world, id, dir);
    if frozen > 0 {
        world.stats[agent_id].action_invalid += 1;
        return;
    }
    let step1 = pos.offset_dir(dir);
    if !world.is_valid_pos(step1) || world.is_terrain_blocked(step1) || world.door_blocks(step1, team) {
        world.stats[agent_id].action_invalid += 1;
        return;
    }
    match can_enter(world, id, agent_id, team, step1, dir) {
        CanEnter::Entered => {
            let mut final_pos = step1;
            if world.terrain_at(step1) == TerrainType::Road {
                let (dx, dy) = dir.delta();
                let step2 = Pos::new(pos.x + dx * 2, pos.y + dy * 2);
                if world.is_valid_pos(step2)
                    && !world.is_terrain_blocked(step2)
                    && !world.door_blocks(step2, team)
                    && can_enter_plain(world, step2)
                {
                    final_pos = step2;
                }
            }
            world.move_thing(id, final_pos);
            update_observations_for_pos(world, pos);
            update_observations_for_pos(world, final_pos);
            world.stats[agent_id].action_move += 1;
        }
        CanEnter::Handled => {}
        CanEnter::Invalid => {
            world.stats[agent_id].action_invalid += 1;
        }
    }
}

// ---------------------------------------------------------------------
// verb 2: ATTACK
// ---------------------------------------------------------------------

fn has_enemy_door(world: &World, pos: Pos, team: TeamId) -> bool {
    match world.overlay_at(pos).and_then(|id| world.registry.get(id)) {
        Some(t) => t.kind == ThingKind::Door && t.team_id != team,
        None => false,
    }
}

/// Per-tile hit resolution, first match wins (spec §4.3 ATTACK `tryHitAt`).
fn try_hit_at(world: &mut World, pos: Pos, damage: i32, attacker_id: Id, attacker_team: TeamId) -> bool {
    if !world.is_valid_pos(pos) {
        return false;
    }
    if let Some(door_id) = world.overlay_at(pos) {
        if let Some(door) = world.registry.get(door_id) {
            if door.kind == ThingKind::Door && door.team_id != attacker_team {
                let hp = door.hp;
                if let Some(d) = world.registry.get_mut(door_id) {
                    d.hp = hp - damage;
                }
                if hp - damage <= 0 {
                    world.remove_thing(door_id);
                }
                return true;
            }
        }
    }
    let Some(target_id) = world.grid_at(pos) else {
        return false;
    };
    let Some(target) = world.registry.get(target_id) else {
        return false;
    };
    match target.kind {
        ThingKind::Tumor => {
            world.remove_thing(target_id);
            add_reward(world, attacker_id, world.config.tumor_kill_reward);
            world.action_tint.set(pos, ActionTintCode::Death, 2);
            true
        }
        ThingKind::Spawner => {
            world.remove_thing(target_id);
            true
        }
        ThingKind::Agent => {
            if target.team_id == attacker_team {
                return false;
            }
            apply_agent_damage(world, target_id, damage, Some(attacker_id));
            true
        }
        ThingKind::Altar => {
            if target.team_id == attacker_team {
                return false;
            }
            let hearts = match target.payload {
                ThingPayload::Altar { hearts } => hearts,
                _ => return false,
            };
            if let Some(t) = world.registry.get_mut(target_id) {
                if let ThingPayload::Altar { hearts } = &mut t.payload {
                    *hearts -= 1;
                }
            }
            if hearts - 1 <= 0 {
                flip_altar_if_destroyed(world, target_id, attacker_team);
            }
            true
        }
        ThingKind::Cow => {
            combat::harvest_cow(world, target_id, attacker_id, &world.config.clone());
            true
        }
        ThingKind::Tree => harvest_node(world, target_id, attacker_id),
        _ => false,
    }
}

fn do_monk_heal(world: &mut World, pos: Pos, dir: Orientation, team: TeamId) -> bool {
    let target_pos = pos.offset_dir(dir);
    let Some(tid) = world.grid_at(target_pos) else {
        return false;
    };
    let Some(target) = world.registry.get(tid) else {
        return false;
    };
    if target.kind != ThingKind::Agent || target.team_id != team {
        return false;
    }
    if let Some(t) = world.registry.get_mut(tid) {
        t.hp = (t.hp + HEAL_AMOUNT).min(t.max_hp);
    }
    world.action_tint.set(target_pos, ActionTintCode::HealMonk, 2);
    true
}

fn do_ranged(world: &mut World, attacker_id: Id, pos: Pos, dir: Orientation, team: TeamId, damage: i32, range: i32) -> bool {
    let (dx, dy) = dir.delta();
    for dist in 1..=range {
        let p = Pos::new(pos.x + dx * dist, pos.y + dy * dist);
        if !world.is_valid_pos(p) {
            break;
        }
        if world.grid_at(p).is_some() || has_enemy_door(world, p, team) {
            world.action_tint.set(p, ActionTintCode::Ranged, 2);
            return try_hit_at(world, p, damage, attacker_id, team);
        }
    }
    false
}

fn do_siege(world: &mut World, attacker_id: Id, pos: Pos, dir: Orientation, team: TeamId, damage: i32, range: i32) -> bool {
    let (dx, dy) = dir.delta();
    for dist in 1..=range {
        let p = Pos::new(pos.x + dx * dist, pos.y + dy * dist);
        if !world.is_valid_pos(p) {
            break;
        }
        if world.grid_at(p).is_some() || has_enemy_door(world, p, team) {
            world.action_tint.set(p, ActionTintCode::Ranged, 2);
            let mut any = try_hit_at(world, p, damage, attacker_id, team);
            for off in perpendiculars((dx, dy)) {
                let side = Pos::new(p.x + off.0, p.y + off.1);
                if try_hit_at(world, side, (damage / 2).max(1), attacker_id, team) {
                    any = true;
                }
            }
            return any;
        }
    }
    false
}

/// Spear area strike: forward tile plus its two perpendicular neighbors,
/// for `step ∈ 1..3` (spec §4.3 ATTACK, tested in E7/§8 property 7).
fn do_spear_attack(world: &mut World, attacker_id: Id, pos: Pos, dir: Orientation, team: TeamId, damage: i32) -> bool {
    let d = dir.delta();
    let perp = perpendiculars(d);
    let mut any_hit = false;
    for step in 1..3 {
        let center = Pos::new(pos.x + d.0 * step, pos.y + d.1 * step);
        world.action_tint.set(center, ActionTintCode::SpearAoe, 2);
        for offset in [(0, 0), perp[0], perp[1]] {
            let p = Pos::new(center.x + offset.0, center.y + offset.1);
            if try_hit_at(world, p, damage, attacker_id, team) {
                any_hit = true;
            }
        }
    }
    if any_hit {
        consume_item(world, attacker_id, ItemKey::Spear, 1);
    }
    any_hit
}

fn do_attack(world: &mut World, agent_id: usize, id: Id, argument: u8) {
    let Some(dir) = Orientation::from_index(argument) else {
        world.stats[agent_id].action_invalid += 1;
        return;
    };
    set_orientation_if_differs(world, id, dir);
    let Some((pos, team, unit_class, attack_damage, has_spear, frozen)) = (match world.registry.get(id) {
        Some(t) => match &t.payload {
            ThingPayload::Agent {
                unit_class,
                attack_damage,
                inventory,
                ..
            } => Some((
                t.pos,
                t.team_id,
                *unit_class,
                *attack_damage,
                inventory.get(&ItemKey::Spear).copied().unwrap_or(0) > 0,
                t.frozen,
            )),
            _ => None,
        },
        None => None,
    }) else {
        return;
    };
    if frozen > 0 {
        world.stats[agent_id].action_invalid += 1;
        return;
    }
    let damage = attack_damage.max(1);
    let archer_range = world.config.archer_base_range;
    let hit = match unit_class {
        UnitClass::Monk => do_monk_heal(world, pos, dir, team),
        UnitClass::Archer => do_ranged(world, id, pos, dir, team, damage, archer_range),
        UnitClass::Siege => do_siege(world, id, pos, dir, team, damage, archer_range + SIEGE_RANGE_BONUS),
        _ if has_spear => do_spear_attack(world, id, pos, dir, team, damage),
        _ => try_hit_at(world, pos.offset_dir(dir), damage, id, team),
    };
    if hit {
        world.stats[agent_id].action_attack += 1;
    } else {
        world.stats[agent_id].action_invalid += 1;
    }
}

// ---------------------------------------------------------------------
// verb 3: USE
// ---------------------------------------------------------------------

fn heal_teammates_around(world: &mut World, healer_id: Id, center: Pos) {
    let team = world.registry.get(healer_id).map(|t| t.team_id).unwrap_or(TeamId::NEUTRAL);
    let ids = world.spatial.collect_allies_in_range(&world.registry, center, team, 1);
    for tid in ids {
        if let Some(t) = world.registry.get_mut(tid) {
            t.hp = (t.hp + HEAL_AMOUNT).min(t.max_hp);
        }
    }
}

fn use_terrain(world: &mut World, actor: Id, target: Pos) -> bool {
    match world.terrain_at(target) {
        TerrainType::Water => {
            if grant_item(world, actor, ItemKey::Water, 1) {
                add_reward(world, actor, world.config.water_reward);
                true
            } else {
                false
            }
        }
        TerrainType::Empty | TerrainType::Grass | TerrainType::Dune | TerrainType::Sand | TerrainType::Snow | TerrainType::Road => {
            if has_item(world, actor, ItemKey::Bread) {
                consume_item(world, actor, ItemKey::Bread, 1);
                heal_teammates_around(world, actor, target);
                world.action_tint.set(target, ActionTintCode::HealMonk, 2);
                true
            } else if has_item(world, actor, ItemKey::Water) {
                consume_item(world, actor, ItemKey::Water, 1);
                world.set_terrain(target, TerrainType::Fertile);
                true
            } else {
                false
            }
        }
        _ => false,
    }
}

fn use_magma(world: &mut World, magma_id: Id, actor: Id) -> bool {
    let Some(magma) = world.registry.get(magma_id) else {
        return false;
    };
    if magma.cooldown > 0 || !has_item(world, actor, ItemKey::Gold) {
        return false;
    }
    consume_item(world, actor, ItemKey::Gold, 1);
    if !grant_item(world, actor, ItemKey::Bar, 1) {
        // capacity exhausted after consuming gold: refund and fail.
        if let Some(t) = world.registry.get_mut(actor) {
            if let ThingPayload::Agent { inventory, .. } = &mut t.payload {
                *inventory.entry(ItemKey::Gold).or_insert(0) += 1;
            }
        }
        return false;
    }
    add_reward(world, actor, world.config.bar_reward);
    if let Some(t) = world.registry.get_mut(magma_id) {
        t.cooldown = MAGMA_COOLDOWN;
    }
    true
}

fn use_crafting(world: &mut World, building_id: Id, actor: Id, team: TeamId) -> bool {
    let Some(building) = world.registry.get(building_id) else {
        return false;
    };
    if building.cooldown > 0 || building.team_id != team {
        return false;
    }
    let Some(recipe) = buildings::recipe_for(building.kind) else {
        return false;
    };
    if !has_item(world, actor, recipe.consumes) {
        return false;
    }
    consume_item(world, actor, recipe.consumes, recipe.consumes_count);
    if !grant_item(world, actor, recipe.produces, recipe.produces_count) {
        // refund on capacity failure.
        if let Some(t) = world.registry.get_mut(actor) {
            if let ThingPayload::Agent { inventory, .. } = &mut t.payload {
                *inventory.entry(recipe.consumes).or_insert(0) += recipe.consumes_count;
            }
        }
        return false;
    }
    add_reward(world, actor, reward_for_item(&world.config, recipe.produces));
    if let Some(t) = world.registry.get_mut(building_id) {
        t.cooldown = recipe.cooldown;
    }
    true
}

fn use_altar(world: &mut World, altar_id: Id, actor: Id, team: TeamId) -> bool {
    let Some(altar) = world.registry.get(altar_id) else {
        return false;
    };
    if altar.team_id != team || altar.cooldown > 0 || !has_item(world, actor, ItemKey::Bar) {
        return false;
    }
    consume_item(world, actor, ItemKey::Bar, 1);
    if let Some(t) = world.registry.get_mut(altar_id) {
        if let ThingPayload::Altar { hearts } = &mut t.payload {
            *hearts += 1;
        }
        t.cooldown = world.config.altar_cooldown;
    }
    add_reward(world, actor, world.config.heart_reward);
    true
}

/// Sells the largest carried sellable resource straight to gold at the
/// team's stockpile (spec §4.6 "sell stockpile resources for gold"; the
/// exact exchange rate is undefined by spec.md, fixed at 2:1 here and
/// recorded as a design choice in `DESIGN.md`).
fn use_market(world: &mut World, actor: Id, team: TeamId) -> bool {
    const SELL_RATE: i32 = 2;
    let sellable = [ItemKey::Wood, ItemKey::Stone, ItemKey::Wheat];
    let chosen = sellable.into_iter().find(|&item| has_item(world, actor, item));
    let Some(item) = chosen else {
        return false;
    };
    consume_item(world, actor, item, 1);
    let team_idx = team.0.max(0) as usize;
    if let Some(stock) = world.stockpiles.get_mut(team_idx) {
        stock.add(ItemKey::Gold, SELL_RATE, i32::MAX / 2);
    }
    add_reward(world, actor, world.config.ore_reward);
    true
}

fn use_dropoff(world: &mut World, building_id: Id, actor: Id, team: TeamId) -> bool {
    let Some(building) = world.registry.get(building_id) else {
        return false;
    };
    if building.team_id != team && building.team_id != TeamId::NEUTRAL {
        return false;
    }
    let accepted = buildings::dropoff_accepts(building.kind);
    if accepted.is_empty() {
        return false;
    }
    let team_idx = team.0.max(0) as usize;
    let cap = i32::MAX / 2;
    let mut any = false;
    for &item in accepted {
        let n = match world.registry.get(actor).map(|t| &t.payload) {
            Some(ThingPayload::Agent { inventory, .. }) => inventory.get(&item).copied().unwrap_or(0),
            _ => 0,
        };
        if n > 0 {
            consume_item(world, actor, item, n);
            if let Some(stock) = world.stockpiles.get_mut(team_idx) {
                stock.add(item, n, cap);
            }
            any = true;
        }
    }
    any
}

fn use_training(world: &mut World, building_id: Id, team: TeamId) -> bool {
    let Some(building) = world.registry.get(building_id) else {
        return false;
    };
    if building.team_id != team || building.cooldown > 0 {
        return false;
    }
    let Some(option) = buildings::TRAINING_OPTIONS.first() else {
        return false;
    };
    let team_idx = team.0.max(0) as usize;
    let Some(stock) = world.stockpiles.get_mut(team_idx) else {
        return false;
    };
    if !stock.spend(option.costs) {
        return false;
    }
    let Some(trainee_agent_id) = world.find_terminated_teammate(team) else {
        return false;
    };
    let Some(trainee_id) = world.agent_thing_id(trainee_agent_id) else {
        return false;
    };
    let Some(spawn_pos) = world.find_empty_adjacent(building.pos) else {
        return false;
    };
    if let Some(t) = world.registry.get_mut(trainee_id) {
        t.pos = spawn_pos;
        t.hp = t.max_hp;
        if let ThingPayload::Agent { inventory, unit_class, .. } = &mut t.payload {
            inventory.clear();
            *unit_class = option.unit_class;
        }
    }
    let kind = world.registry.get(trainee_id).map(|t| t.kind).unwrap_or(ThingKind::Agent);
    world.spatial.add(trainee_id, spawn_pos, kind);
    let idx = world.idx(spawn_pos);
    world.set_grid_slot(idx, Some(trainee_id), false);
    if trainee_agent_id < world.terminated.len() {
        world.terminated[trainee_agent_id] = 0;
    }
    update_observations_for_pos(world, spawn_pos);
    if let Some(t) = world.registry.get_mut(building_id) {
        t.cooldown = option.cooldown;
    }
    true
}

fn use_research(world: &mut World, building_id: Id, team: TeamId) -> bool {
    let Some(building) = world.registry.get(building_id) else {
        return false;
    };
    building.team_id == team && building.cooldown == 0 && {
        if let Some(t) = world.registry.get_mut(building_id) {
            t.cooldown = world.config.altar_cooldown;
        }
        true
    }
}

fn use_corpse(world: &mut World, corpse_id: Id, actor: Id) -> bool {
    const ITEM_ORDER: [ItemKey; 13] = [
        ItemKey::Meat,
        ItemKey::Wood,
        ItemKey::Wheat,
        ItemKey::Stone,
        ItemKey::Gold,
        ItemKey::Bar,
        ItemKey::Bread,
        ItemKey::Armor,
        ItemKey::Cloth,
        ItemKey::Spear,
        ItemKey::Wool,
        ItemKey::Water,
        ItemKey::Lantern,
    ];
    let Some(corpse) = world.registry.get(corpse_id) else {
        return false;
    };
    let pos = corpse.pos;
    let ThingPayload::Corpse { loot } = &corpse.payload else {
        return false;
    };
    let Some(item) = ITEM_ORDER.into_iter().find(|it| loot.get(it).copied().unwrap_or(0) > 0) else {
        return false;
    };
    if !grant_item(world, actor, item, 1) {
        return false;
    }
    let mut non_meat_remaining = false;
    if let Some(t) = world.registry.get_mut(corpse_id) {
        if let ThingPayload::Corpse { loot } = &mut t.payload {
            if let Some(c) = loot.get_mut(&item) {
                *c -= 1;
                if *c <= 0 {
                    loot.remove(&item);
                }
            }
            non_meat_remaining = loot.keys().any(|k| *k != ItemKey::Meat);
        }
    }
    if !non_meat_remaining {
        world.remove_thing(corpse_id);
        world.add(Thing {
            id: Id(0),
            kind: ThingKind::Skeleton,
            pos,
            team_id: TeamId::NEUTRAL,
            hp: 1,
            max_hp: 1,
            cooldown: 0,
            frozen: 0,
            payload: ThingPayload::Skeleton,
            things_index: 0,
            kind_list_index: 0,
        });
    }
    true
}

fn use_thing(world: &mut World, oid: Id, actor: Id, team: TeamId) -> bool {
    let Some(t) = world.registry.get(oid) else {
        return false;
    };
    if t.frozen > 0 {
        return false;
    }
    match t.kind {
        ThingKind::Wheat | ThingKind::Stubble | ThingKind::Stone | ThingKind::Gold | ThingKind::Bush | ThingKind::Cactus | ThingKind::Stalagmite | ThingKind::Stump | ThingKind::Tree => {
            harvest_node(world, oid, actor)
        }
        ThingKind::Corpse => use_corpse(world, oid, actor),
        ThingKind::Magma => use_magma(world, oid, actor),
        ThingKind::WeavingLoom | ThingKind::ClayOven | ThingKind::Blacksmith | ThingKind::Armory => use_crafting(world, oid, actor, team),
        ThingKind::Altar => use_altar(world, oid, actor, team),
        ThingKind::Market => use_market(world, actor, team),
        ThingKind::Dropoff | ThingKind::Storage | ThingKind::TownCenter | ThingKind::Mill | ThingKind::LumberCamp | ThingKind::MiningCamp => {
            use_dropoff(world, oid, actor, team)
        }
        ThingKind::TrainingGround => use_training(world, oid, team),
        ThingKind::ResearchHouse => use_research(world, oid, team),
        _ => false,
    }
}

fn do_use(world: &mut World, agent_id: usize, id: Id, argument: u8) {
    let Some(dir) = Orientation::from_index(argument) else {
        world.stats[agent_id].action_invalid += 1;
        return;
    };
    let Some((pos, team, frozen)) = agent_snapshot(world, id) else {
        return;
    };
    if frozen > 0 {
        world.stats[agent_id].action_invalid += 1;
        return;
    }
    let target = pos.offset_dir(dir);
    if !world.is_valid_pos(target) {
        world.stats[agent_id].action_invalid += 1;
        return;
    }
    let occupant = world.grid_at(target).or_else(|| world.overlay_at(target));
    let success = match occupant {
        Some(oid) => use_thing(world, oid, id, team),
        None => use_terrain(world, id, target),
    };
    if success {
        world.stats[agent_id].action_use += 1;
    } else {
        world.stats[agent_id].action_invalid += 1;
    }
}

// ---------------------------------------------------------------------
// verb 4: SWAP
// ---------------------------------------------------------------------

fn do_swap(world: &mut World, agent_id: usize, id: Id, argument: u8) {
    let Some(dir) = Orientation::from_index(argument) else {
        world.stats[agent_id].action_invalid += 1;
        return;
    };
    let Some((pos, team, frozen)) = agent_snapshot(world, id) else {
        return;
    };
    if frozen > 0 {
        world.stats[agent_id].action_invalid += 1;
        return;
    }
    let target_pos = pos.offset_dir(dir);
    let Some(tid) = world.grid_at(target_pos) else {
        world.stats[agent_id].action_invalid += 1;
        return;
    };
    let Some(target) = world.registry.get(tid) else {
        world.stats[agent_id].action_invalid += 1;
        return;
    };
    if target.kind != ThingKind::Agent || target.team_id != team || target.frozen > 0 {
        world.stats[agent_id].action_invalid += 1;
        return;
    }
    perform_swap(world, id, tid);
    world.stats[agent_id].action_swap += 1;
}

// ---------------------------------------------------------------------
// verb 5: PUT (give)
// ---------------------------------------------------------------------

fn give_item(world: &mut World, giver: Id, receiver: Id) -> bool {
    let cap = world.config.max_inventory;
    let Some(ThingPayload::Agent { inventory: giver_inv, .. }) = world.registry.get(giver).map(|t| t.payload.clone()) else {
        return false;
    };
    let receiver_total = inventory_total_of(world, receiver);
    if receiver_total >= cap {
        return false;
    }
    let receiver_has_armor = has_item(world, receiver, ItemKey::Armor);

    let chosen = if giver_inv.get(&ItemKey::Armor).copied().unwrap_or(0) > 0 && !receiver_has_armor {
        Some(ItemKey::Armor)
    } else if giver_inv.get(&ItemKey::Bread).copied().unwrap_or(0) > 0 {
        Some(ItemKey::Bread)
    } else {
        giver_inv
            .iter()
            .filter(|(_, &c)| c > 0)
            .max_by_key(|(k, &c)| (c, std::cmp::Reverse(**k as u8)))
            .map(|(k, _)| *k)
    };
    let Some(item) = chosen else {
        return false;
    };
    consume_item(world, giver, item, 1);
    grant_item(world, receiver, item, 1)
}

fn do_put(world: &mut World, agent_id: usize, id: Id, argument: u8) {
    let Some(dir) = Orientation::from_index(argument) else {
        world.stats[agent_id].action_invalid += 1;
        return;
    };
    let Some((pos, team, frozen)) = agent_snapshot(world, id) else {
        return;
    };
    if frozen > 0 {
        world.stats[agent_id].action_invalid += 1;
        return;
    }
    let target_pos = pos.offset_dir(dir);
    let Some(tid) = world.grid_at(target_pos) else {
        world.stats[agent_id].action_invalid += 1;
        return;
    };
    let Some(target) = world.registry.get(tid) else {
        world.stats[agent_id].action_invalid += 1;
        return;
    };
    if target.kind != ThingKind::Agent || target.team_id != team {
        world.stats[agent_id].action_invalid += 1;
        return;
    }
    if give_item(world, id, tid) {
        world.stats[agent_id].action_put += 1;
    } else {
        world.stats[agent_id].action_invalid += 1;
    }
}

// ---------------------------------------------------------------------
// verb 6: PLANT LANTERN
// ---------------------------------------------------------------------

fn do_plant_lantern(world: &mut World, agent_id: usize, id: Id, argument: u8) {
    let Some(dir) = Orientation::from_index(argument) else {
        world.stats[agent_id].action_invalid += 1;
        return;
    };
    let Some((pos, team, frozen)) = agent_snapshot(world, id) else {
        return;
    };
    if frozen > 0 {
        world.stats[agent_id].action_invalid += 1;
        return;
    }
    let target = pos.offset_dir(dir);
    let blocked = !world.is_valid_pos(target)
        || world.is_terrain_blocked(target)
        || world.terrain_at(target) == TerrainType::Water
        || world.grid_at(target).is_some()
        || world.overlay_at(target).is_some();
    if blocked || !has_item(world, id, ItemKey::Lantern) {
        world.stats[agent_id].action_invalid += 1;
        return;
    }
    consume_item(world, id, ItemKey::Lantern, 1);
    world.add(Thing {
        id: Id(0),
        kind: ThingKind::Lantern,
        pos: target,
        team_id: team,
        hp: 1,
        max_hp: 1,
        cooldown: 0,
        frozen: 0,
        payload: ThingPayload::Lantern { healthy: true },
        things_index: 0,
        kind_list_index: 0,
    });
    add_reward(world, id, world.config.cloth_reward / 2.0);
    world.stats[agent_id].action_plant += 1;
}

// ---------------------------------------------------------------------
// verb 7: PLANT RESOURCE
// ---------------------------------------------------------------------

/// Argument decoding retained verbatim from the source per Design Notes
/// §9 / `DESIGN.md` Open Question 3: `kind_bit = argument % 2` (0 = wheat,
/// 1 = tree), `dir = (argument / 2) % 4`, restricted to the 4 cardinal
/// directions regardless of whether `argument` falls in the normal 0..7
/// window or the ad-hoc `argument > 7` fallback — both reduce to the same
/// formula.
fn do_plant_resource(world: &mut World, agent_id: usize, id: Id, argument: u8) {
    let kind_bit = argument % 2;
    let dir_idx = (argument / 2) % 4;
    let Some(dir) = Orientation::from_index(dir_idx) else {
        world.stats[agent_id].action_invalid += 1;
        return;
    };
    let Some((pos, _team, frozen)) = agent_snapshot(world, id) else {
        return;
    };
    if frozen > 0 {
        world.stats[agent_id].action_invalid += 1;
        return;
    }
    let target = pos.offset_dir(dir);
    let (item, kind) = if kind_bit == 0 {
        (ItemKey::Wheat, ThingKind::Wheat)
    } else {
        (ItemKey::Wood, ThingKind::Tree)
    };
    let ok = world.is_valid_pos(target)
        && world.terrain_at(target) == TerrainType::Fertile
        && world.grid_at(target).is_none()
        && world.overlay_at(target).is_none()
        && !world.is_terrain_blocked(target)
        && has_item(world, id, item);
    if !ok {
        world.stats[agent_id].action_invalid += 1;
        return;
    }
    consume_item(world, id, item, 1);
    let initial = world.config.resource_node_initial;
    world.add(Thing {
        id: Id(0),
        kind,
        pos: target,
        team_id: TeamId::NEUTRAL,
        hp: 1,
        max_hp: 1,
        cooldown: 0,
        frozen: 0,
        payload: ThingPayload::ResourceNode { item, remaining: initial },
        things_index: 0,
        kind_list_index: 0,
    });
    world.set_terrain(target, TerrainType::Empty);
    world.stats[agent_id].action_plant_resource += 1;
}

// ---------------------------------------------------------------------
// verb 8: BUILD
// ---------------------------------------------------------------------

fn can_place(world: &World, pos: Pos) -> bool {
    world.is_valid_pos(pos) && !world.is_terrain_blocked(pos) && world.grid_at(pos).is_none() && world.overlay_at(pos).is_none()
}

fn building_payload(kind: ThingKind) -> ThingPayload {
    match kind {
        ThingKind::Door => ThingPayload::Door {},
        _ => ThingPayload::Building {
            use_kind: buildings::use_kind_for(kind),
            cooldown_max: 0,
        },
    }
}

fn pay_cost(world: &mut World, actor: Id, team: TeamId, costs: &[(ItemKey, i32)]) -> bool {
    let affordable_from_inventory = match world.registry.get(actor).map(|t| &t.payload) {
        Some(ThingPayload::Agent { inventory, .. }) => costs.iter().all(|&(item, amt)| inventory.get(&item).copied().unwrap_or(0) >= amt),
        _ => false,
    };
    if affordable_from_inventory {
        for &(item, amt) in costs {
            consume_item(world, actor, item, amt);
        }
        return true;
    }
    let team_idx = team.0.max(0) as usize;
    match world.stockpiles.get_mut(team_idx) {
        Some(stock) => stock.spend(costs),
        None => false,
    }
}

/// L-shaped road from `site` back to the nearest teammate `TownCenter`/
/// `Altar`: X axis first, then Y axis. Axis-order-dependent and
/// intentionally reproduced verbatim (spec §9 / `DESIGN.md` Open
/// Question 2), tested against scenario E5.
fn draw_road(world: &mut World, site: Pos, team: TeamId) {
    let max_dist = world.width().max(world.height());
    let anchor_id = world
        .spatial
        .find_nearest_friendly(&world.registry, site, team, ThingKind::TownCenter, max_dist)
        .or_else(|| world.spatial.find_nearest_friendly(&world.registry, site, team, ThingKind::Altar, max_dist));
    let Some(anchor_id) = anchor_id else {
        return;
    };
    let Some(anchor_pos) = world.registry.get(anchor_id).map(|t| t.pos) else {
        return;
    };
    let mut p = site;
    while p.x != anchor_pos.x {
        lay_road_tile(world, p);
        p.x += (anchor_pos.x - p.x).signum();
    }
    while p.y != anchor_pos.y {
        lay_road_tile(world, p);
        p.y += (anchor_pos.y - p.y).signum();
    }
}

fn lay_road_tile(world: &mut World, p: Pos) {
    if world.is_valid_pos(p) && !world.is_terrain_blocked(p) && world.grid_at(p).is_none() {
        world.set_terrain(p, TerrainType::Road);
    }
}

fn do_build(world: &mut World, agent_id: usize, id: Id, argument: u8) {
    let Some(choice) = buildings::build_choice(argument) else {
        world.stats[agent_id].action_invalid += 1;
        return;
    };
    let Some(thing) = world.registry.get(id) else {
        return;
    };
    let (pos, team, orientation, frozen) = match &thing.payload {
        ThingPayload::Agent { orientation, .. } => (thing.pos, thing.team_id, *orientation, thing.frozen),
        _ => return,
    };
    if frozen > 0 {
        world.stats[agent_id].action_invalid += 1;
        return;
    }
    let offsets = [
        orientation,
        Orientation::North,
        Orientation::East,
        Orientation::South,
        Orientation::West,
        Orientation::NorthWest,
        Orientation::NorthEast,
        Orientation::SouthWest,
        Orientation::SouthEast,
    ];
    let mut site = None;
    for dir in offsets {
        let p = pos.offset_dir(dir);
        if can_place(world, p) {
            site = Some(p);
            break;
        }
    }
    let Some(site) = site else {
        world.stats[agent_id].action_invalid += 1;
        return;
    };
    if !pay_cost(world, id, team, choice.costs) {
        world.stats[agent_id].action_invalid += 1;
        return;
    }
    let kind = choice.kind;
    world.add(Thing {
        id: Id(0),
        kind,
        pos: site,
        team_id: team,
        hp: choice.hp,
        max_hp: choice.hp,
        cooldown: 0,
        frozen: 0,
        payload: building_payload(kind),
        things_index: 0,
        kind_list_index: 0,
    });
    if combat::resource_camp_draws_road(kind) {
        draw_road(world, site, team);
    }
    world.stats[agent_id].action_build += 1;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnvironmentConfig;

    fn small_world() -> World {
        let mut cfg = EnvironmentConfig::default();
        cfg.map_width = 20;
        cfg.map_height = 20;
        cfg.num_agents = 2;
        cfg.agents_per_team = 1;
        World::new(cfg)
    }

    /// Removes whatever occupies `pos` on either grid layer, so fixture
    /// placement is never foiled by `populate`'s randomly-scattered
    /// altars/resources/wildlife landing on the same tile.
    fn clear_cell(world: &mut World, pos: Pos) {
        if let Some(id) = world.grid_at(pos) {
            world.remove_thing(id);
        }
        if let Some(id) = world.overlay_at(pos) {
            world.remove_thing(id);
        }
    }

    fn clear_area(world: &mut World, center: Pos, radius: i32) {
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                let p = Pos::new(center.x + dx, center.y + dy);
                if world.is_valid_pos(p) {
                    clear_cell(world, p);
                    world.set_terrain(p, TerrainType::Empty);
                }
            }
        }
    }

    /// Inserts a fresh `Agent` `Thing` at `pos`, reusing `add`'s
    /// `agent_index` overwrite so `agent_id` now resolves to this fixture
    /// (the same idiom `combat::tests::insert_agent` already establishes).
    fn insert_agent(
        world: &mut World,
        pos: Pos,
        team: TeamId,
        agent_id: usize,
        orientation: Orientation,
        unit_class: UnitClass,
    ) -> Id {
        clear_cell(world, pos);
        world.add(Thing {
            id: Id(0),
            kind: ThingKind::Agent,
            pos,
            team_id: team,
            hp: 10,
            max_hp: 10,
            cooldown: 0,
            frozen: 0,
            payload: ThingPayload::Agent {
                agent_id,
                orientation,
                unit_class,
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

    fn give_item(world: &mut World, id: Id, item: ItemKey, n: i32) {
        if let Some(t) = world.registry.get_mut(id) {
            if let ThingPayload::Agent { inventory, .. } = &mut t.payload {
                *inventory.entry(item).or_insert(0) += n;
            }
        }
    }

    fn inventory_count(world: &World, id: Id, item: ItemKey) -> i32 {
        match world.registry.get(id).map(|t| &t.payload) {
            Some(ThingPayload::Agent { inventory, .. }) => inventory.get(&item).copied().unwrap_or(0),
            _ => 0,
        }
    }

    #[test]
    fn noop_increments_stat_only() {
        let mut world = small_world();
        dispatch_actions(&mut world, &[0, 0]);
        assert_eq!(world.stats[0].action_noop, 1);
    }

    #[test]
    fn invalid_verb_counts_invalid() {
        let mut world = small_world();
        dispatch_actions(&mut world, &[99, 0]);
        assert_eq!(world.stats[0].action_invalid, 1);
    }

    // E1 — plant and harvest Wheat.
    #[test]
    fn plant_resource_wheat_creates_node_and_reverts_terrain() {
        let mut world = small_world();
        let center = Pos::new(10, 10);
        clear_area(&mut world, center, 2);
        let north = Pos::new(10, 9);
        world.set_terrain(north, TerrainType::Fertile);

        let id = insert_agent(&mut world, center, TeamId(0), 0, Orientation::North, UnitClass::Villager);
        give_item(&mut world, id, ItemKey::Wheat, 1);

        // verb 7 (PLANT RESOURCE), kind_bit=0 (wheat), dir_idx=0 (North) => argument 0.
        dispatch_actions(&mut world, &[70]);

        assert_eq!(world.terrain_at(north), TerrainType::Empty);
        let node_id = world.grid_at(north).expect("wheat node placed");
        let node = world.registry.get(node_id).unwrap();
        assert_eq!(node.kind, ThingKind::Wheat);
        assert!(matches!(node.payload, ThingPayload::ResourceNode { item: ItemKey::Wheat, remaining } if remaining == world.config.resource_node_initial));
        assert_eq!(inventory_count(&world, id, ItemKey::Wheat), 0);
        assert_eq!(world.stats[0].action_plant_resource, 1);
    }

    // E2 — use Magma to smelt.
    #[test]
    fn use_magma_smelts_gold_into_bar() {
        let mut world = small_world();
        let center = Pos::new(5, 5);
        clear_area(&mut world, center, 2);
        let magma_pos = Pos::new(6, 5);

        let id = insert_agent(&mut world, center, TeamId(0), 0, Orientation::East, UnitClass::Villager);
        give_item(&mut world, id, ItemKey::Gold, 1);
        world.add(Thing {
            id: Id(0),
            kind: ThingKind::Magma,
            pos: magma_pos,
            team_id: TeamId::NEUTRAL,
            hp: 1,
            max_hp: 1,
            cooldown: 0,
            frozen: 0,
            payload: ThingPayload::Static,
            things_index: 0,
            kind_list_index: 0,
        });

        let reward_before = match world.registry.get(id).map(|t| &t.payload) {
            Some(ThingPayload::Agent { reward, .. }) => *reward,
            _ => 0.0,
        };

        // verb 3 (USE), dir 3 (East) => argument 3.
        dispatch_actions(&mut world, &[33]);

        assert_eq!(inventory_count(&world, id, ItemKey::Gold), 0);
        assert_eq!(inventory_count(&world, id, ItemKey::Bar), 1);
        assert_eq!(world.stats[0].action_use, 1);
        let reward_after = match world.registry.get(id).map(|t| &t.payload) {
            Some(ThingPayload::Agent { reward, .. }) => *reward,
            _ => 0.0,
        };
        assert!((reward_after - reward_before - world.config.bar_reward).abs() < 1e-6);
    }

    // E3 — archer ranged hit on a Tumor.
    #[test]
    fn archer_kills_tumor_at_range() {
        let mut world = small_world();
        let origin = Pos::new(0, 0);
        clear_area(&mut world, Pos::new(2, 0), 3);

        let id = insert_agent(&mut world, origin, TeamId(0), 0, Orientation::East, UnitClass::Archer);
        let tumor_pos = Pos::new(3, 0);
        world.add(Thing {
            id: Id(0),
            kind: ThingKind::Tumor,
            pos: tumor_pos,
            team_id: TeamId::NEUTRAL,
            hp: 1,
            max_hp: 1,
            cooldown: 0,
            frozen: 0,
            payload: ThingPayload::Tumor {
                home_spawner: None,
                has_claimed_territory: false,
                turns_alive: 0,
            },
            things_index: 0,
            kind_list_index: 0,
        });

        // verb 2 (ATTACK), dir 3 (East) => argument 3.
        dispatch_actions(&mut world, &[23]);

        assert!(world.grid_at(tumor_pos).is_none());
        assert_eq!(world.stats[0].action_attack, 1);
    }

    // E6 — stuck agent increments actionInvalid without moving.
    #[test]
    fn move_into_wall_on_every_side_is_always_invalid() {
        let mut world = small_world();
        let center = Pos::new(10, 10);
        clear_area(&mut world, center, 1);
        let id = insert_agent(&mut world, center, TeamId(0), 0, Orientation::South, UnitClass::Villager);
        for dir in Orientation::CARDINALS {
            let p = center.offset_dir(dir);
            world.add(Thing {
                id: Id(0),
                kind: ThingKind::Wall,
                pos: p,
                team_id: TeamId::NEUTRAL,
                hp: 40,
                max_hp: 40,
                cooldown: 0,
                frozen: 0,
                payload: ThingPayload::Static,
                things_index: 0,
                kind_list_index: 0,
            });
        }

        // verb 1 (MOVE), dir 0 (North) => argument 0.
        dispatch_actions(&mut world, &[10]);

        assert_eq!(world.registry.get(id).unwrap().pos, center);
        assert_eq!(world.stats[0].action_invalid, 1);
        assert_eq!(world.stats[0].action_move, 0);
        assert!(matches!(
            world.registry.get(id).unwrap().payload,
            ThingPayload::Agent { orientation: Orientation::North, .. }
        ));
    }

    // Spec §8 property 6 — road doubles movement speed.
    #[test]
    fn move_forward_on_road_advances_two_tiles() {
        let mut world = small_world();
        let start = Pos::new(5, 10);
        clear_area(&mut world, Pos::new(7, 10), 2);
        world.set_terrain(Pos::new(6, 10), TerrainType::Road);

        let id = insert_agent(&mut world, start, TeamId(0), 0, Orientation::South, UnitClass::Villager);
        // verb 1 (MOVE), dir 3 (East) => argument 3.
        dispatch_actions(&mut world, &[13]);

        assert_eq!(world.registry.get(id).unwrap().pos, Pos::new(7, 10));
        assert_eq!(world.stats[0].action_move, 1);
    }

    #[test]
    fn move_forward_off_road_advances_one_tile() {
        let mut world = small_world();
        let start = Pos::new(5, 11);
        clear_area(&mut world, Pos::new(7, 11), 2);

        let id = insert_agent(&mut world, start, TeamId(0), 0, Orientation::South, UnitClass::Villager);
        dispatch_actions(&mut world, &[13]);

        assert_eq!(world.registry.get(id).unwrap().pos, Pos::new(6, 11));
    }

    // Spec §8 property 5 — lantern push, Chebyshev-3 spacing.
    #[test]
    fn move_forward_pushes_lantern_into_open_space() {
        let mut world = small_world();
        let start = Pos::new(2, 2);
        clear_area(&mut world, Pos::new(4, 2), 2);
        let lantern_pos = Pos::new(3, 2);
        world.add(Thing {
            id: Id(0),
            kind: ThingKind::Lantern,
            pos: lantern_pos,
            team_id: TeamId(0),
            hp: 1,
            max_hp: 1,
            cooldown: 0,
            frozen: 0,
            payload: ThingPayload::Lantern { healthy: true },
            things_index: 0,
            kind_list_index: 0,
        });

        let id = insert_agent(&mut world, start, TeamId(0), 0, Orientation::East, UnitClass::Villager);
        dispatch_actions(&mut world, &[13]);

        let agent_pos = world.registry.get(id).unwrap().pos;
        assert_eq!(agent_pos, lantern_pos, "agent should have entered the lantern's old tile");
        assert!(world.overlay_at(lantern_pos).is_none(), "lantern must have vacated its old tile");
    }

    #[test]
    fn move_forward_fails_when_lantern_push_has_no_room() {
        let mut world = small_world();
        let start = Pos::new(0, 15);
        clear_area(&mut world, start, 1);
        let lantern_pos = Pos::new(1, 15);
        world.add(Thing {
            id: Id(0),
            kind: ThingKind::Lantern,
            pos: lantern_pos,
            team_id: TeamId(0),
            hp: 1,
            max_hp: 1,
            cooldown: 0,
            frozen: 0,
            payload: ThingPayload::Lantern { healthy: true },
            things_index: 0,
            kind_list_index: 0,
        });
        // Surround the lantern with walls so every push candidate fails.
        for dx in -1..=2 {
            for dy in -1..=1 {
                let p = Pos::new(lantern_pos.x + dx, lantern_pos.y + dy);
                if p == lantern_pos || p == start || !world.is_valid_pos(p) {
                    continue;
                }
                clear_cell(&mut world, p);
                world.add(Thing {
                    id: Id(0),
                    kind: ThingKind::Wall,
                    pos: p,
                    team_id: TeamId::NEUTRAL,
                    hp: 40,
                    max_hp: 40,
                    cooldown: 0,
                    frozen: 0,
                    payload: ThingPayload::Static,
                    things_index: 0,
                    kind_list_index: 0,
                });
            }
        }

        let id = insert_agent(&mut world, start, TeamId(0), 0, Orientation::East, UnitClass::Villager);
        dispatch_actions(&mut world, &[13]);

        assert_eq!(world.registry.get(id).unwrap().pos, start);
        assert_eq!(world.stats[0].action_invalid, 1);
    }

    // Spec §8 property 7 — spear AoE destroys two tumors, decrements spear count once.
    #[test]
    fn spear_attack_destroys_forward_and_perpendicular_tumor() {
        let mut world = small_world();
        let origin = Pos::new(0, 0);
        clear_area(&mut world, Pos::new(2, 1), 3);

        let id = insert_agent(&mut world, origin, TeamId(0), 0, Orientation::East, UnitClass::Villager);
        give_item(&mut world, id, ItemKey::Spear, 1);

        let forward = Pos::new(2, 0);
        let perpendicular = Pos::new(2, 1);
        for p in [forward, perpendicular] {
            world.add(Thing {
                id: Id(0),
                kind: ThingKind::Tumor,
                pos: p,
                team_id: TeamId::NEUTRAL,
                hp: 1,
                max_hp: 1,
                cooldown: 0,
                frozen: 0,
                payload: ThingPayload::Tumor {
                    home_spawner: None,
                    has_claimed_territory: false,
                    turns_alive: 0,
                },
                things_index: 0,
                kind_list_index: 0,
            });
        }

        dispatch_actions(&mut world, &[23]);

        assert!(world.grid_at(forward).is_none());
        assert!(world.grid_at(perpendicular).is_none());
        assert_eq!(inventory_count(&world, id, ItemKey::Spear), 0);
    }

    // Spec §8 property 8 — swap symmetry.
    #[test]
    fn two_swaps_return_both_agents_to_their_original_positions() {
        let mut world = small_world();
        let a_pos = Pos::new(8, 8);
        let b_pos = Pos::new(9, 8);
        clear_area(&mut world, a_pos, 2);

        let a = insert_agent(&mut world, a_pos, TeamId(0), 0, Orientation::East, UnitClass::Villager);
        let b = insert_agent(&mut world, b_pos, TeamId(0), 1, Orientation::West, UnitClass::Villager);

        // agent 0 moves East into agent 1: swap.
        dispatch_actions(&mut world, &[13, 0]);
        assert_eq!(world.registry.get(a).unwrap().pos, b_pos);
        assert_eq!(world.registry.get(b).unwrap().pos, a_pos);

        // agent 0 (now at b_pos) moves West back into agent 1 (now at a_pos): swap back.
        dispatch_actions(&mut world, &[12, 0]);
        assert_eq!(world.registry.get(a).unwrap().pos, a_pos);
        assert_eq!(world.registry.get(b).unwrap().pos, b_pos);
    }

    #[test]
    fn swap_fails_against_frozen_teammate() {
        let mut world = small_world();
        let a_pos = Pos::new(8, 8);
        let b_pos = Pos::new(9, 8);
        clear_area(&mut world, a_pos, 2);

        insert_agent(&mut world, a_pos, TeamId(0), 0, Orientation::East, UnitClass::Villager);
        let b = insert_agent(&mut world, b_pos, TeamId(0), 1, Orientation::West, UnitClass::Villager);
        if let Some(t) = world.registry.get_mut(b) {
            t.frozen = 3;
        }

        dispatch_actions(&mut world, &[43, 0]);
        assert_eq!(world.registry.get(b).unwrap().pos, b_pos);
    }

    // PUT priority: armor first, then bread, then largest fitting stack.
    #[test]
    fn put_gives_armor_before_other_items() {
        let mut world = small_world();
        let a_pos = Pos::new(8, 8);
        let b_pos = Pos::new(9, 8);
        clear_area(&mut world, a_pos, 2);

        let a = insert_agent(&mut world, a_pos, TeamId(0), 0, Orientation::East, UnitClass::Villager);
        let b = insert_agent(&mut world, b_pos, TeamId(0), 1, Orientation::West, UnitClass::Villager);
        give_item(&mut world, a, ItemKey::Armor, 1);
        give_item(&mut world, a, ItemKey::Bread, 1);

        dispatch_actions(&mut world, &[53, 0]);

        assert_eq!(inventory_count(&world, a, ItemKey::Armor), 0);
        assert_eq!(inventory_count(&world, b, ItemKey::Armor), 1);
        assert_eq!(inventory_count(&world, a, ItemKey::Bread), 1, "bread stays since armor already satisfied the give");
    }

    /// Regression test: when no armor/bread give applies and two item
    /// stacks are tied for largest, the choice of which stack to hand over
    /// used to fall out of `HashMap` iteration order and could differ
    /// between otherwise-identical worlds. The tie-break must be a pure
    /// function of the tied item kinds, not of insertion/iteration order.
    #[test]
    fn put_breaks_tied_largest_stack_deterministically() {
        let mut world = small_world();
        let a_pos = Pos::new(8, 8);
        let b_pos = Pos::new(9, 8);
        clear_area(&mut world, a_pos, 2);

        let a = insert_agent(&mut world, a_pos, TeamId(0), 0, Orientation::East, UnitClass::Villager);
        let b = insert_agent(&mut world, b_pos, TeamId(0), 1, Orientation::West, UnitClass::Villager);
        // Wood and Stone tied at 2 each; neither armor nor bread present.
        give_item(&mut world, a, ItemKey::Wood, 2);
        give_item(&mut world, a, ItemKey::Stone, 2);

        dispatch_actions(&mut world, &[53, 0]);

        let wood_given = inventory_count(&world, b, ItemKey::Wood) == 1;
        let stone_given = inventory_count(&world, b, ItemKey::Stone) == 1;
        assert_ne!(wood_given, stone_given, "exactly one tied stack should transfer");
        // Re-running from the same starting inventories must pick the same
        // item every time, regardless of HashMap iteration order.
        let mut world2 = small_world();
        clear_area(&mut world2, a_pos, 2);
        let a2 = insert_agent(&mut world2, a_pos, TeamId(0), 0, Orientation::East, UnitClass::Villager);
        let b2 = insert_agent(&mut world2, b_pos, TeamId(0), 1, Orientation::West, UnitClass::Villager);
        give_item(&mut world2, a2, ItemKey::Stone, 2);
        give_item(&mut world2, a2, ItemKey::Wood, 2);
        dispatch_actions(&mut world2, &[53, 0]);
        assert_eq!(wood_given, inventory_count(&world2, b2, ItemKey::Wood) == 1);
        assert_eq!(stone_given, inventory_count(&world2, b2, ItemKey::Stone) == 1);
    }

    // PLANT LANTERN.
    #[test]
    fn plant_lantern_consumes_item_and_places_lantern() {
        let mut world = small_world();
        let center = Pos::new(12, 12);
        clear_area(&mut world, center, 2);

        let id = insert_agent(&mut world, center, TeamId(0), 0, Orientation::North, UnitClass::Villager);
        give_item(&mut world, id, ItemKey::Lantern, 1);

        dispatch_actions(&mut world, &[60]);

        let target = Pos::new(12, 11);
        let lantern_id = world.overlay_at(target).expect("lantern placed");
        assert_eq!(world.registry.get(lantern_id).unwrap().kind, ThingKind::Lantern);
        assert_eq!(inventory_count(&world, id, ItemKey::Lantern), 0);
        assert_eq!(world.stats[0].action_plant, 1);
    }

    // E5 — BUILD places a Mill and draws a road back to the TownCenter.
    #[test]
    fn build_mill_pays_from_inventory_and_draws_road_to_town_center() {
        let mut world = small_world();
        let town_center_pos = Pos::new(5, 5);
        clear_area(&mut world, Pos::new(9, 5), 6);
        world.add(Thing {
            id: Id(0),
            kind: ThingKind::TownCenter,
            pos: town_center_pos,
            team_id: TeamId(0),
            hp: 400,
            max_hp: 400,
            cooldown: 0,
            frozen: 0,
            payload: ThingPayload::Building {
                use_kind: crate::buildings::use_kind_for(ThingKind::TownCenter),
                cooldown_max: 0,
            },
            things_index: 0,
            kind_list_index: 0,
        });

        let actor_pos = Pos::new(10, 5);
        let id = insert_agent(&mut world, actor_pos, TeamId(0), 0, Orientation::South, UnitClass::Villager);
        give_item(&mut world, id, ItemKey::Wood, 5);

        // verb 8 (BUILD), argument 2 => Mill (BUILD_CHOICES[2]).
        dispatch_actions(&mut world, &[82]);

        assert_eq!(inventory_count(&world, id, ItemKey::Wood), 0);
        // The actor faces South, so the first build offset tried is pos + South.
        let site = Pos::new(10, 6);
        let mill_id = world.grid_at(site).expect("mill placed forward of the actor's orientation");
        assert_eq!(world.registry.get(mill_id).unwrap().kind, ThingKind::Mill);
        // The L-shaped road walks X first from the build site toward the anchor, then Y:
        // a tile on the X leg (same row as the build site, short of the anchor's column)
        // must be Road.
        assert_eq!(world.terrain_at(Pos::new(6, 6)), TerrainType::Road);
        assert_eq!(world.stats[0].action_build, 1);
    }
}
