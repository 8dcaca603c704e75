//! Observation composer (spec §4.4): builds the fixed-shape ego-centric
//! `[MapAgents][Layers][W][H]` tensor every step.
//!
//! Grounded on `core_sim/src/visibility.rs`'s `TileVisibility` /
//! `FactionVisibilityMap` (flat `Vec`-backed per-tile state with index
//! helpers rather than a hashmap-by-position) for the tensor's backing
//! storage, and `core_sim/src/visibility_systems.rs`'s per-faction rebuild
//! pass for the "rebuild per observer, centered on observer state" shape.

use crate::ids::{Pos, ThingKind};
use crate::terrain::TerrainType;
use crate::thing::ThingPayload;
use crate::world::World;

pub const OBS_WIDTH: i32 = 11;
pub const OBS_HEIGHT: i32 = 11;
pub const OBS_RADIUS: i32 = 5;

const TERRAIN_LAYERS: usize = TerrainType::COUNT;
const KIND_LAYERS: usize = ThingKind::COUNT;
/// Team, orientation, unit-class, and action-tint layers beyond the
/// one-hot terrain/kind blocks, plus the obscured-by-elevation layer.
const EXTRA_LAYERS: usize = 5;

pub const OBSERVATION_LAYERS: usize = TERRAIN_LAYERS + KIND_LAYERS + EXTRA_LAYERS;

pub const TEAM_LAYER: usize = TERRAIN_LAYERS + KIND_LAYERS;
pub const ORIENTATION_LAYER: usize = TEAM_LAYER + 1;
pub const UNIT_CLASS_LAYER: usize = ORIENTATION_LAYER + 1;
pub const TINT_LAYER: usize = UNIT_CLASS_LAYER + 1;
pub const OBSCURED_LAYER: usize = TINT_LAYER + 1;

fn layer_stride() -> usize {
    (OBS_WIDTH * OBS_HEIGHT) as usize
}

pub fn agent_block_len() -> usize {
    OBSERVATION_LAYERS * layer_stride()
}

/// Offset of `(layer, local_x, local_y)` within one agent's observation
/// block (row-major, spec §6.1 buffer shapes).
fn cell_offset(layer: usize, lx: i32, ly: i32) -> usize {
    layer * layer_stride() + (ly * OBS_WIDTH + lx) as usize
}

/// Full rebuild of one agent's observation block, written into `out` (a
/// slice exactly `agent_block_len()` long). `updateObservations`'s targeted
/// writes must remain byte-identical to calling this after every action
/// (spec §4.4); both paths share `write_cell`.
pub fn rebuild_agent_observation(world: &World, agent_pos: Pos, agent_team_id_plus1: u8, out: &mut [u8]) {
    debug_assert_eq!(out.len(), agent_block_len());
    out.fill(0);
    for ly in 0..OBS_HEIGHT {
        for lx in 0..OBS_WIDTH {
            let world_pos = Pos::new(
                agent_pos.x - OBS_RADIUS + lx,
                agent_pos.y - OBS_RADIUS + ly,
            );
            write_cell(world, world_pos, agent_pos, lx, ly, out);
        }
    }
    let _ = agent_team_id_plus1;
}

fn write_cell(world: &World, world_pos: Pos, agent_pos: Pos, lx: i32, ly: i32, out: &mut [u8]) {
    if !world.is_valid_pos(world_pos) {
        return;
    }
    let terrain = world.terrain_at(world_pos);
    out[cell_offset(terrain as usize, lx, ly)] = 1;

    if let Some(id) = world.grid_at(world_pos).or_else(|| world.overlay_at(world_pos)) {
        if let Some(thing) = world.registry.get(id) {
            out[cell_offset(TERRAIN_LAYERS + thing.kind as usize, lx, ly)] = 1;
            out[cell_offset(TEAM_LAYER, lx, ly)] = (thing.team_id.0 + 1).max(0) as u8;
            if let ThingPayload::Agent {
                orientation,
                unit_class,
                ..
            } = &thing.payload
            {
                out[cell_offset(ORIENTATION_LAYER, lx, ly)] = orientation.index() + 1;
                out[cell_offset(UNIT_CLASS_LAYER, lx, ly)] = *unit_class as u8 + 1;
            }
        }
    }

    let tint_code = world.action_tint.code_at(world_pos);
    out[cell_offset(TINT_LAYER, lx, ly)] = tint_code;

    let agent_elev = world.elevation_at(agent_pos);
    let target_elev = world.elevation_at(world_pos);
    out[cell_offset(OBSCURED_LAYER, lx, ly)] = (target_elev > agent_elev) as u8;
}

/// Targeted single-cell update, used by action effects that change world
/// state visible from nearby observation windows without forcing a full
/// rebuild of every affected agent (spec §4.4). Any agent whose window
/// contains `world_pos` has its block patched in place.
pub fn update_observations_for_pos(world: &mut World, world_pos: Pos) {
    let agent_ids: Vec<_> = world.registry.agent_ids().to_vec();
    for id in agent_ids {
        let Some(thing) = world.registry.get(id) else {
            continue;
        };
        if !thing.is_alive() {
            continue;
        }
        let agent_pos = thing.pos;
        let dx = world_pos.x - agent_pos.x;
        let dy = world_pos.y - agent_pos.y;
        if dx.abs() > OBS_RADIUS || dy.abs() > OBS_RADIUS {
            continue;
        }
        let lx = dx + OBS_RADIUS;
        let ly = dy + OBS_RADIUS;
        let agent_id = match &thing.payload {
            ThingPayload::Agent { agent_id, .. } => *agent_id,
            _ => continue,
        };
        let block_start = agent_id * agent_block_len();
        let block_end = block_start + agent_block_len();
        if block_end > world.observations.len() {
            continue;
        }
        // Clear every layer before rewriting: terrain/kind/team/orientation/
        // unit-class are all written conditionally by `write_cell` (only one
        // terrain bit, at most one kind bit, and team/orientation/unit-class
        // only when an occupant is present), so a vacated tile must have its
        // old bits zeroed or it would diverge from a full rebuild. Tint and
        // obscured are written unconditionally every call, so clearing them
        // too is harmless.
        for layer in 0..OBSERVATION_LAYERS {
            world.observations[block_start + cell_offset(layer, lx, ly)] = 0;
        }
        let block = &mut world.observations[block_start..block_end];
        write_cell(world, world_pos, agent_pos, lx, ly, block);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnvironmentConfig;

    #[test]
    fn dead_agent_block_is_all_zero() {
        let mut cfg = EnvironmentConfig::default();
        cfg.num_agents = 2;
        cfg.agents_per_team = 1;
        cfg.map_width = 20;
        cfg.map_height = 20;
        let mut world = World::new(cfg);
        world.reset();
        world.terminated[0] = 1;
        world.rebuild_observations();
        let start = 0;
        let end = agent_block_len();
        assert!(world.observations[start..end].iter().all(|&b| b == 0));
    }

    #[test]
    fn team_layer_centered_at_radius() {
        let mut cfg = EnvironmentConfig::default();
        cfg.num_agents = 1;
        cfg.agents_per_team = 1;
        cfg.map_width = 20;
        cfg.map_height = 20;
        let mut world = World::new(cfg);
        world.reset();
        world.rebuild_observations();
        let block = &world.observations[0..agent_block_len()];
        let team = world.registry.get(world.registry.agent_ids()[0]).unwrap().team_id;
        let center = cell_offset(TEAM_LAYER, OBS_RADIUS, OBS_RADIUS);
        assert_eq!(block[center], (team.0 + 1) as u8);
    }
}
