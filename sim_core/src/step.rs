//! Top-level step pipeline (spec §4.9): one call per tick, fixed order,
//! no suspension points (spec §5 "single-threaded and synchronous").
//!
//! Grounded on `core_sim/src/bin/server.rs`'s per-tick orchestration (a
//! flat sequence of subsystem calls run from one command-loop iteration
//! rather than a Bevy schedule), generalized into a single `World::step`
//! method since the ECS scheduler that ordered the teacher's systems is
//! dropped per Design Notes §9.

use rand::Rng;

use crate::combat::altar_auto_respawn;
use crate::ids::{Orientation, Pos, ThingKind};
use crate::observation::update_observations_for_pos;
use crate::thing::{Thing, ThingPayload};
use crate::tint::CLIPPY_TINT;
use crate::world::World;

const AGENT_TINT_RADIUS: i32 = 2;
const AGENT_TINT_WEIGHT: i32 = 400;
const TUMOR_TINT_RADIUS: i32 = 2;
const TUMOR_TINT_WEIGHT: i32 = 900;

/// Tumors a single spawner may have alive at once (spec §4.9 step 6,
/// "bounded tumors-in-range").
const MAX_TUMORS_PER_SPAWNER: usize = 6;
/// Ticks a tumor survives before it is considered to have claimed its
/// territory and becomes immune to wildlife predation (Open Question
/// resolution 6 in `DESIGN.md`; spec names `hasClaimedTerritory` on the
/// payload but never defines what sets it).
const TUMOR_CLAIM_TICKS: u32 = 50;

impl World {
    /// Advances the simulation by exactly one tick (spec §4.9). `actions`
    /// is one packed byte per agent; a short slice treats missing trailing
    /// agents as `NOOP` (`dispatch_actions`'s `.get(agent_id).unwrap_or(0)`).
    pub fn step(&mut self, actions: &[u8]) {
        self.rewards.iter_mut().for_each(|r| *r = 0.0);

        self.decrement_cooldowns_and_shields();
        self.action_tint.tick();

        crate::actions::dispatch_actions(self, actions);

        let bear_aggro = self.config.bear_aggro_radius;
        let follow_chance = self.config.cow_herd_follow_chance;
        let random_chance = self.config.cow_random_move_chance;
        crate::wildlife::run_wildlife_ai(self, bear_aggro, follow_chance, random_chance);

        self.update_tint_fields();
        self.grow_tumors();
        altar_auto_respawn(self);
        self.apply_survival_penalty();
        self.rebuild_observations();

        self.current_step += 1;
        if self.config.max_steps > 0 && self.current_step >= self.config.max_steps as u64 {
            self.truncated.iter_mut().for_each(|t| *t = 1);
        }

        // Grid/registry desync is a programmer error (§7 InvariantViolation),
        // not a recoverable game-logic outcome, so it's only worth the cost
        // of walking every entity in debug builds. A release build logs and
        // carries on rather than taking down a long-running host process.
        if cfg!(debug_assertions) {
            if let Some(detail) = self.check_invariants() {
                tracing::error!(tick = self.current_step, detail = %detail, "grid/registry invariant violated");
                panic!("invariant violated at tick {}: {detail}", self.current_step);
            }
        }
    }

    fn decrement_cooldowns_and_shields(&mut self) {
        for thing in self.registry.iter_mut() {
            if thing.cooldown > 0 {
                thing.cooldown -= 1;
            }
            if thing.frozen > 0 {
                thing.frozen -= 1;
            }
            if let ThingPayload::Agent { shield_ticks, .. } = &mut thing.payload {
                if *shield_ticks > 0 {
                    *shield_ticks -= 1;
                }
            }
        }
    }

    fn update_tint_fields(&mut self) {
        self.tint.decay_tick();
        self.tumor_tint.decay_tick();

        let agent_colors: Vec<(Pos, [u8; 3])> = self
            .registry
            .agent_ids()
            .iter()
            .filter_map(|id| self.registry.get(*id))
            .filter(|t| t.is_alive())
            .map(|t| (t.pos, self.team_colors.get(t.team_id.0.max(0) as usize).copied().unwrap_or([200, 200, 200])))
            .collect();
        for (pos, color) in agent_colors {
            self.tint.accrete(pos, AGENT_TINT_RADIUS, AGENT_TINT_WEIGHT, (color[0] as i32, color[1] as i32, color[2] as i32));
        }

        let lantern_colors: Vec<(Pos, [u8; 3])> = self
            .registry
            .kind_ids(ThingKind::Lantern)
            .filter_map(|id| self.registry.get(id))
            .map(|t| (t.pos, self.team_colors.get(t.team_id.0.max(0) as usize).copied().unwrap_or([200, 200, 200])))
            .collect();
        for (pos, color) in lantern_colors {
            self.tint.accrete(pos, AGENT_TINT_RADIUS, AGENT_TINT_WEIGHT, (color[0] as i32, color[1] as i32, color[2] as i32));
        }

        let tumor_positions: Vec<Pos> = self
            .registry
            .kind_ids(ThingKind::Tumor)
            .filter_map(|id| self.registry.get(id))
            .map(|t| t.pos)
            .collect();
        for pos in tumor_positions {
            self.tumor_tint.accrete(pos, TUMOR_TINT_RADIUS, TUMOR_TINT_WEIGHT, CLIPPY_TINT);
        }

        self.tint.sort_active_by_x();
        self.tumor_tint.sort_active_by_x();

        self.apply_frozen_from_saturated_tint();
    }

    /// Entities on or 8-adjacent to a fully saturated clippy-tinted tile
    /// freeze for the next tick (spec §4.8 "frozen terrain").
    fn apply_frozen_from_saturated_tint(&mut self) {
        let tolerance = self.config.clippy_tint_tolerance;
        let saturated: Vec<Pos> = self
            .tumor_tint
            .active_tiles()
            .iter()
            .copied()
            .filter(|&pos| self.tumor_tint.is_saturated_toward(pos, CLIPPY_TINT, tolerance))
            .collect();
        for pos in saturated {
            self.freeze_entity_at(pos);
            for delta in Orientation::DELTAS {
                self.freeze_entity_at(pos.offset(delta));
            }
        }
    }

    fn freeze_entity_at(&mut self, pos: Pos) {
        let Some(id) = self.grid_at(pos).or_else(|| self.overlay_at(pos)) else {
            return;
        };
        if let Some(thing) = self.registry.get_mut(id) {
            thing.frozen = thing.frozen.max(1);
        }
    }

    /// Step 6: each spawner has a stochastic chance to emit a new tumor in
    /// an empty neighboring tile, bounded by how many of its own tumors are
    /// already alive; existing tumors age toward claiming their territory.
    fn grow_tumors(&mut self) {
        let tumor_ids: Vec<crate::ids::Id> = self.registry.kind_ids(ThingKind::Tumor).collect();
        for id in tumor_ids {
            if let Some(thing) = self.registry.get_mut(id) {
                if let ThingPayload::Tumor { has_claimed_territory, turns_alive, .. } = &mut thing.payload {
                    *turns_alive += 1;
                    if *turns_alive >= TUMOR_CLAIM_TICKS {
                        *has_claimed_territory = true;
                    }
                }
            }
        }

        let spawner_ids: Vec<crate::ids::Id> = self.registry.kind_ids(ThingKind::Spawner).collect();
        for spawner_id in spawner_ids {
            let Some(spawner) = self.registry.get(spawner_id) else { continue };
            let pos = spawner.pos;
            if self.rng.gen::<f32>() >= self.config.tumor_spawn_rate {
                continue;
            }
            let alive_for_spawner = self
                .registry
                .kind_ids(ThingKind::Tumor)
                .filter(|&tid| {
                    matches!(
                        self.registry.get(tid).map(|t| &t.payload),
                        Some(ThingPayload::Tumor { home_spawner, .. }) if *home_spawner == Some(spawner_id)
                    )
                })
                .count();
            if alive_for_spawner >= MAX_TUMORS_PER_SPAWNER {
                continue;
            }
            let Some(spot) = self.find_empty_adjacent(pos) else { continue };
            let tumor = Thing {
                id: crate::ids::Id(0),
                kind: ThingKind::Tumor,
                pos: spot,
                team_id: crate::ids::TeamId::NEUTRAL,
                hp: 5,
                max_hp: 5,
                cooldown: 0,
                frozen: 0,
                payload: ThingPayload::Tumor {
                    home_spawner: Some(spawner_id),
                    has_claimed_territory: false,
                    turns_alive: 0,
                },
                things_index: 0,
                kind_list_index: 0,
            };
            self.add(tumor);
            update_observations_for_pos(self, spot);
            if let Some(spawner) = self.registry.get_mut(spawner_id) {
                if let ThingPayload::Spawner { tumors_spawned } = &mut spawner.payload {
                    *tumors_spawned += 1;
                }
            }
        }
    }

    /// Step 8 (survival half): every living, non-terminated agent accrues
    /// `survivalPenalty` this tick. Death penalties are credited once, at
    /// the moment of death, by `combat::resolve_agent_death`.
    fn apply_survival_penalty(&mut self) {
        for agent_id in 0..self.config.num_agents {
            if self.terminated.get(agent_id).copied().unwrap_or(1) == 0 {
                if let Some(r) = self.rewards.get_mut(agent_id) {
                    *r += self.config.survival_penalty;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnvironmentConfig;

    fn small_config() -> EnvironmentConfig {
        let mut cfg = EnvironmentConfig::default();
        cfg.map_width = 24;
        cfg.map_height = 24;
        cfg.num_agents = 2;
        cfg.agents_per_team = 1;
        cfg.max_steps = 5;
        cfg
    }

    #[test]
    fn noop_step_advances_counter_and_applies_survival_penalty() {
        let mut world = World::new(small_config());
        let actions = vec![0u8; world.config.num_agents];
        world.step(&actions);
        assert_eq!(world.current_step, 1);
        for r in &world.rewards {
            assert_eq!(*r, world.config.survival_penalty);
        }
    }

    #[test]
    fn truncates_once_max_steps_reached() {
        let mut world = World::new(small_config());
        let actions = vec![0u8; world.config.num_agents];
        for _ in 0..world.config.max_steps {
            world.step(&actions);
        }
        assert!(world.truncated.iter().all(|&t| t == 1));
    }

    #[test]
    fn determinism_across_identically_seeded_worlds() {
        let mut w1 = World::new(small_config());
        let mut w2 = World::new(small_config());
        let actions = vec![0u8; w1.config.num_agents];
        for _ in 0..3 {
            w1.step(&actions);
            w2.step(&actions);
        }
        assert_eq!(w1.observations, w2.observations);
        assert_eq!(w1.rewards, w2.rewards);
    }
}
