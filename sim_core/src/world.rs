//! `Environment`/`World`: owns every grid, the registry, the spatial index,
//! tint fields, team stockpiles, RNG, and per-episode buffers (spec §4.1,
//! §3 "Grids"/"Team state").
//!
//! Grounded on `core_sim/src/resources.rs` (the set of resources a Bevy
//! `World` would otherwise hold as separate ECS resources), here owned
//! directly by one struct since ECS is dropped per Design Notes §9
//! ("model the environment as a value owned by the binding layer", not a
//! global singleton). `rand_chacha::ChaCha8Rng` replaces the teacher's
//! `SmallRng::seed_from_u64(seed)` idiom (`core_sim/src/fauna.rs`) with a
//! reproducible generator suitable for crossing the FFI boundary.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::buildings::Stockpile;
use crate::config::EnvironmentConfig;
use crate::ids::{Id, Orientation, Pos, TeamId, ThingKind};
use crate::observation::{agent_block_len, rebuild_agent_observation};
use crate::registry::EntityRegistry;
use crate::spatial::SpatialIndex;
use crate::stats::AgentStats;
use crate::terrain::TerrainType;
use crate::thing::{Inventory, ItemKey, Thing, ThingPayload, UnitClass};
use crate::tint::{ActionTintLayer, TintField};

pub struct World {
    pub config: EnvironmentConfig,
    pub rng: ChaCha8Rng,

    pub registry: EntityRegistry,
    pub spatial: SpatialIndex,

    grid: Vec<Option<Id>>,
    overlay_grid: Vec<Option<Id>>,
    terrain: Vec<TerrainType>,
    elevation: Vec<i8>,

    /// `agentId -> Id` lookup, populated as agents are created. Agents are
    /// never removed from the registry (spec §3), so this never changes
    /// after `populate`.
    agent_index: Vec<Option<Id>>,

    pub tint: TintField,
    pub tumor_tint: TintField,
    pub action_tint: ActionTintLayer,

    pub stockpiles: Vec<Stockpile>,
    pub control: crate::control::ControlState,
    pub wildlife: crate::wildlife::WildlifeState,

    pub stats: Vec<AgentStats>,
    pub rewards: Vec<f32>,
    pub terminated: Vec<u8>,
    pub truncated: Vec<u8>,
    pub observations: Vec<u8>,

    pub team_colors: Vec<[u8; 3]>,

    pub current_step: u64,
}

impl World {
    pub fn new(config: EnvironmentConfig) -> Self {
        let width = config.map_width;
        let height = config.map_height;
        let area = (width * height).max(0) as usize;
        let num_agents = config.num_agents;
        let num_teams = Self::team_count(&config);

        let seed = config.seed;
        let rng = ChaCha8Rng::seed_from_u64(seed);

        let mut world = Self {
            rng,
            grid: vec![None; area],
            overlay_grid: vec![None; area],
            terrain: vec![TerrainType::Empty; area],
            elevation: vec![0; area],
            agent_index: vec![None; num_agents],
            tint: TintField::new(width, height, crate::fixed::TRAIL_DECAY_NUM),
            tumor_tint: TintField::new(width, height, crate::fixed::TUMOR_DECAY_NUM),
            action_tint: ActionTintLayer::new(width, height),
            stockpiles: vec![Stockpile::default(); num_teams],
            control: crate::control::ControlState::new(num_agents, num_teams),
            wildlife: crate::wildlife::WildlifeState::new(),
            stats: vec![AgentStats::default(); num_agents],
            rewards: vec![0.0; num_agents],
            terminated: vec![0; num_agents],
            truncated: vec![0; num_agents],
            observations: vec![0; num_agents * agent_block_len()],
            team_colors: (0..num_teams).map(team_color).collect(),
            registry: EntityRegistry::new(),
            spatial: SpatialIndex::new(config.cell_size),
            current_step: 0,
            config,
        };
        world.populate();
        world.rebuild_observations();
        world
    }

    fn team_count(config: &EnvironmentConfig) -> usize {
        (config.num_agents / config.agents_per_team.max(1)).max(1)
    }

    pub fn num_teams(&self) -> usize {
        Self::team_count(&self.config)
    }

    pub fn width(&self) -> i32 {
        self.config.map_width
    }

    pub fn height(&self) -> i32 {
        self.config.map_height
    }

    pub fn is_valid_pos(&self, pos: Pos) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < self.width() && pos.y < self.height()
    }

    pub(crate) fn idx(&self, pos: Pos) -> usize {
        (pos.y * self.width() + pos.x) as usize
    }

    pub fn terrain_at(&self, pos: Pos) -> TerrainType {
        if !self.is_valid_pos(pos) {
            return TerrainType::Empty;
        }
        self.terrain[self.idx(pos)]
    }

    pub fn set_terrain(&mut self, pos: Pos, t: TerrainType) {
        if self.is_valid_pos(pos) {
            let i = self.idx(pos);
            self.terrain[i] = t;
        }
    }

    pub fn elevation_at(&self, pos: Pos) -> i8 {
        if !self.is_valid_pos(pos) {
            return 0;
        }
        self.elevation[self.idx(pos)]
    }

    pub fn grid_at(&self, pos: Pos) -> Option<Id> {
        if !self.is_valid_pos(pos) {
            return None;
        }
        self.grid[self.idx(pos)]
    }

    pub fn overlay_at(&self, pos: Pos) -> Option<Id> {
        if !self.is_valid_pos(pos) {
            return None;
        }
        self.overlay_grid[self.idx(pos)]
    }

    pub fn is_empty_of_things(&self, pos: Pos) -> bool {
        self.grid_at(pos).is_none()
    }

    /// A door on `pos` blocks entry unless the mover's team matches its
    /// owner (spec §4.3 "the agent cannot pass a door on `step1`").
    pub fn door_blocks(&self, pos: Pos, mover_team: TeamId) -> bool {
        let Some(id) = self.overlay_at(pos) else {
            return false;
        };
        match self.registry.get(id) {
            Some(t) if t.kind == ThingKind::Door => t.team_id != mover_team,
            _ => false,
        }
    }

    pub fn is_terrain_blocked(&self, pos: Pos) -> bool {
        crate::terrain::is_blocking(self.terrain_at(pos))
    }

    /// Insert a new entity into the registry, the appropriate grid layer,
    /// and the spatial index (spec §4.1 `add`).
    pub fn add(&mut self, thing: Thing) -> Id {
        let kind = thing.kind;
        let pos = thing.pos;
        let overlay = kind.is_overlay();
        let agent_id = match &thing.payload {
            ThingPayload::Agent { agent_id, .. } => Some(*agent_id),
            _ => None,
        };
        let id = self.registry.insert(thing);
        if let Some(aid) = agent_id {
            if aid < self.agent_index.len() {
                self.agent_index[aid] = Some(id);
            }
        }
        if self.is_valid_pos(pos) {
            let i = self.idx(pos);
            if overlay {
                self.overlay_grid[i] = Some(id);
            } else {
                self.grid[i] = Some(id);
            }
            self.spatial.add(id, pos, kind);
        }
        id
    }

    /// `agentId -> Id` lookup populated by `add` (spec §3 "Entity registry").
    pub fn agent_thing_id(&self, agent_id: usize) -> Option<Id> {
        self.agent_index.get(agent_id).copied().flatten()
    }

    /// Clears whichever layer (blocking or overlay) currently holds an
    /// entity at `pos` and drops it from the spatial index, without
    /// touching the registry. Used when an agent dies: its `grid` cell is
    /// cleared per spec §3 "Lifecycle" while the `Thing` itself survives
    /// (agents never leave `agents`) until respawn re-adds it.
    pub(crate) fn grid_or_overlay_clear(&mut self, pos: Pos) {
        if !self.is_valid_pos(pos) {
            return;
        }
        let i = self.idx(pos);
        if let Some(id) = self.grid[i].take() {
            self.spatial.remove(id);
        } else if let Some(id) = self.overlay_grid[i].take() {
            self.spatial.remove(id);
        }
    }

    pub(crate) fn set_grid_slot(&mut self, idx: usize, id: Option<Id>, overlay: bool) {
        if overlay {
            self.overlay_grid[idx] = id;
        } else {
            self.grid[idx] = id;
        }
    }

    /// Lowest `agentId` on `team_id` whose `terminated` flag is set
    /// (spec §4.5 altar auto-respawn picks "one terminated teammate").
    pub fn find_terminated_teammate(&self, team_id: TeamId) -> Option<usize> {
        let mut best: Option<usize> = None;
        for id in self.registry.agent_ids() {
            let Some(t) = self.registry.get(*id) else { continue };
            if t.team_id != team_id {
                continue;
            }
            let ThingPayload::Agent { agent_id, .. } = &t.payload else {
                continue;
            };
            if self.terminated.get(*agent_id).copied().unwrap_or(0) == 1
                && best.map_or(true, |b| *agent_id < b)
            {
                best = Some(*agent_id);
            }
        }
        best
    }

    /// First empty, unblocked, valid tile adjacent to `pos` in compass
    /// order (N,S,W,E,NW,NE,SW,SE), used to place a respawned agent.
    pub fn find_empty_adjacent(&self, pos: Pos) -> Option<Pos> {
        for dir in [
            Orientation::North,
            Orientation::South,
            Orientation::West,
            Orientation::East,
            Orientation::NorthWest,
            Orientation::NorthEast,
            Orientation::SouthWest,
            Orientation::SouthEast,
        ] {
            let p = pos.offset_dir(dir);
            if self.is_valid_pos(p) && self.is_empty_of_things(p) && !self.is_terrain_blocked(p) {
                return Some(p);
            }
        }
        None
    }

    /// Remove an entity from every layer (spec §4.1 `removeThing`).
    /// Idempotent: removing an already-absent `Id` is a no-op.
    pub fn remove_thing(&mut self, id: Id) {
        let Some(thing) = self.registry.get(id) else {
            return;
        };
        let pos = thing.pos;
        let kind = thing.kind;
        if self.is_valid_pos(pos) {
            let i = self.idx(pos);
            if kind.is_overlay() {
                if self.overlay_grid[i] == Some(id) {
                    self.overlay_grid[i] = None;
                }
            } else if self.grid[i] == Some(id) {
                self.grid[i] = None;
            }
        }
        self.spatial.remove(id);
        self.registry.remove(id);
    }

    /// Move a blocking (or overlay) entity to `new_pos`, keeping the grid,
    /// registry, and spatial index consistent.
    pub fn move_thing(&mut self, id: Id, new_pos: Pos) {
        let Some(thing) = self.registry.get(id) else {
            return;
        };
        let old_pos = thing.pos;
        let kind = thing.kind;
        if self.is_valid_pos(old_pos) {
            let i = self.idx(old_pos);
            if kind.is_overlay() {
                if self.overlay_grid[i] == Some(id) {
                    self.overlay_grid[i] = None;
                }
            } else if self.grid[i] == Some(id) {
                self.grid[i] = None;
            }
        }
        if let Some(t) = self.registry.get_mut(id) {
            t.pos = new_pos;
        }
        if self.is_valid_pos(new_pos) {
            let i = self.idx(new_pos);
            if kind.is_overlay() {
                self.overlay_grid[i] = Some(id);
            } else {
                self.grid[i] = Some(id);
            }
        }
        self.spatial.move_thing(id, new_pos, kind);
    }

    pub fn agent_team(&self, agent_id: usize) -> TeamId {
        TeamId((agent_id / self.config.agents_per_team.max(1)) as i8)
    }

    pub fn reset(&mut self) {
        self.grid.iter_mut().for_each(|c| *c = None);
        self.overlay_grid.iter_mut().for_each(|c| *c = None);
        self.terrain.iter_mut().for_each(|t| *t = TerrainType::Empty);
        self.elevation.iter_mut().for_each(|e| *e = 0);
        self.tint.reset();
        self.tumor_tint.reset();
        self.action_tint.reset();
        let num_teams = self.num_teams();
        self.stockpiles = vec![Stockpile::default(); num_teams];
        self.control = crate::control::ControlState::new(self.config.num_agents, num_teams);
        self.wildlife.reset();
        self.stats = vec![AgentStats::default(); self.config.num_agents];
        self.rewards = vec![0.0; self.config.num_agents];
        self.terminated = vec![0; self.config.num_agents];
        self.truncated = vec![0; self.config.num_agents];
        self.observations = vec![0; self.config.num_agents * agent_block_len()];
        self.registry.clear();
        self.spatial.clear();
        self.rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        self.current_step = 0;
        self.populate();
        self.rebuild_observations();
    }

    /// Minimal deterministic world layout: village altars, agent spawns,
    /// and scattered resources/wildlife/spawners. Procedural biome/terrain
    /// generation proper is an external, out-of-scope collaborator (spec
    /// §1); this supplies only what `newEnvironment` (§4.1) requires to
    /// hand the dispatcher a populated world.
    fn populate(&mut self) {
        let width = self.width();
        let height = self.height();
        let num_teams = self.num_teams();

        // Scatter a handful of fertile patches and elevated tiles before
        // placing entities, matching §3's terrain/elevation fields.
        let fertile_patches = (width * height / 40).max(4);
        for _ in 0..fertile_patches {
            let x = self.rng.gen_range(0..width);
            let y = self.rng.gen_range(0..height);
            self.set_terrain(Pos::new(x, y), TerrainType::Fertile);
        }
        let hill_count = (width * height / 80).max(2);
        for _ in 0..hill_count {
            let x = self.rng.gen_range(0..width);
            let y = self.rng.gen_range(0..height);
            if self.is_valid_pos(Pos::new(x, y)) {
                let i = self.idx(Pos::new(x, y));
                self.elevation[i] = self.rng.gen_range(1..=3);
            }
        }

        let cols = (num_teams as f32).sqrt().ceil() as i32;
        let cols = cols.max(1);
        for team in 0..num_teams {
            let team_id = TeamId(team as i8);
            let col = team as i32 % cols;
            let row = team as i32 / cols;
            let rows = ((num_teams as i32) + cols - 1) / cols;
            let cx = ((col * 2 + 1) * width) / (cols * 2);
            let cy = ((row * 2 + 1) * height) / (rows.max(1) * 2);
            let altar_pos = Pos::new(cx.clamp(1, width - 2), cy.clamp(1, height - 2));

            let altar = Thing {
                id: Id(0),
                kind: ThingKind::Altar,
                pos: altar_pos,
                team_id,
                hp: 1,
                max_hp: 1,
                cooldown: 0,
                frozen: 0,
                payload: ThingPayload::Altar { hearts: 3 },
                things_index: 0,
                kind_list_index: 0,
            };
            let altar_id = self.add(altar);

            let town_center_pos = Pos::new(
                (altar_pos.x + 2).min(width - 1),
                (altar_pos.y).min(height - 1),
            );
            if self.is_empty_of_things(town_center_pos) {
                let tc = Thing {
                    id: Id(0),
                    kind: ThingKind::TownCenter,
                    pos: town_center_pos,
                    team_id,
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
                };
                self.add(tc);
            }

            let agents_per_team = self.config.agents_per_team;
            for slot in 0..agents_per_team {
                let agent_id = team * agents_per_team + slot;
                if agent_id >= self.config.num_agents {
                    break;
                }
                let spawn = self.find_open_spawn(altar_pos);
                let unit_class = match slot % 5 {
                    0 => UnitClass::Villager,
                    1 => UnitClass::Villager,
                    2 => UnitClass::Archer,
                    3 => UnitClass::ManAtArms,
                    _ => UnitClass::Monk,
                };
                let attack_damage = match unit_class {
                    UnitClass::Villager => 1,
                    UnitClass::Monk => 0,
                    UnitClass::Archer => 3,
                    UnitClass::Siege => 6,
                    UnitClass::ManAtArms => 4,
                };
                let agent = Thing {
                    id: Id(0),
                    kind: ThingKind::Agent,
                    pos: spawn,
                    team_id,
                    hp: 10,
                    max_hp: 10,
                    cooldown: 0,
                    frozen: 0,
                    payload: ThingPayload::Agent {
                        agent_id,
                        orientation: Orientation::South,
                        unit_class,
                        inventory: Inventory::new(),
                        reward: 0.0,
                        attack_damage,
                        home_altar: Some(altar_id),
                        shield_ticks: 0,
                    },
                    things_index: 0,
                    kind_list_index: 0,
                };
                self.add(agent);
            }
        }

        self.scatter_resources_and_wildlife();
    }

    fn find_open_spawn(&mut self, near: Pos) -> Pos {
        for radius in 1..12 {
            for _ in 0..16 {
                let dx = self.rng.gen_range(-radius..=radius);
                let dy = self.rng.gen_range(-radius..=radius);
                let p = Pos::new(near.x + dx, near.y + dy);
                if self.is_valid_pos(p) && self.is_empty_of_things(p) && !self.is_terrain_blocked(p)
                {
                    return p;
                }
            }
        }
        near
    }

    fn scatter_resources_and_wildlife(&mut self) {
        let width = self.width();
        let height = self.height();
        let area = (width * height) as i32;

        let tree_count = (area / 60).max(4);
        for _ in 0..tree_count {
            let p = Pos::new(self.rng.gen_range(0..width), self.rng.gen_range(0..height));
            if self.is_empty_of_things(p) && !self.is_terrain_blocked(p) {
                self.spawn_resource_node(p, ThingKind::Tree, ItemKey::Wood);
            }
        }
        let wheat_count = (area / 90).max(2);
        for _ in 0..wheat_count {
            let p = Pos::new(self.rng.gen_range(0..width), self.rng.gen_range(0..height));
            if self.is_empty_of_things(p) && !self.is_terrain_blocked(p) {
                self.spawn_resource_node(p, ThingKind::Wheat, ItemKey::Wheat);
            }
        }
        let stone_count = (area / 120).max(2);
        for _ in 0..stone_count {
            let p = Pos::new(self.rng.gen_range(0..width), self.rng.gen_range(0..height));
            if self.is_empty_of_things(p) && !self.is_terrain_blocked(p) {
                self.spawn_resource_node(p, ThingKind::Stone, ItemKey::Stone);
            }
        }
        let gold_count = (area / 200).max(1);
        for _ in 0..gold_count {
            let p = Pos::new(self.rng.gen_range(0..width), self.rng.gen_range(0..height));
            if self.is_empty_of_things(p) && !self.is_terrain_blocked(p) {
                self.spawn_resource_node(p, ThingKind::Gold, ItemKey::Gold);
            }
        }

        let spawner_count = (area / 400).max(1);
        for i in 0..spawner_count {
            let p = Pos::new(self.rng.gen_range(0..width), self.rng.gen_range(0..height));
            if self.is_empty_of_things(p) {
                let spawner = Thing {
                    id: Id(0),
                    kind: ThingKind::Spawner,
                    pos: p,
                    team_id: TeamId::NEUTRAL,
                    hp: 30,
                    max_hp: 30,
                    cooldown: 0,
                    frozen: 0,
                    payload: ThingPayload::Spawner { tumors_spawned: 0 },
                    things_index: 0,
                    kind_list_index: 0,
                };
                self.add(spawner);
            }
            let _ = i;
        }

        let herd_count = (area / 300).max(1);
        for herd_id in 0..herd_count as u32 {
            let center = Pos::new(self.rng.gen_range(0..width), self.rng.gen_range(0..height));
            for _ in 0..self.rng.gen_range(3..=6) {
                let p = Pos::new(
                    (center.x + self.rng.gen_range(-3..=3)).clamp(0, width - 1),
                    (center.y + self.rng.gen_range(-3..=3)).clamp(0, height - 1),
                );
                if self.is_empty_of_things(p) {
                    let cow = Thing {
                        id: Id(0),
                        kind: ThingKind::Cow,
                        pos: p,
                        team_id: TeamId::NEUTRAL,
                        hp: 6,
                        max_hp: 6,
                        cooldown: 0,
                        frozen: 0,
                        payload: ThingPayload::Cow { herd_id },
                        things_index: 0,
                        kind_list_index: 0,
                    };
                    self.add(cow);
                }
            }
        }

        let pack_count = (area / 600).max(1);
        for pack_id in 0..pack_count as u32 {
            let center = Pos::new(self.rng.gen_range(0..width), self.rng.gen_range(0..height));
            for _ in 0..self.rng.gen_range(2..=4) {
                let p = Pos::new(
                    (center.x + self.rng.gen_range(-3..=3)).clamp(0, width - 1),
                    (center.y + self.rng.gen_range(-3..=3)).clamp(0, height - 1),
                );
                if self.is_empty_of_things(p) {
                    let wolf = Thing {
                        id: Id(0),
                        kind: ThingKind::Wolf,
                        pos: p,
                        team_id: TeamId::NEUTRAL,
                        hp: 8,
                        max_hp: 8,
                        cooldown: 0,
                        frozen: 0,
                        payload: ThingPayload::Wolf {
                            pack_id,
                            scattered_steps: 0,
                        },
                        things_index: 0,
                        kind_list_index: 0,
                    };
                    self.add(wolf);
                }
            }
        }

        let bear_count = (area / 1200).max(1);
        for _ in 0..bear_count {
            let p = Pos::new(self.rng.gen_range(0..width), self.rng.gen_range(0..height));
            if self.is_empty_of_things(p) {
                let bear = Thing {
                    id: Id(0),
                    kind: ThingKind::Bear,
                    pos: p,
                    team_id: TeamId::NEUTRAL,
                    hp: 24,
                    max_hp: 24,
                    cooldown: 0,
                    frozen: 0,
                    payload: ThingPayload::Bear,
                    things_index: 0,
                    kind_list_index: 0,
                };
                self.add(bear);
            }
        }
    }

    fn spawn_resource_node(&mut self, pos: Pos, kind: ThingKind, item: ItemKey) {
        let node = Thing {
            id: Id(0),
            kind,
            pos,
            team_id: TeamId::NEUTRAL,
            hp: 1,
            max_hp: 1,
            cooldown: 0,
            frozen: 0,
            payload: ThingPayload::ResourceNode {
                item,
                remaining: self.config.resource_node_initial,
            },
            things_index: 0,
            kind_list_index: 0,
        };
        self.add(node);
    }

    pub fn rebuild_observations(&mut self) {
        let agent_ids: Vec<_> = self.registry.agent_ids().to_vec();
        for id in agent_ids {
            let Some(thing) = self.registry.get(id) else {
                continue;
            };
            let ThingPayload::Agent { agent_id, .. } = thing.payload else {
                continue;
            };
            let block_len = agent_block_len();
            let start = agent_id * block_len;
            let end = start + block_len;
            if end > self.observations.len() {
                continue;
            }
            if thing.is_alive() && self.terminated.get(agent_id).copied().unwrap_or(1) == 0 {
                let pos = thing.pos;
                let team_plus1 = (thing.team_id.0 + 1).max(0) as u8;
                let slice = &mut self.observations[start..end];
                rebuild_agent_observation(self, pos, team_plus1, slice);
            } else {
                self.observations[start..end].fill(0);
            }
        }
    }

    /// Debug-mode check of the grid/registry bijection and spatial-index
    /// consistency (spec §8 properties 1–2). Returns a description of the
    /// first violation found, or `None` if every entity with a valid
    /// position agrees with the grid it should occupy and with
    /// `find_nearest_thing(pos, kind, 0)`. Not called on the hot path in
    /// release builds; see `step.rs`'s end-of-tick call.
    pub fn check_invariants(&self) -> Option<String> {
        for thing in self.registry.iter() {
            if !self.is_valid_pos(thing.pos) {
                continue;
            }
            let layer = if thing.kind.is_overlay() { self.overlay_at(thing.pos) } else { self.grid_at(thing.pos) };
            if layer != Some(thing.id) {
                return Some(format!(
                    "thing {:?} of kind {:?} at {:?} is not the grid occupant there (found {:?})",
                    thing.id, thing.kind, thing.pos, layer
                ));
            }
            if self.spatial.find_nearest_thing(&self.registry, thing.pos, thing.kind, 0) != Some(thing.id) {
                return Some(format!(
                    "thing {:?} of kind {:?} at {:?} is missing from the spatial index",
                    thing.id, thing.kind, thing.pos
                ));
            }
        }
        for (grid, label) in [(&self.grid, "grid"), (&self.overlay_grid, "overlay_grid")] {
            for (i, slot) in grid.iter().enumerate() {
                let Some(id) = slot else { continue };
                let pos = Pos::new(i as i32 % self.width(), i as i32 / self.width());
                match self.registry.get(*id) {
                    Some(thing) if thing.pos == pos => {}
                    Some(thing) => {
                        return Some(format!("{label}[{pos:?}] points to {id:?}, but its registered pos is {:?}", thing.pos));
                    }
                    None => return Some(format!("{label}[{pos:?}] points to freed id {id:?}")),
                }
            }
        }
        None
    }
}

fn team_color(team: usize) -> [u8; 3] {
    const PALETTE: [[u8; 3]; 8] = [
        [220, 60, 60],
        [60, 120, 220],
        [70, 190, 90],
        [230, 200, 50],
        [190, 90, 220],
        [240, 140, 40],
        [60, 200, 200],
        [180, 180, 180],
    ];
    PALETTE[team % PALETTE.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> EnvironmentConfig {
        let mut cfg = EnvironmentConfig::default();
        cfg.map_width = 24;
        cfg.map_height = 24;
        cfg.num_agents = 4;
        cfg.agents_per_team = 2;
        cfg
    }

    #[test]
    fn new_world_places_all_agents() {
        let world = World::new(small_config());
        assert_eq!(world.registry.agent_ids().len(), 4);
        for id in world.registry.agent_ids() {
            let thing = world.registry.get(*id).unwrap();
            assert!(world.grid_at(thing.pos) == Some(*id));
        }
    }

    #[test]
    fn reset_rebuilds_same_layout_with_same_seed() {
        let mut w1 = World::new(small_config());
        let mut w2 = World::new(small_config());
        w1.reset();
        w2.reset();
        let positions = |w: &World| -> Vec<Pos> {
            w.registry.agent_ids().iter().map(|id| w.registry.get(*id).unwrap().pos).collect()
        };
        assert_eq!(positions(&w1), positions(&w2));
    }

    #[test]
    fn remove_thing_clears_grid_and_spatial_index() {
        let mut world = World::new(small_config());
        let tree_id = world
            .registry
            .kind_ids(ThingKind::Tree)
            .next()
            .expect("at least one tree spawned");
        let pos = world.registry.get(tree_id).unwrap().pos;
        world.remove_thing(tree_id);
        assert!(world.grid_at(pos).is_none());
        assert!(world
            .spatial
            .find_nearest_thing(&world.registry, pos, ThingKind::Tree, 0)
            .is_none());
    }
}
