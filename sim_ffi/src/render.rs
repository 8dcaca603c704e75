//! Debug rendering for `sim_render_rgb`/`sim_render_ansi` (spec §6.1).
//! Not part of the simulation itself (`sim_core` owns no rendering; see
//! its crate doc comment) — this is the thin visualization layer a C
//! caller or `sim_cli` uses to look at a `World` without touching its
//! internals directly.

use sim_core::terrain::TerrainType;
use sim_core::thing::Thing;
use sim_core::{Pos, ThingKind, World};

fn terrain_color(t: TerrainType) -> [u8; 3] {
    use TerrainType::*;
    match t {
        Empty => [20, 20, 20],
        Grass => [40, 110, 40],
        Fertile => [70, 140, 50],
        Road => [120, 110, 90],
        Water => [30, 60, 140],
        ShallowWater => [60, 100, 170],
        Bridge => [110, 90, 60],
        Sand => [200, 180, 120],
        Dune => [210, 170, 100],
        Snow => [230, 230, 235],
        Mud => [90, 70, 50],
        Mountain => [100, 100, 100],
        RampUp | RampDown => [130, 120, 110],
    }
}

fn kind_color(kind: ThingKind) -> [u8; 3] {
    match kind {
        ThingKind::Wall | ThingKind::Stalagmite => [80, 80, 80],
        ThingKind::Door => [150, 110, 60],
        ThingKind::Tree | ThingKind::Stump => [30, 90, 30],
        ThingKind::Wheat | ThingKind::Stubble => [200, 190, 60],
        ThingKind::Stone => [150, 150, 150],
        ThingKind::Gold => [220, 190, 40],
        ThingKind::Bush => [60, 120, 60],
        ThingKind::Cactus => [50, 130, 70],
        ThingKind::Magma => [200, 60, 20],
        ThingKind::Altar => [220, 220, 255],
        ThingKind::Spawner => [120, 20, 120],
        ThingKind::Tumor => [180, 40, 160],
        ThingKind::Cow => [230, 220, 200],
        ThingKind::Bear => [90, 60, 40],
        ThingKind::Wolf => [120, 120, 130],
        ThingKind::Corpse => [90, 30, 30],
        ThingKind::Skeleton => [220, 220, 210],
        ThingKind::Lantern => [240, 200, 80],
        ThingKind::WeavingLoom | ThingKind::ClayOven | ThingKind::Blacksmith => [160, 120, 90],
        ThingKind::Market | ThingKind::Dropoff | ThingKind::Storage => [170, 140, 90],
        ThingKind::TrainingGround | ThingKind::ResearchHouse | ThingKind::TownCenter | ThingKind::Armory => {
            [190, 160, 100]
        }
        ThingKind::Mill | ThingKind::LumberCamp | ThingKind::MiningCamp => [150, 130, 90],
        ThingKind::Agent => [255, 255, 255],
    }
}

fn tile_color(world: &World, pos: Pos, team_colors: &[[u8; 3]]) -> [u8; 3] {
    if let Some(id) = world.grid_at(pos).or_else(|| world.overlay_at(pos)) {
        if let Some(thing) = world.registry.get(id) {
            if thing.kind == ThingKind::Agent {
                let team = thing.team_id.0.max(0) as usize;
                return team_colors.get(team).copied().unwrap_or([200, 200, 200]);
            }
            return kind_color(thing.kind);
        }
    }
    terrain_color(world.terrain_at(pos))
}

/// Flat `width * height * 3` row-major RGB buffer.
pub fn render_rgb(world: &World) -> Vec<u8> {
    let (width, height) = (world.width(), world.height());
    let mut out = Vec::with_capacity((width * height * 3) as usize);
    for y in 0..height {
        for x in 0..width {
            let color = tile_color(world, Pos::new(x, y), &world.team_colors);
            out.extend_from_slice(&color);
        }
    }
    out
}

/// One character per tile plus an ANSI 24-bit background color escape,
/// newline-terminated rows, reset at end of string.
pub fn render_ansi(world: &World) -> String {
    let (width, height) = (world.width(), world.height());
    let mut out = String::with_capacity((width as usize + 16) * height as usize);
    for y in 0..height {
        for x in 0..width {
            let pos = Pos::new(x, y);
            let color = tile_color(world, pos, &world.team_colors);
            let glyph = world
                .grid_at(pos)
                .or_else(|| world.overlay_at(pos))
                .and_then(|id| world.registry.get(id))
                .map(glyph_for_kind)
                .unwrap_or('.');
            out.push_str(&format!("\x1b[48;2;{};{};{}m{}\x1b[0m", color[0], color[1], color[2], glyph));
        }
        out.push('\n');
    }
    out
}

fn glyph_for_kind(thing: &Thing) -> char {
    use ThingKind::*;
    match thing.kind {
        Agent => 'A',
        Wall | Stalagmite => '#',
        Door => '+',
        Tree | Stump => 'T',
        Wheat | Stubble => 'w',
        Stone => 'o',
        Gold => 'g',
        Bush => 'b',
        Cactus => 'c',
        Magma => '^',
        Altar => 'H',
        Spawner => 'S',
        Tumor => 't',
        Cow => 'C',
        Bear => 'B',
        Wolf => 'W',
        Corpse => 'x',
        Skeleton => 'k',
        Lantern => 'L',
        WeavingLoom | ClayOven | Blacksmith | Market | Dropoff | Storage | TrainingGround | ResearchHouse
        | TownCenter | Armory | Mill | LumberCamp | MiningCamp => '%',
    }
}
