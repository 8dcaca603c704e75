//! Manual stepping and ANSI-render debug tool for `sim_core`.
//!
//! Grounded on `cli_inspector/src/main.rs`'s `clap::Parser` + `color_eyre`
//! shape and `bin/server.rs`'s tracing-subscriber init; this talks to
//! `sim_core::World` in-process rather than over a TCP command loop, since
//! networked multiplayer is out of scope here.

use clap::Parser;
use color_eyre::Result;
use rand::{Rng, SeedableRng};
use sim_core::ids::{Pos, ThingKind};
use sim_core::{EnvironmentConfig, World};

#[derive(Parser, Debug)]
#[command(author, version, about = "Step a sim_core World and print its ANSI render", long_about = None)]
struct Cli {
    /// Number of ticks to run before exiting.
    #[arg(long, default_value_t = 10)]
    steps: u64,

    /// RNG seed for the environment and for random scripted actions.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Map width/height (square map).
    #[arg(long, default_value_t = 32)]
    size: i32,

    /// Number of agents to populate.
    #[arg(long, default_value_t = 16)]
    agents: usize,

    /// Feed every agent random action bytes instead of NOOP each tick.
    #[arg(long, default_value_t = false)]
    random_actions: bool,

    /// Print the ANSI render after every tick instead of only the last one.
    #[arg(long, default_value_t = false)]
    render_every_tick: bool,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let mut config = EnvironmentConfig::default();
    config.map_width = cli.size;
    config.map_height = cli.size;
    config.num_agents = cli.agents;
    config.seed = cli.seed;

    let mut world = World::new(config);
    world.reset();
    let mut action_rng = rand::rngs::StdRng::seed_from_u64(cli.seed);

    tracing::info!(steps = cli.steps, agents = cli.agents, size = cli.size, "starting run");

    for tick in 0..cli.steps {
        let actions: Vec<u8> = (0..world.config.num_agents)
            .map(|_| if cli.random_actions { action_rng.gen_range(0..40) } else { 0 })
            .collect();
        world.step(&actions);

        if cli.render_every_tick {
            println!("-- tick {tick} --");
            println!("{}", render_ansi(&world));
        }
    }

    if !cli.render_every_tick {
        println!("{}", render_ansi(&world));
    }

    let alive = world.terminated.iter().filter(|&&t| t == 0).count();
    let total_reward: f32 = world.rewards.iter().sum();
    println!("step={} alive={}/{} reward_sum={total_reward:.3}", world.current_step, alive, world.config.num_agents);

    Ok(())
}

fn glyph_for_kind(kind: ThingKind) -> char {
    use ThingKind::*;
    match kind {
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

/// Plain-glyph render (no ANSI color, unlike `sim_ffi::render::render_ansi`)
/// since this CLI has no dependency on `sim_ffi` and errs on the side of the
/// teacher's own inspector being a thin, dependency-light debug tool.
fn render_ansi(world: &World) -> String {
    let mut out = String::new();
    for y in 0..world.height() {
        for x in 0..world.width() {
            let pos = Pos::new(x, y);
            let glyph = world
                .grid_at(pos)
                .or_else(|| world.overlay_at(pos))
                .and_then(|id| world.registry.get(id))
                .map(|t| glyph_for_kind(t.kind))
                .unwrap_or('.');
            out.push(glyph);
        }
        out.push('\n');
    }
    out
}
