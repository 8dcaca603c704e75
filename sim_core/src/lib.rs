//! Deterministic simulation core for the tile-world multi-agent
//! environment: an arena-based entity registry, a cell-partitioned spatial
//! index, a packed-byte action dispatcher, an ego-centric observation
//! composer, a decayed tint/influence field, wildlife AI, and the
//! top-level step pipeline that ties them together.
//!
//! No FFI surface and no rendering live here (see `sim_ffi`/`sim_cli`);
//! this crate is a plain `rlib` the way the teacher's `core_sim` is the
//! engine crate underneath its binary/client crates.

pub mod actions;
pub mod buildings;
pub mod combat;
pub mod config;
pub mod control;
pub mod error;
pub mod fixed;
pub mod ids;
pub mod observation;
pub mod registry;
pub mod snapshot;
pub mod spatial;
pub mod stats;
mod step;
pub mod terrain;
pub mod thing;
pub mod tint;
pub mod wildlife;
pub mod world;

pub use config::{CEnvironmentConfig, EnvironmentConfig};
pub use error::{CoreError, CoreResult};
pub use ids::{Id, Orientation, Pos, TeamId, ThingKind};
pub use observation::{OBSERVATION_LAYERS, OBS_HEIGHT, OBS_WIDTH};
pub use world::World;
