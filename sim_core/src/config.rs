use serde::{Deserialize, Serialize};

/// Per-episode configuration. Structural fields are fixed for the life of
/// an `Environment`; the reward knobs and `max_steps`/`victory_condition`
/// can be changed between episodes via `set_config`.
///
/// Grounded on `core_sim/src/resources.rs::SimulationConfig`: a plain
/// `Clone`-able struct with a full `Default` impl holding the tuned
/// constants the rest of the engine reads by value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    // Structural
    pub map_width: i32,
    pub map_height: i32,
    pub num_agents: usize,
    pub agents_per_team: usize,
    pub cell_size: i32,
    pub observation_radius: i32,
    pub observation_layers: usize,

    // Episode control
    pub max_steps: i32,
    pub victory_condition: i32,
    pub seed: u64,

    // Reward knobs (spec §6.3)
    pub tumor_spawn_rate: f32,
    pub heart_reward: f32,
    pub ore_reward: f32,
    pub bar_reward: f32,
    pub wood_reward: f32,
    pub water_reward: f32,
    pub wheat_reward: f32,
    pub spear_reward: f32,
    pub armor_reward: f32,
    pub food_reward: f32,
    pub cloth_reward: f32,
    pub tumor_kill_reward: f32,
    pub survival_penalty: f32,
    pub death_penalty: f32,

    // Tuned gameplay constants (Glossary / §4)
    pub archer_base_range: i32,
    pub resource_node_initial: i32,
    pub max_inventory: i32,
    pub altar_auto_spawn_threshold: i32,
    pub altar_cooldown: i32,
    pub clippy_tint_tolerance: i32,
    pub bear_aggro_radius: i32,
    pub cow_herd_follow_chance: f32,
    pub cow_random_move_chance: f32,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            map_width: 64,
            map_height: 64,
            num_agents: 64,
            agents_per_team: 8,
            cell_size: 16,
            observation_radius: 5,
            observation_layers: 24,

            max_steps: 1000,
            victory_condition: 0,
            seed: 0,

            tumor_spawn_rate: 0.01,
            heart_reward: 1.0,
            ore_reward: 0.1,
            bar_reward: 0.2,
            wood_reward: 0.05,
            water_reward: 0.02,
            wheat_reward: 0.05,
            spear_reward: 0.1,
            armor_reward: 0.1,
            food_reward: 0.05,
            cloth_reward: 0.1,
            tumor_kill_reward: 0.5,
            survival_penalty: -0.001,
            death_penalty: -1.0,

            archer_base_range: 3,
            resource_node_initial: 5,
            max_inventory: 5,
            altar_auto_spawn_threshold: 5,
            altar_cooldown: 20,
            clippy_tint_tolerance: 8,
            bear_aggro_radius: 6,
            cow_herd_follow_chance: 0.5,
            cow_random_move_chance: 0.1,
        }
    }
}

/// POD mirror of `EnvironmentConfig` for the FFI boundary (spec §6.1/§6.3).
/// Every field is a plain scalar so it can be passed by value across the C
/// ABI without a serializer.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct CEnvironmentConfig {
    pub max_steps: i32,
    pub victory_condition: i32,
    pub tumor_spawn_rate: f32,
    pub heart_reward: f32,
    pub ore_reward: f32,
    pub bar_reward: f32,
    pub wood_reward: f32,
    pub water_reward: f32,
    pub wheat_reward: f32,
    pub spear_reward: f32,
    pub armor_reward: f32,
    pub food_reward: f32,
    pub cloth_reward: f32,
    pub tumor_kill_reward: f32,
    pub survival_penalty: f32,
    pub death_penalty: f32,
}

impl EnvironmentConfig {
    /// Apply a `CEnvironmentConfig` onto this config. NaN float fields and
    /// a non-positive `max_steps` preserve the existing value, per §6.3.
    /// `victory_condition` is clamped into `0..=5`.
    pub fn apply_c_config(&mut self, c: &CEnvironmentConfig) {
        if c.max_steps > 0 {
            self.max_steps = c.max_steps;
        }
        self.victory_condition = c.victory_condition.clamp(0, 5);

        apply_f32(&mut self.tumor_spawn_rate, c.tumor_spawn_rate);
        apply_f32(&mut self.heart_reward, c.heart_reward);
        apply_f32(&mut self.ore_reward, c.ore_reward);
        apply_f32(&mut self.bar_reward, c.bar_reward);
        apply_f32(&mut self.wood_reward, c.wood_reward);
        apply_f32(&mut self.water_reward, c.water_reward);
        apply_f32(&mut self.wheat_reward, c.wheat_reward);
        apply_f32(&mut self.spear_reward, c.spear_reward);
        apply_f32(&mut self.armor_reward, c.armor_reward);
        apply_f32(&mut self.food_reward, c.food_reward);
        apply_f32(&mut self.cloth_reward, c.cloth_reward);
        apply_f32(&mut self.tumor_kill_reward, c.tumor_kill_reward);
        apply_f32(&mut self.survival_penalty, c.survival_penalty);
        apply_f32(&mut self.death_penalty, c.death_penalty);
    }
}

fn apply_f32(slot: &mut f32, value: f32) {
    if !value.is_nan() {
        *slot = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nan_preserves_default() {
        let mut cfg = EnvironmentConfig::default();
        let original_bar = cfg.bar_reward;
        let c = CEnvironmentConfig {
            max_steps: -1,
            victory_condition: 9,
            tumor_spawn_rate: f32::NAN,
            heart_reward: f32::NAN,
            ore_reward: f32::NAN,
            bar_reward: f32::NAN,
            wood_reward: f32::NAN,
            water_reward: f32::NAN,
            wheat_reward: f32::NAN,
            spear_reward: f32::NAN,
            armor_reward: f32::NAN,
            food_reward: f32::NAN,
            cloth_reward: f32::NAN,
            tumor_kill_reward: f32::NAN,
            survival_penalty: f32::NAN,
            death_penalty: f32::NAN,
        };
        let original_max_steps = cfg.max_steps;
        cfg.apply_c_config(&c);
        assert_eq!(cfg.max_steps, original_max_steps);
        assert_eq!(cfg.victory_condition, 5);
        assert_eq!(cfg.bar_reward, original_bar);
    }

    #[test]
    fn valid_values_apply() {
        let mut cfg = EnvironmentConfig::default();
        let c = CEnvironmentConfig {
            max_steps: 500,
            victory_condition: 2,
            tumor_spawn_rate: 0.2,
            heart_reward: 2.0,
            ore_reward: 0.0,
            bar_reward: 0.0,
            wood_reward: 0.0,
            water_reward: 0.0,
            wheat_reward: 0.0,
            spear_reward: 0.0,
            armor_reward: 0.0,
            food_reward: 0.0,
            cloth_reward: 0.0,
            tumor_kill_reward: 0.0,
            survival_penalty: 0.0,
            death_penalty: 0.0,
        };
        cfg.apply_c_config(&c);
        assert_eq!(cfg.max_steps, 500);
        assert_eq!(cfg.victory_condition, 2);
        assert_eq!(cfg.tumor_spawn_rate, 0.2);
    }
}
