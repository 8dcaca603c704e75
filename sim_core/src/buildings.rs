//! Building/resource model (spec §4.6): use-kind dispatch tables, the
//! `BuildChoices` preset table consulted by verb 8 (BUILD), crafting
//! stations, training, and the team stockpile.
//!
//! Grounded on `core_sim/src/resources.rs`'s `TileRegistry` (a resource
//! that is mostly a typed lookup table) for the const build-choice table
//! shape, and the teacher's `def()`-style tiny-constructor idiom carried
//! over from `terrain.rs`. String-typed building registries (Design Notes
//! §9) are replaced with enum keys and const arrays; no hash lookups sit on
//! the step path.

use crate::ids::ThingKind;
use crate::thing::ItemKey;

/// What a `USE` against this building kind does (spec §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UseKind {
    UseAltar,
    UseArmory,
    UseWeavingLoom,
    UseClayOven,
    UseBlacksmith,
    UseMarket,
    UseDropoff,
    UseDropoffAndStorage,
    UseStorage,
    UseTrain,
    UseTrainAndCraft,
    UseCraft,
    UseNone,
}

/// A crafting station's raw-material recipe, consulted by `actions::use_verb`.
#[derive(Debug, Clone, Copy)]
pub struct Recipe {
    pub consumes: ItemKey,
    pub consumes_count: i32,
    pub produces: ItemKey,
    pub produces_count: i32,
    pub cooldown: i32,
}

pub fn use_kind_for(kind: ThingKind) -> UseKind {
    match kind {
        ThingKind::Altar => UseKind::UseAltar,
        ThingKind::Armory => UseKind::UseArmory,
        ThingKind::WeavingLoom => UseKind::UseWeavingLoom,
        ThingKind::ClayOven => UseKind::UseClayOven,
        ThingKind::Blacksmith => UseKind::UseBlacksmith,
        ThingKind::Market => UseKind::UseMarket,
        ThingKind::Dropoff => UseKind::UseDropoff,
        ThingKind::Storage => UseKind::UseStorage,
        ThingKind::TrainingGround => UseKind::UseTrainAndCraft,
        ThingKind::ResearchHouse => UseKind::UseCraft,
        ThingKind::TownCenter => UseKind::UseDropoffAndStorage,
        ThingKind::Mill | ThingKind::LumberCamp | ThingKind::MiningCamp => UseKind::UseDropoff,
        _ => UseKind::UseNone,
    }
}

pub fn recipe_for(kind: ThingKind) -> Option<Recipe> {
    match kind {
        ThingKind::WeavingLoom => Some(Recipe {
            consumes: ItemKey::Wool,
            consumes_count: 1,
            produces: ItemKey::Cloth,
            produces_count: 1,
            cooldown: 10,
        }),
        ThingKind::ClayOven => Some(Recipe {
            consumes: ItemKey::Wheat,
            consumes_count: 1,
            produces: ItemKey::Bread,
            produces_count: 1,
            cooldown: 8,
        }),
        ThingKind::Blacksmith => Some(Recipe {
            consumes: ItemKey::Bar,
            consumes_count: 1,
            produces: ItemKey::Spear,
            produces_count: 1,
            cooldown: 15,
        }),
        ThingKind::Armory => Some(Recipe {
            consumes: ItemKey::Bar,
            consumes_count: 1,
            produces: ItemKey::Armor,
            produces_count: 1,
            cooldown: 15,
        }),
        _ => None,
    }
}

/// Resources a `Dropoff`/`TownCenter`/resource-camp accepts from an agent's
/// inventory straight into the team stockpile.
pub fn dropoff_accepts(kind: ThingKind) -> &'static [ItemKey] {
    match kind {
        ThingKind::TownCenter => &[
            ItemKey::Wood,
            ItemKey::Wheat,
            ItemKey::Stone,
            ItemKey::Gold,
            ItemKey::Water,
        ],
        ThingKind::LumberCamp => &[ItemKey::Wood],
        ThingKind::MiningCamp => &[ItemKey::Stone, ItemKey::Gold],
        ThingKind::Mill => &[ItemKey::Wheat],
        ThingKind::Dropoff => &[
            ItemKey::Wood,
            ItemKey::Wheat,
            ItemKey::Stone,
            ItemKey::Gold,
            ItemKey::Water,
        ],
        _ => &[],
    }
}

/// True for the three resource-camp kinds that auto-draw a road back to the
/// nearest teammate `TownCenter`/`Altar` on placement (spec §4.3 BUILD).
pub fn is_resource_camp(kind: ThingKind) -> bool {
    matches!(
        kind,
        ThingKind::Mill | ThingKind::LumberCamp | ThingKind::MiningCamp
    )
}

/// One entry in the `BuildChoices` preset table indexed by the BUILD verb's
/// argument.
#[derive(Debug, Clone, Copy)]
pub struct BuildChoice {
    pub kind: ThingKind,
    pub costs: &'static [(ItemKey, i32)],
    pub hp: i32,
}

pub const BUILD_CHOICES: &[BuildChoice] = &[
    BuildChoice {
        kind: ThingKind::Wall,
        costs: &[(ItemKey::Stone, 2)],
        hp: 40,
    },
    BuildChoice {
        kind: ThingKind::Door,
        costs: &[(ItemKey::Wood, 2)],
        hp: 20,
    },
    BuildChoice {
        kind: ThingKind::Mill,
        costs: &[(ItemKey::Wood, 5)],
        hp: 60,
    },
    BuildChoice {
        kind: ThingKind::LumberCamp,
        costs: &[(ItemKey::Wood, 4)],
        hp: 60,
    },
    BuildChoice {
        kind: ThingKind::MiningCamp,
        costs: &[(ItemKey::Stone, 4)],
        hp: 60,
    },
    BuildChoice {
        kind: ThingKind::WeavingLoom,
        costs: &[(ItemKey::Wood, 6), (ItemKey::Stone, 2)],
        hp: 80,
    },
    BuildChoice {
        kind: ThingKind::ClayOven,
        costs: &[(ItemKey::Stone, 6)],
        hp: 80,
    },
    BuildChoice {
        kind: ThingKind::Blacksmith,
        costs: &[(ItemKey::Stone, 8), (ItemKey::Wood, 4)],
        hp: 100,
    },
    BuildChoice {
        kind: ThingKind::Market,
        costs: &[(ItemKey::Wood, 8), (ItemKey::Gold, 2)],
        hp: 100,
    },
    BuildChoice {
        kind: ThingKind::Storage,
        costs: &[(ItemKey::Wood, 6)],
        hp: 80,
    },
];

pub fn build_choice(argument: u8) -> Option<&'static BuildChoice> {
    BUILD_CHOICES.get(argument as usize)
}

/// One unit class trainable at a `TrainingGround` (spec §4.6).
#[derive(Debug, Clone, Copy)]
pub struct TrainingOption {
    pub unit_class: crate::thing::UnitClass,
    pub costs: &'static [(ItemKey, i32)],
    pub cooldown: i32,
}

pub const TRAINING_OPTIONS: &[TrainingOption] = &[
    TrainingOption {
        unit_class: crate::thing::UnitClass::Villager,
        costs: &[(ItemKey::Wheat, 2)],
        cooldown: 10,
    },
    TrainingOption {
        unit_class: crate::thing::UnitClass::Monk,
        costs: &[(ItemKey::Wheat, 3), (ItemKey::Gold, 1)],
        cooldown: 20,
    },
    TrainingOption {
        unit_class: crate::thing::UnitClass::Archer,
        costs: &[(ItemKey::Wood, 3), (ItemKey::Wheat, 2)],
        cooldown: 20,
    },
    TrainingOption {
        unit_class: crate::thing::UnitClass::Siege,
        costs: &[(ItemKey::Wood, 6), (ItemKey::Stone, 4)],
        cooldown: 40,
    },
    TrainingOption {
        unit_class: crate::thing::UnitClass::ManAtArms,
        costs: &[(ItemKey::Stone, 3), (ItemKey::Wheat, 2)],
        cooldown: 25,
    },
];

/// Per-team stockpile (spec §3 "Team state").
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Stockpile {
    pub food: i32,
    pub wood: i32,
    pub stone: i32,
    pub gold: i32,
    pub water: i32,
}

impl Stockpile {
    pub fn get(&self, item: ItemKey) -> i32 {
        match item {
            ItemKey::Wheat => self.food,
            ItemKey::Wood => self.wood,
            ItemKey::Stone => self.stone,
            ItemKey::Gold => self.gold,
            ItemKey::Water => self.water,
            _ => 0,
        }
    }

    fn slot_mut(&mut self, item: ItemKey) -> Option<&mut i32> {
        match item {
            ItemKey::Wheat => Some(&mut self.food),
            ItemKey::Wood => Some(&mut self.wood),
            ItemKey::Stone => Some(&mut self.stone),
            ItemKey::Gold => Some(&mut self.gold),
            ItemKey::Water => Some(&mut self.water),
            _ => None,
        }
    }

    /// Clamp-adds `n` (spec §4.6 `addToStockpile`); caps at `cap` per resource.
    pub fn add(&mut self, item: ItemKey, n: i32, cap: i32) {
        if let Some(slot) = self.slot_mut(item) {
            *slot = (*slot + n).clamp(0, cap);
        }
    }

    /// Succeeds iff every cost in `costs` is satisfiable, in which case all
    /// are deducted atomically (spec §4.6 `spendStockpile`).
    pub fn spend(&mut self, costs: &[(ItemKey, i32)]) -> bool {
        for &(item, amount) in costs {
            if self.get(item) < amount {
                return false;
            }
        }
        for &(item, amount) in costs {
            if let Some(slot) = self.slot_mut(item) {
                *slot -= amount;
            }
        }
        true
    }

    pub fn can_afford(&self, costs: &[(ItemKey, i32)]) -> bool {
        costs.iter().all(|&(item, amount)| self.get(item) >= amount)
    }
}

/// Team-wide gameplay multipliers (spec §3 "Team state").
#[derive(Debug, Clone, Copy)]
pub struct TeamModifiers {
    pub gather_multiplier: f32,
    pub build_cost_multiplier: f32,
    pub hp_bonus: i32,
    pub attack_bonus: i32,
}

impl Default for TeamModifiers {
    fn default() -> Self {
        Self {
            gather_multiplier: 1.0,
            build_cost_multiplier: 1.0,
            hp_bonus: 0,
            attack_bonus: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stockpile_spend_is_atomic() {
        let mut s = Stockpile {
            wood: 3,
            stone: 1,
            ..Default::default()
        };
        assert!(!s.spend(&[(ItemKey::Wood, 2), (ItemKey::Stone, 5)]));
        assert_eq!(s.wood, 3, "failed spend must not partially deduct");
    }

    #[test]
    fn stockpile_add_clamps() {
        let mut s = Stockpile::default();
        s.add(ItemKey::Wood, 100, 50);
        assert_eq!(s.wood, 50);
    }

    #[test]
    fn resource_camps_are_flagged() {
        assert!(is_resource_camp(ThingKind::Mill));
        assert!(!is_resource_camp(ThingKind::Market));
    }
}
