use std::collections::HashMap;

use crate::ids::{Id, Orientation, Pos, TeamId, ThingKind};

/// Item keys used in inventories and stockpiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKey {
    Wood,
    Wheat,
    Stone,
    Gold,
    Bar,
    Meat,
    Water,
    Bread,
    Armor,
    Lantern,
    Cloth,
    Spear,
    Wool,
}

pub type Inventory = HashMap<ItemKey, i32>;

pub fn inventory_total(inv: &Inventory) -> i32 {
    inv.values().sum()
}

/// Unit classes for agents. Determines attack behavior in `actions::attack`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitClass {
    Villager,
    Monk,
    Archer,
    Siege,
    ManAtArms,
}

/// Kind-specific fields, tagged by `ThingKind` on the enclosing `Thing`.
#[derive(Debug, Clone)]
pub enum ThingPayload {
    Agent {
        agent_id: usize,
        orientation: Orientation,
        unit_class: UnitClass,
        inventory: Inventory,
        reward: f32,
        attack_damage: i32,
        home_altar: Option<Id>,
        shield_ticks: i32,
    },
    Tumor {
        home_spawner: Option<Id>,
        has_claimed_territory: bool,
        turns_alive: u32,
    },
    Spawner {
        tumors_spawned: u32,
    },
    Lantern {
        healthy: bool,
    },
    Altar {
        hearts: i32,
    },
    Door {
        // team_id on the header carries ownership
    },
    Cow {
        herd_id: u32,
    },
    Wolf {
        pack_id: u32,
        scattered_steps: i32,
    },
    Bear,
    ResourceNode {
        item: ItemKey,
        remaining: i32,
    },
    Corpse {
        loot: Inventory,
    },
    Skeleton,
    Building {
        use_kind: crate::buildings::UseKind,
        cooldown_max: i32,
    },
    Static,
}

/// A single entity. The header fields are shared by every kind; the
/// variant payload carries kind-specific state. This replaces the source's
/// polymorphic mutable heap record (Design Notes §9) with a tagged union
/// stored by value in an arena (see `registry::EntityRegistry`).
#[derive(Debug, Clone)]
pub struct Thing {
    pub id: Id,
    pub kind: ThingKind,
    pub pos: Pos,
    pub team_id: TeamId,
    pub hp: i32,
    pub max_hp: i32,
    pub cooldown: i32,
    pub frozen: i32,
    pub payload: ThingPayload,

    /// Index into `EntityRegistry::things`. Maintained by the registry.
    pub(crate) things_index: usize,
    /// Index into the per-kind bucket. Maintained by the registry.
    pub(crate) kind_list_index: usize,
}

impl Thing {
    pub fn is_blocking(&self) -> bool {
        !self.kind.is_overlay()
    }

    pub fn is_alive(&self) -> bool {
        self.hp > 0
    }

    pub fn as_agent(&self) -> Option<(usize, Orientation, UnitClass, &Inventory, f32)> {
        match &self.payload {
            ThingPayload::Agent {
                agent_id,
                orientation,
                unit_class,
                inventory,
                reward,
                ..
            } => Some((*agent_id, *orientation, *unit_class, inventory, *reward)),
            _ => None,
        }
    }
}
