use std::fmt;

/// Stable handle into `EntityRegistry::things`. Never reused while the
/// entity it names is alive; on removal the slot is recycled but the
/// generation-free design relies on callers dropping `Id`s of removed
/// entities promptly (the registry never hands out an `Id` pointing at a
/// freed slot without the caller having first observed the removal).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id(pub usize);

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Team identity. `-1` denotes neutral/wild (wildlife, unclaimed resources).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TeamId(pub i8);

impl TeamId {
    pub const NEUTRAL: TeamId = TeamId(-1);

    pub fn is_neutral(self) -> bool {
        self.0 < 0
    }
}

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_neutral() {
            write!(f, "neutral")
        } else {
            write!(f, "team{}", self.0)
        }
    }
}

/// Kind tag for every entity in the world, blocking and non-blocking alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ThingKind {
    Agent = 0,
    Wall,
    Door,
    Tree,
    Wheat,
    Stone,
    Gold,
    Bush,
    Cactus,
    Stalagmite,
    Magma,
    Altar,
    Spawner,
    Tumor,
    Cow,
    Bear,
    Wolf,
    Corpse,
    Skeleton,
    Stump,
    Lantern,
    Stubble,
    WeavingLoom,
    ClayOven,
    Blacksmith,
    Market,
    Dropoff,
    Storage,
    TrainingGround,
    ResearchHouse,
    TownCenter,
    Armory,
    Mill,
    LumberCamp,
    MiningCamp,
}

impl ThingKind {
    pub const COUNT: usize = Self::MiningCamp as usize + 1;

    /// Non-blocking kinds live on `overlay_grid`; everything else is
    /// blocking and lives on `grid`.
    pub fn is_overlay(self) -> bool {
        matches!(self, ThingKind::Door | ThingKind::Lantern | ThingKind::Stubble)
    }
}

/// 8-way compass orientation with a const unit-delta table, matching the
/// terrain enum-with-const-array idiom: direction math never branches on
/// the hot path, it indexes `Orientation::DELTAS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Orientation {
    North = 0,
    South = 1,
    West = 2,
    East = 3,
    NorthWest = 4,
    NorthEast = 5,
    SouthWest = 6,
    SouthEast = 7,
}

impl Orientation {
    pub const DELTAS: [(i32, i32); 8] = [
        (0, -1),  // North
        (0, 1),   // South
        (-1, 0),  // West
        (1, 0),   // East
        (-1, -1), // NorthWest
        (1, -1),  // NorthEast
        (-1, 1),  // SouthWest
        (1, 1),   // SouthEast
    ];

    pub const CARDINALS: [Orientation; 4] = [
        Orientation::North,
        Orientation::South,
        Orientation::West,
        Orientation::East,
    ];

    pub fn from_index(idx: u8) -> Option<Orientation> {
        match idx {
            0 => Some(Orientation::North),
            1 => Some(Orientation::South),
            2 => Some(Orientation::West),
            3 => Some(Orientation::East),
            4 => Some(Orientation::NorthWest),
            5 => Some(Orientation::NorthEast),
            6 => Some(Orientation::SouthWest),
            7 => Some(Orientation::SouthEast),
            _ => None,
        }
    }

    pub fn delta(self) -> (i32, i32) {
        Self::DELTAS[self as usize]
    }

    pub fn index(self) -> u8 {
        self as u8
    }
}

/// A playable grid coordinate. Construction never validates bounds; use
/// `World::is_valid_pos` before trusting a derived position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pos {
    pub x: i32,
    pub y: i32,
}

impl Pos {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, d: (i32, i32)) -> Pos {
        Pos::new(self.x + d.0, self.y + d.1)
    }

    pub fn offset_dir(self, dir: Orientation) -> Pos {
        self.offset(dir.delta())
    }

    pub fn chebyshev(self, other: Pos) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }

    pub fn manhattan(self, other: Pos) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }
}
