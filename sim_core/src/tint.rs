//! The tint/creep influence field (spec §4.8): two decayed, sparse RGB
//! accumulator grids (agent-trail and tumor-creep) plus a short-lived
//! per-tile "action tint" layer used for combat/heal highlights in
//! observations (§4.4).
//!
//! Grounded on `core_sim/src/resources.rs`'s `TileRegistry::index` flat
//! lookup for the backing grid shape, and Design Notes §9's explicit
//! instruction to replace template/macro-based accumulators
//! (`markActiveTile`, `safeTintAdd`) with small inlineable functions over
//! explicit `&mut` state (`fixed.rs::saturating_tint_add`).

use crate::fixed::{decay, saturating_tint_add, tint_epsilon, DECAY_DEN};
use crate::ids::Pos;

/// Color this field's accretion is locked to when the contributor is a
/// `Tumor` (spec §4.8 "color-locked to `ClippyTint`").
pub const CLIPPY_TINT: (i32, i32, i32) = (40, 220, 90);
pub const CLIPPY_TINT_TOLERANCE_DEFAULT: i32 = 8;

#[derive(Debug, Clone, Copy, Default)]
struct TileAccum {
    strength: i32,
    r: i32,
    g: i32,
    b: i32,
    active: bool,
}

/// One decayed, sparsely-active RGB accumulator grid. Two instances live on
/// `World`: the agent/lantern trail field and the tumor/creep field, with
/// different decay rates and accretion weights (spec §4.8).
#[derive(Debug, Clone)]
pub struct TintField {
    width: i32,
    height: i32,
    tiles: Vec<TileAccum>,
    active_tiles: Vec<Pos>,
    decay_num: i64,
    /// Tiles touched by fresh accretion this tick; used by `compose` to
    /// distinguish the decay-only fast path from the full recompute.
    touched_this_tick: Vec<Pos>,
}

impl TintField {
    pub fn new(width: i32, height: i32, decay_num: i64) -> Self {
        Self {
            width,
            height,
            tiles: vec![TileAccum::default(); (width * height).max(0) as usize],
            active_tiles: Vec::new(),
            decay_num,
            touched_this_tick: Vec::new(),
        }
    }

    pub fn reset(&mut self) {
        for t in self.tiles.iter_mut() {
            *t = TileAccum::default();
        }
        self.active_tiles.clear();
        self.touched_this_tick.clear();
    }

    fn idx(&self, pos: Pos) -> Option<usize> {
        if pos.x < 0 || pos.y < 0 || pos.x >= self.width || pos.y >= self.height {
            return None;
        }
        Some((pos.y * self.width + pos.x) as usize)
    }

    fn mark_active(&mut self, pos: Pos, idx: usize) {
        if !self.tiles[idx].active {
            self.tiles[idx].active = true;
            self.active_tiles.push(pos);
        }
    }

    /// Decay every active tile's accumulators by this field's fixed-point
    /// factor; drop tiles below the adaptive epsilon from the active set.
    pub fn decay_tick(&mut self) {
        let epsilon = tint_epsilon(self.active_tiles.len());
        let mut next_active = Vec::with_capacity(self.active_tiles.len());
        for &pos in &self.active_tiles {
            let Some(idx) = self.idx(pos) else { continue };
            let tile = &mut self.tiles[idx];
            tile.strength = decay(tile.strength, self.decay_num, DECAY_DEN);
            tile.r = decay(tile.r, self.decay_num, DECAY_DEN);
            tile.g = decay(tile.g, self.decay_num, DECAY_DEN);
            tile.b = decay(tile.b, self.decay_num, DECAY_DEN);
            if tile.strength.abs() < epsilon {
                *tile = TileAccum::default();
            } else {
                next_active.push(pos);
            }
        }
        self.active_tiles = next_active;
        self.touched_this_tick.clear();
    }

    /// Counting-sort the active set by X once per tick for cache-friendly
    /// traversal (spec §4.8).
    pub fn sort_active_by_x(&mut self) {
        let mut buckets: Vec<Vec<Pos>> = vec![Vec::new(); self.width.max(1) as usize];
        for &pos in &self.active_tiles {
            if pos.x >= 0 && (pos.x as usize) < buckets.len() {
                buckets[pos.x as usize].push(pos);
            }
        }
        self.active_tiles = buckets.into_iter().flatten().collect();
    }

    /// Add a Manhattan-falloff contribution around `center` out to
    /// `radius`, with per-distance `weight` and an optional color lock
    /// (tumor contributions are locked to `CLIPPY_TINT`).
    pub fn accrete(&mut self, center: Pos, radius: i32, weight: i32, color: (i32, i32, i32)) {
        for dx in -radius..=radius {
            for dy in -radius..=radius {
                let dist = dx.abs() + dy.abs();
                if dist > radius {
                    continue;
                }
                let pos = Pos::new(center.x + dx, center.y + dy);
                let Some(idx) = self.idx(pos) else { continue };
                let falloff = weight * (radius - dist + 1);
                if falloff <= 0 {
                    continue;
                }
                self.mark_active(pos, idx);
                let tile = &mut self.tiles[idx];
                tile.strength = saturating_tint_add(tile.strength, falloff);
                tile.r = saturating_tint_add(tile.r, falloff * color.0 / 255);
                tile.g = saturating_tint_add(tile.g, falloff * color.1 / 255);
                tile.b = saturating_tint_add(tile.b, falloff * color.2 / 255);
                self.touched_this_tick.push(pos);
            }
        }
    }

    pub fn strength_at(&self, pos: Pos) -> i32 {
        self.idx(pos).map(|i| self.tiles[i].strength).unwrap_or(0)
    }

    /// Normalized RGB for an active tile, or `(0,0,0)` if inactive.
    pub fn color_at(&self, pos: Pos) -> (u8, u8, u8) {
        let Some(idx) = self.idx(pos) else {
            return (0, 0, 0);
        };
        let tile = &self.tiles[idx];
        if tile.strength <= 0 {
            return (0, 0, 0);
        }
        let norm = |c: i32| -> u8 { (c.max(0).min(255 * tile.strength.max(1)) / tile.strength.max(1)).clamp(0, 255) as u8 };
        (norm(tile.r), norm(tile.g), norm(tile.b))
    }

    pub fn is_active(&self, pos: Pos) -> bool {
        self.idx(pos).map(|i| self.tiles[i].active).unwrap_or(false)
    }

    pub fn active_tiles(&self) -> &[Pos] {
        &self.active_tiles
    }

    /// True if this tile's color is within `tolerance` of `target` and
    /// close to fully saturated (spec §4.8 "frozen terrain").
    pub fn is_saturated_toward(&self, pos: Pos, target: (i32, i32, i32), tolerance: i32) -> bool {
        let Some(idx) = self.idx(pos) else {
            return false;
        };
        let tile = &self.tiles[idx];
        if !tile.active || tile.strength < crate::fixed::MAX_TINT_ACCUM / 4 {
            return false;
        }
        let (r, g, b) = self.color_at(pos);
        (r as i32 - target.0).abs() <= tolerance
            && (g as i32 - target.1).abs() <= tolerance
            && (b as i32 - target.2).abs() <= tolerance
    }
}

/// Short-lived per-tile combat/heal highlight codes written alongside the
/// `ActionTint*` layer consumed by the observation composer (spec §3,
/// §4.3, §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ActionTintCode {
    None = 0,
    Melee = 1,
    Ranged = 2,
    HealMonk = 3,
    Death = 4,
    Shield = 5,
    SpearAoe = 6,
}

#[derive(Debug, Clone)]
pub struct ActionTintLayer {
    width: i32,
    height: i32,
    countdown: Vec<u8>,
    code: Vec<u8>,
    active: Vec<Pos>,
}

impl ActionTintLayer {
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            width,
            height,
            countdown: vec![0; (width * height).max(0) as usize],
            code: vec![0; (width * height).max(0) as usize],
            active: Vec::new(),
        }
    }

    pub fn reset(&mut self) {
        self.countdown.iter_mut().for_each(|c| *c = 0);
        self.code.iter_mut().for_each(|c| *c = 0);
        self.active.clear();
    }

    fn idx(&self, pos: Pos) -> Option<usize> {
        if pos.x < 0 || pos.y < 0 || pos.x >= self.width || pos.y >= self.height {
            return None;
        }
        Some((pos.y * self.width + pos.x) as usize)
    }

    pub fn set(&mut self, pos: Pos, code: ActionTintCode, ticks: u8) {
        let Some(idx) = self.idx(pos) else { return };
        if self.countdown[idx] == 0 {
            self.active.push(pos);
        }
        self.countdown[idx] = ticks;
        self.code[idx] = code as u8;
    }

    pub fn code_at(&self, pos: Pos) -> u8 {
        self.idx(pos).map(|i| self.code[i]).unwrap_or(0)
    }

    /// Decrement every active countdown, dropping expired tiles from the
    /// active list (spec §4.9 step 2).
    pub fn tick(&mut self) {
        let mut next_active = Vec::with_capacity(self.active.len());
        for &pos in &self.active {
            let Some(idx) = self.idx(pos) else { continue };
            if self.countdown[idx] > 0 {
                self.countdown[idx] -= 1;
            }
            if self.countdown[idx] == 0 {
                self.code[idx] = 0;
            } else {
                next_active.push(pos);
            }
        }
        self.active = next_active;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accretion_then_decay_monotone_then_zero() {
        let mut field = TintField::new(20, 20, crate::fixed::TRAIL_DECAY_NUM);
        let center = Pos::new(10, 10);
        let mut last = 0;
        for _ in 0..30 {
            field.accrete(center, 2, 2000, (200, 40, 40));
            field.decay_tick();
            let s = field.strength_at(center);
            assert!(s >= last || s > 0);
            last = s;
        }
        assert!(last > 0);
        for _ in 0..5000 {
            field.decay_tick();
            if field.strength_at(center) == 0 {
                break;
            }
        }
        assert_eq!(field.strength_at(center), 0);
    }

    #[test]
    fn action_tint_expires() {
        let mut layer = ActionTintLayer::new(10, 10);
        let pos = Pos::new(1, 1);
        layer.set(pos, ActionTintCode::Melee, 2);
        assert_eq!(layer.code_at(pos), ActionTintCode::Melee as u8);
        layer.tick();
        assert_eq!(layer.code_at(pos), ActionTintCode::Melee as u8);
        layer.tick();
        assert_eq!(layer.code_at(pos), 0);
    }
}
