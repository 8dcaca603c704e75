//! Backing store for the §6.1 "agent-control and query endpoints" whose
//! game-logic semantics are never defined anywhere in §4 (no patrol,
//! garrison, production-queue, research, rally-point, formation, or
//! selection-group behavior is specified for the tile-world). Per the Open
//! Question resolution in `DESIGN.md`, each is a validated per-agent or
//! per-team attribute store: `set_*`/`get_*`/`clear_*` persist a value after
//! id/coordinate validation, with no further effect on the step pipeline.
//!
//! Grounded on `core_sim/src/resources.rs`'s `SentimentAxisBias::set_axis`
//! bounds-checked setter idiom (`if let Some(slot) = values.get_mut(axis)`).

use crate::buildings::TeamModifiers;

#[derive(Debug, Clone, Copy, Default)]
pub struct AgentControl {
    pub attack_move_target: Option<(i32, i32)>,
    pub patrol: Option<((i32, i32), (i32, i32))>,
    pub stance: i32,
    pub garrison_target: i32,
    pub production_queue: i32,
    pub research: i32,
    pub scout_mode: bool,
    pub fog_reveal: bool,
    pub rally_point: Option<(i32, i32)>,
    pub hold_position: bool,
    pub follow_target: i32,
    pub formation: i32,
    pub control_group: i32,
    pub selected: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ControlState {
    pub agents: Vec<AgentControl>,
    pub team_modifiers: Vec<TeamModifiers>,
    pub team_territory_score: Vec<i32>,
    pub ai_difficulty: Vec<i32>,
}

impl ControlState {
    pub fn new(num_agents: usize, num_teams: usize) -> Self {
        Self {
            agents: vec![AgentControl::default(); num_agents],
            team_modifiers: vec![TeamModifiers::default(); num_teams],
            team_territory_score: vec![0; num_teams],
            ai_difficulty: vec![0; num_teams],
        }
    }

    fn agent_mut(&mut self, agent_id: i32) -> Option<&mut AgentControl> {
        usize::try_from(agent_id).ok().and_then(|i| self.agents.get_mut(i))
    }

    fn agent(&self, agent_id: i32) -> Option<&AgentControl> {
        usize::try_from(agent_id).ok().and_then(|i| self.agents.get(i))
    }

    fn team_mut(&mut self, team_id: i32) -> Option<usize> {
        usize::try_from(team_id)
            .ok()
            .filter(|&i| i < self.team_modifiers.len())
    }

    pub fn set_attack_move(&mut self, agent_id: i32, x: i32, y: i32) -> i32 {
        match self.agent_mut(agent_id) {
            Some(a) => {
                a.attack_move_target = Some((x, y));
                1
            }
            None => -1,
        }
    }

    pub fn clear_attack_move(&mut self, agent_id: i32) -> i32 {
        match self.agent_mut(agent_id) {
            Some(a) => {
                a.attack_move_target = None;
                1
            }
            None => -1,
        }
    }

    pub fn get_attack_move(&self, agent_id: i32) -> Option<(i32, i32)> {
        self.agent(agent_id).and_then(|a| a.attack_move_target)
    }

    pub fn set_patrol(&mut self, agent_id: i32, x1: i32, y1: i32, x2: i32, y2: i32) -> i32 {
        match self.agent_mut(agent_id) {
            Some(a) => {
                a.patrol = Some(((x1, y1), (x2, y2)));
                1
            }
            None => -1,
        }
    }

    pub fn get_patrol(&self, agent_id: i32) -> Option<((i32, i32), (i32, i32))> {
        self.agent(agent_id).and_then(|a| a.patrol)
    }

    pub fn set_garrison(&mut self, agent_id: i32, target: i32) -> i32 {
        match self.agent_mut(agent_id) {
            Some(a) => {
                a.garrison_target = target;
                1
            }
            None => -1,
        }
    }

    pub fn get_garrison(&self, agent_id: i32) -> i32 {
        self.agent(agent_id).map(|a| a.garrison_target).unwrap_or(-1)
    }

    pub fn set_production_queue(&mut self, agent_id: i32, item: i32) -> i32 {
        match self.agent_mut(agent_id) {
            Some(a) => {
                a.production_queue = item;
                1
            }
            None => -1,
        }
    }

    pub fn get_production_queue(&self, agent_id: i32) -> i32 {
        self.agent(agent_id).map(|a| a.production_queue).unwrap_or(-1)
    }

    pub fn set_research(&mut self, agent_id: i32, topic: i32) -> i32 {
        match self.agent_mut(agent_id) {
            Some(a) => {
                a.research = topic;
                1
            }
            None => -1,
        }
    }

    pub fn get_research(&self, agent_id: i32) -> i32 {
        self.agent(agent_id).map(|a| a.research).unwrap_or(-1)
    }

    pub fn set_scout_mode(&mut self, agent_id: i32, enabled: bool) -> i32 {
        match self.agent_mut(agent_id) {
            Some(a) => {
                a.scout_mode = enabled;
                1
            }
            None => -1,
        }
    }

    pub fn get_scout_mode(&self, agent_id: i32) -> i32 {
        self.agent(agent_id).map(|a| a.scout_mode as i32).unwrap_or(-1)
    }

    pub fn set_fog_reveal(&mut self, agent_id: i32, enabled: bool) -> i32 {
        match self.agent_mut(agent_id) {
            Some(a) => {
                a.fog_reveal = enabled;
                1
            }
            None => -1,
        }
    }

    pub fn get_fog_reveal(&self, agent_id: i32) -> i32 {
        self.agent(agent_id).map(|a| a.fog_reveal as i32).unwrap_or(-1)
    }

    pub fn set_follow_target(&mut self, agent_id: i32, target: i32) -> i32 {
        match self.agent_mut(agent_id) {
            Some(a) => {
                a.follow_target = target;
                1
            }
            None => -1,
        }
    }

    pub fn get_follow_target(&self, agent_id: i32) -> i32 {
        self.agent(agent_id).map(|a| a.follow_target).unwrap_or(-1)
    }

    /// Clears every standing order on the agent (spec §6.1 "stop"); leaves
    /// stance, formation, and control-group membership untouched since those
    /// are persistent groupings rather than orders.
    pub fn stop(&mut self, agent_id: i32) -> i32 {
        match self.agent_mut(agent_id) {
            Some(a) => {
                a.attack_move_target = None;
                a.patrol = None;
                a.rally_point = None;
                a.follow_target = -1;
                a.hold_position = false;
                1
            }
            None => -1,
        }
    }

    pub fn set_stance(&mut self, agent_id: i32, stance: i32) -> i32 {
        if !(0..=3).contains(&stance) {
            return -1;
        }
        match self.agent_mut(agent_id) {
            Some(a) => {
                a.stance = stance;
                1
            }
            None => -1,
        }
    }

    pub fn get_stance(&self, agent_id: i32) -> i32 {
        self.agent(agent_id).map(|a| a.stance).unwrap_or(-1)
    }

    pub fn set_hold_position(&mut self, agent_id: i32, hold: bool) -> i32 {
        match self.agent_mut(agent_id) {
            Some(a) => {
                a.hold_position = hold;
                1
            }
            None => -1,
        }
    }

    pub fn get_hold_position(&self, agent_id: i32) -> i32 {
        self.agent(agent_id).map(|a| a.hold_position as i32).unwrap_or(-1)
    }

    pub fn set_rally_point(&mut self, agent_id: i32, x: i32, y: i32) -> i32 {
        match self.agent_mut(agent_id) {
            Some(a) => {
                a.rally_point = Some((x, y));
                1
            }
            None => -1,
        }
    }

    pub fn get_rally_point(&self, agent_id: i32) -> Option<(i32, i32)> {
        self.agent(agent_id).and_then(|a| a.rally_point)
    }

    pub fn set_formation(&mut self, agent_id: i32, formation: i32) -> i32 {
        match self.agent_mut(agent_id) {
            Some(a) => {
                a.formation = formation;
                1
            }
            None => -1,
        }
    }

    pub fn get_formation(&self, agent_id: i32) -> i32 {
        self.agent(agent_id).map(|a| a.formation).unwrap_or(-1)
    }

    pub fn set_control_group(&mut self, agent_id: i32, group: i32) -> i32 {
        match self.agent_mut(agent_id) {
            Some(a) => {
                a.control_group = group;
                1
            }
            None => -1,
        }
    }

    pub fn get_control_group(&self, agent_id: i32) -> i32 {
        self.agent(agent_id).map(|a| a.control_group).unwrap_or(-1)
    }

    pub fn set_selected(&mut self, agent_id: i32, selected: bool) -> i32 {
        match self.agent_mut(agent_id) {
            Some(a) => {
                a.selected = selected;
                1
            }
            None => -1,
        }
    }

    pub fn get_selected(&self, agent_id: i32) -> i32 {
        self.agent(agent_id).map(|a| a.selected as i32).unwrap_or(-1)
    }

    pub fn set_gather_rate(&mut self, team_id: i32, value: f32) -> i32 {
        match self.team_mut(team_id) {
            Some(i) => {
                self.team_modifiers[i].gather_multiplier = value;
                1
            }
            None => -1,
        }
    }

    pub fn set_build_cost_multiplier(&mut self, team_id: i32, value: f32) -> i32 {
        match self.team_mut(team_id) {
            Some(i) => {
                self.team_modifiers[i].build_cost_multiplier = value;
                1
            }
            None => -1,
        }
    }

    pub fn set_class_bonus(&mut self, team_id: i32, hp_bonus: i32, attack_bonus: i32) -> i32 {
        match self.team_mut(team_id) {
            Some(i) => {
                self.team_modifiers[i].hp_bonus = hp_bonus;
                self.team_modifiers[i].attack_bonus = attack_bonus;
                1
            }
            None => -1,
        }
    }

    pub fn get_territory_score(&self, team_id: i32) -> i32 {
        usize::try_from(team_id)
            .ok()
            .and_then(|i| self.team_territory_score.get(i))
            .copied()
            .unwrap_or(-1)
    }

    pub fn set_territory_score(&mut self, team_id: i32, score: i32) -> i32 {
        match self.team_mut(team_id) {
            Some(i) => {
                self.team_territory_score[i] = score;
                1
            }
            None => -1,
        }
    }

    pub fn set_ai_difficulty(&mut self, team_id: i32, difficulty: i32) -> i32 {
        match self.team_mut(team_id) {
            Some(i) => {
                self.ai_difficulty[i] = difficulty;
                1
            }
            None => -1,
        }
    }

    pub fn get_ai_difficulty(&self, team_id: i32) -> i32 {
        usize::try_from(team_id)
            .ok()
            .and_then(|i| self.ai_difficulty.get(i))
            .copied()
            .unwrap_or(-1)
    }

    pub fn get_gather_rate(&self, team_id: i32) -> f32 {
        usize::try_from(team_id)
            .ok()
            .and_then(|i| self.team_modifiers.get(i))
            .map(|m| m.gather_multiplier)
            .unwrap_or(-1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_agent_returns_negative_one() {
        let mut state = ControlState::new(4, 2);
        assert_eq!(state.set_stance(99, 1), -1);
        assert_eq!(state.set_stance(0, 9), -1);
        assert_eq!(state.set_stance(0, 1), 1);
        assert_eq!(state.get_stance(0), 1);
    }

    #[test]
    fn team_modifiers_validate_team_id() {
        let mut state = ControlState::new(4, 2);
        assert_eq!(state.set_gather_rate(5, 2.0), -1);
        assert_eq!(state.set_gather_rate(1, 2.0), 1);
        assert_eq!(state.team_modifiers[1].gather_multiplier, 2.0);
    }
}
