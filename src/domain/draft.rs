//! spec §3 "DraftState" / "DraftAction" and the fixed 20-action sequence
//! (spec §4.6): bans 1,2,1,2,1,2,1,2,1,2 then picks in snake order
//! 1,2,2,1,1,2,2,1,1,2.

use crate::types::{Millis, SummonerName};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Ban,
    Pick,
}

/// Team assignment for each of the 20 actions in the canonical sequence.
const ACTION_TEAMS: [u8; 20] = [
    1, 2, 1, 2, 1, 2, 1, 2, 1, 2, // bans
    1, 2, 2, 1, 1, 2, 2, 1, 1, 2, // picks, snake order
];

const ACTION_KINDS: [ActionKind; 20] = [
    ActionKind::Ban,
    ActionKind::Ban,
    ActionKind::Ban,
    ActionKind::Ban,
    ActionKind::Ban,
    ActionKind::Ban,
    ActionKind::Ban,
    ActionKind::Ban,
    ActionKind::Ban,
    ActionKind::Ban,
    ActionKind::Pick,
    ActionKind::Pick,
    ActionKind::Pick,
    ActionKind::Pick,
    ActionKind::Pick,
    ActionKind::Pick,
    ActionKind::Pick,
    ActionKind::Pick,
    ActionKind::Pick,
    ActionKind::Pick,
];

pub const DRAFT_ACTION_COUNT: usize = 20;

/// A single resolved (or pending) slot in the draft sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftAction {
    pub index: usize,
    pub kind: ActionKind,
    pub team: u8,
    /// `None` until the action has been taken (or skipped).
    pub champion_id: Option<String>,
    pub by_player: Option<SummonerName>,
    /// Set for a pick that timed out and was auto-resolved (spec §4.6 edge
    /// case "skipped pick"); exempt from the uniqueness invariant.
    pub skipped: bool,
}

impl DraftAction {
    fn empty(index: usize) -> Self {
        DraftAction {
            index,
            kind: ACTION_KINDS[index],
            team: ACTION_TEAMS[index],
            champion_id: None,
            by_player: None,
            skipped: false,
        }
    }
}

/// Full draft state for one match (spec §3, §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftState {
    pub match_id: u64,
    pub actions: Vec<DraftAction>,
    pub current_index: usize,
    pub confirmations: Vec<SummonerName>,
    pub team1_players: Vec<SummonerName>,
    pub team2_players: Vec<SummonerName>,
    pub last_action_start_ms: Millis,
    /// `None` until the draft completes; set (and reset on every
    /// `confirm` call) to `now + confirmation_timeout_seconds` once the
    /// final-confirmation phase begins (spec §4.6 "30 s countdown reset
    /// on each action").
    #[serde(default)]
    pub confirmation_deadline_ms: Option<Millis>,
}

impl DraftState {
    pub fn new(
        match_id: u64,
        team1_players: Vec<SummonerName>,
        team2_players: Vec<SummonerName>,
        now_ms: Millis,
    ) -> Self {
        DraftState {
            match_id,
            actions: (0..DRAFT_ACTION_COUNT).map(DraftAction::empty).collect(),
            current_index: 0,
            confirmations: Vec::new(),
            team1_players,
            team2_players,
            last_action_start_ms: now_ms,
            confirmation_deadline_ms: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.current_index >= DRAFT_ACTION_COUNT
    }

    pub fn current_action(&self) -> Option<&DraftAction> {
        self.actions.get(self.current_index)
    }

    pub fn expected_team(&self) -> Option<u8> {
        self.current_action().map(|a| a.team)
    }

    /// Champions already taken (picked) in this draft, compared
    /// case-insensitively; skipped slots never contribute (spec §4.6
    /// uniqueness invariant).
    pub fn used_champions(&self) -> Vec<String> {
        self.actions
            .iter()
            .filter(|a| !a.skipped)
            .filter_map(|a| a.champion_id.as_ref())
            .map(|c| c.to_lowercase())
            .collect()
    }

    pub fn is_champion_used(&self, champion_id: &str) -> bool {
        self.used_champions()
            .iter()
            .any(|c| c == &champion_id.to_lowercase())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn teams() -> (Vec<SummonerName>, Vec<SummonerName>) {
        (
            vec!["a1".into(), "a2".into(), "a3".into(), "a4".into(), "a5".into()],
            vec!["b1".into(), "b2".into(), "b3".into(), "b4".into(), "b5".into()],
        )
    }

    #[test]
    fn sequence_matches_spec_ordering() {
        let (t1, t2) = teams();
        let state = DraftState::new(1, t1, t2, 0);
        let kinds: Vec<ActionKind> = state.actions.iter().map(|a| a.kind).collect();
        assert_eq!(&kinds[0..10], &[ActionKind::Ban; 10]);
        assert_eq!(&kinds[10..20], &[ActionKind::Pick; 10]);
        let teams: Vec<u8> = state.actions.iter().map(|a| a.team).collect();
        assert_eq!(teams, vec![1, 2, 1, 2, 1, 2, 1, 2, 1, 2, 1, 2, 2, 1, 1, 2, 2, 1, 1, 2]);
    }

    #[test]
    fn uniqueness_ignores_skipped_and_case() {
        let (t1, t2) = teams();
        let mut state = DraftState::new(1, t1, t2, 0);
        state.actions[0].champion_id = Some("Ahri".to_string());
        state.actions[1].champion_id = Some("ahri".to_string());
        state.actions[1].skipped = true;
        assert!(state.is_champion_used("AHRI"));
        assert_eq!(state.used_champions(), vec!["ahri".to_string()]);
    }

    #[test]
    fn completion_after_twenty_actions() {
        let (t1, t2) = teams();
        let mut state = DraftState::new(1, t1, t2, 0);
        assert!(!state.is_complete());
        state.current_index = DRAFT_ACTION_COUNT;
        assert!(state.is_complete());
        assert!(state.current_action().is_none());
    }
}
