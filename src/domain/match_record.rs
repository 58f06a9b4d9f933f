//! spec §3 "Match"

use super::draft::DraftAction;
use crate::types::{Millis, SummonerName};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    MatchFound,
    Draft,
    InProgress,
    Completed,
    Cancelled,
}

/// A single completed or in-flight custom match (spec §3, §4.6-§4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
    pub match_id: u64,
    pub status: MatchStatus,
    pub team1_players: Vec<SummonerName>,
    pub team2_players: Vec<SummonerName>,
    pub average_mmr_team1: f64,
    pub average_mmr_team2: f64,
    /// Frozen snapshot of the completed draft, stored once the draft ends
    /// (spec §4.6 step "persist pickBanData").
    pub pick_ban_data: Option<Vec<DraftAction>>,
    pub winner_team: Option<u8>,
    pub actual_duration_ms: Option<Millis>,
    pub lp_changes: Option<Vec<(SummonerName, i64)>>,
    pub created_at: Millis,
    pub started_at: Option<Millis>,
    pub completed_at: Option<Millis>,
}

impl Match {
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, MatchStatus::Completed | MatchStatus::Cancelled)
    }

    pub fn team_of(&self, summoner_name: &str) -> Option<u8> {
        if self
            .team1_players
            .iter()
            .any(|p| p.eq_ignore_ascii_case(summoner_name))
        {
            Some(1)
        } else if self
            .team2_players
            .iter()
            .any(|p| p.eq_ignore_ascii_case(summoner_name))
        {
            Some(2)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample() -> Match {
        Match {
            match_id: 1,
            status: MatchStatus::Draft,
            team1_players: vec!["Alice".to_string()],
            team2_players: vec!["bob".to_string()],
            average_mmr_team1: 1000.0,
            average_mmr_team2: 1000.0,
            pick_ban_data: None,
            winner_team: None,
            actual_duration_ms: None,
            lp_changes: None,
            created_at: 0,
            started_at: None,
            completed_at: None,
        }
    }

    #[test]
    fn team_lookup_is_case_insensitive() {
        let m = sample();
        assert_eq!(m.team_of("alice"), Some(1));
        assert_eq!(m.team_of("BOB"), Some(2));
        assert_eq!(m.team_of("carol"), None);
    }

    #[test]
    fn terminal_statuses() {
        let mut m = sample();
        assert!(!m.is_terminal());
        m.status = MatchStatus::Completed;
        assert!(m.is_terminal());
        m.status = MatchStatus::Cancelled;
        assert!(m.is_terminal());
    }
}
