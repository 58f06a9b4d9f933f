//! Player identity and lane preferences (spec §3 "Player").

use crate::types::{CustomSessionId, SummonerName};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lane {
    Top,
    Jungle,
    Mid,
    Bot,
    Support,
    Fill,
}

impl Lane {
    /// The five real lanes, in slot order (spec §4.4 step 4).
    pub const SLOT_ORDER: [Lane; 5] = [
        Lane::Top,
        Lane::Jungle,
        Lane::Mid,
        Lane::Bot,
        Lane::Support,
    ];
}

/// Baseline MMR every player starts from before LP adjustments (Glossary,
/// spec §9 Open Questions).
pub const BASE_MMR: i64 = 1000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    /// Identity; compared case-insensitively everywhere.
    pub summoner_name: SummonerName,
    pub game_name: String,
    pub tag_line: String,
    pub region: String,
    pub custom_lp: i64,
    pub primary_lane: Lane,
    pub secondary_lane: Lane,
}

impl Player {
    pub fn custom_mmr(&self) -> i64 {
        BASE_MMR + self.custom_lp
    }

    /// `customSessionId = player_<gameName>_<tagLine>`, non-alphanumerics
    /// folded to `_`, lowercased. Stable across reconnects (Glossary).
    pub fn custom_session_id(&self) -> CustomSessionId {
        let raw = format!("player_{}_{}", self.game_name, self.tag_line);
        fold_session_id(&raw)
    }

    /// Bot players are recognised purely by a name prefix; the source
    /// system has no stronger registry, and this spec preserves that
    /// (spec §9 Open Questions).
    pub fn is_bot(&self) -> bool {
        self.summoner_name.starts_with("Bot")
    }
}

fn fold_session_id(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect::<String>()
        .to_lowercase()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn session_id_folds_and_lowercases() {
        let player = Player {
            summoner_name: "FZD Ratoso".to_string(),
            game_name: "FZD Ratoso".to_string(),
            tag_line: "fzd".to_string(),
            region: "euw".to_string(),
            custom_lp: 0,
            primary_lane: Lane::Top,
            secondary_lane: Lane::Jungle,
        };
        assert_eq!(player.custom_session_id(), "player_fzd_ratoso_fzd");
    }

    #[test]
    fn bot_detection_is_prefix_based() {
        let mut player = Player {
            summoner_name: "BotOne".to_string(),
            game_name: "BotOne".to_string(),
            tag_line: "bot".to_string(),
            region: "euw".to_string(),
            custom_lp: 0,
            primary_lane: Lane::Mid,
            secondary_lane: Lane::Bot,
        };
        assert!(player.is_bot());
        player.summoner_name = "NotABot".to_string();
        assert!(!player.is_bot());
    }

    #[test]
    fn custom_mmr_adds_baseline() {
        let player = Player {
            summoner_name: "A".to_string(),
            game_name: "A".to_string(),
            tag_line: "aa".to_string(),
            region: "euw".to_string(),
            custom_lp: 50,
            primary_lane: Lane::Top,
            secondary_lane: Lane::Jungle,
        };
        assert_eq!(player.custom_mmr(), 1050);
    }
}
