//! Chat-bot integration (spec §1 "Deliberately out of scope ... chat-bot
//! integrations", §4.5 "Bot auto-accept"). The core only needs to know
//! whether a roster slot is a bot and to notify the bridge of lifecycle
//! events worth announcing in chat; the bridge's own wiring is external.

use crate::types::{MatchId, SummonerName};
use async_trait::async_trait;

#[async_trait]
pub trait ChatBridge: Send + Sync {
    async fn announce_match_found(&self, match_id: MatchId, roster: &[SummonerName]);
    async fn announce_match_cancelled(&self, match_id: MatchId, reason: &str);
    async fn announce_game_finished(&self, match_id: MatchId, winner_team: u8);
}

/// No-op implementation used when no chat integration is configured.
pub struct NullChatBridge;

#[async_trait]
impl ChatBridge for NullChatBridge {
    async fn announce_match_found(&self, _match_id: MatchId, _roster: &[SummonerName]) {}
    async fn announce_match_cancelled(&self, _match_id: MatchId, _reason: &str) {}
    async fn announce_game_finished(&self, _match_id: MatchId, _winner_team: u8) {}
}
