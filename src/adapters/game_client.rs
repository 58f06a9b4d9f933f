//! Third-party game-client RPC (spec §1 "Deliberately out of scope ...
//! third-party game-client polling", §4.7 "Game monitor"). The monitor
//! asks this bridge to launch a lobby and to poll for a live result; the
//! bridge's actual polling/transport is external per the spec.

use crate::domain::match_record::Match;
use crate::error::CoreError;
use crate::types::MatchId;
use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct GameResult {
    pub winner_team: u8,
    pub reason: String,
}

#[async_trait]
pub trait GameClientBridge: Send + Sync {
    async fn launch_lobby(&self, match_record: &Match) -> Result<(), CoreError>;

    /// Polls the game client for a terminal result. `None` means the
    /// game is still in progress from the client's perspective.
    async fn poll_result(&self, match_id: MatchId) -> Result<Option<GameResult>, CoreError>;
}

/// Stand-in used when no external game client is wired up: lobbies are
/// assumed launched out of band and results only ever arrive via the
/// `voteWinner` RPC surface (spec §6).
pub struct NullGameClientBridge;

#[async_trait]
impl GameClientBridge for NullGameClientBridge {
    async fn launch_lobby(&self, _match_record: &Match) -> Result<(), CoreError> {
        Ok(())
    }

    async fn poll_result(&self, _match_id: MatchId) -> Result<Option<GameResult>, CoreError> {
        Ok(None)
    }
}
