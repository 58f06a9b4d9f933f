//! PlayerState registry (spec §4.2, component C2): single-writer tracking
//! of each player's phase, stored under `state:player:<name>` with a TTL
//! refreshed on every write so a stale key implicitly decays to
//! `Available`.

use crate::error::{CoreError, CoreResult};
use crate::kv::KvStore;
use crate::types::SummonerName;
use std::sync::Arc;
use std::time::Duration;

/// Spec leaves the exact TTL for player-state keys unspecified (unlike the
/// player lock's explicit 4h); six hours comfortably outlives the longest
/// legitimate phase (a 1h game plus draft/acceptance) while still
/// guaranteeing eventual self-healing if a replica never clears it.
const STATE_TTL: Duration = Duration::from_secs(6 * 3600);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayerState {
    Available,
    InQueue,
    InMatchFound,
    InDraft,
    InGame,
}

impl PlayerState {
    fn as_str(self) -> &'static str {
        match self {
            PlayerState::Available => "AVAILABLE",
            PlayerState::InQueue => "IN_QUEUE",
            PlayerState::InMatchFound => "IN_MATCH_FOUND",
            PlayerState::InDraft => "IN_DRAFT",
            PlayerState::InGame => "IN_GAME",
        }
    }

    fn from_str(s: &str) -> PlayerState {
        match s {
            "IN_QUEUE" => PlayerState::InQueue,
            "IN_MATCH_FOUND" => PlayerState::InMatchFound,
            "IN_DRAFT" => PlayerState::InDraft,
            "IN_GAME" => PlayerState::InGame,
            // Unrecognised or missing keys decay to AVAILABLE (spec §4.2).
            _ => PlayerState::Available,
        }
    }

    /// The transition graph from spec §4.2.
    fn allows(self, next: PlayerState) -> bool {
        use PlayerState::*;
        matches!(
            (self, next),
            (Available, InQueue)
                | (InQueue, Available)
                | (InQueue, InMatchFound)
                | (InMatchFound, Available)
                | (InMatchFound, InDraft)
                | (InDraft, Available)
                | (InDraft, InGame)
                | (InGame, Available)
        )
    }
}

impl std::fmt::Display for PlayerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

fn key(name: &str) -> String {
    format!("state:player:{}", name.to_lowercase())
}

pub struct PlayerStateRegistry {
    kv: Arc<dyn KvStore>,
}

impl PlayerStateRegistry {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        PlayerStateRegistry { kv }
    }

    pub async fn get(&self, name: &SummonerName) -> PlayerState {
        match self.kv.get(&key(name)).await {
            Some(raw) => PlayerState::from_str(&raw),
            None => PlayerState::Available,
        }
    }

    /// Validated transition; refreshes the TTL on success.
    pub async fn set(&self, name: &SummonerName, new_state: PlayerState) -> CoreResult<()> {
        let current = self.get(name).await;
        if !current.allows(new_state) {
            return Err(CoreError::IllegalTransition {
                summoner_name: name.clone(),
                from: current.to_string(),
                to: new_state.to_string(),
            });
        }
        self.kv
            .set(&key(name), new_state.as_str(), Some(STATE_TTL))
            .await;
        Ok(())
    }

    /// Bypasses the transition graph. Reserved for the janitor (spec §4.2
    /// "unless `forceSet` is used (janitor only)").
    pub async fn force_set(&self, name: &SummonerName, new_state: PlayerState) {
        self.kv
            .set(&key(name), new_state.as_str(), Some(STATE_TTL))
            .await;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::kv::memory::MemoryKv;

    fn registry() -> PlayerStateRegistry {
        PlayerStateRegistry::new(Arc::new(MemoryKv::new()))
    }

    #[tokio::test]
    async fn defaults_to_available() {
        let reg = registry();
        assert_eq!(reg.get(&"Unknown".to_string()).await, PlayerState::Available);
    }

    #[tokio::test]
    async fn valid_chain_succeeds() {
        let reg = registry();
        let name = "Player1".to_string();
        reg.set(&name, PlayerState::InQueue).await.unwrap();
        reg.set(&name, PlayerState::InMatchFound).await.unwrap();
        reg.set(&name, PlayerState::InDraft).await.unwrap();
        reg.set(&name, PlayerState::InGame).await.unwrap();
        reg.set(&name, PlayerState::Available).await.unwrap();
    }

    #[tokio::test]
    async fn illegal_transition_is_rejected() {
        let reg = registry();
        let name = "Player1".to_string();
        let err = reg.set(&name, PlayerState::InDraft).await.unwrap_err();
        assert!(matches!(err, CoreError::IllegalTransition { .. }));
    }

    #[tokio::test]
    async fn force_set_bypasses_graph() {
        let reg = registry();
        let name = "Player1".to_string();
        reg.force_set(&name, PlayerState::InGame).await;
        assert_eq!(reg.get(&name).await, PlayerState::InGame);
    }
}
