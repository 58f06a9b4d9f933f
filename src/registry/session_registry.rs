//! Per-replica session registry (spec §5 "Shared resources": "a
//! per-replica in-memory map from `playerName → set<session>`; mutations
//! only occur on connect/disconnect; reads are lock-free snapshots.").
//!
//! Grounded on the teacher's `Sessions` (`services/sessions.rs`), which
//! keeps an in-memory map behind a `Mutex` and hands out cheap lookups;
//! here the map is keyed by player name rather than session token since
//! the event bus (C8) needs to go from roster name to connected sessions
//! for directed delivery.

use crate::types::{SessionId, SummonerName};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

#[derive(Default)]
pub struct SessionRegistry {
    by_player: RwLock<HashMap<SummonerName, HashSet<SessionId>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        SessionRegistry::default()
    }

    pub fn connect(&self, player: &SummonerName, session: SessionId) {
        self.by_player
            .write()
            .entry(player.clone())
            .or_default()
            .insert(session);
    }

    pub fn disconnect(&self, player: &SummonerName, session: &SessionId) {
        let mut map = self.by_player.write();
        if let Some(sessions) = map.get_mut(player) {
            sessions.remove(session);
            if sessions.is_empty() {
                map.remove(player);
            }
        }
    }

    /// Lock-free-from-the-caller's-perspective snapshot of a player's
    /// currently connected sessions on this replica.
    pub fn sessions_for(&self, player: &SummonerName) -> Vec<SessionId> {
        self.by_player
            .read()
            .get(player)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_connected(&self, player: &SummonerName) -> bool {
        self.by_player
            .read()
            .get(player)
            .map(|set| !set.is_empty())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn connect_and_disconnect_round_trip() {
        let registry = SessionRegistry::new();
        let player = "Alice".to_string();
        registry.connect(&player, "s1".to_string());
        registry.connect(&player, "s2".to_string());
        assert_eq!(registry.sessions_for(&player).len(), 2);
        registry.disconnect(&player, &"s1".to_string());
        assert_eq!(registry.sessions_for(&player).len(), 1);
        registry.disconnect(&player, &"s2".to_string());
        assert!(!registry.is_connected(&player));
    }
}
