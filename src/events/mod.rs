//! Event bus / broadcaster (spec §4.8, component C8). Every
//! state-changing operation publishes a typed event on a named channel
//! (spec §6); this module owns the mapping from [`Event`] to channel name
//! and JSON payload, and the directed-vs-broadcast delivery rule.
//!
//! Delivery itself (translating a received event into WebSocket sends) is
//! edge concern out of scope per spec §1; [`EventBus`] only publishes —
//! the fan-out side is a thin consumer of [`Subscriber`] plus
//! [`crate::registry::SessionRegistry`], sketched in
//! `EventBus::directed_targets`.

use crate::domain::draft::DraftAction;
use crate::kv::{Publisher, Subscriber};
use crate::registry::SessionRegistry;
use crate::types::{MatchId, Millis, SummonerName};
use serde::Serialize;
use std::sync::Arc;

/// Typed variant over the channel names in spec §6. Each serializes to
/// the JSON payload documented there.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Event {
    #[serde(rename = "queue:update")]
    QueueUpdate { players_in_queue: usize },
    #[serde(rename = "queue:player_joined")]
    QueuePlayerJoined { summoner_name: SummonerName },
    #[serde(rename = "queue:player_left")]
    QueuePlayerLeft { summoner_name: SummonerName },
    #[serde(rename = "match:found")]
    MatchFound {
        match_id: MatchId,
        team1: Vec<SummonerName>,
        team2: Vec<SummonerName>,
        avg_mmr1: f64,
        avg_mmr2: f64,
        timeout_seconds: u32,
    },
    #[serde(rename = "match:acceptance")]
    MatchAcceptance {
        match_id: MatchId,
        summoner_name: SummonerName,
        accepted: usize,
        total: usize,
    },
    #[serde(rename = "draft_starting")]
    DraftStarting {
        match_id: MatchId,
        team1: Vec<SummonerName>,
        team2: Vec<SummonerName>,
        actions: Vec<DraftAction>,
        current_index: usize,
        current_player: SummonerName,
        time_remaining: u32,
    },
    #[serde(rename = "draft_updated")]
    DraftUpdated {
        match_id: MatchId,
        current_index: usize,
        actions: Vec<DraftAction>,
        confirmations: Vec<SummonerName>,
        remaining_ms: Millis,
        action_timeout_ms: Millis,
        confirmation_only: bool,
    },
    #[serde(rename = "draft_completed")]
    DraftCompleted { match_id: MatchId },
    #[serde(rename = "draft_confirmed")]
    DraftConfirmed { match_id: MatchId },
    #[serde(rename = "match_game_ready")]
    MatchGameReady {
        match_id: MatchId,
        team1: Vec<SummonerName>,
        team2: Vec<SummonerName>,
    },
    #[serde(rename = "game_started")]
    GameStarted {
        match_id: MatchId,
        start_time: Millis,
        team1: Vec<SummonerName>,
        team2: Vec<SummonerName>,
    },
    #[serde(rename = "match_cancelled")]
    MatchCancelled {
        match_id: MatchId,
        reason: String,
        declined_player: Option<SummonerName>,
    },
    #[serde(rename = "game_finished")]
    GameFinished {
        match_id: MatchId,
        winner_team: u8,
    },
    #[serde(rename = "game:winner_vote")]
    GameWinnerVote {
        match_id: MatchId,
        summoner_name: SummonerName,
        voted_team: u8,
        votes_team1: usize,
        votes_team2: usize,
        total_needed: usize,
    },
    #[serde(rename = "spectator:mute")]
    SpectatorMute(SpectatorPayload),
    #[serde(rename = "spectator:unmute")]
    SpectatorUnmute(SpectatorPayload),
    #[serde(rename = "spectator:add")]
    SpectatorAdd(SpectatorPayload),
    #[serde(rename = "spectator:remove")]
    SpectatorRemove(SpectatorPayload),
}

/// Shared payload for the four `spectator:*` channels (spec §6):
/// `{ matchId, spectatorName, performedBy }`.
#[derive(Debug, Clone, Serialize)]
pub struct SpectatorPayload {
    pub match_id: MatchId,
    pub spectator_name: SummonerName,
    pub performed_by: SummonerName,
}

impl Event {
    /// The channel this event is published on (spec §6 table).
    pub fn channel(&self) -> &'static str {
        match self {
            Event::QueueUpdate { .. } => "queue:update",
            Event::QueuePlayerJoined { .. } => "queue:player_joined",
            Event::QueuePlayerLeft { .. } => "queue:player_left",
            Event::MatchFound { .. } => "match:found",
            Event::MatchAcceptance { .. } => "match:acceptance",
            Event::DraftStarting { .. } => "draft_starting",
            Event::DraftUpdated { .. } => "draft_updated",
            Event::DraftCompleted { .. } => "draft_completed",
            Event::DraftConfirmed { .. } => "draft_confirmed",
            Event::MatchGameReady { .. } => "match_game_ready",
            Event::GameStarted { .. } => "game_started",
            Event::MatchCancelled { .. } => "match_cancelled",
            Event::GameFinished { .. } => "game_finished",
            Event::GameWinnerVote { .. } => "game:winner_vote",
            Event::SpectatorMute(_) => "spectator:mute",
            Event::SpectatorUnmute(_) => "spectator:unmute",
            Event::SpectatorAdd(_) => "spectator:add",
            Event::SpectatorRemove(_) => "spectator:remove",
        }
    }

    /// Whether this event must only reach a match's currently connected
    /// roster sessions (spec §4.8), vs. queue-wide events that may
    /// broadcast to everyone.
    pub fn is_match_directed(&self) -> bool {
        matches!(
            self,
            Event::MatchFound { .. }
                | Event::MatchAcceptance { .. }
                | Event::DraftStarting { .. }
                | Event::DraftUpdated { .. }
                | Event::DraftCompleted { .. }
                | Event::DraftConfirmed { .. }
                | Event::MatchGameReady { .. }
                | Event::GameStarted { .. }
                | Event::MatchCancelled { .. }
                | Event::GameFinished { .. }
                | Event::GameWinnerVote { .. }
        )
    }

    fn roster(&self) -> Vec<SummonerName> {
        match self {
            Event::MatchFound { team1, team2, .. }
            | Event::DraftStarting { team1, team2, .. }
            | Event::MatchGameReady { team1, team2, .. }
            | Event::GameStarted { team1, team2, .. } => {
                team1.iter().chain(team2.iter()).cloned().collect()
            }
            _ => Vec::new(),
        }
    }
}

/// Publishes typed events onto the shared bus (spec §4.8). Every emitted
/// payload includes `type` (via `#[serde(tag = "type")]`) and a server
/// `timestamp`, matching spec §6's "all include `type` and a server
/// `timestamp`".
pub struct EventBus {
    publisher: Arc<dyn Publisher>,
}

#[derive(Serialize)]
struct Envelope<'a> {
    #[serde(flatten)]
    event: &'a Event,
    timestamp: Millis,
}

impl EventBus {
    pub fn new(publisher: Arc<dyn Publisher>) -> Self {
        EventBus { publisher }
    }

    pub async fn publish(&self, event: Event) {
        self.publish_at(event, now_ms())
    }

    fn publish_at(&self, event: Event, timestamp: Millis) {
        let channel = event.channel();
        let envelope = Envelope {
            event: &event,
            timestamp,
        };
        match serde_json::to_string(&envelope) {
            Ok(payload) => {
                let publisher = self.publisher.clone();
                let channel = channel.to_string();
                tokio::spawn(async move { publisher.publish(&channel, payload).await });
            }
            Err(err) => log::error!("failed to serialize event for {channel}: {err}"),
        }
    }
}

fn now_ms() -> Millis {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as Millis)
        .unwrap_or(0)
}

/// Replica-local fan-out from a received event to connected WebSocket
/// sessions. The actual socket send is edge concern (spec §1); this
/// function only resolves *which* sessions should receive a given event,
/// honouring the directed-delivery rule (spec §4.8).
pub fn directed_targets(event: &Event, sessions: &SessionRegistry) -> Vec<SummonerName> {
    if !event.is_match_directed() {
        return Vec::new();
    }
    event
        .roster()
        .into_iter()
        .filter(|player| sessions.is_connected(player))
        .collect()
}

/// Subscribes to every channel named in spec §6 so a replica can fan
/// received events to its locally connected sessions.
pub const ALL_CHANNELS: &[&str] = &[
    "queue:update",
    "queue:player_joined",
    "queue:player_left",
    "match:found",
    "match:acceptance",
    "draft_starting",
    "draft_updated",
    "draft_completed",
    "draft_confirmed",
    "match_game_ready",
    "game_started",
    "match_cancelled",
    "game_finished",
    "game:winner_vote",
    "spectator:mute",
    "spectator:unmute",
    "spectator:add",
    "spectator:remove",
];

pub async fn subscribe_all(subscriber: &dyn Subscriber) -> Vec<tokio::sync::broadcast::Receiver<String>> {
    let mut receivers = Vec::with_capacity(ALL_CHANNELS.len());
    for channel in ALL_CHANNELS {
        receivers.push(subscriber.subscribe(channel).await);
    }
    receivers
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::kv::pubsub::MemoryBus;

    #[tokio::test]
    async fn publish_serializes_with_type_tag() {
        let bus_impl = Arc::new(MemoryBus::new());
        let mut rx = bus_impl.subscribe("queue:player_joined").await;
        let bus = EventBus::new(bus_impl);
        bus.publish(Event::QueuePlayerJoined {
            summoner_name: "Alice".to_string(),
        })
        .await;
        let payload = rx.recv().await.unwrap();
        assert!(payload.contains("\"type\":\"queue:player_joined\""));
        assert!(payload.contains("Alice"));
    }

    #[test]
    fn match_directed_events_resolve_roster() {
        let sessions = SessionRegistry::new();
        sessions.connect(&"Alice".to_string(), "s1".to_string());
        let event = Event::MatchFound {
            match_id: 1,
            team1: vec!["Alice".to_string()],
            team2: vec!["Bob".to_string()],
            avg_mmr1: 1000.0,
            avg_mmr2: 1000.0,
            timeout_seconds: 30,
        };
        let targets = directed_targets(&event, &sessions);
        assert_eq!(targets, vec!["Alice".to_string()]);
    }

    #[tokio::test]
    async fn spectator_events_serialize_with_type_tag() {
        let bus_impl = Arc::new(MemoryBus::new());
        let mut rx = bus_impl.subscribe("spectator:add").await;
        let bus = EventBus::new(bus_impl);
        bus.publish(Event::SpectatorAdd(SpectatorPayload {
            match_id: 7,
            spectator_name: "Watcher".to_string(),
            performed_by: "Host".to_string(),
        }))
        .await;
        let payload = rx.recv().await.unwrap();
        assert!(payload.contains("\"type\":\"spectator:add\""));
        assert!(payload.contains("Watcher"));
    }

    #[test]
    fn queue_wide_events_are_not_directed() {
        let sessions = SessionRegistry::new();
        let event = Event::QueueUpdate { players_in_queue: 3 };
        assert!(directed_targets(&event, &sessions).is_empty());
    }
}
