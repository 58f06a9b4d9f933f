pub mod custom_matches;
pub mod players;
pub mod queue_players;

pub type CustomMatch = custom_matches::Model;
pub type Player = players::Model;
pub type QueuePlayer = queue_players::Model;
