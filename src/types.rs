//! Module for type aliases that help to better identify field types

/// Stable identifier for a player: the summoner name, compared
/// case-insensitively everywhere it is used as a map key.
pub type SummonerName = String;

/// Derived stable lock key: `player_<gameName>_<tagLine>` lowercased with
/// non-alphanumerics folded to `_`.
pub type CustomSessionId = String;

pub type MatchId = u64;
pub type SessionId = String;

/// Milliseconds since the Unix epoch, as used throughout the timing fields
/// of the shared store (`joinTime`, `startTimeMs`, `lastActionStartMs`, ...).
pub type Millis = i64;
