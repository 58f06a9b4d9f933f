//! spec §3 "QueueEntry"

use super::player::Lane;
use crate::types::{Millis, SummonerName};
use serde::{Deserialize, Serialize};

/// Per-queue-entry acceptance status (Glossary). Encoded on the wire/in the
/// shared store as the integers spec §3 specifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptanceStatus {
    Idle,
    Awaiting,
    Accepted,
    Declined,
}

impl AcceptanceStatus {
    pub fn as_i8(self) -> i8 {
        match self {
            AcceptanceStatus::Idle => 0,
            AcceptanceStatus::Awaiting => -1,
            AcceptanceStatus::Accepted => 1,
            AcceptanceStatus::Declined => 2,
        }
    }

    pub fn from_i8(value: i8) -> Option<Self> {
        match value {
            0 => Some(AcceptanceStatus::Idle),
            -1 => Some(AcceptanceStatus::Awaiting),
            1 => Some(AcceptanceStatus::Accepted),
            2 => Some(AcceptanceStatus::Declined),
            _ => None,
        }
    }
}

impl Serialize for AcceptanceStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_i8(self.as_i8())
    }
}

impl<'de> Deserialize<'de> for AcceptanceStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = i8::deserialize(deserializer)?;
        AcceptanceStatus::from_i8(value)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid acceptance status {value}")))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    pub summoner_name: SummonerName,
    pub region: String,
    pub custom_lp: i64,
    pub primary_lane: Lane,
    pub secondary_lane: Lane,
    pub join_time: Millis,
    pub queue_position: usize,
    pub acceptance_status: AcceptanceStatus,
}

impl QueueEntry {
    pub fn is_idle(&self) -> bool {
        matches!(self.acceptance_status, AcceptanceStatus::Idle)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        for status in [
            AcceptanceStatus::Idle,
            AcceptanceStatus::Awaiting,
            AcceptanceStatus::Accepted,
            AcceptanceStatus::Declined,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            let back: AcceptanceStatus = serde_json::from_str(&json).unwrap();
            assert_eq!(status, back);
        }
    }
}
