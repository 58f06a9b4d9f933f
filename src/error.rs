//! Domain error kinds shared by every component. Not exception types: each
//! variant is a normal return value the caller is expected to match on, per
//! spec §7's error handling policy.

use crate::types::MatchId;
use thiserror::Error;

/// Phase a match-scoped error occurred in, carried for log/event
/// correlation (spec §7: "every emitted domain error includes matchId and
/// phase").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Queue,
    Acceptance,
    Draft,
    Game,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Queue => "queue",
            Phase::Acceptance => "acceptance",
            Phase::Draft => "draft",
            Phase::Game => "game",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum CoreError {
    /// Could not acquire a distributed lock within its wait budget.
    #[error("contended: {phase} lock for match {match_id:?} (waited {waited_ms}ms)")]
    Contended {
        phase: Phase,
        match_id: Option<MatchId>,
        waited_ms: u64,
    },

    /// A held lock's lease expired before the guarded operation completed.
    #[error("lock lost: {phase} lock for match {match_id:?}")]
    LockLost {
        phase: Phase,
        match_id: Option<MatchId>,
    },

    /// `PlayerState::set` was asked for a transition outside the allowed
    /// graph (spec §4.2).
    #[error("illegal player state transition for {summoner_name}: {from:?} -> {to:?}")]
    IllegalTransition {
        summoner_name: String,
        from: String,
        to: String,
    },

    /// Ownership registration found a different match already owning the
    /// player (spec §4.3).
    #[error("player {summoner_name} already owned by match {existing}")]
    AlreadyOwned {
        summoner_name: String,
        existing: MatchId,
    },

    /// `processAction` was called with an index other than the current one.
    #[error("out of turn action on match {match_id}: expected {expected}, got {got}")]
    OutOfTurn {
        match_id: MatchId,
        expected: usize,
        got: usize,
    },

    /// The acting player is not on the team the current action belongs to.
    #[error("wrong team for action on match {match_id}: player is not on team {required_team}")]
    WrongTeam {
        match_id: MatchId,
        required_team: u8,
    },

    /// Champion already used by a non-SKIPPED action in this draft (I4).
    #[error("champion already used in match {match_id}: {champion}")]
    ChampionUsed { match_id: MatchId, champion: String },

    /// The draft has already consumed all twenty actions (I3).
    #[error("draft already complete for match {match_id}")]
    DraftComplete { match_id: MatchId },

    /// The requested operation does not apply to the match's current phase.
    #[error("match {match_id} is not in the required phase for this operation ({phase})")]
    NotInPhase { match_id: MatchId, phase: Phase },

    /// No match exists with the given id.
    #[error("unknown match {match_id}")]
    UnknownMatch { match_id: MatchId },

    /// A wall-clock timeout elapsed. Not surfaced to API callers per §7;
    /// used internally by timeout-monitor code paths that still want to
    /// express "this deadline passed" as a `Result`.
    #[error("timeout waiting on {phase} for match {match_id:?}")]
    Timeout {
        phase: Phase,
        match_id: Option<MatchId>,
    },

    /// SQL status changed out from under an optimistic check.
    #[error("conflict: match {match_id} status changed under us")]
    Conflict { match_id: MatchId },

    /// An external collaborator (SQL, chat bridge, ranked-data, game
    /// client) could not be reached.
    #[error("downstream unavailable ({what}): {source}")]
    DownstreamUnavailable {
        what: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl CoreError {
    pub fn match_id(&self) -> Option<MatchId> {
        match self {
            CoreError::Contended { match_id, .. } => *match_id,
            CoreError::LockLost { match_id, .. } => *match_id,
            CoreError::AlreadyOwned { .. } => None,
            CoreError::IllegalTransition { .. } => None,
            CoreError::OutOfTurn { match_id, .. } => Some(*match_id),
            CoreError::WrongTeam { match_id, .. } => Some(*match_id),
            CoreError::ChampionUsed { match_id, .. } => Some(*match_id),
            CoreError::DraftComplete { match_id } => Some(*match_id),
            CoreError::NotInPhase { match_id, .. } => Some(*match_id),
            CoreError::UnknownMatch { match_id } => Some(*match_id),
            CoreError::Timeout { match_id, .. } => *match_id,
            CoreError::Conflict { match_id } => Some(*match_id),
            CoreError::DownstreamUnavailable { .. } => None,
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
