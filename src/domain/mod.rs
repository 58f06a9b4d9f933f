pub mod draft;
pub mod lp;
pub mod match_record;
pub mod player;
pub mod queue_entry;

pub use draft::{DraftAction, DraftState, ActionKind};
pub use match_record::{Match, MatchStatus};
pub use player::{Lane, Player};
pub use queue_entry::{AcceptanceStatus, QueueEntry};
