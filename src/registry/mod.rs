//! Cross-cutting player registries (spec §4.2, §4.3, components C2/C3).

pub mod ownership;
pub mod player_lock;
pub mod player_state;
pub mod session_registry;

pub use ownership::OwnershipMaps;
pub use player_lock::{ConnectOutcome, PlayerLockRegistry};
pub use player_state::{PlayerState, PlayerStateRegistry};
pub use session_registry::SessionRegistry;
