//! External adapters (spec §4.1 Polymorphism note, component C10): thin
//! driver interfaces to SQL, game-client RPC, chat bot, and ranked-data
//! service. Everything else in the crate depends on these traits, never
//! on a concrete transport, mirroring the teacher's `Retriever`/
//! leaderboard services being isolated behind their own modules.

pub mod chat_bridge;
pub mod game_client;
pub mod ranked_data;
pub mod sql;

pub use chat_bridge::ChatBridge;
pub use game_client::GameClientBridge;
pub use ranked_data::RankedDataClient;
pub use sql::SqlStore;
