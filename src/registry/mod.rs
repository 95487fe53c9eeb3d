//! Concurrent registries shared by the matchmaking core (spec §3, §4.3).

pub mod broadcasters;
pub mod cooldown;
pub mod sessions;

pub use broadcasters::BroadcasterRegistry;
pub use cooldown::CooldownSet;
pub use sessions::SessionIndex;
