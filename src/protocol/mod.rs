//! Wire protocol framing (spec §6).

pub mod start_session;

pub use start_session::{EntrantDescriptor, StartSessionCodec, StartSessionFrame};
