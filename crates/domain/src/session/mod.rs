//! Session state, profile snapshot and session events

mod event;
mod profile;
mod state;

pub use event::{SessionEvent, StorageChange};
pub use profile::UserProfile;
pub use state::SessionState;
