//! Tradepoint Application - Session core
//!
//! Ports for the outside world and the logic that keeps a session alive:
//! credential storage, single-flight renewal, the request pipeline, session
//! events and the application-visible session state machine.

pub mod auth;
pub mod error;
pub mod pipeline;
pub mod ports;
pub mod session;

#[cfg(test)]
mod testing;

pub use auth::{RefreshCoordinator, RefreshError, SessionBroadcaster, TokenStore};
pub use error::{ApplicationError, ApplicationResult};
pub use pipeline::{Attempt, PipelineError, RequestPipeline};
pub use session::SessionContext;
