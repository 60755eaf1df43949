//! Application-visible session state.

mod context;

pub use context::SessionContext;
